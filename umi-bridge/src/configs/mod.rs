pub mod settings;

pub use settings::{Audio, Bridge, Logger, Remote, Serial, Settings};
