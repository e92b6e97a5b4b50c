use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU16, AtomicU32, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use umi_api::codec::MAX_PACKET_SIZE;
use umi_api::models::{Command, HelloAnnouncement, SensorEvent, classify_line};
use umi_api::{Message, Packet, decode, encode};

use super::transport::{UdpListener, UdpUplink, Uplink};
use super::{ActivityIndicator, CommandChannel, lock};
use crate::configs;
use crate::error::{BridgeError, Result};

/// Lifecycle of an [`EventBridge`]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Stopping = 3,
}

impl BridgeState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopping,
            _ => Self::Stopped,
        }
    }
}

/// Bridge configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Identity reported in every outbound message
    pub device_id: String,
    /// Interval between liveness announcements
    pub heartbeat_period: Duration,
    /// Blink the board indicator on each detection
    pub blink_on_detect: bool,
}

impl BridgeConfig {
    pub fn new<S: Into<String>>(device_id: S) -> Self {
        Self {
            device_id: device_id.into(),
            heartbeat_period: Duration::from_millis(5000),
            blink_on_detect: false,
        }
    }

    pub fn with_heartbeat_period(mut self, period: Duration) -> Self {
        self.heartbeat_period = period;
        self
    }

    pub fn with_blink_on_detect(mut self, enabled: bool) -> Self {
        self.blink_on_detect = enabled;
        self
    }
}

impl From<&configs::Bridge> for BridgeConfig {
    fn from(bridge: &configs::Bridge) -> Self {
        Self::new(bridge.device_id.clone())
            .with_heartbeat_period(bridge.heartbeat_period())
            .with_blink_on_detect(bridge.blink_on_detect)
    }
}

/// Bridge statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Sensor events accepted by the uplink
    pub events_sent: u64,
    /// Sensor events dropped after the retry budget ran out
    pub events_dropped: u64,
    /// Announcements accepted by the uplink
    pub hellos_sent: u64,
    /// Announcements that failed to send
    pub hellos_failed: u64,
    /// Datagrams decoded while running
    pub datagrams_received: u64,
    /// Datagrams discarded as undecodable
    pub malformed_datagrams: u64,
    /// Commands written to the serial board
    pub commands_applied: u64,
    /// Messages with an address this node does not handle
    pub unhandled_messages: u64,
    /// Serial lines or datagrams dropped outside the running state
    pub ignored_inputs: u64,
}

#[derive(Default)]
struct Counters {
    events_sent: AtomicU64,
    events_dropped: AtomicU64,
    hellos_sent: AtomicU64,
    hellos_failed: AtomicU64,
    datagrams_received: AtomicU64,
    malformed_datagrams: AtomicU64,
    commands_applied: AtomicU64,
    unhandled_messages: AtomicU64,
    ignored_inputs: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> BridgeStats {
        BridgeStats {
            events_sent: self.events_sent.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            hellos_sent: self.hellos_sent.load(Ordering::Relaxed),
            hellos_failed: self.hellos_failed.load(Ordering::Relaxed),
            datagrams_received: self.datagrams_received.load(Ordering::Relaxed),
            malformed_datagrams: self.malformed_datagrams.load(Ordering::Relaxed),
            commands_applied: self.commands_applied.load(Ordering::Relaxed),
            unhandled_messages: self.unhandled_messages.load(Ordering::Relaxed),
            ignored_inputs: self.ignored_inputs.load(Ordering::Relaxed),
        }
    }
}

/// Outbound link plus the remote it should be attached to.
///
/// `connected` is only true after a successful connect and is cleared on
/// every send failure before anything else is tried.
struct ConnectionState {
    uplink: Box<dyn Uplink>,
    connected: bool,
    remote: Option<(String, u16)>,
}

impl ConnectionState {
    fn ensure_connected(&mut self) -> Result<()> {
        if self.connected {
            return Ok(());
        }

        let Some((host, port)) = self.remote.as_ref() else {
            return Err(BridgeError::NoRemote);
        };

        match self.uplink.connect(host, *port) {
            Ok(()) => {
                self.connected = true;
                tracing::debug!("Uplink attached to {}:{}", host, port);
                Ok(())
            }
            Err(source) => Err(BridgeError::Connect {
                endpoint: format!("{host}:{port}"),
                source,
            }),
        }
    }

    fn mark_disconnected(&mut self) {
        self.uplink.disconnect();
        self.connected = false;
    }
}

struct Shared {
    config: BridgeConfig,
    state: AtomicU8,
    running: AtomicBool,
    link: Mutex<ConnectionState>,
    listen_port: AtomicU16,
    event_sequence: AtomicU32,
    hello_sequence: AtomicU32,
    commands: Arc<CommandChannel>,
    epoch: Instant,
    counters: Counters,
}

impl Shared {
    fn state(&self) -> BridgeState {
        BridgeState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: BridgeState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn is_running(&self) -> bool {
        self.state() == BridgeState::Running
    }

    /// Truncated to 32 bits, wraps after ~49 days
    fn monotonic_ms(&self) -> u32 {
        self.epoch.elapsed().as_millis() as u32
    }

    /// Connect if needed, send, and on failure reconnect once and send once more.
    ///
    /// The link lock is held for the whole sequence so concurrent callers
    /// never interleave their connect and send steps.
    fn send_with_retry(&self, packet: &Packet) -> Result<()> {
        let datagram = encode(packet);
        if datagram.len() > MAX_PACKET_SIZE {
            return Err(BridgeError::Oversized(datagram.len()));
        }

        let mut link = lock(&self.link);

        link.ensure_connected()?;

        let first = match link.uplink.send(&datagram) {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        link.mark_disconnected();
        tracing::debug!("Send failed ({}), reconnecting once", first);
        link.ensure_connected()?;

        match link.uplink.send(&datagram) {
            Ok(()) => Ok(()),
            Err(e) => {
                link.mark_disconnected();
                Err(BridgeError::Send(e))
            }
        }
    }

    fn announce(&self) {
        let hello = HelloAnnouncement {
            device_id: self.config.device_id.clone(),
            listen_port: self.listen_port.load(Ordering::Acquire),
            hello_sequence: self.hello_sequence.fetch_add(1, Ordering::AcqRel),
        };

        match self.send_with_retry(&hello.to_message().into()) {
            Ok(()) => {
                Counters::bump(&self.counters.hellos_sent);
                tracing::debug!("TX hello seq={}", hello.hello_sequence);
            }
            Err(e) => {
                Counters::bump(&self.counters.hellos_failed);
                tracing::warn!("Failed to send hello seq={}: {}", hello.hello_sequence, e);
            }
        }
    }

    fn run_heartbeat(&self, stop: Receiver<()>) {
        let period = self.config.heartbeat_period;

        loop {
            match stop.recv_timeout(period) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }

            if !self.running.load(Ordering::Acquire) {
                break;
            }

            self.announce();
        }

        tracing::debug!("Heartbeat stopped");
    }

    fn handle_datagram(&self, datagram: &[u8]) -> Result<usize> {
        if !self.is_running() {
            Counters::bump(&self.counters.ignored_inputs);
            return Ok(0);
        }

        let packet = match decode(datagram) {
            Ok(packet) => packet,
            Err(e) => {
                Counters::bump(&self.counters.malformed_datagrams);
                return Err(e.into());
            }
        };
        Counters::bump(&self.counters.datagrams_received);

        let mut dispatched = 0;
        packet.for_each_message(&mut |message: &Message| {
            self.handle_message(message);
            dispatched += 1;
        });

        Ok(dispatched)
    }

    fn handle_message(&self, message: &Message) {
        tracing::debug!("RX {}", message);

        match Command::parse(message) {
            Some(command) => {
                if self.commands.send_line(command.serial_line()) {
                    Counters::bump(&self.counters.commands_applied);
                } else {
                    tracing::warn!("Failed to apply {:?} to serial board", command);
                }
            }
            None => {
                Counters::bump(&self.counters.unhandled_messages);
                tracing::debug!("Ignoring unhandled address {}", message.address);
            }
        }
    }
}

#[derive(Default)]
struct Workers {
    listener: Option<UdpListener>,
    heartbeat: Option<(Sender<()>, JoinHandle<()>)>,
}

/// Relays serial detections to a UDP peer and applies inbound commands.
///
/// Events are delivered at most once: a send that exhausts its retry budget
/// is dropped, never queued.
pub struct EventBridge {
    shared: Arc<Shared>,
    workers: Mutex<Workers>,
    indicator: Mutex<Option<ActivityIndicator>>,
}

impl EventBridge {
    pub fn new(config: BridgeConfig, commands: Arc<CommandChannel>, uplink: Box<dyn Uplink>) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                state: AtomicU8::new(BridgeState::Stopped as u8),
                running: AtomicBool::new(false),
                link: Mutex::new(ConnectionState {
                    uplink,
                    connected: false,
                    remote: None,
                }),
                listen_port: AtomicU16::new(0),
                event_sequence: AtomicU32::new(1),
                hello_sequence: AtomicU32::new(1),
                commands,
                epoch: Instant::now(),
                counters: Counters::default(),
            }),
            workers: Mutex::new(Workers::default()),
            indicator: Mutex::new(None),
        }
    }

    pub fn with_udp(config: BridgeConfig, commands: Arc<CommandChannel>) -> Self {
        Self::new(config, commands, Box::new(UdpUplink::new()))
    }

    /// Binds the command listener, attaches the uplink and starts the heartbeat.
    ///
    /// A bind failure leaves the bridge `Stopped` with nothing retained. A
    /// failed initial connect is only logged; the next send retries it.
    /// Port 0 binds an ephemeral port, see [`EventBridge::listen_port`].
    pub fn start(&self, listen_port: u16, remote_host: &str, remote_port: u16) -> Result<()> {
        if self.shared.config.heartbeat_period.is_zero() {
            return Err(BridgeError::ZeroHeartbeat);
        }

        if self
            .shared
            .state
            .compare_exchange(
                BridgeState::Stopped as u8,
                BridgeState::Starting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return Err(BridgeError::AlreadyRunning);
        }

        match self.launch(listen_port, remote_host, remote_port) {
            Ok(()) => {
                self.shared.set_state(BridgeState::Running);
                tracing::info!(
                    "Bridge {} running: listening on UDP {}, uplink {}:{}",
                    self.shared.config.device_id,
                    self.listen_port(),
                    remote_host,
                    remote_port
                );
                Ok(())
            }
            Err(e) => {
                self.teardown();
                self.shared.set_state(BridgeState::Stopped);
                tracing::error!("Failed to start bridge: {}", e);
                Err(e)
            }
        }
    }

    fn launch(&self, listen_port: u16, remote_host: &str, remote_port: u16) -> Result<()> {
        let mut listener = UdpListener::bind(listen_port).map_err(|source| BridgeError::Bind {
            port: listen_port,
            source,
        })?;
        self.shared
            .listen_port
            .store(listener.local_port()?, Ordering::Release);

        {
            let mut link = lock(&self.shared.link);
            link.remote = Some((remote_host.to_string(), remote_port));
            if let Err(e) = link.ensure_connected() {
                tracing::warn!("Initial connect failed, retrying on next send: {}", e);
            }
        }

        self.shared.running.store(true, Ordering::Release);

        let shared = self.shared.clone();
        listener.start(move |datagram, from| {
            if let Err(e) = shared.handle_datagram(datagram) {
                tracing::warn!("Discarding datagram from {}: {}", from, e);
            }
        })?;
        lock(&self.workers).listener = Some(listener);

        if self.shared.config.blink_on_detect {
            let indicator = ActivityIndicator::spawn(self.shared.commands.clone())?;
            *lock(&self.indicator) = Some(indicator);
        }

        let (stop_tx, stop_rx) = mpsc::channel();
        let shared = self.shared.clone();
        let heartbeat = thread::Builder::new()
            .name("umi-heartbeat".into())
            .spawn(move || shared.run_heartbeat(stop_rx))?;
        lock(&self.workers).heartbeat = Some((stop_tx, heartbeat));

        Ok(())
    }

    /// Stops every worker and detaches the uplink. Returns once the heartbeat
    /// and receive threads have exited; a no-op unless running.
    pub fn stop(&self) {
        if self
            .shared
            .state
            .compare_exchange(
                BridgeState::Running as u8,
                BridgeState::Stopping as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return;
        }

        self.teardown();
        self.shared.set_state(BridgeState::Stopped);
        tracing::info!("Bridge {} stopped", self.shared.config.device_id);
    }

    fn teardown(&self) {
        self.shared.running.store(false, Ordering::Release);

        let (listener, heartbeat) = {
            let mut workers = lock(&self.workers);
            (workers.listener.take(), workers.heartbeat.take())
        };

        if let Some((stop_tx, handle)) = heartbeat {
            let _ = stop_tx.send(());
            if handle.join().is_err() {
                tracing::warn!("Heartbeat thread panicked");
            }
        }

        if let Some(mut listener) = listener {
            listener.stop();
        }

        let indicator = lock(&self.indicator).take();
        if let Some(mut indicator) = indicator {
            indicator.shutdown();
        }

        let mut link = lock(&self.shared.link);
        link.mark_disconnected();
        link.remote = None;
    }

    /// Forwards a framed serial line as a sensor event.
    ///
    /// Returns the event that was built, whether or not it was delivered.
    /// Lines outside `Running` and unrecognised lines produce nothing.
    pub fn on_serial_event(&self, line: &str) -> Option<SensorEvent> {
        if !self.shared.is_running() {
            Counters::bump(&self.shared.counters.ignored_inputs);
            return None;
        }

        let detected = classify_line(line)?;

        if detected && self.shared.config.blink_on_detect {
            if let Some(indicator) = lock(&self.indicator).as_ref() {
                indicator.pulse();
            }
        }

        let event = SensorEvent {
            device_id: self.shared.config.device_id.clone(),
            sequence: self.shared.event_sequence.fetch_add(1, Ordering::AcqRel),
            detected,
            timestamp_ms: self.shared.monotonic_ms(),
        };

        match self.shared.send_with_retry(&event.to_message().into()) {
            Ok(()) => {
                Counters::bump(&self.shared.counters.events_sent);
                tracing::debug!(
                    "TX prox seq={} detected={} ts={}",
                    event.sequence,
                    event.detected as i32,
                    event.timestamp_ms
                );
            }
            Err(e) => {
                Counters::bump(&self.shared.counters.events_dropped);
                tracing::warn!("Dropped prox seq={}: {}", event.sequence, e);
            }
        }

        Some(event)
    }

    /// Runs the bounded connect/send/reconnect/resend sequence for one packet
    pub fn send_with_retry(&self, packet: &Packet) -> Result<()> {
        self.shared.send_with_retry(packet)
    }

    /// Decodes one inbound datagram and dispatches every message it carries,
    /// returning how many were dispatched.
    pub fn handle_datagram(&self, datagram: &[u8]) -> Result<usize> {
        self.shared.handle_datagram(datagram)
    }

    pub fn state(&self) -> BridgeState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        lock(&self.shared.link).connected
    }

    /// Port actually bound by the listener, 0 before the first start
    pub fn listen_port(&self) -> u16 {
        self.shared.listen_port.load(Ordering::Acquire)
    }

    pub fn device_id(&self) -> &str {
        &self.shared.config.device_id
    }

    pub fn stats(&self) -> BridgeStats {
        self.shared.counters.snapshot()
    }
}

impl Drop for EventBridge {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use umi_api::Bundle;

    use super::*;

    struct NullUplink;

    impl Uplink for NullUplink {
        fn connect(&mut self, _: &str, _: u16) -> io::Result<()> {
            Ok(())
        }

        fn send(&mut self, _: &[u8]) -> io::Result<()> {
            Ok(())
        }

        fn disconnect(&mut self) {}
    }

    fn bridge() -> EventBridge {
        EventBridge::new(
            BridgeConfig::new("pi-test").with_heartbeat_period(Duration::from_secs(60)),
            Arc::new(CommandChannel::disconnected()),
            Box::new(NullUplink),
        )
    }

    #[test]
    fn test_config_from_settings() {
        let settings = configs::Bridge {
            device_id: "pi-09".into(),
            heartbeat_ms: 250,
            blink_on_detect: true,
            ..Default::default()
        };

        let config = BridgeConfig::from(&settings);
        assert_eq!(config.device_id, "pi-09");
        assert_eq!(config.heartbeat_period, Duration::from_millis(250));
        assert!(config.blink_on_detect);
    }

    #[test]
    fn test_send_without_remote() {
        let bridge = bridge();
        let packet: Packet = Message::new("/umi/hello").into();
        assert!(matches!(
            bridge.send_with_retry(&packet),
            Err(BridgeError::NoRemote)
        ));
        assert!(!bridge.is_connected());
    }

    #[test]
    fn test_oversized_datagram_rejected() {
        let bridge = bridge();
        bridge.start(0, "127.0.0.1", 9).unwrap();

        let packet: Packet = Message::new("/umi/hello")
            .with_blob(vec![0; MAX_PACKET_SIZE])
            .into();
        assert!(matches!(
            bridge.send_with_retry(&packet),
            Err(BridgeError::Oversized(len)) if len > MAX_PACKET_SIZE
        ));
        assert!(bridge.is_connected());
    }

    #[test]
    fn test_zero_heartbeat_rejected() {
        let bridge = EventBridge::new(
            BridgeConfig::new("pi-test").with_heartbeat_period(Duration::ZERO),
            Arc::new(CommandChannel::disconnected()),
            Box::new(NullUplink),
        );

        assert!(matches!(
            bridge.start(0, "127.0.0.1", 9),
            Err(BridgeError::ZeroHeartbeat)
        ));
        assert_eq!(bridge.state(), BridgeState::Stopped);
        assert_eq!(bridge.listen_port(), 0);
    }

    #[test]
    fn test_inputs_ignored_when_stopped() {
        let bridge = bridge();
        assert_eq!(bridge.state(), BridgeState::Stopped);
        assert!(bridge.on_serial_event("D").is_none());

        let datagram = encode(&Bundle::immediate().with(Message::new("/umi/led").with_int(1)).into());
        assert_eq!(bridge.handle_datagram(&datagram).unwrap(), 0);
        assert_eq!(bridge.stats().ignored_inputs, 2);
    }

    #[test]
    fn test_start_twice_and_stop() {
        let bridge = bridge();
        bridge.start(0, "127.0.0.1", 9).unwrap();
        assert_eq!(bridge.state(), BridgeState::Running);
        assert_ne!(bridge.listen_port(), 0);
        assert!(bridge.is_connected());

        assert!(matches!(
            bridge.start(0, "127.0.0.1", 9),
            Err(BridgeError::AlreadyRunning)
        ));

        bridge.stop();
        assert_eq!(bridge.state(), BridgeState::Stopped);
        assert!(!bridge.is_connected());
        bridge.stop();
    }
}
