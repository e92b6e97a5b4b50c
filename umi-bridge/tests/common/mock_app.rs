use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use umi_api::{Message, decode};
use umi_bridge::services::transport::Uplink;
use umi_bridge::services::{BridgeConfig, CommandChannel, EventBridge};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Connect,
    Send,
    Disconnect,
}

/// One uplink call with the thread that made it and whether it succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub thread: ThreadId,
    pub call: Call,
    pub ok: bool,
}

#[derive(Default)]
struct Script {
    connect_results: VecDeque<io::Result<()>>,
    send_results: VecDeque<io::Result<()>>,
    calls: Vec<Call>,
    attempts: Vec<Attempt>,
    datagrams: Vec<Vec<u8>>,
}

impl Script {
    fn record(&mut self, call: Call, ok: bool) {
        self.calls.push(call);
        self.attempts.push(Attempt {
            thread: thread::current().id(),
            call,
            ok,
        });
    }
}

/// Uplink whose connect and send outcomes are scripted; unscripted calls succeed
#[derive(Clone, Default)]
pub struct MockUplink(Arc<Mutex<Script>>);

impl MockUplink {
    pub fn fail_connects(&self, times: usize) {
        let mut script = self.0.lock().unwrap();
        for _ in 0..times {
            script
                .connect_results
                .push_back(Err(io::ErrorKind::ConnectionRefused.into()));
        }
    }

    pub fn fail_sends(&self, times: usize) {
        let mut script = self.0.lock().unwrap();
        for _ in 0..times {
            script
                .send_results
                .push_back(Err(io::ErrorKind::ConnectionRefused.into()));
        }
    }

    /// Queues send outcomes in order, `false` being a failure
    pub fn script_sends(&self, outcomes: &[bool]) {
        let mut script = self.0.lock().unwrap();
        for &ok in outcomes {
            script.send_results.push_back(if ok {
                Ok(())
            } else {
                Err(io::ErrorKind::ConnectionRefused.into())
            });
        }
    }

    pub fn attempts(&self) -> Vec<Attempt> {
        self.0.lock().unwrap().attempts.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: Call) -> usize {
        self.calls().into_iter().filter(|c| *c == call).count()
    }

    pub fn clear(&self) {
        let mut script = self.0.lock().unwrap();
        script.calls.clear();
        script.attempts.clear();
        script.datagrams.clear();
    }

    /// Every message carried by successfully sent datagrams, in send order
    pub fn sent(&self) -> Vec<Message> {
        let mut messages = Vec::new();
        for datagram in self.0.lock().unwrap().datagrams.iter() {
            decode(datagram)
                .unwrap()
                .for_each_message(&mut |message: &Message| messages.push(message.clone()));
        }
        messages
    }

    pub fn sent_to(&self, address: &str) -> Vec<Message> {
        self.sent()
            .into_iter()
            .filter(|message| message.address == address)
            .collect()
    }
}

impl Uplink for MockUplink {
    fn connect(&mut self, _host: &str, _port: u16) -> io::Result<()> {
        let mut script = self.0.lock().unwrap();
        let result = script.connect_results.pop_front().unwrap_or(Ok(()));
        script.record(Call::Connect, result.is_ok());
        result
    }

    fn send(&mut self, datagram: &[u8]) -> io::Result<()> {
        let mut script = self.0.lock().unwrap();
        let result = script.send_results.pop_front().unwrap_or(Ok(()));
        script.record(Call::Send, result.is_ok());
        if result.is_ok() {
            script.datagrams.push(datagram.to_vec());
        }
        result
    }

    fn disconnect(&mut self) {
        self.0.lock().unwrap().record(Call::Disconnect, true);
    }
}

/// Serial sink capturing every command line
#[derive(Clone, Default)]
pub struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    /// Polls until the sink holds `expected` or the timeout elapses
    pub fn wait_for(&self, expected: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.contents() == expected {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        self.contents() == expected
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub struct MockApp {
    pub bridge: EventBridge,
    pub uplink: MockUplink,
    pub serial: SharedSink,
}

impl MockApp {
    pub fn new() -> Self {
        Self::with_config(BridgeConfig::new("pi-test").with_heartbeat_period(Duration::from_secs(60)))
    }

    pub fn with_config(config: BridgeConfig) -> Self {
        let uplink = MockUplink::default();
        let serial = SharedSink::default();
        let bridge = EventBridge::new(
            config,
            Arc::new(CommandChannel::new(serial.clone())),
            Box::new(uplink.clone()),
        );

        Self {
            bridge,
            uplink,
            serial,
        }
    }

    /// Starts on an ephemeral listen port towards a fixed remote
    pub fn start(self) -> Self {
        self.bridge.start(0, "127.0.0.1", 9000).unwrap();
        self
    }
}
