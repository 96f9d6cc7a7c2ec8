#![allow(dead_code)]

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use oscvars::{
    ConnectionOptions, Endpoint, FieldFlags, GroupDirectory, GroupId, HostFramework, OscMessage,
    SchemaKey, TickReport, Variable, View,
};

static PORT_COUNTER: AtomicU16 = AtomicU16::new(47000);

pub fn next_port() -> u16 {
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

#[derive(Default)]
pub struct RecordingHost {
    pub kinds: Mutex<Vec<(SchemaKey, GroupId)>>,
}

impl RecordingHost {
    pub fn keys(&self) -> Vec<String> {
        self.kinds.lock().iter().map(|(k, _)| k.to_string()).collect()
    }
}

impl HostFramework for RecordingHost {
    fn register_schema_kind(&self, _category: &str, key: &SchemaKey, group: GroupId) {
        self.kinds.lock().push((key.clone(), group));
    }

    fn unregister_schema_kind(&self, _category: &str, key: &SchemaKey) {
        self.kinds.lock().retain(|(k, _)| k != key);
    }
}

#[derive(Default)]
pub struct ViewLog {
    pub fields: Vec<(String, FieldFlags)>,
    pub endpoint: Option<(Endpoint, FieldFlags)>,
    pub endpoint_updates: usize,
    pub destroyed: bool,
}

pub struct RecordingView(pub Arc<Mutex<ViewLog>>);

impl RecordingView {
    pub fn new() -> (Self, Arc<Mutex<ViewLog>>) {
        let log = Arc::new(Mutex::new(ViewLog::default()));
        (Self(log.clone()), log)
    }
}

impl View for RecordingView {
    fn add_field(&mut self, variable: &Variable, flags: FieldFlags) {
        self.0.lock().fields.push((variable.name().to_string(), flags));
    }

    fn remove_field(&mut self, name: &str) {
        self.0.lock().fields.retain(|(n, _)| n != name);
    }

    fn set_endpoint(&mut self, endpoint: &Endpoint, flags: FieldFlags) {
        let mut log = self.0.lock();
        log.endpoint = Some((endpoint.clone(), flags));
        log.endpoint_updates += 1;
    }

    fn destroy(&mut self) {
        self.0.lock().destroyed = true;
    }
}

pub fn directory() -> (Arc<RecordingHost>, GroupDirectory) {
    let host = Arc::new(RecordingHost::default());
    let dir = GroupDirectory::with_options(
        host.clone(),
        ConnectionOptions {
            settle_delay: Duration::ZERO,
            ..Default::default()
        },
    );
    (host, dir)
}

/// A plain socket standing in for the remote OSC peer.
pub struct Peer {
    pub socket: UdpSocket,
}

impl Peer {
    pub fn bind() -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(50)))
            .unwrap();
        Self { socket }
    }

    pub fn port(&self) -> u16 {
        self.socket.local_addr().unwrap().port()
    }

    pub fn send_to(&self, port: u16, message: &OscMessage) {
        let target: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
        self.socket.send_to(&message.encode().unwrap(), target).unwrap();
    }

    /// Sends `messages` as one immediate `#bundle` datagram.
    pub fn send_bundle(&self, port: u16, messages: &[OscMessage]) {
        let mut data = b"#bundle\0".to_vec();
        data.extend_from_slice(&1u64.to_be_bytes());
        for message in messages {
            let encoded = message.encode().unwrap();
            data.extend_from_slice(&(encoded.len() as i32).to_be_bytes());
            data.extend_from_slice(&encoded);
        }
        self.send_raw(port, &data);
    }

    pub fn send_raw(&self, port: u16, data: &[u8]) {
        self.socket.send_to(data, ("127.0.0.1", port)).unwrap();
    }

    /// Collects messages until `count` arrived or `timeout_ms` passed.
    pub fn receive(&self, count: usize, timeout_ms: u64) -> Vec<OscMessage> {
        let mut messages = Vec::new();
        let mut buf = [0u8; 2048];
        let start = Instant::now();
        while messages.len() < count && start.elapsed() < Duration::from_millis(timeout_ms) {
            if let Ok((size, _)) = self.socket.recv_from(&mut buf) {
                messages.extend(OscMessage::decode_packet(&buf[..size]).unwrap());
            }
        }
        messages
    }
}

/// Ticks `tick` until something was drained or `timeout_ms` passed.
pub fn tick_until_drained(mut tick: impl FnMut() -> TickReport, timeout_ms: u64) -> TickReport {
    let start = Instant::now();
    let mut total = TickReport::default();
    while start.elapsed() < Duration::from_millis(timeout_ms) {
        let report = tick();
        if !report.is_idle() {
            total = report;
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }
    total
}

/// Gives loopback datagrams time to reach the receiving socket's buffer.
pub fn settle() {
    thread::sleep(Duration::from_millis(20));
}
