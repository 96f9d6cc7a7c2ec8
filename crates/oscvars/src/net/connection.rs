use std::fmt;
use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::message::{MAX_DATAGRAM_SIZE, OscMessage};
use super::stats::NetworkStats;

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_DRAIN_LIMIT: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Sender,
    Receiver,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Sender => "sender",
            Mode::Receiver => "receiver",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mode::Sender => "Sender",
            Mode::Receiver => "Receiver",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a group's socket points. The variant determines the group's mode.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Sender { host: String, port: u16 },
    Receiver { port: u16 },
}

impl Endpoint {
    pub fn sender(host: impl Into<String>, port: u16) -> Self {
        Endpoint::Sender {
            host: host.into(),
            port,
        }
    }

    pub fn receiver(port: u16) -> Self {
        Endpoint::Receiver { port }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Endpoint::Sender { .. } => Mode::Sender,
            Endpoint::Receiver { .. } => Mode::Receiver,
        }
    }

    pub fn port(&self) -> u16 {
        match self {
            Endpoint::Sender { port, .. } | Endpoint::Receiver { port } => *port,
        }
    }

    pub fn host(&self) -> Option<&str> {
        match self {
            Endpoint::Sender { host, .. } => Some(host),
            Endpoint::Receiver { .. } => None,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Sender { host, port } => write!(f, "-> {}:{}", host, port),
            Endpoint::Receiver { port } => write!(f, "<- :{}", port),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundState {
    Unbound,
    Bound,
    BindFailed,
}

impl BoundState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoundState::Unbound => "unbound",
            BoundState::Bound => "bound",
            BoundState::BindFailed => "bind failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionOptions {
    /// Wait before binding a receiver so the OS can release the previous binding.
    pub settle_delay: Duration,
    /// Most datagrams read by one drain; the rest wait for the next tick.
    pub drain_limit: usize,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
            drain_limit: DEFAULT_DRAIN_LIMIT,
        }
    }
}

#[derive(Debug)]
pub struct OpenSocket {
    socket: UdpSocket,
    target: Option<SocketAddr>,
}

impl OpenSocket {
    /// Binds the socket for `endpoint`.
    ///
    /// A sender resolves its host here, which may block on a DNS lookup for as
    /// long as the system resolver takes. Callers run this outside any lock.
    pub fn open(endpoint: &Endpoint) -> io::Result<Self> {
        match endpoint {
            Endpoint::Sender { host, port } => {
                let target = resolve_target(host, *port);
                let local: SocketAddr = match target {
                    Some(SocketAddr::V6(_)) => (Ipv6Addr::UNSPECIFIED, 0).into(),
                    _ => (Ipv4Addr::UNSPECIFIED, 0).into(),
                };
                let socket = UdpSocket::bind(local)?;
                socket.set_nonblocking(true)?;
                Ok(Self { socket, target })
            }
            Endpoint::Receiver { port } => {
                let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, *port))?;
                socket.set_nonblocking(true)?;
                Ok(Self {
                    socket,
                    target: None,
                })
            }
        }
    }
}

fn resolve_target(host: &str, port: u16) -> Option<SocketAddr> {
    match (host, port).to_socket_addrs() {
        Ok(addrs) => {
            let addrs: Vec<SocketAddr> = addrs.collect();
            let target = addrs
                .iter()
                .find(|a| a.is_ipv4())
                .or_else(|| addrs.first())
                .copied();
            if target.is_none() {
                log::warn!("Host {} resolved to no addresses", host);
            }
            target
        }
        Err(e) => {
            log::warn!("Could not resolve OSC target {}:{}: {}", host, port, e);
            None
        }
    }
}

#[derive(Debug)]
pub struct Connection {
    endpoint: Endpoint,
    options: ConnectionOptions,
    socket: Option<UdpSocket>,
    target: Option<SocketAddr>,
    local_addr: Option<SocketAddr>,
    state: BoundState,
    stats: NetworkStats,
    recv_buffer: Vec<u8>,
}

impl Connection {
    pub fn new(endpoint: Endpoint, options: ConnectionOptions) -> Self {
        Self {
            endpoint,
            options,
            socket: None,
            target: None,
            local_addr: None,
            state: BoundState::Unbound,
            stats: NetworkStats::default(),
            recv_buffer: vec![0u8; MAX_DATAGRAM_SIZE],
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn mode(&self) -> Mode {
        self.endpoint.mode()
    }

    pub fn state(&self) -> BoundState {
        self.state
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn target(&self) -> Option<SocketAddr> {
        self.target
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    /// Replaces the endpoint and leaves the connection unbound until the next reset.
    pub fn set_endpoint(&mut self, endpoint: Endpoint) {
        self.unbind();
        self.endpoint = endpoint;
    }

    pub fn unbind(&mut self) {
        self.socket = None;
        self.target = None;
        self.local_addr = None;
        self.state = BoundState::Unbound;
    }

    pub fn settle_delay(&self) -> Duration {
        match self.endpoint {
            Endpoint::Receiver { .. } => self.options.settle_delay,
            Endpoint::Sender { .. } => Duration::ZERO,
        }
    }

    /// Installs the outcome of [`OpenSocket::open`] for the current endpoint.
    pub fn attach(&mut self, opened: io::Result<OpenSocket>) -> BoundState {
        self.unbind();

        match opened {
            Ok(OpenSocket { socket, target }) => {
                self.local_addr = socket.local_addr().ok();
                self.socket = Some(socket);
                self.target = target;
                self.state = BoundState::Bound;
                match &self.endpoint {
                    Endpoint::Receiver { port } => {
                        log::info!("OSC receiver listening on port {}", port)
                    }
                    Endpoint::Sender { host, port } => {
                        log::info!("OSC sender ready for {}:{}", host, port)
                    }
                }
            }
            Err(e) => {
                self.state = BoundState::BindFailed;
                match &self.endpoint {
                    Endpoint::Receiver { port } => {
                        log::error!("Failed to set up OSC receiver on port {}: {}", port, e)
                    }
                    Endpoint::Sender { host, port } => {
                        log::error!("Failed to set up OSC sender for {}:{}: {}", host, port, e)
                    }
                }
            }
        }

        self.state
    }

    /// Reads the datagrams currently buffered by the OS without blocking, up to
    /// the drain limit.
    pub fn drain(&mut self) -> Vec<OscMessage> {
        let mut messages = Vec::new();
        let Some(socket) = self.socket.as_ref() else {
            return messages;
        };

        for _ in 0..self.options.drain_limit {
            match socket.recv_from(&mut self.recv_buffer) {
                Ok((size, addr)) => match OscMessage::decode_packet(&self.recv_buffer[..size]) {
                    Ok(decoded) => {
                        self.stats.record_received(size, decoded.len());
                        messages.extend(decoded);
                    }
                    Err(e) => {
                        self.stats.decode_errors += 1;
                        log::debug!("Dropped malformed datagram from {}: {}", addr, e);
                    }
                },
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::ConnectionReset => continue,
                Err(e) => {
                    log::warn!("Receive error on {}: {}", self.endpoint, e);
                    break;
                }
            }
        }

        messages
    }

    /// Fire-and-forget send. Returns whether a datagram was handed to the OS.
    pub fn send(&mut self, message: &OscMessage) -> bool {
        let (Some(socket), Some(target)) = (self.socket.as_ref(), self.target) else {
            return false;
        };

        let data = match message.encode() {
            Ok(data) => data,
            Err(e) => {
                self.stats.send_errors += 1;
                log::warn!("Cannot encode message for {}: {}", message.address, e);
                return false;
            }
        };

        match socket.send_to(&data, target) {
            Ok(bytes) => {
                self.stats.record_sent(bytes);
                true
            }
            Err(e) => {
                self.stats.send_errors += 1;
                log::debug!("Send to {} failed: {}", target, e);
                false
            }
        }
    }
}
