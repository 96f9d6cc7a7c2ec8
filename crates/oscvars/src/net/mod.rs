mod connection;
mod message;
mod stats;

pub use connection::{
    BoundState, Connection, ConnectionOptions, DEFAULT_DRAIN_LIMIT, DEFAULT_SETTLE_DELAY, Endpoint,
    Mode, OpenSocket,
};
pub use message::{ArgType, MAX_DATAGRAM_SIZE, MessageError, OscArg, OscMessage};
pub use stats::NetworkStats;
