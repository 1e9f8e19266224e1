//! WebSocket network sink.
//!
//! `WebSocketSink` turns a WebSocket connection into an ordered, non-blocking
//! byte sink. Writes land in a bounded queue; a supervisor thread dials the
//! peer, restarts the connection after any failure, and runs one read and one
//! write pump per live connection. The peer can gate output by announcing
//! whether a consumer is attached, and heartbeats detect silent peers.

mod backoff;
mod config;
mod control;
mod envelope;
mod handler;
mod lifecycle;
mod liveness;
mod pumps;
mod queue;
mod transport;

#[cfg(test)]
mod tests;

pub use config::{
    BackoffPolicy, DEFAULT_CONNECT_TIMEOUT, DEFAULT_HEARTBEAT_PERIOD, DEFAULT_MAX_FRAME_SIZE,
    DEFAULT_PONG_TIMEOUT, DEFAULT_QUEUE_CAPACITY, DEFAULT_RETRY_BASE, DEFAULT_ROLE,
    DEFAULT_WRITE_TIMEOUT, WebSocketSinkConfig,
};
pub use control::{
    COMMAND_PEER_OFFLINE, COMMAND_PEER_ONLINE, ControlSignal, FRAME_TYPE_COMMAND, FRAME_TYPE_DATA,
    decode_control,
};
pub use envelope::{Envelope, EnvelopeKind};
pub use handler::WebSocketSink;
pub use lifecycle::{ConnectHandler, Phase};
