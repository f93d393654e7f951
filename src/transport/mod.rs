//! Duplex transport abstraction
//!
//! The uplink session owns exactly one transport connection at a time and
//! consumes its lifecycle as an ordered event stream: events are delivered
//! in emission order and fully processed before the next one is dispatched.

pub mod ws;

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc;

pub use ws::WsTransport;

/// Frame kind for outbound sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Binary,
    Text,
}

/// How badly a transport error broke the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Momentary failure; the connection object may recover
    Transient,
    /// TLS/session-level failure; the handle must be torn down and rebuilt
    Fatal,
}

/// Lifecycle events emitted by a connection, in order.
#[derive(Debug)]
pub enum TransportEvent {
    BeforeConnect,
    Begin,
    Connected,
    Data(Vec<u8>),
    Disconnected,
    Error(TransportErrorKind),
    Closed,
    Finish,
}

/// Connection factory.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Establish a connection. Returns the send handle and the lifecycle
    /// event stream (which starts with BeforeConnect/Begin/Connected).
    async fn connect(
        &self,
        uri: &str,
    ) -> Result<(Arc<dyn TransportHandle>, mpsc::Receiver<TransportEvent>)>;
}

/// A live connection.
#[async_trait::async_trait]
pub trait TransportHandle: Send + Sync {
    /// Send one frame; returns the confirmed byte count.
    async fn send(&self, payload: &[u8], kind: FrameKind) -> Result<usize>;

    /// Whether the connection currently looks alive.
    fn is_connected(&self) -> bool;

    /// Tear the connection down. Safe to call more than once.
    async fn close(&self);
}
