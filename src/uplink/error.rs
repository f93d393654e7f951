use thiserror::Error;

/// Errors surfaced by the uplink session.
///
/// Configuration problems (`InvalidUri`, `AlreadyRunning`) are returned
/// synchronously and never retried. Send failures are absorbed up to the
/// bounded retry limit before surfacing as `SendFailed`; reconnection then
/// proceeds in the background.
#[derive(Debug, Error)]
pub enum UplinkError {
    #[error("uplink session is already running")]
    AlreadyRunning,

    #[error("invalid uplink uri: {0:?}")]
    InvalidUri(String),

    #[error("not connected to server")]
    NotConnected,

    #[error("payload is empty")]
    EmptyPayload,

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("send failed after {attempts} attempts: {reason}")]
    SendFailed { attempts: u32, reason: String },
}
