//! Duplex uplink session management
//!
//! This module owns the single transport connection and its lifecycle:
//! - `DuplexSession`: connect, send-binary/send-text, manual stop
//! - `ReconnectPolicy` and the bounded backoff worker
//! - Control messages sent on wake and on connect

pub mod error;
pub mod messages;
pub mod reconnect;
pub mod session;

pub use error::UplinkError;
pub use messages::{format_mac, ControlMessage};
pub use reconnect::ReconnectPolicy;
pub use session::{DuplexSession, SessionState};
