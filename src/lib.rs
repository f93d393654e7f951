pub mod capture;
pub mod config;
pub mod playback;
pub mod transport;
pub mod uplink;

pub use capture::{
    AudioFrame, CapturePipeline, FileFrameSource, FrameRelay, FrameSource, RecordingWindow,
    SourceEvent, WindowState,
};
pub use config::Config;
pub use playback::{AudioDecoder, DecodeStep, OutputSink, PlaybackStats, SymphoniaDecoder};
pub use transport::{FrameKind, Transport, TransportEvent, TransportHandle, WsTransport};
pub use uplink::{ControlMessage, DuplexSession, ReconnectPolicy, SessionState, UplinkError};
