//! Wakeword-gated audio capture
//!
//! This module provides the capture side of the agent:
//! - `FrameSource`: the frame-fetch interface over the detection engine
//! - `FrameRelay`: the two-slot hand-off between capture and uplink
//! - `RecordingWindow`: the wake-opened, duration-bounded capture window
//! - `CapturePipeline`: the producer/consumer worker pair tying them together

pub mod pipeline;
pub mod relay;
pub mod source;
pub mod window;

pub use pipeline::CapturePipeline;
pub use relay::FrameRelay;
pub use source::{AudioFrame, FileFrameSource, FrameSource, SourceEvent};
pub use window::{RecordingWindow, WindowState};
