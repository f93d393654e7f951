//! Compressed-audio playback
//!
//! Decodes a compressed stream (MP3, OGG, WAV via symphonia) into interleaved
//! 16-bit PCM and pushes it through an [`OutputSink`]. The decoder is a trait
//! so other codec backends can slot in without touching the player loop.

pub mod decoder;
pub mod player;
pub mod symphonia;

pub use decoder::{AudioDecoder, DecodeStep, TrackInfo};
pub use player::{play_file, OutputSink, PlaybackStats, WavFileSink};
pub use symphonia::SymphoniaDecoder;
