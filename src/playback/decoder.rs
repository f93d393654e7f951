use anyhow::Result;

/// Outcome of one decode step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStep {
    /// `n` interleaved i16 samples were written to the output buffer
    Decoded(usize),
    /// The step consumed metadata or a non-audio packet; call again
    HeaderOnly,
    /// End of stream
    Eof,
}

/// Stream parameters discovered while decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackInfo {
    pub sample_rate: u32,
    pub channels: u16,
}

/// One compressed-audio decoder.
///
/// `decode_frame` fills `out` with interleaved i16 samples and reports how
/// the step went; `info` becomes available once the first audio packet has
/// been decoded. Call `deinit` when done to release codec state.
pub trait AudioDecoder {
    fn init(&mut self) -> Result<()>;

    fn decode_frame(&mut self, out: &mut Vec<i16>) -> Result<DecodeStep>;

    fn info(&self) -> Option<TrackInfo>;

    fn deinit(&mut self);
}
