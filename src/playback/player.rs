use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::decoder::{AudioDecoder, DecodeStep, TrackInfo};

/// Where decoded PCM ends up. Implementations receive the track parameters
/// before the first write and again whenever they change mid-stream.
pub trait OutputSink {
    fn set_format(&mut self, info: TrackInfo) -> Result<()>;

    fn write(&mut self, samples: &[i16]) -> Result<()>;

    fn finish(&mut self) -> Result<()>;
}

/// What one playback run produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackStats {
    pub frames: u64,
    pub samples: u64,
}

/// Decode an entire stream into the sink.
///
/// Header-only steps are skipped silently; the loop ends at end-of-stream.
/// The decoder is initialized here and torn down before returning, also on
/// the error path.
pub fn play_file(
    decoder: &mut dyn AudioDecoder,
    sink: &mut dyn OutputSink,
) -> Result<PlaybackStats> {
    decoder.init()?;

    let result = pump(decoder, sink);
    decoder.deinit();

    let stats = result?;
    info!(
        "Playback finished: {} frames, {} samples",
        stats.frames, stats.samples
    );

    Ok(stats)
}

fn pump(decoder: &mut dyn AudioDecoder, sink: &mut dyn OutputSink) -> Result<PlaybackStats> {
    let mut stats = PlaybackStats::default();
    let mut pcm: Vec<i16> = Vec::new();
    let mut format: Option<TrackInfo> = None;

    loop {
        match decoder.decode_frame(&mut pcm)? {
            DecodeStep::Decoded(n) => {
                let info = decoder
                    .info()
                    .context("Decoder produced samples without track info")?;

                if format != Some(info) {
                    debug!(
                        "Track format: {}Hz, {} channel(s)",
                        info.sample_rate, info.channels
                    );
                    sink.set_format(info)?;
                    format = Some(info);
                }

                sink.write(&pcm[..n])?;
                stats.frames += 1;
                stats.samples += n as u64;
            }
            DecodeStep::HeaderOnly => continue,
            DecodeStep::Eof => break,
        }
    }

    sink.finish()?;
    Ok(stats)
}

/// Sink that writes decoded PCM to a WAV file. The writer is created on the
/// first `set_format` call, once the stream's parameters are known.
pub struct WavFileSink {
    path: PathBuf,
    writer: Option<hound::WavWriter<std::io::BufWriter<std::fs::File>>>,
    format: Option<TrackInfo>,
}

impl WavFileSink {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            writer: None,
            format: None,
        }
    }
}

impl OutputSink for WavFileSink {
    fn set_format(&mut self, info: TrackInfo) -> Result<()> {
        match self.format {
            None => {
                let spec = hound::WavSpec {
                    channels: info.channels,
                    sample_rate: info.sample_rate,
                    bits_per_sample: 16,
                    sample_format: hound::SampleFormat::Int,
                };
                let writer = hound::WavWriter::create(&self.path, spec).with_context(|| {
                    format!("Failed to create output file {}", self.path.display())
                })?;
                self.writer = Some(writer);
                self.format = Some(info);
                Ok(())
            }
            Some(current) if current == info => Ok(()),
            Some(current) => bail!(
                "stream format changed mid-file ({}Hz/{}ch -> {}Hz/{}ch)",
                current.sample_rate,
                current.channels,
                info.sample_rate,
                info.channels
            ),
        }
    }

    fn write(&mut self, samples: &[i16]) -> Result<()> {
        let writer = match self.writer.as_mut() {
            Some(writer) => writer,
            None => bail!("sink format was never set"),
        };

        for &sample in samples {
            writer
                .write_sample(sample)
                .context("Failed to write output sample")?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().context("Failed to finalize output file")?;
        }
        Ok(())
    }
}
