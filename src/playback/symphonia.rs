use anyhow::{anyhow, bail, Context, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use super::decoder::{AudioDecoder, DecodeStep, TrackInfo};

/// File-backed decoder over symphonia's probe/format/codec stack.
///
/// Handles every container and codec symphonia ships with ("all" feature);
/// the common cases here are MP3 prompts and WAV fixtures.
pub struct SymphoniaDecoder {
    path: PathBuf,
    state: Option<DecoderState>,
}

struct DecoderState {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_buf: Option<SampleBuffer<i16>>,
    info: Option<TrackInfo>,
}

impl SymphoniaDecoder {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            state: None,
        }
    }
}

impl AudioDecoder for SymphoniaDecoder {
    fn init(&mut self) -> Result<()> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open audio file {}", self.path.display()))?;
        let source = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = self.path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                source,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .with_context(|| format!("Unrecognized audio format {}", self.path.display()))?;

        let format = probed.format;
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| anyhow!("No decodable audio track in {}", self.path.display()))?;

        let track_id = track.id;
        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .context("Failed to build codec decoder")?;

        debug!(
            "Decoder ready for {} (track {})",
            self.path.display(),
            track_id
        );

        self.state = Some(DecoderState {
            format,
            decoder,
            track_id,
            sample_buf: None,
            info: None,
        });

        Ok(())
    }

    fn decode_frame(&mut self, out: &mut Vec<i16>) -> Result<DecodeStep> {
        let state = match self.state.as_mut() {
            Some(state) => state,
            None => bail!("decoder is not initialized"),
        };

        let packet = match state.format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                return Ok(DecodeStep::Eof);
            }
            Err(SymphoniaError::ResetRequired) => return Ok(DecodeStep::Eof),
            Err(e) => return Err(e).context("Failed to read next packet"),
        };

        if packet.track_id() != state.track_id {
            return Ok(DecodeStep::HeaderOnly);
        }

        match state.decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();

                if state.sample_buf.is_none() {
                    state.sample_buf =
                        Some(SampleBuffer::<i16>::new(decoded.capacity() as u64, spec));
                }
                state.info = Some(TrackInfo {
                    sample_rate: spec.rate,
                    channels: spec.channels.count() as u16,
                });

                let buf = state.sample_buf.as_mut().expect("sample buffer was set");
                buf.copy_interleaved_ref(decoded);

                out.clear();
                out.extend_from_slice(buf.samples());
                Ok(DecodeStep::Decoded(out.len()))
            }
            // Malformed packets are skipped, not fatal
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet: {e}");
                Ok(DecodeStep::HeaderOnly)
            }
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                Ok(DecodeStep::Eof)
            }
            Err(e) => Err(e).context("Codec decode failed"),
        }
    }

    fn info(&self) -> Option<TrackInfo> {
        self.state.as_ref().and_then(|s| s.info)
    }

    fn deinit(&mut self) {
        self.state = None;
    }
}
