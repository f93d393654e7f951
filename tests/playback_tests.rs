// Integration tests for compressed-audio playback
//
// A WAV fixture is written with hound, decoded through the symphonia
// backend, and collected into an in-memory sink.

use anyhow::Result;
use voxlink::playback::{play_file, AudioDecoder, OutputSink, SymphoniaDecoder, WavFileSink};
use voxlink::playback::decoder::TrackInfo;

struct CollectSink {
    format: Option<TrackInfo>,
    samples: Vec<i16>,
    finished: bool,
}

impl CollectSink {
    fn new() -> Self {
        Self {
            format: None,
            samples: Vec::new(),
            finished: false,
        }
    }
}

impl OutputSink for CollectSink {
    fn set_format(&mut self, info: TrackInfo) -> Result<()> {
        self.format = Some(info);
        Ok(())
    }

    fn write(&mut self, samples: &[i16]) -> Result<()> {
        self.samples.extend_from_slice(samples);
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

/// Write a mono 16kHz WAV holding a short ramp of `n` samples.
fn write_fixture(path: &std::path::Path, n: usize) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for i in 0..n {
        writer.write_sample((i % 1000) as i16).unwrap();
    }
    writer.finalize().unwrap();
}

#[test]
fn test_wav_decodes_to_pcm() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.wav");
    write_fixture(&path, 16000);

    let mut decoder = SymphoniaDecoder::new(&path);
    let mut sink = CollectSink::new();
    let stats = play_file(&mut decoder, &mut sink).unwrap();

    assert!(sink.finished);
    assert_eq!(sink.samples.len(), 16000);
    assert_eq!(stats.samples, 16000);
    assert!(stats.frames > 0);

    let info = sink.format.expect("format must be reported before writes");
    assert_eq!(info.sample_rate, 16000);
    assert_eq!(info.channels, 1);

    // Decoded PCM matches the ramp that was written
    assert_eq!(sink.samples[0], 0);
    assert_eq!(sink.samples[999], 999);
    assert_eq!(sink.samples[1000], 0);
}

#[test]
fn test_decode_into_wav_sink_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src.wav");
    let dst = dir.path().join("dst.wav");
    write_fixture(&src, 4800);

    let mut decoder = SymphoniaDecoder::new(&src);
    let mut sink = WavFileSink::new(&dst);
    let stats = play_file(&mut decoder, &mut sink).unwrap();
    assert_eq!(stats.samples, 4800);

    let reader = hound::WavReader::open(&dst).unwrap();
    assert_eq!(reader.spec().sample_rate, 16000);
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.len(), 4800);
}

#[test]
fn test_missing_file_fails_at_init() {
    let mut decoder = SymphoniaDecoder::new("/nonexistent/prompt.mp3");
    assert!(decoder.init().is_err());
}

#[test]
fn test_decode_before_init_fails() {
    let mut decoder = SymphoniaDecoder::new("anything.wav");
    let mut out = Vec::new();
    assert!(decoder.decode_frame(&mut out).is_err());
}

#[test]
fn test_info_unavailable_until_first_frame() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.wav");
    write_fixture(&path, 1600);

    let mut decoder = SymphoniaDecoder::new(&path);
    decoder.init().unwrap();
    assert!(decoder.info().is_none());

    let mut out = Vec::new();
    loop {
        match decoder.decode_frame(&mut out).unwrap() {
            voxlink::playback::DecodeStep::Decoded(_) => break,
            voxlink::playback::DecodeStep::HeaderOnly => continue,
            voxlink::playback::DecodeStep::Eof => panic!("fixture held no audio"),
        }
    }

    assert!(decoder.info().is_some());
    decoder.deinit();
}
