use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

/// One fixed-size unit of 16-bit PCM audio (little-endian, interleaved).
///
/// The buffer capacity is fixed at construction; `len` marks how many bytes
/// are valid. A frame is never partially overwritten once handed off.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    data: Vec<u8>,
    len: usize,
}

impl AudioFrame {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            len: 0,
        }
    }

    /// Create a frame holding a copy of `payload` (truncated to `capacity`).
    pub fn from_bytes(capacity: usize, payload: &[u8]) -> Self {
        let mut frame = Self::new(capacity);
        frame.fill_from(payload);
        frame
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The valid bytes of this frame.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Copy `payload` into the frame, truncating to capacity.
    pub(crate) fn fill_from(&mut self, payload: &[u8]) {
        let n = payload.len().min(self.data.len());
        self.data[..n].copy_from_slice(&payload[..n]);
        self.len = n;
    }

    pub(crate) fn clear(&mut self) {
        self.len = 0;
    }
}

/// Events emitted by a frame source.
#[derive(Debug)]
pub enum SourceEvent {
    /// A captured audio frame at hardware cadence
    Frame(AudioFrame),
    /// The wakeword was detected
    Wake,
}

/// Frame-fetch interface over the detection engine
///
/// The engine keeps producing frames while suspended; `suspend` only turns
/// off wake detection (so an open recording window cannot re-trigger).
#[async_trait::async_trait]
pub trait FrameSource: Send + Sync {
    /// Start the source; returns the event stream
    async fn start(&mut self) -> Result<mpsc::Receiver<SourceEvent>>;

    /// Disable wake detection (frames keep flowing)
    async fn suspend(&mut self) -> Result<()>;

    /// Re-enable wake detection
    async fn resume(&mut self) -> Result<()>;

    /// Source name for logging
    fn name(&self) -> &str;
}

/// Development source that replays a WAV file at frame cadence.
///
/// Emits a `Wake` at the start of each pass through the file (unless wake
/// detection is suspended), then the file's samples as fixed-size frames.
pub struct FileFrameSource {
    path: PathBuf,
    frame_size: usize,
    wake_suspended: Arc<AtomicBool>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl FileFrameSource {
    pub fn new(path: impl AsRef<Path>, frame_size: usize) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            frame_size,
            wake_suspended: Arc::new(AtomicBool::new(false)),
            task: None,
        }
    }
}

#[async_trait::async_trait]
impl FrameSource for FileFrameSource {
    async fn start(&mut self) -> Result<mpsc::Receiver<SourceEvent>> {
        let reader = hound::WavReader::open(&self.path)
            .with_context(|| format!("Failed to open capture source {}", self.path.display()))?;

        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read capture source samples")?;

        let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        // One frame of 16-bit PCM covers frame_size / 2 samples
        let bytes_per_sec = u64::from(spec.sample_rate) * u64::from(spec.channels) * 2;
        let frame_ms = (self.frame_size as u64 * 1000 / bytes_per_sec).max(1);

        info!(
            "File source started: {} ({}Hz, {}ch, {} byte frames every {}ms)",
            self.path.display(),
            spec.sample_rate,
            spec.channels,
            self.frame_size,
            frame_ms
        );

        let (tx, rx) = mpsc::channel(16);
        let frame_size = self.frame_size;
        let wake_suspended = Arc::clone(&self.wake_suspended);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(frame_ms));

            loop {
                if !wake_suspended.load(Ordering::SeqCst) && tx.send(SourceEvent::Wake).await.is_err()
                {
                    break;
                }

                for chunk in pcm.chunks(frame_size) {
                    ticker.tick().await;

                    let frame = AudioFrame::from_bytes(frame_size, chunk);
                    if tx.send(SourceEvent::Frame(frame)).await.is_err() {
                        return;
                    }
                }
            }
        });

        if let Some(old) = self.task.replace(task) {
            old.abort();
        }

        Ok(rx)
    }

    async fn suspend(&mut self) -> Result<()> {
        self.wake_suspended.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn resume(&mut self) -> Result<()> {
        self.wake_suspended.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn name(&self) -> &str {
        "file"
    }
}

impl Drop for FileFrameSource {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_fixture(path: &Path) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..1600i16 {
            writer.write_sample(i).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn restart_aborts_previous_replay_task() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.wav");
        write_fixture(&path);

        let mut source = FileFrameSource::new(&path, 64);
        let mut first = source.start().await.unwrap();
        let _second = source.start().await.unwrap();

        // The first stream's producer was aborted, so its channel drains
        // to a close instead of replaying forever.
        while first.recv().await.is_some() {}
    }

    #[tokio::test(start_paused = true)]
    async fn suspend_stops_wake_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.wav");
        write_fixture(&path);

        let mut source = FileFrameSource::new(&path, 3200);
        let mut events = source.start().await.unwrap();
        source.suspend().await.unwrap();

        // First pass already queued a Wake before the suspend
        let mut wakes = 0;
        for _ in 0..8 {
            match events.recv().await {
                Some(SourceEvent::Wake) => wakes += 1,
                Some(SourceEvent::Frame(_)) => {}
                None => break,
            }
        }
        assert!(wakes <= 1, "suspended source must not keep waking");
    }
}
