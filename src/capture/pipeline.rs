use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::relay::FrameRelay;
use super::source::{FrameSource, SourceEvent};
use super::window::{RecordingWindow, WindowState};
use crate::uplink::{ControlMessage, DuplexSession};

/// Upper bound on the consumer's wait for a published frame. Keeps the poll
/// loop responsive without spinning.
const CONSUMER_POLL_BOUND: Duration = Duration::from_millis(20);

/// The producer/consumer worker pair around the frame relay.
///
/// The producer blocks on the source's event stream, drives the recording
/// window, and submits frames into the relay while the window is active.
/// The consumer polls the relay and forwards ready frames over the uplink.
/// Neither worker ever blocks on the other.
pub struct CapturePipeline {
    relay: Arc<FrameRelay>,
    producer: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

impl CapturePipeline {
    pub async fn start(
        mut source: Box<dyn FrameSource>,
        session: Arc<DuplexSession>,
        frame_size: usize,
        recording_duration: Duration,
    ) -> Result<Self> {
        let relay = Arc::new(FrameRelay::new(frame_size));

        let mut events = source
            .start()
            .await
            .context("Failed to start frame source")?;

        info!(
            "Capture pipeline started (source: {}, frame: {} bytes, window: {:?})",
            source.name(),
            frame_size,
            recording_duration
        );

        let producer_relay = Arc::clone(&relay);
        let producer_session = Arc::clone(&session);

        let producer = tokio::spawn(async move {
            let mut window = RecordingWindow::new(recording_duration);

            while let Some(event) = events.recv().await {
                match event {
                    SourceEvent::Wake => {
                        if window.state() == WindowState::Active {
                            continue;
                        }

                        window.open(Instant::now());
                        info!("Wakeword detected, recording window open");

                        // Paused during capture so the engine cannot re-trigger
                        if let Err(e) = source.suspend().await {
                            warn!("Failed to suspend wake detection: {e:#}");
                        }

                        match serde_json::to_vec(&ControlMessage::Wakeup) {
                            Ok(msg) => {
                                if let Err(e) = producer_session.send_text(&msg).await {
                                    warn!("Failed to send wakeup notification: {e}");
                                }
                            }
                            Err(e) => warn!("Failed to encode wakeup notification: {e}"),
                        }
                    }

                    SourceEvent::Frame(frame) => {
                        let now = Instant::now();

                        if window.check_timeout(now) {
                            info!("Recording window timed out, resuming wake detection");
                            if let Err(e) = source.resume().await {
                                warn!("Failed to resume wake detection: {e:#}");
                            }
                        }

                        if window.is_active_at(now) {
                            producer_relay.submit(frame.bytes());
                        }
                        // Idle frames are discarded at the relay boundary;
                        // the fetch loop itself never stops.
                    }
                }
            }

            info!("Capture producer stopped");
        });

        let consumer_relay = Arc::clone(&relay);

        let consumer = tokio::spawn(async move {
            let mut reported_drops: u64 = 0;

            loop {
                match consumer_relay.take_ready() {
                    Some(frame) => {
                        if session.is_connected() {
                            if let Err(e) = session.send_binary(frame.bytes()).await {
                                warn!("Uplink frame send failed: {e}");
                            }
                        }
                        consumer_relay.release(frame);

                        let dropped = consumer_relay.dropped_frames();
                        if dropped > reported_drops {
                            warn!(
                                "Relay dropped {} frames (total {})",
                                dropped - reported_drops,
                                dropped
                            );
                            reported_drops = dropped;
                        }
                    }
                    None => {
                        let _ = tokio::time::timeout(CONSUMER_POLL_BOUND, consumer_relay.ready())
                            .await;
                    }
                }
            }
        });

        Ok(Self {
            relay,
            producer,
            consumer,
        })
    }

    /// Frames discarded by the relay because the uplink lagged.
    pub fn dropped_frames(&self) -> u64 {
        self.relay.dropped_frames()
    }

    pub async fn stop(self) {
        self.producer.abort();
        self.consumer.abort();

        info!(
            "Capture pipeline stopped ({} frames dropped)",
            self.relay.dropped_frames()
        );
    }
}
