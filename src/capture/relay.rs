use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::sync::Notify;

use super::source::AudioFrame;

/// Two-slot ping-pong hand-off between the capture worker and the uplink
/// worker.
///
/// The producer owns the `current` slot while filling it; publishing swaps
/// the filled slot into the `pending` position, so ownership crosses sides
/// by moving buffers, never by copying their contents. Each submitted frame
/// costs exactly one copy (payload into the current slot).
///
/// Full-buffer policy: last-writer-wins. If the consumer has not taken the
/// pending frame when the next one is published, the old frame is discarded
/// and counted in `dropped_frames`. The producer is never blocked by a slow
/// consumer.
pub struct FrameRelay {
    slots: Mutex<Slots>,
    ready: Notify,
    dropped: AtomicU64,
}

struct Slots {
    /// Producer-owned buffer, filled on the next submit
    current: AudioFrame,
    /// Published frame awaiting the consumer
    pending: Option<AudioFrame>,
    /// Spare buffer returned by the consumer, reused on the next swap
    spare: Option<AudioFrame>,
}

impl FrameRelay {
    pub fn new(frame_capacity: usize) -> Self {
        Self {
            slots: Mutex::new(Slots {
                current: AudioFrame::new(frame_capacity),
                pending: None,
                spare: Some(AudioFrame::new(frame_capacity)),
            }),
            ready: Notify::new(),
            dropped: AtomicU64::new(0),
        }
    }

    /// Producer side: copy `payload` into the current slot and publish it.
    ///
    /// An unread pending frame is discarded (and counted) rather than
    /// stalling the capture cadence.
    pub fn submit(&self, payload: &[u8]) {
        {
            let mut slots = self.slots.lock().expect("relay lock poisoned");

            slots.current.fill_from(payload);

            if let Some(stale) = slots.pending.take() {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                slots.spare = Some(stale);
            }

            let capacity = slots.current.capacity();
            let next = slots
                .spare
                .take()
                .unwrap_or_else(|| AudioFrame::new(capacity));
            let published = std::mem::replace(&mut slots.current, next);
            slots.pending = Some(published);
        }

        self.ready.notify_one();
    }

    /// Consumer side: take the pending frame if one is ready (non-blocking).
    ///
    /// The returned buffer must be handed back via [`release`] once sent so
    /// the relay can reuse it.
    ///
    /// [`release`]: FrameRelay::release
    pub fn take_ready(&self) -> Option<AudioFrame> {
        let mut slots = self.slots.lock().expect("relay lock poisoned");
        slots.pending.take()
    }

    /// Return a consumed buffer for reuse.
    pub fn release(&self, mut frame: AudioFrame) {
        frame.clear();
        let mut slots = self.slots.lock().expect("relay lock poisoned");
        if slots.spare.is_none() {
            slots.spare = Some(frame);
        }
    }

    /// Wait until a frame has been published. Pair with a timeout to keep
    /// the consumer's poll bounded.
    pub async fn ready(&self) {
        self.ready.notified().await;
    }

    /// Frames discarded because the consumer lagged behind.
    pub fn dropped_frames(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_before_submit_is_not_ready() {
        let relay = FrameRelay::new(8);
        assert!(relay.take_ready().is_none());
    }

    #[test]
    fn submit_then_take_round_trip() {
        let relay = FrameRelay::new(8);
        relay.submit(&[1, 2, 3, 4]);

        let frame = relay.take_ready().expect("frame should be ready");
        assert_eq!(frame.bytes(), &[1, 2, 3, 4]);
        relay.release(frame);

        // Cleared after take
        assert!(relay.take_ready().is_none());
        assert_eq!(relay.dropped_frames(), 0);
    }

    #[test]
    fn overwrite_counts_dropped_frames() {
        let relay = FrameRelay::new(4);
        relay.submit(&[1; 4]);
        relay.submit(&[2; 4]);
        relay.submit(&[3; 4]);

        // Last writer wins
        let frame = relay.take_ready().expect("frame should be ready");
        assert_eq!(frame.bytes(), &[3; 4]);
        assert_eq!(relay.dropped_frames(), 2);
    }

    #[test]
    fn payload_truncated_to_capacity() {
        let relay = FrameRelay::new(4);
        relay.submit(&[9; 10]);

        let frame = relay.take_ready().expect("frame should be ready");
        assert_eq!(frame.len(), 4);
    }
}
