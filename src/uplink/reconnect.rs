use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::session::{SessionShared, SessionState};

/// Backoff growth ratio per failed attempt: 3/2, gentler than doubling.
const BACKOFF_NUMERATOR: u32 = 3;
const BACKOFF_DENOMINATOR: u32 = 2;

/// How long a fresh connection must hold before a reconnect counts as
/// successful.
pub(crate) const STABILITY_PROBE: Duration = Duration::from_secs(1);

/// Bounded, jittered exponential backoff state.
///
/// Invariants: `initial_interval <= current_interval <= max_interval`;
/// `attempt_count` only grows until it is reset by a confirmed-stable
/// reconnect.
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    attempt_count: u32,
    current_interval: Duration,
    initial_interval: Duration,
    max_interval: Duration,
    max_attempts: u32,
    jitter_range: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(3000), Duration::from_millis(30000), 15)
    }
}

impl ReconnectPolicy {
    pub fn new(initial_interval: Duration, max_interval: Duration, max_attempts: u32) -> Self {
        let max_interval = max_interval.max(initial_interval);
        Self {
            attempt_count: 0,
            current_interval: initial_interval,
            initial_interval,
            max_interval,
            max_attempts,
            jitter_range: Duration::from_millis(500),
        }
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn current_interval(&self) -> Duration {
        self.current_interval
    }

    pub fn exhausted(&self) -> bool {
        self.attempt_count >= self.max_attempts
    }

    pub(crate) fn reset(&mut self) {
        self.attempt_count = 0;
        self.current_interval = self.initial_interval;
    }

    /// Record a failed attempt. Returns the base delay to sleep before the
    /// next try; the interval then grows by 3/2 up to the cap.
    pub(crate) fn record_failure(&mut self) -> Duration {
        self.attempt_count += 1;
        let delay = self.current_interval;
        let grown = self.current_interval * BACKOFF_NUMERATOR / BACKOFF_DENOMINATOR;
        self.current_interval = grown.min(self.max_interval);
        delay
    }

    /// Apply random jitter within +/- `jitter_range` to a base delay.
    pub(crate) fn jittered(&self, base: Duration) -> Duration {
        let range = self.jitter_range.as_millis() as i64;
        if range == 0 {
            return base;
        }
        let offset = rand::thread_rng().gen_range(-range..=range);
        let millis = (base.as_millis() as i64 + offset).max(0);
        Duration::from_millis(millis as u64)
    }
}

/// The reconnect worker: tears down the old handle, rebuilds the connection
/// from scratch, probes it for stability, and backs off between attempts.
/// At most one instance runs at a time; the running marker is cleared by the
/// worker itself, under the session lock, just before it exits.
pub(crate) async fn run(shared: Arc<SessionShared>) {
    info!("Reconnect worker started");
    let mut reconnected = false;

    loop {
        let uri = {
            let mut inner = shared.lock();
            if inner.manual_disconnect {
                info!("Manual disconnect in progress, reconnect worker exiting");
                break;
            }
            if inner.policy.exhausted() {
                warn!(
                    "Reconnect attempts exhausted ({}/{})",
                    inner.policy.attempt_count(),
                    inner.policy.max_attempts()
                );
                inner.state = SessionState::Disconnected;
                break;
            }
            inner.state = SessionState::Reconnecting;
            match inner.uri.clone() {
                Some(uri) => uri,
                None => break,
            }
        };

        // Tear down any half-dead handle outside the lock; the new attempt
        // is a full re-construction, not a resume.
        let stale = { shared.lock().take_handle() };
        if let Some(handle) = stale {
            handle.close().await;
        }

        let (attempt, max) = {
            let inner = shared.lock();
            (inner.policy.attempt_count() + 1, inner.policy.max_attempts())
        };
        info!("Reconnect attempt {attempt}/{max}");

        match shared.establish(&uri).await {
            Ok(()) => {
                tokio::time::sleep(STABILITY_PROBE).await;

                let stable = {
                    let inner = shared.lock();
                    inner.handle_connected()
                };

                if stable {
                    let mut inner = shared.lock();
                    inner.policy.reset();
                    inner.state = SessionState::Connected;
                    info!("Reconnected, connection held through the probe");
                    reconnected = true;
                    break;
                }

                warn!("Reconnected but connection did not hold, retrying");
            }
            Err(e) => {
                error!("Reconnect attempt {attempt} failed: {e}");
            }
        }

        let delay = {
            let mut inner = shared.lock();
            let base = inner.policy.record_failure();
            inner.policy.jittered(base)
        };
        tokio::time::sleep(delay).await;

        if shared.lock().manual_disconnect {
            break;
        }
    }

    let mut inner = shared.lock();
    inner.reconnect_running = false;
    if !reconnected {
        info!("Reconnect worker finished without restoring the connection");
    }
}
