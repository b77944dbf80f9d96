//! Re-subscription backoff with jitter.

use std::time::Duration;

use rand::Rng;
use tokio::sync::watch;

pub(crate) const BACKOFF_BASE: Duration = Duration::from_millis(100);
pub(crate) const BACKOFF_CAP: Duration = Duration::from_secs(30);

/// Exponential backoff with additive jitter of up to half the current
/// delay. Reset whenever a subscription is established.
pub(crate) struct Backoff {
    base: Duration,
    cap: Duration,
    current: Duration,
}

impl Backoff {
    pub(crate) fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            current: base,
        }
    }

    pub(crate) fn next_delay(&mut self) -> Duration {
        let half_ms = (self.current.as_millis() as u64) / 2;
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..=half_ms));
        let delay = self.current + jitter;
        self.current = (self.current * 2).min(self.cap);
        delay
    }

    pub(crate) fn reset(&mut self) {
        self.current = self.base;
    }
}

/// Sleep for `delay`, returning early (and `true`) if shutdown fires.
pub(crate) async fn sleep_or_shutdown(
    delay: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = shutdown.changed() => true,
    }
}
