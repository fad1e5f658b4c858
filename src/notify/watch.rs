//! Long-poll watch loop with exponential backoff.

use super::WatchCallback;
use crate::sources::kv::{KvClient, KvSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const MIN_DELAY: Duration = Duration::from_millis(1);

/// Retry delay schedule for failing watches.
///
/// Each failure waits for the current delay and then doubles it, never going
/// past the maximum. A successful poll resets the delay to its start value.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use tiered_config::notify::Backoff;
///
/// let mut backoff = Backoff::new(Duration::from_millis(500), Duration::from_millis(1500));
/// assert_eq!(backoff.next_delay(), Duration::from_millis(500));
/// assert_eq!(backoff.next_delay(), Duration::from_millis(1000));
/// assert_eq!(backoff.next_delay(), Duration::from_millis(1500));
/// assert_eq!(backoff.next_delay(), Duration::from_millis(1500));
/// backoff.reset();
/// assert_eq!(backoff.next_delay(), Duration::from_millis(500));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    start: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    /// Create a schedule starting at `start` and capped at `max`.
    ///
    /// A start delay above the cap is clamped to the cap. Neither delay goes
    /// below one millisecond, so a failing store is never polled in a tight loop.
    pub fn new(start: Duration, max: Duration) -> Self {
        let max = max.max(MIN_DELAY);
        let start = start.clamp(MIN_DELAY, max);
        Self {
            start,
            max,
            current: start,
        }
    }

    /// The delay the next failure will wait for.
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Take the delay for this failure and advance the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = delay.checked_mul(2).unwrap_or(self.max).min(self.max);
        delay
    }

    /// Return to the start delay.
    pub fn reset(&mut self) {
        self.current = self.start;
    }
}

/// Per-watch state carried between polls.
#[derive(Debug)]
pub(crate) struct WatchState {
    key: String,
    path: String,
    previous: Option<String>,
    backoff: Backoff,
    index: u64,
}

impl WatchState {
    pub(crate) fn new(key: impl Into<String>, path: impl Into<String>, backoff: Backoff) -> Self {
        Self {
            key: key.into(),
            path: path.into(),
            previous: None,
            backoff,
            index: 0,
        }
    }

    /// Record a successful poll. Returns the value to deliver when it differs
    /// from the last observation; a removal is delivered as an empty string.
    fn observe(&mut self, snapshot: KvSnapshot) -> Option<String> {
        // a store index moving backwards means the store was reset
        self.index = if snapshot.index < self.index {
            0
        } else {
            snapshot.index
        };
        self.backoff.reset();

        if snapshot.value == self.previous {
            return None;
        }
        self.previous = snapshot.value.clone();
        Some(snapshot.value.unwrap_or_default())
    }

    /// Record a failed poll and return how long to wait before retrying.
    fn fail(&mut self) -> Duration {
        self.index = 0;
        self.backoff.next_delay()
    }
}

/// Run a watch until `cancel` fires.
pub(crate) async fn watch_key(
    client: Arc<dyn KvClient>,
    mut state: WatchState,
    wait_time: Duration,
    callback: WatchCallback,
    cancel: CancellationToken,
) {
    loop {
        debug!(
            "Setting a watch on key {} with {:?} wait time",
            state.path, wait_time
        );

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = client.wait(&state.path, state.index, wait_time) => result,
        };

        match result {
            Ok(snapshot) => {
                debug!("Wait on watch for key {} returned", state.path);
                if let Some(value) = state.observe(snapshot) {
                    callback(&state.key, &value);
                }
            }
            Err(e) => {
                let delay = state.fail();
                warn!(
                    "Watch on {} failed with error: {}, retry delay: {} ms",
                    state.path,
                    e,
                    delay.as_millis()
                );

                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    debug!("Watch on {} stopped", state.path);
}
