//! # Secret Rotation
//!
//! A background task that advances the [`SecretRing`](super::SecretRing) once
//! per rotation bucket. Ticks are aligned to bucket boundaries
//! (`floor(now / ttl)`) and each tick advances the counter by exactly one, so
//! the published secrets can be replayed offline with [`derive`] for
//! consecutive counters.
//!
//! A store is rotated by at most one scheduler at a time.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::codec::secret::{bucket, derive, SecretStore, MAX_PREVIOUS};

/// Controls a running rotation task.
#[derive(Debug)]
pub struct RotationHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RotationHandle {
    /// Stop rotating and wait for the task to finish.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            tracing::error!("secret rotation task failed: {e}");
        }
    }

    /// Whether the task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

/// Start rotating `store`, which holds the secret for bucket `counter`.
///
/// Buckets that have passed since `counter` are published first, so the
/// current secret is always the one for `floor(now / ttl)`. The next rotation
/// happens at the start of the following bucket.
///
/// Returns `None` when `store` is already being rotated. Must be called from
/// within a Tokio runtime.
#[must_use]
pub fn spawn(
    store: Arc<SecretStore>, base_secret: String, ttl: Duration, counter: u64,
) -> Option<RotationHandle> {
    if !store.claim_rotation() {
        tracing::warn!("secret rotation is already running");
        return None;
    }

    let now = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    let counter = catch_up(&store, &base_secret, ttl, counter, now);
    let boundary = Duration::from_secs(ttl.as_secs().saturating_mul(counter.saturating_add(1)));
    Some(start(store, base_secret, ttl, counter, boundary.saturating_sub(now)))
}

// publishes the secrets of buckets missed since `counter`, returning the
// bucket `now` falls into
fn catch_up(
    store: &SecretStore, base_secret: &str, ttl: Duration, counter: u64, now: Duration,
) -> u64 {
    let current = bucket(now.as_secs(), ttl.as_secs());
    if current <= counter {
        return counter;
    }

    let from = current.saturating_sub(MAX_PREVIOUS as u64).max(counter);
    for c in from + 1..=current {
        store.rotate(&derive(base_secret, c));
    }
    tracing::debug!(from = counter, to = current, "secret ring caught up");
    current
}

fn start(
    store: Arc<SecretStore>, base_secret: String, ttl: Duration, mut counter: u64, delay: Duration,
) -> RotationHandle {
    let period = ttl.max(Duration::from_secs(1));
    let cancel = CancellationToken::new();
    let cancelled = cancel.clone();

    let task = tokio::spawn(async move {
        let mut ticks = interval_at(Instant::now() + delay, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Burst);
        tracing::info!(period = period.as_secs(), "secret rotation started");

        loop {
            tokio::select! {
                () = cancelled.cancelled() => break,
                _ = ticks.tick() => {
                    counter += 1;
                    store.rotate(&derive(&base_secret, counter));
                    tracing::debug!(counter, "secret rotated");
                }
            }
        }

        store.release_rotation();
        tracing::info!("secret rotation stopped");
    });

    RotationHandle { cancel, task }
}
