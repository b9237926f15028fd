//! Expiration Policy
//!
//! Two halves: pure expiry math used on every read path, and a background
//! sweeper that periodically drops expired entries so that keys nobody
//! touches again still get reclaimed.
//!
//! The sweeper runs on a fixed interval (default 60s) independent of
//! request traffic. A failed sweep is logged and retried on the next tick;
//! it never takes the process down.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::backend::Backend;
use super::entry::Entry;

/// TTL result for a key that does not exist.
pub const TTL_MISSING: i64 = -2;

/// TTL result for a key that exists without an expiry.
pub const TTL_NONE: i64 = -1;

/// Computes an absolute expiry timestamp from an optional TTL in seconds.
///
/// Only a positive TTL produces an expiry; `None` and `0` mean "no
/// expiration".
pub fn compute_expiry(ttl_seconds: Option<u64>) -> Option<u64> {
    match ttl_seconds {
        Some(secs) if secs > 0 => {
            Some(super::entry::now_ms().saturating_add(secs.saturating_mul(1000)))
        }
        _ => None,
    }
}

/// Whether an entry is still live at `now` (unix ms).
pub fn is_live(entry: &Entry, now: u64) -> bool {
    match entry.expires_at {
        Some(expires_at) => expires_at > now,
        None => true,
    }
}

/// Remaining TTL in whole seconds, rounded up.
///
/// `-2` if the entry is absent, `-1` if it has no expiry, otherwise
/// `ceil((expires_at - now) / 1000)` clamped to zero.
pub fn remaining_seconds(entry: Option<&Entry>, now: u64) -> i64 {
    match entry {
        None => TTL_MISSING,
        Some(entry) => match entry.expires_at {
            None => TTL_NONE,
            Some(expires_at) if expires_at <= now => 0,
            Some(expires_at) => ((expires_at - now + 999) / 1000) as i64,
        },
    }
}

/// Handle to the running background sweeper.
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct Sweeper {
    shutdown_tx: watch::Sender<bool>,
}

impl Sweeper {
    /// Starts the sweeper against a backend on a fixed interval.
    pub fn start(backend: Arc<dyn Backend>, interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        tokio::spawn(sweep_loop(backend, interval, shutdown_rx));
        info!(interval_secs = interval.as_secs(), "expiry sweeper started");

        Self { shutdown_tx }
    }

    /// Stops the sweeper. Called automatically on drop.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn sweep_loop(
    backend: Arc<dyn Backend>,
    interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = shutdown_rx.changed() => {
                if result.is_err() || *shutdown_rx.borrow() {
                    debug!("expiry sweeper received shutdown signal");
                    return;
                }
            }
        }

        match backend.sweep().await {
            Ok(0) => {}
            Ok(removed) => {
                debug!(removed, "sweep removed expired entries");
                // Persist the removals for disk-backed stores.
                if let Err(e) = backend.flush().await {
                    warn!(error = %e, "flush after sweep failed, will retry next tick");
                }
            }
            Err(e) => {
                warn!(error = %e, "sweep failed, will retry next tick");
            }
        }
    }
}
