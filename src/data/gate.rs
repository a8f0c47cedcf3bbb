//! Request gate for backend calls.
//!
//! Every storage operation goes through a single [`RequestGate`] so that the
//! backend sees a bounded request rate:
//!
//! - Calls are admitted one at a time, in arrival order.
//! - The start of a call is at least `min_interval` after the start of the
//!   previous one.
//! - A call rejected with [`DatabaseError::RateLimited`] is retried exactly
//!   once, after the backend's reset time or the configured fallback wait.
//!
//! State is in-memory only and resets on process restart.

use std::future::Future;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;

use crate::config::GateConfig;
use crate::error::DatabaseError;

/// Serializes and spaces backend calls.
pub struct RequestGate {
    config: GateConfig,
    /// Held for the whole operation. tokio's mutex is fair, so waiters are
    /// admitted in FIFO order.
    admission: AsyncMutex<()>,
    last_dispatch: Mutex<Option<Instant>>,
    dispatches: AtomicU64,
}

impl RequestGate {
    pub fn new(config: GateConfig) -> Self {
        Self {
            config,
            admission: AsyncMutex::new(()),
            last_dispatch: Mutex::new(None),
            dispatches: AtomicU64::new(0),
        }
    }

    /// When the most recent call (or retry) was dispatched.
    pub fn last_dispatch(&self) -> Option<Instant> {
        self.last_dispatch.lock().ok().and_then(|g| *g)
    }

    /// Total dispatches, retries included.
    pub fn dispatch_count(&self) -> u64 {
        self.dispatches.load(Ordering::Relaxed)
    }

    /// Run `operation` under the gate.
    ///
    /// `operation` is invoked at most twice: once normally and once more if
    /// the first attempt was rate limited. Any other error, or a second rate
    /// limit, is returned to the caller.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T, DatabaseError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, DatabaseError>>,
    {
        let _admitted = self.admission.lock().await;

        self.wait_for_slot().await;
        self.mark_dispatch();

        match operation().await {
            Err(DatabaseError::RateLimited { reset }) => {
                let wait = self.retry_delay(reset);
                tracing::warn!(
                    "Backend rate limited, retrying once in {}ms",
                    wait.as_millis()
                );
                tokio::time::sleep(wait).await;
                self.mark_dispatch();
                operation().await
            }
            other => other,
        }
    }

    async fn wait_for_slot(&self) {
        let Some(last) = self.last_dispatch() else {
            return;
        };
        let elapsed = last.elapsed();
        if elapsed < self.config.min_interval {
            let remaining = self.config.min_interval - elapsed;
            tracing::debug!("Request gate delaying call by {}ms", remaining.as_millis());
            tokio::time::sleep(remaining).await;
        }
    }

    fn mark_dispatch(&self) {
        if let Ok(mut last) = self.last_dispatch.lock() {
            *last = Some(Instant::now());
        }
        self.dispatches.fetch_add(1, Ordering::Relaxed);
    }

    /// Wait until `reset` if the backend gave one, otherwise the fallback.
    fn retry_delay(&self, reset: Option<DateTime<Utc>>) -> Duration {
        match reset {
            Some(at) => (at - Utc::now()).to_std().unwrap_or(Duration::ZERO),
            None => self.config.rate_limit_fallback,
        }
    }
}

impl Default for RequestGate {
    fn default() -> Self {
        Self::new(GateConfig::default())
    }
}
