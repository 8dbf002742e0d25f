//! Broadcast dispatch: delivers one job item by item with progressive delays.
//!
//! Small batches go out back-to-back. Larger batches ramp the wait after each
//! item linearly up to `max_delay`, so the first recipients are reached fast
//! and the tail of the batch is spaced out enough not to trip channel-side
//! anti-abuse throttling.

use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

use castline_core::config::DispatchConfig;
use castline_core::error::{CastlineError, Result};
use castline_core::Shutdown;

/// One delivery: a payload for a single canonical recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchItem {
    pub recipient: String,
    pub payload: String,
    /// Interpret `payload` as a command addressed to `recipient`.
    pub is_command: bool,
}

impl DispatchItem {
    pub fn text(recipient: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            payload: payload.into(),
            is_command: false,
        }
    }

    pub fn command(recipient: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            payload: payload.into(),
            is_command: true,
        }
    }
}

/// An ordered, deduplicated batch of items.
#[derive(Debug, Clone)]
pub struct DispatchJob {
    pub id: Uuid,
    items: Vec<DispatchItem>,
}

impl DispatchJob {
    /// Build a job, keeping the first item for each recipient and the caller's order.
    pub fn new(items: impl IntoIterator<Item = DispatchItem>) -> Self {
        let mut seen = HashSet::new();
        let items = items
            .into_iter()
            .filter(|item| seen.insert(item.recipient.clone()))
            .collect();
        Self {
            id: Uuid::new_v4(),
            items,
        }
    }

    pub fn items(&self) -> &[DispatchItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Outcome of a finished (or shutdown-interrupted) run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
    /// Items never attempted because shutdown was requested mid-run.
    pub abandoned: usize,
}

/// Performs the actual delivery of one item.
/// Errors are logged and counted. A [`CastlineError::Session`] error ends the
/// run: every item not yet delivered is counted as failed.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, item: &DispatchItem) -> Result<()>;
}

/// Pacing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchPolicy {
    pub max_delay: Duration,
    pub fast_path_limit: usize,
    pub item_timeout: Duration,
}

impl DispatchPolicy {
    /// Waits applied after each item except the last, in order.
    pub fn delay_schedule(&self, len: usize) -> Vec<Duration> {
        if len < 2 {
            return Vec::new();
        }
        if len <= self.fast_path_limit {
            return vec![Duration::ZERO; len - 1];
        }
        let steps = (len - 1) as u32;
        (1..=steps)
            .map(|step| {
                self.max_delay
                    .checked_mul(step)
                    .map(|d| d / steps)
                    .or_else(|| {
                        let ratio = f64::from(step) / f64::from(steps);
                        Duration::try_from_secs_f64(self.max_delay.as_secs_f64() * ratio).ok()
                    })
                    .unwrap_or(self.max_delay)
                    .min(self.max_delay)
            })
            .collect()
    }
}

impl From<&DispatchConfig> for DispatchPolicy {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            max_delay: Duration::from_millis(config.max_delay_ms),
            fast_path_limit: config.fast_path_limit,
            item_timeout: Duration::from_millis(config.item_timeout_ms),
        }
    }
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self::from(&DispatchConfig::default())
    }
}

/// Runs broadcast jobs, one at a time, against the shared channel.
pub struct BroadcastDispatcher {
    policy: DispatchPolicy,
    shutdown: Shutdown,
    run_lock: Mutex<()>,
}

impl BroadcastDispatcher {
    pub fn new(policy: DispatchPolicy, shutdown: Shutdown) -> Self {
        Self {
            policy,
            shutdown,
            run_lock: Mutex::new(()),
        }
    }

    /// Whether a job is currently running.
    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    /// Deliver every item of `job` through `sink`.
    ///
    /// Rejects with [`CastlineError::Busy`] while another job is running.
    /// Per-item failures and timeouts are counted, never propagated.
    pub async fn dispatch(&self, job: DispatchJob, sink: &dyn DeliverySink) -> Result<DispatchReport> {
        let _running = self.run_lock.try_lock().map_err(|_| CastlineError::Busy)?;
        if self.shutdown.is_triggered() {
            return Err(CastlineError::ShuttingDown);
        }

        let total = job.len();
        let waits = self.policy.delay_schedule(total);
        if total <= self.policy.fast_path_limit {
            tracing::info!("📤 [{}] Fast send: {} item(s)", job.id, total);
        } else {
            tracing::info!(
                "📤 [{}] Progressive send: {} item(s), max delay {:.1}s",
                job.id,
                total,
                self.policy.max_delay.as_secs_f64()
            );
        }

        let mut report = DispatchReport {
            delivered: 0,
            failed: 0,
            abandoned: 0,
        };

        for (i, item) in job.items().iter().enumerate() {
            if self.shutdown.is_triggered() {
                report.abandoned = total - i;
                tracing::warn!(
                    "🛑 [{}] Shutdown: abandoning {} remaining item(s)",
                    job.id,
                    report.abandoned
                );
                break;
            }

            match tokio::time::timeout(self.policy.item_timeout, sink.deliver(item)).await {
                Ok(Ok(())) => {
                    report.delivered += 1;
                    tracing::info!("✓ [{}] Sent to {}", job.id, item.recipient);
                }
                Ok(Err(e @ CastlineError::Session(_))) => {
                    report.failed += total - i;
                    tracing::error!(
                        "✗ [{}] Session lost at {}: failing {} remaining item(s): {e}",
                        job.id,
                        item.recipient,
                        total - i
                    );
                    break;
                }
                Ok(Err(e)) => {
                    report.failed += 1;
                    tracing::warn!("✗ [{}] Error with {}: {e}", job.id, item.recipient);
                }
                Err(_) => {
                    report.failed += 1;
                    tracing::warn!(
                        "✗ [{}] Timed out after {} ms with {}",
                        job.id,
                        self.policy.item_timeout.as_millis(),
                        item.recipient
                    );
                }
            }

            if let Some(wait) = waits.get(i).copied()
                && !wait.is_zero()
            {
                tracing::debug!("⏳ [{}] Waiting {:.1}s", job.id, wait.as_secs_f64());
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = self.shutdown.wait() => {}
                }
            }
        }

        tracing::info!(
            "📊 [{}] Done: {} delivered, {} failed, {} abandoned",
            job.id,
            report.delivered,
            report.failed,
            report.abandoned
        );
        Ok(report)
    }
}
