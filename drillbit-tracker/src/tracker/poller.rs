//! Per-task status polling.

use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::StatementBackend;

/// Delay growth between polls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    Fixed,
    /// Multiply the interval by `factor` each attempt, capped at `max_interval`.
    Exponential { factor: f64, max_interval: Duration },
}

/// One budget for every kind of unsuccessful tick.
///
/// A pending state and a failed status request both consume an attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
    pub backoff: Backoff,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(2000),
            max_attempts: 100,
            backoff: Backoff::Fixed,
        }
    }
}

impl PollPolicy {
    pub fn fixed(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            backoff: Backoff::Fixed,
        }
    }

    /// Wait before the given attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential {
                factor,
                max_interval,
            } => {
                let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let nanos = self.interval.as_nanos() as f64 * factor.max(1.0).powi(exponent);
                if !nanos.is_finite() || nanos >= max_interval.as_nanos() as f64 {
                    max_interval.max(self.interval)
                } else {
                    Duration::from_nanos(nanos.round() as u64)
                }
            }
        }
    }
}

/// How a poll loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Success { attempts: u32 },
    Failed { attempts: u32, reason: String },
    /// The caller stopped caring (a newer request replaced the matrix).
    Abandoned { attempts: u32 },
}

/// Poll `task_id` until it succeeds, fails, or runs out of attempts.
///
/// `on_attempt(attempt, error)` is called after every unsuccessful tick;
/// returning false abandons the loop without further requests.
pub async fn poll_task<F>(
    backend: &dyn StatementBackend,
    policy: &PollPolicy,
    task_id: &str,
    mut on_attempt: F,
) -> PollOutcome
where
    F: FnMut(u32, Option<String>) -> bool,
{
    for attempt in 1..=policy.max_attempts {
        tokio::time::sleep(policy.delay(attempt)).await;

        let error = match backend.task_state(task_id).await {
            Ok(state) if state.is_success() => {
                debug!(task_id, attempt, "Task succeeded");
                return PollOutcome::Success { attempts: attempt };
            }
            Ok(state) if state.is_terminal_failure() => {
                warn!(task_id, attempt, state = %state, "Task failed on worker");
                return PollOutcome::Failed {
                    attempts: attempt,
                    reason: format!("task ended in state {}", state),
                };
            }
            Ok(state) => {
                debug!(task_id, attempt, state = %state, "Task still running");
                None
            }
            Err(e) => {
                warn!(task_id, attempt, error = %e, "Task status request failed");
                Some(e.to_string())
            }
        };

        if !on_attempt(attempt, error) {
            debug!(task_id, attempt, "Abandoning stale poller");
            return PollOutcome::Abandoned { attempts: attempt };
        }
    }

    warn!(task_id, attempts = policy.max_attempts, "Task exceeded max attempts");
    PollOutcome::Failed {
        attempts: policy.max_attempts,
        reason: "max attempts exceeded".to_string(),
    }
}
