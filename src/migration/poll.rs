//! Fixed-interval polling.
//!
//! [`PollPolicy`] is an explicit (interval, attempts) pair; [`poll_until`]
//! probes at most `max_attempts` times and sleeps `interval` between
//! consecutive probes, never after the last one. Time goes through the
//! [`Clock`] trait so tests substitute a recording clock and never wait.

use crate::constants::migration;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Nominal wall-clock budget, `interval * max_attempts`.
    ///
    /// Only `max_attempts - 1` sleeps actually happen, see [`Self::sleeps`].
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }

    /// Sleeps taken when every attempt is used
    pub fn sleeps(&self) -> u32 {
        self.max_attempts.saturating_sub(1)
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(migration::POLL_INTERVAL, migration::POLL_MAX_ATTEMPTS)
    }
}

#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome<T> {
    /// The probe produced a value on attempt `attempts`
    Ready { value: T, attempts: u32 },
    /// Every attempt was used without a value
    Exhausted { attempts: u32 },
    /// Cancellation was observed after `attempts` probes
    Cancelled { attempts: u32 },
}

/// Probe until it yields `Some`, the policy runs out, or `cancel` turns true.
///
/// Probe errors are returned immediately and never retried.
pub async fn poll_until<T, E, F, Fut>(
    policy: &PollPolicy,
    clock: &dyn Clock,
    mut cancel: Option<&mut watch::Receiver<bool>>,
    mut probe: F,
) -> Result<PollOutcome<T>, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<T>, E>>,
{
    for attempt in 1..=policy.max_attempts {
        if cancel.as_deref().is_some_and(|rx| *rx.borrow()) {
            return Ok(PollOutcome::Cancelled {
                attempts: attempt - 1,
            });
        }

        if let Some(value) = probe(attempt).await? {
            return Ok(PollOutcome::Ready {
                value,
                attempts: attempt,
            });
        }

        if attempt < policy.max_attempts
            && pause(clock, policy.interval, cancel.as_deref_mut()).await
        {
            return Ok(PollOutcome::Cancelled { attempts: attempt });
        }
    }

    Ok(PollOutcome::Exhausted {
        attempts: policy.max_attempts,
    })
}

/// Sleep for `interval`; returns true when cancelled while sleeping
async fn pause(
    clock: &dyn Clock,
    interval: Duration,
    cancel: Option<&mut watch::Receiver<bool>>,
) -> bool {
    let Some(rx) = cancel else {
        clock.sleep(interval).await;
        return false;
    };

    let mut sleep = clock.sleep(interval);
    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            changed = rx.changed() => match changed {
                Ok(()) if *rx.borrow() => return true,
                Ok(()) => continue,
                Err(_) => {
                    // Sender gone; cancellation can no longer arrive
                    (&mut sleep).await;
                    return false;
                }
            },
        }
    }
}
