//! Submission pacing.
//!
//! The driver consults a [`RateGate`] before every submission and reports
//! each outcome back to it. Pacing policy therefore lives in one place and
//! applies across all in-flight workers: a rate-limit backoff triggered by
//! one item holds back every item admitted after it.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};

use crate::ErrorClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    /// Pause after every successful item.
    pub success_delay: Duration,
    /// Pause after a failure classified as rate limiting.
    pub rate_limit_backoff: Duration,
    /// Pause after any other failure.
    pub transient_backoff: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            success_delay: Duration::from_millis(500),
            rate_limit_backoff: Duration::from_secs(30),
            transient_backoff: Duration::from_secs(1),
        }
    }
}

impl PacingPolicy {
    /// No pauses at all.
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            success_delay: Duration::ZERO,
            rate_limit_backoff: Duration::ZERO,
            transient_backoff: Duration::ZERO,
        }
    }

    #[must_use]
    pub const fn with_success_delay(mut self, delay: Duration) -> Self {
        self.success_delay = delay;
        self
    }

    #[must_use]
    pub const fn backoff_for(&self, class: ErrorClass) -> Duration {
        match class {
            ErrorClass::RateLimited => self.rate_limit_backoff,
            ErrorClass::Transient => self.transient_backoff,
        }
    }
}

#[async_trait]
pub trait RateGate: Send + Sync {
    /// Waits until a new submission may start.
    async fn admit(&self);

    async fn on_success(&self);

    /// Records a failure and returns the backoff it imposed.
    async fn on_failure(&self, class: ErrorClass) -> Duration;
}

/// Fixed-interval gate: closes for a policy-defined duration after each
/// outcome, and `admit` waits for it to reopen.
pub struct IntervalGate {
    policy: PacingPolicy,
    reopens_at: Mutex<Instant>,
}

impl IntervalGate {
    #[must_use]
    pub fn new(policy: PacingPolicy) -> Self {
        Self {
            policy,
            reopens_at: Mutex::new(Instant::now()),
        }
    }

    async fn hold_for(&self, pause: Duration) {
        let candidate = Instant::now() + pause;
        let mut reopens_at = self.reopens_at.lock().await;
        if candidate > *reopens_at {
            *reopens_at = candidate;
        }
    }
}

#[async_trait]
impl RateGate for IntervalGate {
    async fn admit(&self) {
        // Another outcome may push the reopen time while we sleep.
        loop {
            let until = *self.reopens_at.lock().await;
            if until <= Instant::now() {
                break;
            }
            sleep_until(until).await;
        }
    }

    async fn on_success(&self) {
        self.hold_for(self.policy.success_delay).await;
    }

    async fn on_failure(&self, class: ErrorClass) -> Duration {
        let pause = self.policy.backoff_for(class);
        self.hold_for(pause).await;
        pause
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_selection_follows_class() {
        let policy = PacingPolicy::default();
        assert_eq!(
            policy.backoff_for(ErrorClass::RateLimited),
            Duration::from_secs(30)
        );
        assert_eq!(
            policy.backoff_for(ErrorClass::Transient),
            Duration::from_secs(1)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn gate_waits_after_success() {
        let gate = IntervalGate::new(PacingPolicy::default());
        let start = Instant::now();

        gate.admit().await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        gate.on_success().await;
        gate.admit().await;
        assert_eq!(start.elapsed(), Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_backoff_holds_the_gate() {
        let gate = IntervalGate::new(PacingPolicy::default());
        let start = Instant::now();

        let pause = gate.on_failure(ErrorClass::RateLimited).await;
        assert_eq!(pause, Duration::from_secs(30));

        // A later, shorter pause must not shorten the pending backoff.
        gate.on_success().await;
        gate.admit().await;
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn waiting_admission_sees_a_later_backoff() {
        let gate = std::sync::Arc::new(IntervalGate::new(PacingPolicy::default()));
        let start = Instant::now();
        gate.on_success().await;

        let waiter = {
            let gate = std::sync::Arc::clone(&gate);
            tokio::spawn(async move {
                gate.admit().await;
                Instant::now()
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        gate.on_failure(ErrorClass::RateLimited).await;

        let admitted_at = waiter.await.unwrap_or_else(|e| panic!("join: {e}"));
        assert_eq!(admitted_at - start, Duration::from_millis(30_100));
    }
}
