use std::fmt::Display;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Delay schedule for [`retry_with_backoff`]: the escalating `delays`
/// first, then `final_retries` more attempts spaced by `final_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    pub delays: Vec<Duration>,
    pub final_retries: usize,
    pub final_delay: Duration,
}

impl Default for Backoff {
    /// 2s, 4s, 8s, then 10s x 3.
    fn default() -> Self {
        Self {
            delays: [2, 4, 8].into_iter().map(Duration::from_secs).collect(),
            final_retries: 3,
            final_delay: Duration::from_secs(10),
        }
    }
}

impl Backoff {
    fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        self.delays
            .iter()
            .copied()
            .chain(std::iter::repeat_n(self.final_delay, self.final_retries))
    }

    #[must_use]
    pub fn max_attempts(&self) -> usize {
        self.delays.len() + self.final_retries + 1
    }
}

/// Retry an async operation, sleeping per `backoff` between attempts.
///
/// Returns the first success, or the error of the final attempt.
pub async fn retry_with_backoff<F, Fut, T, E>(
    mut operation: F,
    backoff: &Backoff,
    what: &str,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = backoff.max_attempts();
    let mut schedule = backoff.schedule();
    let mut attempt = 1;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let Some(delay) = schedule.next() else {
                    return Err(e);
                };
                warn!(
                    "{what} failed (attempt {attempt}/{max_attempts}): {e}. Retrying after {}s...",
                    delay.as_secs()
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
