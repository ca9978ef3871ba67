//! Bounded convergence polling over an eventually consistent feed index.
//!
//! A single immediate read races the indexer, so the wait is the primitive:
//! poll the feed until it reaches the expected size or the budget runs out.
//! Read errors during the wait are retried; overshoot fails fast.

use std::time::Duration;

use tokio::time::Instant;

use feedprobe_activity::{ActivityFeed, ActivityMessage, FeedSource};

use crate::VerifyError;

/// How long and how often to poll for index convergence.
#[derive(Debug, Clone)]
pub struct ConvergencePolicy {
    /// Sleep before the first feed check. Zero for immediate polling.
    pub initial_delay: Duration,
    /// Pause between checks.
    pub poll_interval: Duration,
    /// Total wait budget, measured from the start of the call.
    pub max_wait: Duration,
}

impl Default for ConvergencePolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::ZERO,
            poll_interval: Duration::from_millis(500),
            max_wait: Duration::from_secs(30),
        }
    }
}

impl ConvergencePolicy {
    /// Incremental polling with an explicit interval and budget.
    pub fn polling(poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            initial_delay: Duration::ZERO,
            poll_interval,
            max_wait,
        }
    }

    /// The historical sleep-then-check behaviour: one generous fixed delay
    /// followed by a single feed read. Kept as an opt-in for servers with a
    /// known fixed indexing latency; incremental polling is the default.
    pub fn fixed_delay(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            poll_interval: delay,
            max_wait: delay,
        }
    }
}

/// Poll the feed for `target` until it holds exactly `expected_total`
/// entries, or the policy's wait budget elapses.
///
/// At least one read always happens after the initial delay, even if the
/// delay consumes the whole budget (that is the fixed-delay mode). A feed
/// that overshoots the expected total fails immediately with a mismatch;
/// waiting cannot shrink a feed.
pub async fn await_convergence<S: FeedSource>(
    source: &S,
    target: &str,
    expected_total: u64,
    policy: &ConvergencePolicy,
) -> Result<ActivityFeed, VerifyError> {
    let start = Instant::now();
    let deadline = start + policy.max_wait;

    if !policy.initial_delay.is_zero() {
        tokio::time::sleep(policy.initial_delay).await;
    }

    let mut attempts: u32 = 0;
    let mut last: Option<ActivityFeed> = None;
    let mut last_err: Option<feedprobe_activity::FeedError> = None;

    loop {
        attempts += 1;
        match source.fetch_feed(target).await {
            Ok(feed) => {
                if feed.total >= expected_total {
                    // Equal: converged. Greater: duplicates, fail fast.
                    feed.expect_total(expected_total)?;
                    tracing::debug!(
                        target,
                        expected_total,
                        attempts,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        "feed converged"
                    );
                    return Ok(feed);
                }
                tracing::debug!(
                    target,
                    total = feed.total,
                    expected_total,
                    attempts,
                    "feed not yet converged"
                );
                last = Some(feed);
            }
            Err(e) => {
                tracing::debug!(target, error = %e, "feed read failed, will retry");
                last_err = Some(e);
            }
        }

        if Instant::now() >= deadline {
            let last_desc = match (&last, &last_err) {
                (Some(feed), _) => serde_json::to_string(feed)
                    .unwrap_or_else(|_| "(unserialisable feed)".into()),
                (None, Some(e)) => format!("(no successful read, last error: {e})"),
                (None, None) => "(no read attempted)".into(),
            };
            return Err(VerifyError::ConvergenceTimeout {
                target: target.to_string(),
                expected: expected_total,
                waited_ms: policy.max_wait.as_millis(),
                last: last_desc,
            });
        }

        tokio::time::sleep(policy.poll_interval).await;
    }
}

/// Re-read a converged feed and require the same count and message order
/// every time. Catches indexes that keep growing after reaching the
/// expected size (duplicate delivery on repeated reads).
pub async fn confirm_stable<S: FeedSource>(
    source: &S,
    target: &str,
    reference: &ActivityFeed,
    reads: u32,
) -> Result<(), VerifyError> {
    let expected: Vec<ActivityMessage> =
        reference.messages().into_iter().cloned().collect();
    for read in 0..reads {
        let feed = source.fetch_feed(target).await?;
        feed.expect_total(reference.total)?;
        feed.expect_order(&expected)?;
        tracing::debug!(target, read, "feed stable");
    }
    Ok(())
}
