//! Adaptive, cursor-driven polling of the surebet feed.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::client::FeedClient;
use super::parser::FeedParser;
use crate::domain::Surebet;
use crate::error::{ConstructError, FeedError};
use crate::store::DedupStore;

/// Retry attempts for transport failures within one cycle.
const MAX_FETCH_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts within a cycle.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);

/// Backoff exponent ceiling for consecutive rate limits.
const MAX_RATE_LIMIT_STREAK: u32 = 4;

/// What one poll cycle produced.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Parsed surebets plus the discards that fell out of the same batch.
    Batch {
        /// Successfully parsed records, feed order preserved.
        surebets: Vec<Surebet>,
        /// Typed discard reasons for malformed records.
        discards: Vec<ConstructError>,
    },
    /// Feed answered 429; cursor unchanged, interval widened.
    RateLimited,
    /// All attempts failed; cursor unchanged.
    Failed,
    /// Cancellation observed mid-cycle.
    Cancelled,
}

/// Rate-limited, cursor-driven feed fetcher.
///
/// The interval between cycles follows `min(max, base * 2^k)` where `k`
/// counts consecutive rate-limit responses, saturating at
/// [`MAX_RATE_LIMIT_STREAK`] and decaying by one per successful cycle.
pub struct AdaptivePoller {
    client: FeedClient,
    parser: FeedParser,
    store: Arc<DedupStore>,
    base_interval: Duration,
    max_interval: Duration,
    rate_limit_streak: u32,
    cursor: Option<String>,
}

impl AdaptivePoller {
    /// Build the poller.
    pub fn new(
        client: FeedClient,
        parser: FeedParser,
        store: Arc<DedupStore>,
        base_interval: Duration,
        max_interval: Duration,
    ) -> Self {
        Self {
            client,
            parser,
            store,
            base_interval,
            max_interval,
            rate_limit_streak: 0,
            cursor: None,
        }
    }

    /// Restore the cursor persisted by a previous run.
    pub async fn restore_cursor(&mut self) {
        match self.store.load_cursor().await {
            Ok(Some(cursor)) => {
                debug!(cursor = %cursor, "Resuming from persisted cursor");
                self.cursor = Some(cursor);
            }
            Ok(None) => debug!("No persisted cursor, starting fresh"),
            Err(e) => warn!(error = %e, "Cursor load failed, starting fresh"),
        }
    }

    /// Current inter-cycle sleep.
    pub fn current_interval(&self) -> Duration {
        interval_for(self.base_interval, self.max_interval, self.rate_limit_streak)
    }

    /// Consecutive 429 count, exposed for the stats log.
    pub fn rate_limit_streak(&self) -> u32 {
        self.rate_limit_streak
    }

    /// The cursor that will be sent with the next fetch.
    pub fn cursor(&self) -> Option<&str> {
        self.cursor.as_deref()
    }

    /// Run one poll cycle: fetch with bounded retries, parse, advance and
    /// persist the cursor.
    pub async fn poll_cycle(&mut self, cancel: &CancellationToken) -> CycleOutcome {
        let mut attempt = 0;
        let response = loop {
            if cancel.is_cancelled() {
                return CycleOutcome::Cancelled;
            }

            match self.client.fetch(self.cursor.as_deref()).await {
                Ok(response) => break response,
                Err(FeedError::RateLimited { retry_after_secs }) => {
                    self.rate_limit_streak =
                        (self.rate_limit_streak + 1).min(MAX_RATE_LIMIT_STREAK);
                    warn!(
                        streak = self.rate_limit_streak,
                        retry_after_secs, "Feed rate limited"
                    );
                    return CycleOutcome::RateLimited;
                }
                Err(e) => {
                    attempt += 1;
                    if attempt >= MAX_FETCH_ATTEMPTS {
                        warn!(error = %e, attempts = attempt, "Feed cycle abandoned");
                        return CycleOutcome::Failed;
                    }
                    let backoff = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                    debug!(error = %e, attempt, backoff_ms = backoff.as_millis() as u64, "Feed fetch retry");
                    tokio::select! {
                        _ = cancel.cancelled() => return CycleOutcome::Cancelled,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                }
            }
        };

        // A successful response relaxes the adaptive interval by one step.
        self.rate_limit_streak = self.rate_limit_streak.saturating_sub(1);

        let mut surebets = Vec::new();
        let mut discards = Vec::new();
        for record in &response.records {
            match self.parser.parse_record(record) {
                Ok(surebet) => surebets.push(surebet),
                Err(reason) => discards.push(reason),
            }
        }

        // Cursor advances to the feed-order last record of the batch, then
        // persists so a restart resumes instead of re-reading history.
        if let Some(last) = response.records.last() {
            let cursor = last.cursor_token();
            if let Err(e) = self.store.save_cursor(&cursor).await {
                warn!(error = %e, "Cursor persistence failed");
            }
            self.cursor = Some(cursor);
        }

        CycleOutcome::Batch { surebets, discards }
    }
}

/// Adaptive interval: `min(max, base * 2^streak)`.
fn interval_for(base: Duration, max: Duration, streak: u32) -> Duration {
    let scaled = base.saturating_mul(2u32.saturating_pow(streak));
    scaled.min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_millis(500);
    const MAX: Duration = Duration::from_secs(5);

    #[test]
    fn interval_doubles_per_rate_limit() {
        assert_eq!(interval_for(BASE, MAX, 0), Duration::from_millis(500));
        assert_eq!(interval_for(BASE, MAX, 1), Duration::from_secs(1));
        assert_eq!(interval_for(BASE, MAX, 2), Duration::from_secs(2));
        assert_eq!(interval_for(BASE, MAX, 3), Duration::from_secs(4));
    }

    #[test]
    fn interval_is_capped_at_max() {
        assert_eq!(interval_for(BASE, MAX, 4), MAX);
        assert_eq!(interval_for(BASE, MAX, 10), MAX);
    }

    #[test]
    fn three_rate_limits_then_success_sequence() {
        // Intervals used: 0.5, 1.0, 2.0, 4.0; after a success the streak
        // decrements by one and the next interval is 2.0.
        let mut streak = 0u32;
        let mut seen = vec![interval_for(BASE, MAX, streak)];
        for _ in 0..3 {
            streak = (streak + 1).min(MAX_RATE_LIMIT_STREAK);
            seen.push(interval_for(BASE, MAX, streak));
        }
        assert_eq!(
            seen,
            vec![
                Duration::from_millis(500),
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
            ]
        );

        streak = streak.saturating_sub(1);
        assert_eq!(interval_for(BASE, MAX, streak), Duration::from_secs(2));
    }

    #[test]
    fn streak_saturates() {
        let mut streak = 0u32;
        for _ in 0..10 {
            streak = (streak + 1).min(MAX_RATE_LIMIT_STREAK);
        }
        assert_eq!(streak, MAX_RATE_LIMIT_STREAK);
    }
}
