//! Pipeline counters and latency metrics.
//!
//! Two surfaces: `metrics`-crate counters/histograms for scrapers, and an
//! in-process [`PipelineStats`] block behind the periodic stats log line
//! and the status endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use serde::Serialize;
use tracing::info;

// === Metric Name Constants ===

/// Raw records received from the feed.
pub const METRIC_PICKS_RECEIVED: &str = "picks_received_total";
/// Records parsed into surebets.
pub const METRIC_PICKS_PARSED: &str = "picks_parsed_total";
/// Picks that passed the validation chain.
pub const METRIC_PICKS_VALIDATED: &str = "picks_validated_total";
/// Picks delivered to chat.
pub const METRIC_PICKS_SENT: &str = "picks_sent_total";
/// Picks dropped, labeled by reason.
pub const METRIC_PICKS_DROPPED: &str = "picks_dropped_total";
/// Feed poll cycles completed.
pub const METRIC_FEED_CYCLES: &str = "feed_cycles_total";
/// Feed 429 responses.
pub const METRIC_FEED_RATE_LIMITED: &str = "feed_rate_limited_total";
/// Chat send latency.
pub const METRIC_SEND_LATENCY: &str = "send_latency_ms";
/// Batch processing latency.
pub const METRIC_BATCH_LATENCY: &str = "batch_latency_ms";

/// Initialize all metric descriptions. Call once at startup.
pub fn init_metrics() {
    describe_counter!(METRIC_PICKS_RECEIVED, "Raw records received from the feed");
    describe_counter!(METRIC_PICKS_PARSED, "Records parsed into surebets");
    describe_counter!(METRIC_PICKS_VALIDATED, "Picks that passed validation");
    describe_counter!(METRIC_PICKS_SENT, "Picks delivered to chat");
    describe_counter!(METRIC_PICKS_DROPPED, "Picks dropped, labeled by reason");
    describe_counter!(METRIC_FEED_CYCLES, "Feed poll cycles completed");
    describe_counter!(METRIC_FEED_RATE_LIMITED, "Feed 429 responses");
    describe_histogram!(METRIC_SEND_LATENCY, "Chat send latency in milliseconds");
    describe_histogram!(METRIC_BATCH_LATENCY, "Batch processing latency in milliseconds");
}

/// Record chat send latency.
pub fn record_send_latency(start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_SEND_LATENCY).record(latency_ms);
}

/// Record one batch's processing latency.
pub fn record_batch_latency(start: Instant) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_BATCH_LATENCY).record(latency_ms);
}

/// In-process pipeline counters.
///
/// Everything is monotonic; the periodic log line and `/status` read
/// snapshots.
#[derive(Debug, Default)]
pub struct PipelineStats {
    received: AtomicU64,
    parsed: AtomicU64,
    parse_discarded: AtomicU64,
    validated: AtomicU64,
    dropped_odds_range: AtomicU64,
    dropped_profit_range: AtomicU64,
    dropped_stale_event: AtomicU64,
    dropped_bad_roles: AtomicU64,
    dropped_duplicate: AtomicU64,
    dropped_opposite: AtomicU64,
    dropped_store_error: AtomicU64,
    dropped_below_min_odds: AtomicU64,
    dropped_overflow: AtomicU64,
    enqueued: AtomicU64,
    sent: AtomicU64,
    dropped_permanent: AtomicU64,
    dropped_retries: AtomicU64,
    send_retries: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    /// Raw records received.
    pub received: u64,
    /// Records parsed into surebets.
    pub parsed: u64,
    /// Records discarded at parse time.
    pub parse_discarded: u64,
    /// Picks past the validation chain.
    pub validated: u64,
    /// Dropped: soft odds outside the window.
    pub dropped_odds_range: u64,
    /// Dropped: profit outside the window.
    pub dropped_profit_range: u64,
    /// Dropped: event not in the future.
    pub dropped_stale_event: u64,
    /// Dropped: role sanity failure.
    pub dropped_bad_roles: u64,
    /// Dropped: dedup key already present.
    pub dropped_duplicate: u64,
    /// Dropped: opposite-market key present.
    pub dropped_opposite: u64,
    /// Dropped: dedup store unavailable.
    pub dropped_store_error: u64,
    /// Dropped: live soft odds below computed minimum.
    pub dropped_below_min_odds: u64,
    /// Dropped: queue overflow rejection.
    pub dropped_overflow: u64,
    /// Accepted into the dispatch queue.
    pub enqueued: u64,
    /// Delivered to chat.
    pub sent: u64,
    /// Dropped: permanent chat-API failure.
    pub dropped_permanent: u64,
    /// Dropped: transient retries exhausted.
    pub dropped_retries: u64,
    /// Transient retries performed.
    pub send_retries: u64,
}

impl PipelineStats {
    /// Fresh zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count raw records received.
    pub fn add_received(&self, count: u64) {
        self.received.fetch_add(count, Ordering::Relaxed);
        counter!(METRIC_PICKS_RECEIVED).increment(count);
    }

    /// Count parsed surebets.
    pub fn add_parsed(&self, count: u64) {
        self.parsed.fetch_add(count, Ordering::Relaxed);
        counter!(METRIC_PICKS_PARSED).increment(count);
    }

    /// Count parse-time discards.
    pub fn add_parse_discarded(&self, count: u64) {
        self.parse_discarded.fetch_add(count, Ordering::Relaxed);
        counter!(METRIC_PICKS_DROPPED, "reason" => "parse").increment(count);
    }

    /// Count a pick that passed validation.
    pub fn inc_validated(&self) {
        self.validated.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_PICKS_VALIDATED).increment(1);
    }

    /// Count a validation-chain drop by reason slug.
    pub fn inc_validation_drop(&self, reason: &str) {
        let field = match reason {
            "odds_range" => &self.dropped_odds_range,
            "profit_range" => &self.dropped_profit_range,
            "stale_event" => &self.dropped_stale_event,
            "bad_roles" => &self.dropped_bad_roles,
            "duplicate" => &self.dropped_duplicate,
            "opposite" => &self.dropped_opposite,
            _ => &self.dropped_store_error,
        };
        field.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_PICKS_DROPPED, "reason" => reason.to_string()).increment(1);
    }

    /// Count a live-odds-below-minimum rejection.
    pub fn inc_below_min_odds(&self) {
        self.dropped_below_min_odds.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_PICKS_DROPPED, "reason" => "below_min_odds").increment(1);
    }

    /// Count a queue overflow rejection.
    pub fn inc_overflow(&self) {
        self.dropped_overflow.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_PICKS_DROPPED, "reason" => "overflow").increment(1);
    }

    /// Count an accepted enqueue.
    pub fn inc_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a delivery.
    pub fn inc_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_PICKS_SENT).increment(1);
    }

    /// Count a permanent send drop.
    pub fn inc_dropped_permanent(&self) {
        self.dropped_permanent.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_PICKS_DROPPED, "reason" => "permanent").increment(1);
    }

    /// Count a retries-exhausted drop.
    pub fn inc_dropped_retries(&self) {
        self.dropped_retries.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_PICKS_DROPPED, "reason" => "retries").increment(1);
    }

    /// Count a transient retry.
    pub fn inc_send_retry(&self) {
        self.send_retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one completed feed cycle.
    pub fn inc_feed_cycle(&self) {
        counter!(METRIC_FEED_CYCLES).increment(1);
    }

    /// Count one feed 429.
    pub fn inc_feed_rate_limited(&self) {
        counter!(METRIC_FEED_RATE_LIMITED).increment(1);
    }

    /// Copy out all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            parsed: self.parsed.load(Ordering::Relaxed),
            parse_discarded: self.parse_discarded.load(Ordering::Relaxed),
            validated: self.validated.load(Ordering::Relaxed),
            dropped_odds_range: self.dropped_odds_range.load(Ordering::Relaxed),
            dropped_profit_range: self.dropped_profit_range.load(Ordering::Relaxed),
            dropped_stale_event: self.dropped_stale_event.load(Ordering::Relaxed),
            dropped_bad_roles: self.dropped_bad_roles.load(Ordering::Relaxed),
            dropped_duplicate: self.dropped_duplicate.load(Ordering::Relaxed),
            dropped_opposite: self.dropped_opposite.load(Ordering::Relaxed),
            dropped_store_error: self.dropped_store_error.load(Ordering::Relaxed),
            dropped_below_min_odds: self.dropped_below_min_odds.load(Ordering::Relaxed),
            dropped_overflow: self.dropped_overflow.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
            dropped_permanent: self.dropped_permanent.load(Ordering::Relaxed),
            dropped_retries: self.dropped_retries.load(Ordering::Relaxed),
            send_retries: self.send_retries.load(Ordering::Relaxed),
        }
    }

    /// Emit the periodic stats log line.
    pub fn log_summary(&self, queue_depth: usize) {
        let s = self.snapshot();
        info!(
            received = s.received,
            parsed = s.parsed,
            parse_discarded = s.parse_discarded,
            validated = s.validated,
            duplicates = s.dropped_duplicate,
            opposites = s.dropped_opposite,
            below_min_odds = s.dropped_below_min_odds,
            overflow = s.dropped_overflow,
            enqueued = s.enqueued,
            sent = s.sent,
            permanent = s.dropped_permanent,
            retries_exhausted = s.dropped_retries,
            queue_depth,
            "pipeline stats"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let stats = PipelineStats::new();
        stats.add_received(10);
        stats.add_parsed(8);
        stats.add_parse_discarded(2);
        stats.inc_validated();
        stats.inc_validation_drop("duplicate");
        stats.inc_validation_drop("opposite");
        stats.inc_overflow();
        stats.inc_sent();

        let s = stats.snapshot();
        assert_eq!(s.received, 10);
        assert_eq!(s.parsed, 8);
        assert_eq!(s.parse_discarded, 2);
        assert_eq!(s.validated, 1);
        assert_eq!(s.dropped_duplicate, 1);
        assert_eq!(s.dropped_opposite, 1);
        assert_eq!(s.dropped_overflow, 1);
        assert_eq!(s.sent, 1);
    }

    #[test]
    fn unknown_drop_reason_lands_in_store_error() {
        let stats = PipelineStats::new();
        stats.inc_validation_drop("store_error");
        stats.inc_validation_drop("something_else");
        assert_eq!(stats.snapshot().dropped_store_error, 2);
    }
}
