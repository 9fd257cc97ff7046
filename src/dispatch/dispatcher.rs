//! Multi-bot delivery: one consumer per bot, shared priority queue.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::bot::{BotClient, SendOutcome};
use super::queue::PriorityQueue;
use crate::metrics::{self, PipelineStats};

/// Per-bot send rate cap.
const MESSAGES_PER_SECOND_PER_BOT: u32 = 30;

/// Total attempts per message before it is dropped.
const MAX_SEND_ATTEMPTS: u32 = 3;

/// Backoff before retry attempt n (1-based): 100 ms, 400 ms, 1600 ms.
fn retry_backoff(attempt: u32) -> Duration {
    Duration::from_millis(100 * 4u64.pow(attempt.saturating_sub(1).min(2)))
}

/// Delivery stage: a pool of bot identities draining the shared heap.
pub struct Dispatcher {
    queue: Arc<PriorityQueue>,
    bots: Vec<Arc<BotClient>>,
    stats: Arc<PipelineStats>,
}

impl Dispatcher {
    /// Build the pool. Token order fixes each bot's position.
    pub fn new(
        bot_tokens: &[String],
        queue: Arc<PriorityQueue>,
        stats: Arc<PipelineStats>,
    ) -> Self {
        let http = BotClient::pool_http();
        let bots = bot_tokens
            .iter()
            .enumerate()
            .map(|(index, token)| Arc::new(BotClient::new(http.clone(), token.clone(), index)))
            .collect();
        Self { queue, bots, stats }
    }

    /// Number of bot identities in the pool.
    pub fn bot_count(&self) -> usize {
        self.bots.len()
    }

    /// Start one consumer task per bot.
    pub fn spawn_consumers(&self, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        self.bots
            .iter()
            .map(|bot| {
                let bot = Arc::clone(bot);
                let queue = Arc::clone(&self.queue);
                let stats = Arc::clone(&self.stats);
                let cancel = cancel.clone();
                let rotate = self.bots.len() > 1;
                tokio::spawn(async move {
                    consumer_loop(bot, queue, stats, cancel, rotate).await;
                })
            })
            .collect()
    }

    /// Drain remaining entries for up to `grace`, then abandon the rest.
    pub async fn drain(&self, grace: Duration) {
        let deadline = Instant::now() + grace;
        while Instant::now() < deadline {
            if self.queue.is_empty().await {
                info!("Dispatch queue drained");
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        let abandoned = self.queue.len().await;
        if abandoned > 0 {
            warn!(abandoned, "Drain grace expired, abandoning queued entries");
        }
    }
}

/// One bot's consumer: pop, rate-limit, send, classify.
async fn consumer_loop(
    bot: Arc<BotClient>,
    queue: Arc<PriorityQueue>,
    stats: Arc<PipelineStats>,
    cancel: CancellationToken,
    rotate: bool,
) {
    let quota = Quota::per_second(
        NonZeroU32::new(MESSAGES_PER_SECOND_PER_BOT).expect("nonzero rate"),
    );
    let limiter: DefaultDirectRateLimiter = RateLimiter::direct(quota);

    info!(bot = %bot.id(), "Dispatcher consumer started");

    while let Some(mut entry) = queue.pop(&cancel).await {
        // Rotation: a retry should land on a different bot when there is
        // one. Hand the entry back and let another consumer win the pop.
        if rotate && entry.last_bot == Some(bot.index()) {
            if !queue.requeue(entry).await {
                stats.inc_overflow();
            }
            // Brief pause so another consumer wins the next pop instead of
            // this one spinning on its own reject.
            tokio::time::sleep(Duration::from_millis(10)).await;
            continue;
        }

        limiter.until_ready().await;

        // Events that started while the entry sat queued are still
        // delivered; the lateness is only logged.
        let now_unix = time::OffsetDateTime::now_utc().unix_timestamp();
        if entry.event_unix <= now_unix {
            warn!(
                channel = entry.channel,
                late_secs = now_unix - entry.event_unix,
                "Delivering pick for an already-started event"
            );
        }

        let start = Instant::now();
        let outcome = bot.send_message(entry.channel, &entry.body).await;
        metrics::record_send_latency(start);

        match outcome {
            SendOutcome::Sent => {
                stats.inc_sent();
            }
            SendOutcome::RetryAfter(secs) => {
                // This bot yields; the entry goes back with unchanged
                // priority and attempt count for another bot to take.
                warn!(bot = %bot.id(), retry_after = secs, "Chat API rate limit");
                entry.last_bot = Some(bot.index());
                if !queue.requeue(entry).await {
                    stats.inc_overflow();
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_secs(secs)) => {}
                }
            }
            SendOutcome::Transient(reason) => {
                entry.attempts += 1;
                if entry.attempts >= MAX_SEND_ATTEMPTS {
                    error!(
                        bot = %bot.id(),
                        channel = entry.channel,
                        attempts = entry.attempts,
                        reason = %reason,
                        "Retries exhausted, dropping message"
                    );
                    stats.inc_dropped_retries();
                } else {
                    warn!(
                        bot = %bot.id(),
                        attempt = entry.attempts,
                        reason = %reason,
                        "Transient send failure, re-enqueueing"
                    );
                    stats.inc_send_retry();
                    let backoff = retry_backoff(entry.attempts);
                    entry.last_bot = Some(bot.index());
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff) => {}
                    }
                    if !queue.requeue(entry).await {
                        stats.inc_overflow();
                    }
                }
            }
            SendOutcome::Permanent(reason) => {
                error!(
                    bot = %bot.id(),
                    channel = entry.channel,
                    reason = %reason,
                    "Permanent send failure, dropping message"
                );
                stats.inc_dropped_permanent();
            }
        }
    }

    info!(bot = %bot.id(), "Dispatcher consumer stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_sequence() {
        assert_eq!(retry_backoff(1), Duration::from_millis(100));
        assert_eq!(retry_backoff(2), Duration::from_millis(400));
        assert_eq!(retry_backoff(3), Duration::from_millis(1600));
        // Clamped past the last configured step.
        assert_eq!(retry_backoff(9), Duration::from_millis(1600));
    }

    #[tokio::test]
    async fn dispatcher_builds_one_consumer_per_bot() {
        let queue = Arc::new(PriorityQueue::new(10));
        let stats = Arc::new(PipelineStats::new());
        let dispatcher = Dispatcher::new(
            &["111:aaa".to_string(), "222:bbb".to_string()],
            queue,
            stats,
        );
        assert_eq!(dispatcher.bot_count(), 2);

        let cancel = CancellationToken::new();
        let handles = dispatcher.spawn_consumers(cancel.clone());
        assert_eq!(handles.len(), 2);

        cancel.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn drain_returns_when_queue_empty() {
        let queue = Arc::new(PriorityQueue::new(10));
        let stats = Arc::new(PipelineStats::new());
        let dispatcher = Dispatcher::new(&["111:aaa".to_string()], queue, stats);

        let start = Instant::now();
        dispatcher.drain(Duration::from_secs(5)).await;
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
