//! Pipeline orchestrator: wires the stages and drives the polling loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use time::OffsetDateTime;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{create_router, AppState};
use crate::calc::CalculatorRegistry;
use crate::config::Config;
use crate::dispatch::{Dispatcher, PriorityQueue};
use crate::domain::{BookmakerRegistry, Surebet};
use crate::error::Result;
use crate::feed::{AdaptivePoller, CycleOutcome, FeedClient, FeedParser};
use crate::message::MessageBuilder;
use crate::metrics::{self, PipelineStats};
use crate::store::DedupStore;
use crate::validate::{ChainResult, ValidationChain};

/// Everything a single pick's processing needs.
struct Stages {
    chain: ValidationChain,
    calculators: CalculatorRegistry,
    builder: MessageBuilder,
    queue: Arc<PriorityQueue>,
    store: Arc<DedupStore>,
    registry: Arc<BookmakerRegistry>,
    stats: Arc<PipelineStats>,
}

/// The ingest-to-delivery pipeline.
pub struct Pipeline;

impl Pipeline {
    /// Construct every stage, start the dispatcher and health server, then
    /// poll until cancelled.
    pub async fn run(config: Config, cancel: CancellationToken) -> Result<()> {
        let stats = Arc::new(PipelineStats::new());
        let queue = Arc::new(PriorityQueue::new(config.dispatcher_max_queue));

        info!("Connecting to dedup store");
        let store = Arc::new(DedupStore::connect(&config.redis_url, 5).await?);

        let registry = Arc::new(BookmakerRegistry::from_config(&config));
        let stages = Arc::new(Stages {
            chain: ValidationChain::standard(&config, Arc::clone(&registry), Arc::clone(&store)),
            calculators: CalculatorRegistry::with_defaults(),
            builder: MessageBuilder::new(
                Duration::from_secs(config.html_cache_ttl),
                config.html_cache_max_entries,
                config.display_utc_offset,
            ),
            queue: Arc::clone(&queue),
            store: Arc::clone(&store),
            registry,
            stats: Arc::clone(&stats),
        });

        // Consumers get their own token so producers stop first at
        // shutdown and the queue can drain.
        let consumer_cancel = CancellationToken::new();
        let dispatcher = Dispatcher::new(&config.bot_tokens, Arc::clone(&queue), Arc::clone(&stats));
        let consumer_handles = dispatcher.spawn_consumers(consumer_cancel.clone());
        info!(bots = dispatcher.bot_count(), "Dispatcher consumers started");

        // Health/status endpoints.
        let app_state = AppState::new(Arc::clone(&stats), Arc::clone(&queue));
        let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "HTTP server listening");
        let router = create_router(app_state.clone());
        let server_cancel = cancel.clone();
        let _server_handle = tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async move { server_cancel.cancelled().await })
                .await
        });

        // Periodic stats log line.
        let stats_handle = tokio::spawn(stats_loop(
            Arc::clone(&stats),
            Arc::clone(&queue),
            Duration::from_secs(config.stats_interval),
            cancel.clone(),
        ));

        let client = FeedClient::new(&config);
        let parser = FeedParser::new(&config.sharp_bookmakers);
        let mut poller = AdaptivePoller::new(
            client,
            parser,
            Arc::clone(&store),
            Duration::from_secs_f64(config.polling_base_interval),
            Duration::from_secs_f64(config.polling_max_interval),
        );
        poller.restore_cursor().await;

        let fan_out = Arc::new(Semaphore::new(config.concurrent_picks));
        app_state.set_ready(true);
        info!("Pipeline started");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(poller.current_interval()) => {}
            }

            match poller.poll_cycle(&cancel).await {
                CycleOutcome::Batch { surebets, discards } => {
                    stats.inc_feed_cycle();
                    stats.add_received((surebets.len() + discards.len()) as u64);
                    stats.add_parsed(surebets.len() as u64);
                    stats.add_parse_discarded(discards.len() as u64);
                    for reason in &discards {
                        debug!(reason = %reason, "Record discarded at parse");
                    }
                    if !surebets.is_empty() {
                        process_batch(Arc::clone(&stages), Arc::clone(&fan_out), surebets).await;
                    }
                }
                CycleOutcome::RateLimited => stats.inc_feed_rate_limited(),
                CycleOutcome::Failed => {}
                CycleOutcome::Cancelled => break,
            }
        }

        // Shutdown: the poller is stopped; give in-flight deliveries a
        // bounded grace period, then abandon whatever is left.
        app_state.set_ready(false);
        info!("Shutting down, draining dispatcher");
        dispatcher.drain(Duration::from_secs(config.drain_grace_secs)).await;
        consumer_cancel.cancel();
        for handle in consumer_handles {
            let _ = handle.await;
        }
        stats_handle.abort();
        stats.log_summary(queue.len().await);
        info!("Pipeline stopped");

        Ok(())
    }
}

/// Process one batch concurrently under the fan-out semaphore.
async fn process_batch(stages: Arc<Stages>, fan_out: Arc<Semaphore>, surebets: Vec<Surebet>) {
    let start = Instant::now();
    let mut tasks = JoinSet::new();

    for surebet in surebets {
        let stages = Arc::clone(&stages);
        let fan_out = Arc::clone(&fan_out);
        tasks.spawn(async move {
            let Ok(_permit) = fan_out.acquire_owned().await else {
                return;
            };
            process_one(&stages, surebet).await;
        });
    }

    while let Some(result) = tasks.join_next().await {
        if let Err(e) = result {
            warn!(error = %e, "Pick task panicked");
        }
    }

    metrics::record_batch_latency(start);
}

/// One pick's path: validate, compute, render, enqueue, commit.
async fn process_one(stages: &Stages, surebet: Surebet) {
    let now = OffsetDateTime::now_utc();

    match stages.chain.validate(&surebet, now).await {
        ChainResult::Fail { reason, .. } => {
            stages.stats.inc_validation_drop(reason);
            return;
        }
        ChainResult::Pass => {}
    }
    stages.stats.inc_validated();

    let calculator = match stages.calculators.get(surebet.sharp_bookmaker()) {
        Ok(calculator) => calculator,
        Err(e) => {
            warn!(error = %e, "Sharp without calculator passed validation");
            stages.stats.inc_validation_drop("no_calculator");
            return;
        }
    };

    let tier = match calculator.stake_tier(surebet.profit) {
        Some(tier) => tier,
        None => {
            stages.stats.inc_validation_drop("profit_range");
            return;
        }
    };

    let min_odds = match calculator.min_soft_odds(surebet.sharp_odds()) {
        Ok(min_odds) => min_odds,
        Err(e) => {
            debug!(error = %e, "Sharp too skewed");
            stages.stats.inc_below_min_odds();
            return;
        }
    };

    if surebet.soft_odds().value() < min_odds {
        debug!(
            soft = %surebet.soft_odds(),
            min = %min_odds,
            "Soft odds below acceptable minimum"
        );
        stages.stats.inc_below_min_odds();
        return;
    }

    let channel = match stages.registry.channel_for(surebet.soft_bookmaker()) {
        Some(channel) => channel,
        None => {
            // Unreachable after config validation; kept as a guard.
            warn!(bookmaker = %surebet.soft_bookmaker(), "Soft without channel");
            return;
        }
    };

    let body = stages.builder.build(&surebet, tier, min_odds);

    let event_unix = surebet.event_time().unix_timestamp();
    if !stages
        .queue
        .push(surebet.profit.value(), channel, body, event_unix)
        .await
    {
        stages.stats.inc_overflow();
        return;
    }
    stages.stats.inc_enqueued();

    // Commit only after the enqueue was accepted. The write is awaited; a
    // failure is logged and tolerated because the TTL window bounds how
    // long a duplicate could slip through.
    let ttl = surebet.soft_prong.dedup_ttl(now);
    let mut entries = vec![(surebet.soft_prong.dedup_key(), ttl)];
    for key in surebet.soft_prong.opposite_keys() {
        entries.push((key, ttl));
    }
    if let Err(e) = stages.store.record_batch(&entries).await {
        warn!(error = %e, "Dedup write failed after enqueue");
    }
}

/// Periodic stats log line.
async fn stats_loop(
    stats: Arc<PipelineStats>,
    queue: Arc<PriorityQueue>,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        stats.log_summary(queue.len().await);
    }
}
