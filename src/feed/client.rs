//! HTTP client for the surebet feed.

use std::num::NonZeroU32;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;

use super::parser::RawRecord;
use crate::config::Config;
use crate::error::FeedError;

/// Contractual upstream limit: at most two requests per second.
const FEED_REQUESTS_PER_SECOND: u32 = 2;

/// Deadline for one feed request.
const FEED_TIMEOUT: Duration = Duration::from_secs(3);

/// Raw feed response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedResponse {
    /// Surebet records in feed order.
    #[serde(default)]
    pub records: Vec<RawRecord>,
}

/// Rate-limited feed fetcher with bearer-token auth.
pub struct FeedClient {
    http: reqwest::Client,
    api_base: String,
    api_token: String,
    source: String,
    sport: String,
    limit: u32,
    min_odds: String,
    max_odds: String,
    min_profit: String,
    max_profit: String,
    limiter: DefaultDirectRateLimiter,
}

impl FeedClient {
    /// Build the client from configuration.
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(FEED_TIMEOUT)
            .connect_timeout(Duration::from_millis(500))
            .tcp_nodelay(true)
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .expect("failed to create HTTP client");

        let quota = Quota::per_second(
            NonZeroU32::new(FEED_REQUESTS_PER_SECOND).expect("nonzero rate"),
        );

        Self {
            http,
            api_base: config.api_base.clone(),
            api_token: config.api_token.clone(),
            source: config.source_bookmakers().join("|"),
            sport: config.sports.join("|"),
            limit: config.feed_limit,
            min_odds: config.min_odds.to_string(),
            max_odds: config.max_odds.to_string(),
            min_profit: config.min_profit.to_string(),
            max_profit: config.max_profit.to_string(),
            limiter: RateLimiter::direct(quota),
        }
    }

    /// Fetch one page of records, resuming from `cursor` when given.
    pub async fn fetch(&self, cursor: Option<&str>) -> Result<FeedResponse, FeedError> {
        self.limiter.until_ready().await;

        let limit = self.limit.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("product", "surebets"),
            ("outcomes", "2"),
            ("order", "created_at_desc"),
            ("min-profit", &self.min_profit),
            ("max-profit", &self.max_profit),
            ("min-odds", &self.min_odds),
            ("max-odds", &self.max_odds),
            ("hide-different-rules", "true"),
            ("startAge", "PT10M"),
            ("limit", &limit),
            ("oddsFormat", "eu"),
            ("source", &self.source),
            ("sport", &self.sport),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }

        let response = self
            .http
            .get(&self.api_base)
            .bearer_auth(&self.api_token)
            .query(&params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FeedError::Timeout
                } else {
                    FeedError::Transport(e)
                }
            })?;

        let status = response.status();
        if status.as_u16() == 429 {
            let retry_after_secs = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            return Err(FeedError::RateLimited { retry_after_secs });
        }

        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
            });
        }

        response
            .json()
            .await
            .map_err(|e| FeedError::Parse(e.to_string()))
    }
}
