//! Application configuration loaded from environment variables.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Deserialize;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Upstream feed ===
    /// Surebet feed endpoint URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Bearer token for the feed.
    #[serde(default)]
    pub api_token: String,

    /// Bookmakers requested from the feed (`source` parameter).
    /// Derived from sharps + targets when empty.
    #[serde(default)]
    pub api_bookmakers: Vec<String>,

    /// Sports requested from the feed (`sport` parameter).
    #[serde(default = "default_sports")]
    pub sports: Vec<String>,

    /// Records per feed request.
    #[serde(default = "default_feed_limit")]
    pub feed_limit: u32,

    // === Bookmakers ===
    /// Sharp (reference) bookmakers.
    #[serde(default = "default_sharp_bookmakers")]
    pub sharp_bookmakers: Vec<String>,

    /// Soft bookmakers picks are delivered for.
    #[serde(default)]
    pub target_bookies: Vec<String>,

    /// Channel mapping as `soft=channel_id` pairs, comma-separated.
    #[serde(default)]
    pub bookmaker_channels: String,

    // === Validation bounds ===
    /// Minimum acceptable soft odds.
    #[serde(default = "default_min_odds")]
    pub min_odds: Decimal,

    /// Maximum acceptable soft odds.
    #[serde(default = "default_max_odds")]
    pub max_odds: Decimal,

    /// Minimum acceptable profit percentage.
    #[serde(default = "default_min_profit")]
    pub min_profit: Decimal,

    /// Maximum acceptable profit percentage.
    #[serde(default = "default_max_profit")]
    pub max_profit: Decimal,

    // === Polling ===
    /// Base polling interval in seconds.
    #[serde(default = "default_base_interval")]
    pub polling_base_interval: f64,

    /// Maximum polling interval in seconds (backoff ceiling).
    #[serde(default = "default_max_interval")]
    pub polling_max_interval: f64,

    // === Processing ===
    /// Fan-out semaphore size for in-flight picks.
    #[serde(default = "default_concurrent_picks")]
    pub concurrent_picks: usize,

    /// Dispatcher heap capacity.
    #[serde(default = "default_max_queue")]
    pub dispatcher_max_queue: usize,

    /// Message-body cache TTL in seconds.
    #[serde(default = "default_html_cache_ttl")]
    pub html_cache_ttl: u64,

    /// Message-body cache maximum entry count.
    #[serde(default = "default_html_cache_entries")]
    pub html_cache_max_entries: usize,

    // === Outbound bots ===
    /// Bot tokens; order determines rotation.
    #[serde(default)]
    pub bot_tokens: Vec<String>,

    // === Dedup store ===
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    // === Observability ===
    /// Seconds between periodic stats log lines.
    #[serde(default = "default_stats_interval")]
    pub stats_interval: u64,

    /// Shutdown drain grace period in seconds.
    #[serde(default = "default_drain_grace")]
    pub drain_grace_secs: u64,

    /// Fixed UTC offset (hours) for rendered event dates.
    #[serde(default = "default_display_offset")]
    pub display_utc_offset: i8,

    /// HTTP server port for health endpoints.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,
}

fn default_api_base() -> String {
    "https://api.apostasseguras.com/request".to_string()
}

fn default_sports() -> Vec<String> {
    [
        "AmericanFootball", "Badminton", "Baseball", "Basketball",
        "CounterStrike", "Cricket", "Darts", "E_Football", "Football",
        "Futsal", "Handball", "Hockey", "LeagueOfLegends", "Rugby",
        "Snooker", "TableTennis", "Tennis", "Valorant", "Volleyball",
        "WaterPolo",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_feed_limit() -> u32 {
    5000
}

fn default_sharp_bookmakers() -> Vec<String> {
    vec!["pinnaclesports".to_string()]
}

fn default_min_odds() -> Decimal {
    Decimal::new(110, 2) // 1.10
}

fn default_max_odds() -> Decimal {
    Decimal::new(999, 2) // 9.99
}

fn default_min_profit() -> Decimal {
    Decimal::new(-10, 1) // -1.0
}

fn default_max_profit() -> Decimal {
    Decimal::new(250, 1) // 25.0
}

fn default_base_interval() -> f64 {
    0.5
}

fn default_max_interval() -> f64 {
    5.0
}

fn default_concurrent_picks() -> usize {
    250
}

fn default_max_queue() -> usize {
    1000
}

fn default_html_cache_ttl() -> u64 {
    60
}

fn default_html_cache_entries() -> usize {
    1000
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379/0".to_string()
}

fn default_stats_interval() -> u64 {
    10
}

fn default_drain_grace() -> u64 {
    5
}

fn default_display_offset() -> i8 {
    1
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Parse the `soft=channel` mapping.
    ///
    /// Malformed pairs are reported through `validate`; this accessor
    /// silently skips them so it stays usable on partially valid input.
    pub fn channel_map(&self) -> HashMap<String, i64> {
        self.bookmaker_channels
            .split(',')
            .filter_map(|pair| {
                let (bookie, channel) = pair.split_once('=')?;
                let channel: i64 = channel.trim().parse().ok()?;
                Some((bookie.trim().to_string(), channel))
            })
            .collect()
    }

    /// Bookmakers sent in the feed's `source` parameter.
    ///
    /// Falls back to sharps followed by targets when `api_bookmakers`
    /// is not set explicitly.
    pub fn source_bookmakers(&self) -> Vec<String> {
        if !self.api_bookmakers.is_empty() {
            return self.api_bookmakers.clone();
        }
        let mut out = self.sharp_bookmakers.clone();
        for target in &self.target_bookies {
            if !out.contains(target) {
                out.push(target.clone());
            }
        }
        out
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.api_token.is_empty() {
            return Err("API_TOKEN is required".to_string());
        }

        if self.sharp_bookmakers.is_empty() {
            return Err("SHARP_BOOKMAKERS must have at least one entry".to_string());
        }

        if self.target_bookies.is_empty() {
            return Err("TARGET_BOOKIES must have at least one entry".to_string());
        }

        if self.bot_tokens.is_empty() {
            return Err("BOT_TOKENS must have at least one entry".to_string());
        }

        if self.min_odds >= self.max_odds {
            return Err(format!(
                "MIN_ODDS ({}) must be less than MAX_ODDS ({})",
                self.min_odds, self.max_odds
            ));
        }

        if self.min_profit >= self.max_profit {
            return Err(format!(
                "MIN_PROFIT ({}) must be less than MAX_PROFIT ({})",
                self.min_profit, self.max_profit
            ));
        }

        if self.polling_base_interval <= 0.0
            || self.polling_base_interval >= self.polling_max_interval
        {
            return Err(format!(
                "POLLING_BASE_INTERVAL ({}) must be positive and less than POLLING_MAX_INTERVAL ({})",
                self.polling_base_interval, self.polling_max_interval
            ));
        }

        for target in &self.target_bookies {
            if self.sharp_bookmakers.contains(target) {
                return Err(format!(
                    "bookmaker cannot be both sharp and target: {target}"
                ));
            }
        }

        // A target without a channel would silently drop every one of its
        // picks, so it is a startup error rather than a runtime warning.
        let channels = self.channel_map();
        for target in &self.target_bookies {
            if !channels.contains_key(target) {
                return Err(format!(
                    "missing channel mapping for target bookmaker: {target}"
                ));
            }
        }

        if !self.api_bookmakers.is_empty() {
            for required in self.sharp_bookmakers.iter().chain(&self.target_bookies) {
                if !self.api_bookmakers.contains(required) {
                    return Err(format!(
                        "bookmaker missing from API_BOOKMAKERS: {required}"
                    ));
                }
            }
        }

        Ok(())
    }
}
