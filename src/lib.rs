//! Low-latency value-bet detection and distribution pipeline.
//!
//! Pulls arbitrage candidates (surebets) from an upstream feed, filters
//! them against business rules, deduplicates them against a short-term
//! memory, ranks them by expected value and fans them out to chat channels
//! through a pool of outbound bots.
//!
//! # Pipeline
//!
//! ```text
//! feed -> poller -> parser -> validation chain -> dedup store
//!      -> calculators -> message builder -> priority dispatcher -> chat
//! ```
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`domain`]: Validated primitives and entities
//! - [`calc`]: Stake tier and minimum-odds calculators
//! - [`validate`]: Ordered fail-fast validation chain
//! - [`store`]: Redis-backed dedup memory and cursor persistence
//! - [`feed`]: Adaptive poller and record parser
//! - [`message`]: HTML body builder with static-part cache
//! - [`dispatch`]: Priority queue and multi-bot delivery
//! - [`pipeline`]: The orchestrator tying the stages together
//! - [`api`]: HTTP health/status endpoints
//! - [`metrics`]: Counters and latency metrics

pub mod api;
pub mod calc;
pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod feed;
pub mod message;
pub mod metrics;
pub mod pipeline;
pub mod store;
pub mod validate;

pub use config::Config;
pub use error::{PipelineError, Result};
