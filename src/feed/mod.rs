//! Upstream surebet feed: HTTP client, adaptive poller, record parser.

pub mod client;
pub mod parser;
pub mod poller;

pub use client::{FeedClient, FeedResponse};
pub use parser::{FeedParser, RawProng, RawRecord};
pub use poller::{AdaptivePoller, CycleOutcome};
