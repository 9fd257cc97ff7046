//! Unified error types for the pipeline.

use rust_decimal::Decimal;
use thiserror::Error;

/// Unified error type for the pipeline.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Entity/value construction error.
    #[error("construction error: {0}")]
    Construct(#[from] ConstructError),

    /// Upstream feed error.
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    /// Dedup store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Dispatcher/chat delivery error.
    #[error("dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    /// Calculator error.
    #[error("calc error: {0}")]
    Calc(#[from] CalcError),

    /// HTTP request error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Validation failures when constructing value types and entities.
///
/// Each variant names the contract the input violated; the originating
/// record is dropped and counted, never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConstructError {
    /// Odds outside the accepted [1.01, 1000] range.
    #[error("odds out of range: {value}")]
    OddsOutOfRange {
        /// The rejected odds value.
        value: Decimal,
    },

    /// Profit outside the [-100, 100] percent range.
    #[error("profit out of range: {value}%")]
    ProfitOutOfRange {
        /// The rejected profit value.
        value: Decimal,
    },

    /// Market descriptor could not be built.
    #[error("invalid market: {0}")]
    InvalidMarket(String),

    /// Event start is not strictly in the future.
    #[error("event time not in the future: {unix}")]
    EventNotFuture {
        /// Event start as unix seconds.
        unix: i64,
    },

    /// A required feed field was absent or empty.
    #[error("missing field: {field}")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// Neither prong's bookmaker is in the sharp set.
    #[error("no sharp prong: {bk1}, {bk2}")]
    NoSharpProng {
        /// First prong's bookmaker.
        bk1: String,
        /// Second prong's bookmaker.
        bk2: String,
    },

    /// Both prongs' bookmakers are in the sharp set.
    #[error("both prongs sharp: {bk1}, {bk2}")]
    BothProngsSharp {
        /// First prong's bookmaker.
        bk1: String,
        /// Second prong's bookmaker.
        bk2: String,
    },

    /// Both prongs reference the same bookmaker.
    #[error("duplicate bookmaker on both prongs: {bookmaker}")]
    DuplicateBookmaker {
        /// The repeated bookmaker id.
        bookmaker: String,
    },
}

/// Upstream feed transport and protocol errors.
#[derive(Error, Debug)]
pub enum FeedError {
    /// Feed answered 429; the adaptive interval must widen.
    #[error("feed rate limited (retry after {retry_after_secs}s)")]
    RateLimited {
        /// Server-suggested wait, if any.
        retry_after_secs: u64,
    },

    /// Non-success, non-429 HTTP status.
    #[error("feed returned HTTP {status}")]
    Status {
        /// The HTTP status code.
        status: u16,
    },

    /// Response body did not match the expected shape.
    #[error("feed response parse error: {0}")]
    Parse(String),

    /// Request exceeded its deadline.
    #[error("feed request timed out")]
    Timeout,

    /// Underlying transport failure.
    #[error("feed transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Dedup store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Underlying redis failure.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Operation exceeded its deadline.
    #[error("store operation timed out")]
    Timeout,
}

/// Dispatcher and chat-API errors.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Queue at capacity and the candidate did not beat the minimum.
    #[error("queue full, entry rejected")]
    QueueFull,

    /// Chat API asked this bot to back off.
    #[error("chat rate limited: retry after {retry_after_secs}s")]
    RetryAfter {
        /// Seconds the bot must wait.
        retry_after_secs: u64,
    },

    /// Permanent failure; the message is dropped without retry.
    #[error("permanent send failure: {reason}")]
    Permanent {
        /// Reason from the chat API.
        reason: String,
    },

    /// Transient failure; eligible for re-enqueue.
    #[error("transient send failure: {reason}")]
    Transient {
        /// Reason from the chat API or transport.
        reason: String,
    },
}

/// Calculator errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalcError {
    /// Sharp odds leave no room for an acceptable soft price.
    #[error("sharp odds too skewed: {sharp_odds}")]
    SharpTooSkewed {
        /// The offending sharp odds.
        sharp_odds: Decimal,
    },

    /// No calculator registered for the sharp bookmaker.
    #[error("no calculator for sharp bookmaker: {bookmaker}")]
    UnknownSharp {
        /// The unmatched bookmaker id.
        bookmaker: String,
    },
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, PipelineError>;
