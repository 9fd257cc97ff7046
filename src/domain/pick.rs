//! The pick entity and its deduplication keys.

use time::OffsetDateTime;

use super::market::Market;
use super::odds::Odds;
use crate::error::ConstructError;

/// A concrete bet at one bookmaker on one event.
///
/// Immutable after construction; everything it exposes is a pure
/// derivation.
#[derive(Debug, Clone, PartialEq)]
pub struct Pick {
    /// Team names, home then away.
    pub teams: (String, String),
    /// Tournament / league name.
    pub tournament: String,
    /// Sport identifier from the feed, e.g. "Football".
    pub sport: String,
    /// Event start time (UTC).
    pub event_time: OffsetDateTime,
    /// Market descriptor.
    pub market: Market,
    /// Decimal odds at this bookmaker.
    pub odds: Odds,
    /// Bookmaker identifier.
    pub bookmaker: String,
    /// Optional deep link into the bookmaker's event page.
    pub link: Option<String>,
}

impl Pick {
    /// Short-term-memory key for this pick.
    ///
    /// Layout: `team1:team2:event_unix:kind:variety:bookmaker` with team
    /// names normalized and canonically ordered, so the same fixture keys
    /// identically regardless of feed-side team ordering.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.base_key(),
            self.market.kind,
            self.market.variety.to_lowercase(),
            self.bookmaker,
        )
    }

    /// Dedup keys for every opposite market of this pick.
    pub fn opposite_keys(&self) -> Vec<String> {
        self.market
            .kind
            .opposites()
            .iter()
            .map(|opposite| {
                format!(
                    "{}:{}:{}:{}",
                    self.base_key(),
                    opposite,
                    self.market.variety.to_lowercase(),
                    self.bookmaker,
                )
            })
            .collect()
    }

    /// Shared key prefix: canonical teams plus event time.
    fn base_key(&self) -> String {
        let mut left = normalize_team(&self.teams.0);
        let mut right = normalize_team(&self.teams.1);
        if left > right {
            std::mem::swap(&mut left, &mut right);
        }
        format!("{}:{}:{}", left, right, self.event_time.unix_timestamp())
    }

    /// Seconds until the event starts, clamped to a one-second floor.
    ///
    /// This is the TTL written alongside dedup keys: memory of a pick is
    /// pointless once its event has kicked off.
    pub fn dedup_ttl(&self, now: OffsetDateTime) -> u64 {
        let remaining = self.event_time.unix_timestamp() - now.unix_timestamp();
        remaining.max(1) as u64
    }
}

/// Normalize a team name for key purposes: case-fold, strip punctuation,
/// collapse whitespace.
pub fn normalize_team(name: &str) -> String {
    let lowered = name.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Assert an event time is strictly in the future.
pub fn ensure_future(
    event_time: OffsetDateTime,
    now: OffsetDateTime,
) -> Result<(), ConstructError> {
    if event_time <= now {
        return Err(ConstructError::EventNotFuture {
            unix: event_time.unix_timestamp(),
        });
    }
    Ok(())
}
