//! The surebet entity: a sharp/soft pair of picks on the same event.

use time::OffsetDateTime;

use super::odds::{Odds, Profit};
use super::pick::Pick;
use crate::error::ConstructError;

/// An arbitrage candidate: two opposing picks at two bookmakers.
///
/// Exactly one prong's bookmaker is sharp; role assignment happens at parse
/// time and the constructor only re-checks the cheap invariant that the two
/// prongs come from different bookmakers.
#[derive(Debug, Clone)]
pub struct Surebet {
    /// The reference-price side.
    pub sharp_prong: Pick,
    /// The value side: the pick actually delivered.
    pub soft_prong: Pick,
    /// Edge reported by the feed.
    pub profit: Profit,
    /// Feed-side record id.
    pub record_id: i64,
    /// Feed-side sort token; pairs with `record_id` to form the cursor.
    pub sort_key: String,
    /// When the feed created the record.
    pub created: Option<OffsetDateTime>,
}

impl Surebet {
    /// Build a surebet from already role-assigned prongs.
    pub fn new(
        sharp_prong: Pick,
        soft_prong: Pick,
        profit: Profit,
        record_id: i64,
        sort_key: String,
        created: Option<OffsetDateTime>,
    ) -> Result<Self, ConstructError> {
        if sharp_prong.bookmaker == soft_prong.bookmaker {
            return Err(ConstructError::DuplicateBookmaker {
                bookmaker: sharp_prong.bookmaker,
            });
        }
        Ok(Self {
            sharp_prong,
            soft_prong,
            profit,
            record_id,
            sort_key,
            created,
        })
    }

    /// Odds at the sharp bookmaker.
    pub fn sharp_odds(&self) -> Odds {
        self.sharp_prong.odds
    }

    /// Odds at the soft bookmaker.
    pub fn soft_odds(&self) -> Odds {
        self.soft_prong.odds
    }

    /// Sharp bookmaker id.
    pub fn sharp_bookmaker(&self) -> &str {
        &self.sharp_prong.bookmaker
    }

    /// Soft bookmaker id.
    pub fn soft_bookmaker(&self) -> &str {
        &self.soft_prong.bookmaker
    }

    /// Event start, taken from the delivered side.
    pub fn event_time(&self) -> OffsetDateTime {
        self.soft_prong.event_time
    }

    /// Cursor token contribution: `{sort_by}:{id}`.
    pub fn cursor_token(&self) -> String {
        format!("{}:{}", self.sort_key, self.record_id)
    }
}
