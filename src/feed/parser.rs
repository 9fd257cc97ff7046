//! Raw feed records and their conversion into [`Surebet`] entities.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::Deserialize;
use time::OffsetDateTime;

use crate::domain::market::{Market, MarketKind};
use crate::domain::{Odds, Pick, Profit, Surebet};
use crate::error::ConstructError;

/// One raw surebet record as the feed delivers it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRecord {
    /// Feed-side record id.
    pub id: i64,
    /// Sort token pairing with `id` for the cursor.
    #[serde(default)]
    pub sort_by: Option<String>,
    /// Record creation time, ms epoch.
    #[serde(default)]
    pub created: Option<i64>,
    /// Reported edge, percent.
    #[serde(default)]
    pub profit: Option<Decimal>,
    /// The two opposing sides.
    #[serde(default)]
    pub prongs: Vec<RawProng>,
}

impl RawRecord {
    /// Cursor token for this record: `{sort_by}:{id}`.
    pub fn cursor_token(&self) -> String {
        format!(
            "{}:{}",
            self.sort_by.as_deref().unwrap_or("created_at"),
            self.id
        )
    }
}

/// One side of a raw surebet record.
#[derive(Debug, Clone, Deserialize)]
pub struct RawProng {
    /// Bookmaker id.
    #[serde(default)]
    pub bk: Option<String>,
    /// Decimal odds.
    #[serde(default)]
    pub value: Option<Decimal>,
    /// Event start, ms epoch.
    #[serde(default)]
    pub time: Option<i64>,
    /// Team names, home then away.
    #[serde(default)]
    pub teams: Vec<String>,
    /// Tournament name.
    #[serde(default)]
    pub tournament: Option<String>,
    /// Sport identifier.
    #[serde(default)]
    pub sport_id: Option<String>,
    /// Market descriptor.
    #[serde(rename = "type", default)]
    pub market: Option<RawMarketType>,
    /// Navigation block carrying the bookmaker deep link.
    #[serde(default)]
    pub event_nav: Option<RawEventNav>,
}

/// Raw market `type` object.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawMarketType {
    /// Bet kind string.
    #[serde(default)]
    pub kind: Option<String>,
    /// Condition value; number or string on the wire.
    #[serde(default)]
    pub condition: Option<serde_json::Value>,
    /// Period qualifier.
    #[serde(default)]
    pub period: Option<String>,
    /// Base side qualifier.
    #[serde(default)]
    pub base: Option<String>,
    /// Game-phase qualifier.
    #[serde(default)]
    pub game: Option<String>,
    /// Variety discriminator.
    #[serde(default)]
    pub variety: Option<String>,
    /// Negation flag.
    #[serde(default)]
    pub no: bool,
}

/// Navigation block from the feed.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawEventNav {
    /// Link entries; the first one carries the deep link.
    #[serde(default)]
    pub links: Vec<RawNavLink>,
}

/// One navigation link entry.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawNavLink {
    /// The link object.
    #[serde(default)]
    pub link: Option<RawLink>,
}

/// Innermost link object.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawLink {
    /// Deep-link URL.
    #[serde(default)]
    pub url: Option<String>,
}

/// Maps raw feed records into [`Surebet`] entities.
///
/// Partial data never raises: every malformed record comes back as a typed
/// discard so the orchestrator can count it and move on.
pub struct FeedParser {
    sharp_set: HashSet<String>,
}

impl FeedParser {
    /// Build a parser over the configured sharp-bookmaker set.
    pub fn new(sharp_bookmakers: &[String]) -> Self {
        Self {
            sharp_set: sharp_bookmakers.iter().cloned().collect(),
        }
    }

    /// Convert one raw record.
    pub fn parse_record(&self, record: &RawRecord) -> Result<Surebet, ConstructError> {
        if record.prongs.len() != 2 {
            return Err(ConstructError::MissingField { field: "prongs" });
        }

        let profit_value = record
            .profit
            .ok_or(ConstructError::MissingField { field: "profit" })?;
        let profit = Profit::new(profit_value)?;

        let pick1 = Self::parse_prong(&record.prongs[0])?;
        let pick2 = Self::parse_prong(&record.prongs[1])?;

        let first_sharp = self.sharp_set.contains(&pick1.bookmaker);
        let second_sharp = self.sharp_set.contains(&pick2.bookmaker);
        let (sharp_prong, soft_prong) = match (first_sharp, second_sharp) {
            (true, false) => (pick1, pick2),
            (false, true) => (pick2, pick1),
            (true, true) => {
                return Err(ConstructError::BothProngsSharp {
                    bk1: pick1.bookmaker,
                    bk2: pick2.bookmaker,
                })
            }
            (false, false) => {
                return Err(ConstructError::NoSharpProng {
                    bk1: pick1.bookmaker,
                    bk2: pick2.bookmaker,
                })
            }
        };

        let created = record
            .created
            .and_then(|ms| OffsetDateTime::from_unix_timestamp(ms / 1000).ok());

        Surebet::new(
            sharp_prong,
            soft_prong,
            profit,
            record.id,
            record.sort_by.clone().unwrap_or_else(|| "created_at".to_string()),
            created,
        )
    }

    fn parse_prong(prong: &RawProng) -> Result<Pick, ConstructError> {
        let bookmaker = prong
            .bk
            .as_deref()
            .filter(|bk| !bk.is_empty())
            .ok_or(ConstructError::MissingField { field: "bk" })?
            .to_string();

        let odds_value = prong
            .value
            .ok_or(ConstructError::MissingField { field: "value" })?;
        let odds = Odds::new(odds_value)?;

        let time_ms = prong
            .time
            .ok_or(ConstructError::MissingField { field: "time" })?;
        let event_time = OffsetDateTime::from_unix_timestamp(time_ms / 1000)
            .map_err(|_| ConstructError::EventNotFuture { unix: time_ms / 1000 })?;

        if prong.teams.len() != 2 {
            return Err(ConstructError::MissingField { field: "teams" });
        }

        let raw_market = prong.market.clone().unwrap_or_default();
        let kind = raw_market
            .kind
            .as_deref()
            .map(MarketKind::parse)
            .unwrap_or(MarketKind::Unknown);

        let market = Market {
            kind,
            condition: raw_market.condition.as_ref().map(json_scalar_to_string),
            period: raw_market.period,
            base: raw_market.base,
            game: raw_market.game,
            variety: raw_market.variety.unwrap_or_default().to_lowercase(),
            negated: raw_market.no,
        };

        let link = prong
            .event_nav
            .as_ref()
            .and_then(|nav| nav.links.first())
            .and_then(|entry| entry.link.as_ref())
            .and_then(|link| link.url.clone());

        Ok(Pick {
            teams: (prong.teams[0].clone(), prong.teams[1].clone()),
            tournament: prong.tournament.clone().unwrap_or_default(),
            sport: prong.sport_id.clone().unwrap_or_default(),
            event_time,
            market,
            odds,
            bookmaker,
            link,
        })
    }
}

/// Render a JSON scalar the way it appeared on the wire.
fn json_scalar_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw_prong(bk: &str, value: Decimal, kind: &str) -> RawProng {
        RawProng {
            bk: Some(bk.to_string()),
            value: Some(value),
            time: Some(1_900_000_000_000),
            teams: vec!["Team A".to_string(), "Team B".to_string()],
            tournament: Some("La Liga".to_string()),
            sport_id: Some("Football".to_string()),
            market: Some(RawMarketType {
                kind: Some(kind.to_string()),
                condition: Some(serde_json::json!(2.5)),
                variety: Some("2.5".to_string()),
                ..Default::default()
            }),
            event_nav: None,
        }
    }

    fn raw_record(prongs: Vec<RawProng>) -> RawRecord {
        RawRecord {
            id: 785141488,
            sort_by: Some("created_at".to_string()),
            created: Some(1_899_999_000_000),
            profit: Some(dec!(2.38)),
            prongs,
        }
    }

    fn parser() -> FeedParser {
        FeedParser::new(&["pinnaclesports".to_string()])
    }

    #[test]
    fn assigns_sharp_and_soft_roles() {
        let record = raw_record(vec![
            raw_prong("retabet_apuestas", dec!(2.10), "over"),
            raw_prong("pinnaclesports", dec!(2.00), "under"),
        ]);

        let surebet = parser().parse_record(&record).unwrap();
        assert_eq!(surebet.sharp_bookmaker(), "pinnaclesports");
        assert_eq!(surebet.soft_bookmaker(), "retabet_apuestas");
        assert_eq!(surebet.soft_odds().value(), dec!(2.10));
        assert_eq!(surebet.soft_prong.market.kind, MarketKind::Over);
        assert_eq!(surebet.soft_prong.market.condition.as_deref(), Some("2.5"));
    }

    #[test]
    fn rejects_when_neither_side_is_sharp() {
        let record = raw_record(vec![
            raw_prong("retabet_apuestas", dec!(2.10), "over"),
            raw_prong("bet365", dec!(2.00), "under"),
        ]);
        assert!(matches!(
            parser().parse_record(&record),
            Err(ConstructError::NoSharpProng { .. })
        ));
    }

    #[test]
    fn rejects_when_both_sides_are_sharp() {
        let sharps = FeedParser::new(&[
            "pinnaclesports".to_string(),
            "bet365".to_string(),
        ]);
        let record = raw_record(vec![
            raw_prong("bet365", dec!(2.10), "over"),
            raw_prong("pinnaclesports", dec!(2.00), "under"),
        ]);
        assert!(matches!(
            sharps.parse_record(&record),
            Err(ConstructError::BothProngsSharp { .. })
        ));
    }

    #[test]
    fn rejects_malformed_odds() {
        let mut bad = raw_prong("retabet_apuestas", dec!(0.99), "over");
        bad.value = Some(dec!(0.99));
        let record = raw_record(vec![
            bad,
            raw_prong("pinnaclesports", dec!(2.00), "under"),
        ]);
        assert!(matches!(
            parser().parse_record(&record),
            Err(ConstructError::OddsOutOfRange { .. })
        ));
    }

    #[test]
    fn rejects_wrong_prong_count() {
        let record = raw_record(vec![raw_prong("pinnaclesports", dec!(2.00), "under")]);
        assert!(matches!(
            parser().parse_record(&record),
            Err(ConstructError::MissingField { field: "prongs" })
        ));
    }

    #[test]
    fn rejects_missing_teams() {
        let mut bad = raw_prong("retabet_apuestas", dec!(2.10), "over");
        bad.teams = vec!["Only One".to_string()];
        let record = raw_record(vec![
            bad,
            raw_prong("pinnaclesports", dec!(2.00), "under"),
        ]);
        assert!(matches!(
            parser().parse_record(&record),
            Err(ConstructError::MissingField { field: "teams" })
        ));
    }

    #[test]
    fn unknown_market_kind_does_not_discard() {
        let record = raw_record(vec![
            raw_prong("retabet_apuestas", dec!(2.10), "some_new_market"),
            raw_prong("pinnaclesports", dec!(2.00), "under"),
        ]);
        let surebet = parser().parse_record(&record).unwrap();
        assert_eq!(surebet.soft_prong.market.kind, MarketKind::Unknown);
    }

    #[test]
    fn cursor_token_layout() {
        let record = raw_record(vec![]);
        assert_eq!(record.cursor_token(), "created_at:785141488");
    }

    #[test]
    fn deep_link_is_extracted() {
        let mut soft = raw_prong("retabet_apuestas", dec!(2.10), "over");
        soft.event_nav = Some(RawEventNav {
            links: vec![RawNavLink {
                link: Some(RawLink {
                    url: Some("https://example.test/event/1".to_string()),
                }),
            }],
        });
        let record = raw_record(vec![
            soft,
            raw_prong("pinnaclesports", dec!(2.00), "under"),
        ]);
        let surebet = parser().parse_record(&record).unwrap();
        assert_eq!(
            surebet.soft_prong.link.as_deref(),
            Some("https://example.test/event/1")
        );
    }
}
