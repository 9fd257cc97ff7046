//! Market kinds, the opposite-market relation, and the market descriptor.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::warn;

/// Closed enumeration of bet kinds understood by the pipeline.
///
/// String forms match the feed wire format. Kinds the feed may emit that we
/// do not recognize parse as [`MarketKind::Unknown`] rather than failing the
/// whole record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum MarketKind {
    /// Home win (money line).
    #[strum(serialize = "win1")]
    #[serde(rename = "win1")]
    Win1,
    /// Away win (money line).
    #[strum(serialize = "win2")]
    #[serde(rename = "win2")]
    Win2,
    /// Draw.
    #[strum(serialize = "draw")]
    #[serde(rename = "draw")]
    Draw,
    /// Double chance 1X.
    #[strum(serialize = "_1x")]
    #[serde(rename = "_1x")]
    DoubleChance1X,
    /// Double chance X2.
    #[strum(serialize = "_x2")]
    #[serde(rename = "_x2")]
    DoubleChanceX2,
    /// Double chance 12.
    #[strum(serialize = "_12")]
    #[serde(rename = "_12")]
    DoubleChance12,
    /// Total over.
    #[strum(serialize = "over")]
    #[serde(rename = "over")]
    Over,
    /// Total under.
    #[strum(serialize = "under")]
    #[serde(rename = "under")]
    Under,
    /// E-sports total over.
    #[strum(serialize = "eover")]
    #[serde(rename = "eover")]
    EOver,
    /// E-sports total under.
    #[strum(serialize = "e_under")]
    #[serde(rename = "e_under")]
    EUnder,
    /// Asian handicap, home side.
    #[strum(serialize = "ah1")]
    #[serde(rename = "ah1")]
    Ah1,
    /// Asian handicap, away side.
    #[strum(serialize = "ah2")]
    #[serde(rename = "ah2")]
    Ah2,
    /// Odd total.
    #[strum(serialize = "odd")]
    #[serde(rename = "odd")]
    Odd,
    /// Even total.
    #[strum(serialize = "even")]
    #[serde(rename = "even")]
    Even,
    /// Yes (both teams to score and similar).
    #[strum(serialize = "yes")]
    #[serde(rename = "yes")]
    Yes,
    /// No.
    #[strum(serialize = "no")]
    #[serde(rename = "no")]
    No,
    /// Draw no bet, home side.
    #[strum(serialize = "win1retx")]
    #[serde(rename = "win1retx")]
    Win1RetX,
    /// Draw no bet, away side.
    #[strum(serialize = "win2retx")]
    #[serde(rename = "win2retx")]
    Win2RetX,
    /// Win only, home side.
    #[strum(serialize = "winonly1")]
    #[serde(rename = "winonly1")]
    WinOnly1,
    /// Win only, away side.
    #[strum(serialize = "winonly2")]
    #[serde(rename = "winonly2")]
    WinOnly2,
    /// Home wins to nil.
    #[strum(serialize = "win1tonil")]
    #[serde(rename = "win1tonil")]
    Win1ToNil,
    /// Away wins to nil.
    #[strum(serialize = "win2tonil")]
    #[serde(rename = "win2tonil")]
    Win2ToNil,
    /// Home clean sheet.
    #[strum(serialize = "clean_sheet_1")]
    #[serde(rename = "clean_sheet_1")]
    CleanSheet1,
    /// Away clean sheet.
    #[strum(serialize = "clean_sheet_2")]
    #[serde(rename = "clean_sheet_2")]
    CleanSheet2,
    /// Home qualifies.
    #[strum(serialize = "win1 qualify")]
    #[serde(rename = "win1 qualify")]
    Win1Qualify,
    /// Away qualifies.
    #[strum(serialize = "win2 qualify")]
    #[serde(rename = "win2 qualify")]
    Win2Qualify,
    /// Margin band, home side.
    #[strum(serialize = "betweenmarginh1")]
    #[serde(rename = "betweenmarginh1")]
    BetweenMarginH1,
    /// Margin band, away side.
    #[strum(serialize = "betweenmarginh2")]
    #[serde(rename = "betweenmarginh2")]
    BetweenMarginH2,
    /// Unrecognized market kind; carried through, never matched as opposite.
    #[strum(serialize = "__unknown__")]
    #[serde(rename = "__unknown__")]
    Unknown,
}

impl MarketKind {
    /// Parse a feed market string, falling back to [`MarketKind::Unknown`].
    ///
    /// Unknown kinds are logged so new feed markets show up in operation.
    pub fn parse(value: &str) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Self::Unknown;
        }
        match trimmed.to_lowercase().parse() {
            Ok(Self::Unknown) | Err(_) => {
                warn!(market = %trimmed, "Unknown market kind from feed");
                Self::Unknown
            }
            Ok(kind) => kind,
        }
    }

    /// Opposite kinds that would rebound the same position.
    ///
    /// Symmetric pairs everywhere except the double-chance triangle, where
    /// each kind opposes the other two.
    pub fn opposites(&self) -> &'static [MarketKind] {
        use MarketKind::*;
        match self {
            Win1 => &[Win2],
            Win2 => &[Win1],
            DoubleChance1X => &[DoubleChanceX2, DoubleChance12],
            DoubleChanceX2 => &[DoubleChance1X, DoubleChance12],
            DoubleChance12 => &[DoubleChance1X, DoubleChanceX2],
            Over => &[Under],
            Under => &[Over],
            EOver => &[EUnder],
            EUnder => &[EOver],
            Ah1 => &[Ah2],
            Ah2 => &[Ah1],
            Odd => &[Even],
            Even => &[Odd],
            Yes => &[No],
            No => &[Yes],
            Win1RetX => &[Win2RetX],
            Win2RetX => &[Win1RetX],
            WinOnly1 => &[WinOnly2],
            WinOnly2 => &[WinOnly1],
            Win1ToNil => &[Win2ToNil],
            Win2ToNil => &[Win1ToNil],
            CleanSheet1 => &[CleanSheet2],
            CleanSheet2 => &[CleanSheet1],
            Win1Qualify => &[Win2Qualify],
            Win2Qualify => &[Win1Qualify],
            BetweenMarginH1 => &[BetweenMarginH2],
            BetweenMarginH2 => &[BetweenMarginH1],
            Draw | Unknown => &[],
        }
    }

    /// Whether the kind has at least one opposite.
    pub fn has_opposites(&self) -> bool {
        !self.opposites().is_empty()
    }
}

/// Full market descriptor as carried by a feed prong's `type` object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Market {
    /// The bet kind.
    pub kind: MarketKind,
    /// Condition value, e.g. "2.5" for a total line.
    pub condition: Option<String>,
    /// Period qualifier, e.g. "regular time".
    pub period: Option<String>,
    /// Base side qualifier.
    pub base: Option<String>,
    /// Game-phase qualifier.
    pub game: Option<String>,
    /// Variety discriminator used in dedup keys.
    pub variety: String,
    /// Negation flag from the feed.
    pub negated: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_kinds() {
        assert_eq!(MarketKind::parse("over"), MarketKind::Over);
        assert_eq!(MarketKind::parse("OVER"), MarketKind::Over);
        assert_eq!(MarketKind::parse(" win1 "), MarketKind::Win1);
        assert_eq!(MarketKind::parse("_1x"), MarketKind::DoubleChance1X);
        assert_eq!(MarketKind::parse("win1 qualify"), MarketKind::Win1Qualify);
    }

    #[test]
    fn parse_unknown_is_nonfatal() {
        assert_eq!(MarketKind::parse("triple_axel"), MarketKind::Unknown);
        assert_eq!(MarketKind::parse(""), MarketKind::Unknown);
    }

    #[test]
    fn opposites_match_expected_pairs() {
        assert_eq!(MarketKind::Over.opposites(), &[MarketKind::Under]);
        assert_eq!(MarketKind::Win1.opposites(), &[MarketKind::Win2]);
        assert_eq!(MarketKind::Yes.opposites(), &[MarketKind::No]);
        assert_eq!(
            MarketKind::DoubleChance1X.opposites(),
            &[MarketKind::DoubleChanceX2, MarketKind::DoubleChance12]
        );
        assert!(MarketKind::Draw.opposites().is_empty());
        assert!(MarketKind::Unknown.opposites().is_empty());
    }

    #[test]
    fn opposite_relation_is_symmetric() {
        // Every kind appears in the opposites of each of its opposites.
        for kind in [
            MarketKind::Win1,
            MarketKind::Win2,
            MarketKind::Over,
            MarketKind::Under,
            MarketKind::Ah1,
            MarketKind::Ah2,
            MarketKind::Odd,
            MarketKind::Even,
            MarketKind::Yes,
            MarketKind::No,
            MarketKind::DoubleChance1X,
            MarketKind::DoubleChanceX2,
            MarketKind::DoubleChance12,
        ] {
            for opp in kind.opposites() {
                assert!(
                    opp.opposites().contains(&kind),
                    "{kind} missing from opposites of {opp}"
                );
            }
        }
    }

    #[test]
    fn display_matches_wire_format() {
        assert_eq!(MarketKind::Over.to_string(), "over");
        assert_eq!(MarketKind::DoubleChance1X.to_string(), "_1x");
        assert_eq!(MarketKind::EUnder.to_string(), "e_under");
    }
}
