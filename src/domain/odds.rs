//! Validated odds and profit primitives.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::ConstructError;

/// Decimal betting odds, validated to [1.01, 1000] on construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Odds(Decimal);

impl Odds {
    /// Lowest accepted odds.
    pub const MIN: Decimal = Decimal::from_parts(101, 0, 0, false, 2); // 1.01
    /// Highest accepted odds.
    pub const MAX: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

    /// Build validated odds.
    pub fn new(value: Decimal) -> Result<Self, ConstructError> {
        if value < Self::MIN || value > Self::MAX {
            return Err(ConstructError::OddsOutOfRange { value });
        }
        Ok(Self(value))
    }

    /// The raw decimal value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Implied probability, `1 / value`.
    pub fn implied_prob(&self) -> Decimal {
        Decimal::ONE / self.0
    }

    /// Check whether the odds fall within an inclusive range.
    pub fn is_in_range(&self, min: Decimal, max: Decimal) -> bool {
        self.0 >= min && self.0 <= max
    }
}

impl std::fmt::Display for Odds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        )
    }
}

/// Profit percentage reported by the feed, validated to [-100, 100].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Profit(Decimal);

impl Profit {
    /// Build a validated profit percentage.
    pub fn new(value: Decimal) -> Result<Self, ConstructError> {
        let hundred = Decimal::ONE_HUNDRED;
        if value < -hundred || value > hundred {
            return Err(ConstructError::ProfitOutOfRange { value });
        }
        Ok(Self(value))
    }

    /// The raw percentage value.
    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Check whether the profit falls within an inclusive range.
    pub fn is_in_range(&self, min: Decimal, max: Decimal) -> bool {
        self.0 >= min && self.0 <= max
    }
}

impl std::fmt::Display for Profit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}
