//! Calculator for Pinnacle as the sharp reference.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::{SharpCalculator, StakeTier};
use crate::domain::{Odds, Profit};
use crate::error::CalcError;

/// Pinnacle-referenced value computation.
///
/// Pinnacle's low-margin prices are treated as the fair probability, so the
/// acceptable soft price is whatever keeps the combined position above the
/// -1% tolerance: `min_odds = 1 / (1.01 - 1/sharp_odds)`.
pub struct PinnacleCalculator;

impl PinnacleCalculator {
    const TOLERANCE: Decimal = dec!(1.01);
    const MIN_PROFIT: Decimal = dec!(-1.0);
    const MAX_PROFIT: Decimal = dec!(25.0);
}

impl SharpCalculator for PinnacleCalculator {
    fn bookmaker(&self) -> &'static str {
        "pinnaclesports"
    }

    fn min_soft_odds(&self, sharp_odds: Odds) -> Result<Decimal, CalcError> {
        let headroom = Self::TOLERANCE - sharp_odds.implied_prob();
        if headroom <= Decimal::ZERO {
            return Err(CalcError::SharpTooSkewed {
                sharp_odds: sharp_odds.value(),
            });
        }
        Ok(Decimal::ONE / headroom)
    }

    fn stake_tier(&self, profit: Profit) -> Option<StakeTier> {
        let p = profit.value();
        if p < Self::MIN_PROFIT || p > Self::MAX_PROFIT {
            return None;
        }
        if p < dec!(-0.5) {
            Some(StakeTier::Low)
        } else if p < dec!(1.5) {
            Some(StakeTier::MediumLow)
        } else if p < dec!(4.0) {
            Some(StakeTier::MediumHigh)
        } else {
            Some(StakeTier::High)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::RoundingStrategy;

    fn min_odds_2dp(sharp: Decimal) -> Decimal {
        PinnacleCalculator
            .min_soft_odds(Odds::new(sharp).unwrap())
            .unwrap()
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    #[test]
    fn min_odds_formula() {
        // 1 / (1.01 - 1/2.00) = 1 / 0.51
        let raw = PinnacleCalculator
            .min_soft_odds(Odds::new(dec!(2.00)).unwrap())
            .unwrap();
        assert!(raw > dec!(1.9607) && raw < dec!(1.9608));
    }

    #[test]
    fn min_odds_reference_values() {
        assert_eq!(min_odds_2dp(dec!(1.50)), dec!(2.91));
        assert_eq!(min_odds_2dp(dec!(1.80)), dec!(2.20));
        assert_eq!(min_odds_2dp(dec!(3.00)), dec!(1.48));
    }

    #[test]
    fn min_odds_finite_at_lowest_sharp() {
        // 1.01 is the lowest constructible odds; implied prob 0.9901,
        // headroom 0.0199, still comfortably positive.
        let raw = PinnacleCalculator
            .min_soft_odds(Odds::new(dec!(1.01)).unwrap())
            .unwrap();
        assert!(raw > Decimal::ZERO);
        assert!(raw < dec!(51));
    }

    #[test]
    fn tier_boundaries_are_left_closed() {
        let calc = PinnacleCalculator;
        let tier = |p: Decimal| calc.stake_tier(Profit::new(p).unwrap());

        assert_eq!(tier(dec!(-1.0)), Some(StakeTier::Low));
        assert_eq!(tier(dec!(-0.51)), Some(StakeTier::Low));
        assert_eq!(tier(dec!(-0.5)), Some(StakeTier::MediumLow));
        assert_eq!(tier(dec!(1.49)), Some(StakeTier::MediumLow));
        assert_eq!(tier(dec!(1.5)), Some(StakeTier::MediumHigh));
        assert_eq!(tier(dec!(3.99)), Some(StakeTier::MediumHigh));
        assert_eq!(tier(dec!(4.0)), Some(StakeTier::High));
        assert_eq!(tier(dec!(25.0)), Some(StakeTier::High));
    }

    #[test]
    fn tier_rejects_outside_tradeable_range() {
        let calc = PinnacleCalculator;
        assert_eq!(calc.stake_tier(Profit::new(dec!(-1.01)).unwrap()), None);
        assert_eq!(calc.stake_tier(Profit::new(dec!(25.01)).unwrap()), None);
    }

    #[test]
    fn tier_indicators() {
        assert_eq!(StakeTier::Low.indicator(), "🔴");
        assert_eq!(StakeTier::MediumLow.indicator(), "🟠");
        assert_eq!(StakeTier::MediumHigh.indicator(), "🟡");
        assert_eq!(StakeTier::High.indicator(), "🟢");
    }
}
