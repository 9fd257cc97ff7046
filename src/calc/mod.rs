//! Stake-tier and minimum-odds calculators, selected by sharp bookmaker.
//!
//! Each sharp operator gets its own [`SharpCalculator`] implementation;
//! adding a new sharp is one registry entry, nothing else changes.

pub mod pinnacle;

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::domain::{Odds, Profit};
use crate::error::CalcError;

pub use pinnacle::PinnacleCalculator;

/// Four-level qualitative stake indicator derived from profit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakeTier {
    /// [-1.0, -0.5)
    Low,
    /// [-0.5, 1.5)
    MediumLow,
    /// [1.5, 4.0)
    MediumHigh,
    /// [4.0, +inf)
    High,
}

impl StakeTier {
    /// Chat indicator for this tier.
    pub fn indicator(&self) -> &'static str {
        match self {
            StakeTier::Low => "\u{1F534}",        // red circle
            StakeTier::MediumLow => "\u{1F7E0}",  // orange circle
            StakeTier::MediumHigh => "\u{1F7E1}", // yellow circle
            StakeTier::High => "\u{1F7E2}",       // green circle
        }
    }
}

/// Per-sharp-bookmaker value computation.
pub trait SharpCalculator: Send + Sync {
    /// Sharp bookmaker id this calculator serves.
    fn bookmaker(&self) -> &'static str;

    /// Minimum acceptable soft odds given the sharp's odds on the
    /// opposite side. The raw value is used for comparisons; rounding
    /// happens only at display time.
    fn min_soft_odds(&self, sharp_odds: Odds) -> Result<Decimal, CalcError>;

    /// Stake tier for a profit, or `None` when the profit is outside the
    /// tradeable range.
    fn stake_tier(&self, profit: Profit) -> Option<StakeTier>;
}

/// Registry mapping sharp bookmaker ids to their calculators.
pub struct CalculatorRegistry {
    calculators: HashMap<&'static str, Arc<dyn SharpCalculator>>,
}

impl CalculatorRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self {
            calculators: HashMap::new(),
        }
    }

    /// Registry with all built-in calculators.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PinnacleCalculator));
        registry
    }

    /// Add a calculator, keyed by its bookmaker id.
    pub fn register(&mut self, calculator: Arc<dyn SharpCalculator>) {
        self.calculators.insert(calculator.bookmaker(), calculator);
    }

    /// Look up the calculator for a sharp bookmaker.
    pub fn get(&self, bookmaker: &str) -> Result<&Arc<dyn SharpCalculator>, CalcError> {
        self.calculators
            .get(bookmaker)
            .ok_or_else(|| CalcError::UnknownSharp {
                bookmaker: bookmaker.to_string(),
            })
    }
}

impl Default for CalculatorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_pinnacle() {
        let registry = CalculatorRegistry::with_defaults();
        assert!(registry.get("pinnaclesports").is_ok());
    }

    #[test]
    fn registry_rejects_unknown_sharp() {
        let registry = CalculatorRegistry::with_defaults();
        assert!(matches!(
            registry.get("bet365"),
            Err(CalcError::UnknownSharp { .. })
        ));
    }
}
