//! Ordered, fail-fast validation chain for parsed surebets.
//!
//! Link order is mandated: pure CPU checks run before anything that talks
//! to the dedup store, and the first failure short-circuits the rest.

use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tracing::warn;

use crate::config::Config;
use crate::domain::{BookmakerRegistry, Surebet};
use crate::store::DedupStore;

/// What a single link decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Link passed; continue down the chain.
    Pass,
    /// Link failed; reason slug feeds the drop counters.
    Fail(&'static str),
}

/// Outcome of running the whole chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainResult {
    /// All links passed.
    Pass,
    /// A link failed.
    Fail {
        /// The failing link's name.
        validator: &'static str,
        /// Reason slug.
        reason: &'static str,
    },
}

/// A single validation link.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Stable name, used for removal in tests and for failure reporting.
    fn name(&self) -> &'static str;

    /// Check one surebet.
    async fn check(&self, surebet: &Surebet, now: OffsetDateTime) -> Verdict;
}

/// Fail-fast sequence of validators.
pub struct ValidationChain {
    links: Vec<Arc<dyn Validator>>,
}

impl ValidationChain {
    /// Empty chain.
    pub fn new() -> Self {
        Self { links: Vec::new() }
    }

    /// Append a link.
    pub fn add(mut self, link: Arc<dyn Validator>) -> Self {
        self.links.push(link);
        self
    }

    /// Remove a link by name. Explicit so tests can drop the store-backed
    /// links and keep the pure ones.
    pub fn remove(mut self, name: &str) -> Self {
        self.links.retain(|link| link.name() != name);
        self
    }

    /// Names of the links in execution order.
    pub fn link_names(&self) -> Vec<&'static str> {
        self.links.iter().map(|link| link.name()).collect()
    }

    /// The mandated production chain.
    pub fn standard(
        config: &Config,
        registry: Arc<BookmakerRegistry>,
        store: Arc<DedupStore>,
    ) -> Self {
        Self::new()
            .add(Arc::new(OddsRangeValidator {
                min: config.min_odds,
                max: config.max_odds,
            }))
            .add(Arc::new(ProfitRangeValidator {
                min: config.min_profit,
                max: config.max_profit,
            }))
            .add(Arc::new(FutureEventValidator))
            .add(Arc::new(RolesValidator { registry }))
            .add(Arc::new(DedupValidator { store }))
    }

    /// Run every link in order, stopping at the first failure.
    pub async fn validate(&self, surebet: &Surebet, now: OffsetDateTime) -> ChainResult {
        for link in &self.links {
            if let Verdict::Fail(reason) = link.check(surebet, now).await {
                return ChainResult::Fail {
                    validator: link.name(),
                    reason,
                };
            }
        }
        ChainResult::Pass
    }
}

impl Default for ValidationChain {
    fn default() -> Self {
        Self::new()
    }
}

/// Link 1: soft odds within the configured delivery window.
pub struct OddsRangeValidator {
    /// Inclusive lower bound.
    pub min: Decimal,
    /// Inclusive upper bound.
    pub max: Decimal,
}

#[async_trait]
impl Validator for OddsRangeValidator {
    fn name(&self) -> &'static str {
        "odds_range"
    }

    async fn check(&self, surebet: &Surebet, _now: OffsetDateTime) -> Verdict {
        if surebet.soft_odds().is_in_range(self.min, self.max) {
            Verdict::Pass
        } else {
            Verdict::Fail("odds_range")
        }
    }
}

/// Link 2: profit within the configured window.
pub struct ProfitRangeValidator {
    /// Inclusive lower bound (percent).
    pub min: Decimal,
    /// Inclusive upper bound (percent).
    pub max: Decimal,
}

#[async_trait]
impl Validator for ProfitRangeValidator {
    fn name(&self) -> &'static str {
        "profit_range"
    }

    async fn check(&self, surebet: &Surebet, _now: OffsetDateTime) -> Verdict {
        if surebet.profit.is_in_range(self.min, self.max) {
            Verdict::Pass
        } else {
            Verdict::Fail("profit_range")
        }
    }
}

/// Link 3: event strictly in the future.
pub struct FutureEventValidator;

#[async_trait]
impl Validator for FutureEventValidator {
    fn name(&self) -> &'static str {
        "future_event"
    }

    async fn check(&self, surebet: &Surebet, now: OffsetDateTime) -> Verdict {
        if surebet.event_time() > now {
            Verdict::Pass
        } else {
            Verdict::Fail("stale_event")
        }
    }
}

/// Link 4: role sanity. The parser already enforced this; re-asserted here
/// so a refactor upstream cannot silently ship soft picks from a sharp.
pub struct RolesValidator {
    /// Configured bookmaker registry.
    pub registry: Arc<BookmakerRegistry>,
}

#[async_trait]
impl Validator for RolesValidator {
    fn name(&self) -> &'static str {
        "roles"
    }

    async fn check(&self, surebet: &Surebet, _now: OffsetDateTime) -> Verdict {
        let sharp_ok = self.registry.is_sharp(surebet.sharp_bookmaker());
        let soft_ok = self.registry.is_soft(surebet.soft_bookmaker());
        if sharp_ok && soft_ok {
            Verdict::Pass
        } else {
            Verdict::Fail("bad_roles")
        }
    }
}

/// Links 5+6: dedup and opposite-market memory, one batched query.
///
/// A store failure drops the pick: a duplicate in chat costs more than a
/// missed pick.
pub struct DedupValidator {
    /// Shared dedup store.
    pub store: Arc<DedupStore>,
}

#[async_trait]
impl Validator for DedupValidator {
    fn name(&self) -> &'static str {
        "dedup"
    }

    async fn check(&self, surebet: &Surebet, _now: OffsetDateTime) -> Verdict {
        let mut keys = vec![surebet.soft_prong.dedup_key()];
        keys.extend(surebet.soft_prong.opposite_keys());

        match self.store.exists_which(&keys).await {
            Ok(None) => Verdict::Pass,
            Ok(Some(0)) => Verdict::Fail("duplicate"),
            Ok(Some(_)) => Verdict::Fail("opposite"),
            Err(e) => {
                warn!(error = %e, "Dedup query failed, dropping pick");
                Verdict::Fail("store_error")
            }
        }
    }
}
