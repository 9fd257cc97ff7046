//! Bookmaker identities and the configured registry.

use std::collections::HashMap;

use crate::config::Config;

/// Role a bookmaker plays in a surebet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookmakerRole {
    /// Reference-price operator; its odds drive the calculators.
    Sharp,
    /// Target operator whose mispriced side gets delivered.
    Soft,
}

/// A configured bookmaker.
#[derive(Debug, Clone)]
pub struct Bookmaker {
    /// Feed-side identifier.
    pub id: String,
    /// Sharp or soft.
    pub role: BookmakerRole,
    /// Delivery channel; present for softs only.
    pub channel: Option<i64>,
}

/// Lookup table of configured bookmakers.
#[derive(Debug, Clone)]
pub struct BookmakerRegistry {
    entries: HashMap<String, Bookmaker>,
}

impl BookmakerRegistry {
    /// Build the registry from configuration.
    ///
    /// `Config::validate` has already guaranteed every soft has a channel,
    /// so this cannot produce a soft without one.
    pub fn from_config(config: &Config) -> Self {
        let channels = config.channel_map();
        let mut entries = HashMap::new();

        for id in &config.sharp_bookmakers {
            entries.insert(
                id.clone(),
                Bookmaker {
                    id: id.clone(),
                    role: BookmakerRole::Sharp,
                    channel: None,
                },
            );
        }

        for id in &config.target_bookies {
            entries.insert(
                id.clone(),
                Bookmaker {
                    id: id.clone(),
                    role: BookmakerRole::Soft,
                    channel: channels.get(id).copied(),
                },
            );
        }

        Self { entries }
    }

    /// Look up a bookmaker by id.
    pub fn get(&self, id: &str) -> Option<&Bookmaker> {
        self.entries.get(id)
    }

    /// Whether the id names a configured sharp.
    pub fn is_sharp(&self, id: &str) -> bool {
        matches!(
            self.entries.get(id).map(|b| b.role),
            Some(BookmakerRole::Sharp)
        )
    }

    /// Whether the id names a configured soft target.
    pub fn is_soft(&self, id: &str) -> bool {
        matches!(
            self.entries.get(id).map(|b| b.role),
            Some(BookmakerRole::Soft)
        )
    }

    /// Delivery channel for a soft bookmaker.
    pub fn channel_for(&self, id: &str) -> Option<i64> {
        self.entries.get(id).and_then(|b| b.channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::tests::test_config;

    #[test]
    fn registry_assigns_roles_and_channels() {
        let registry = BookmakerRegistry::from_config(&test_config());

        assert!(registry.is_sharp("pinnaclesports"));
        assert!(!registry.is_soft("pinnaclesports"));
        assert!(registry.is_soft("retabet_apuestas"));
        assert_eq!(registry.channel_for("retabet_apuestas"), Some(-1001111));
        assert_eq!(registry.channel_for("pinnaclesports"), None);
    }

    #[test]
    fn unconfigured_bookmaker_is_neither_role() {
        let registry = BookmakerRegistry::from_config(&test_config());
        assert!(!registry.is_sharp("bet365"));
        assert!(!registry.is_soft("bet365"));
        assert!(registry.get("bet365").is_none());
    }
}
