//! Hero card: achievement meta-progression that survives every reset.
//!
//! Each achievement climbs a three-level ladder. Levels accrue one per
//! completion and stop at the level cap; an explicit prestige converts a
//! capped level into a rank, and a capped rank carries into a badge. The
//! bonus of one achievement is `base * level * rank_mult^rank * badge_mult^badge`.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::bonus::{BonusKind, BonusMap};
use crate::catalog::{AchievementDef, Catalog};
use crate::config::HeroConfig;
use crate::constants::DEFAULT_HERO_NAME;
use crate::error::{ActionError, ActionResult, Requirement};
use crate::numbers::{exponent_from_u32, floor_f64_to_u32, u64_to_f64};

/// Well-known achievement ids the engine increments itself.
pub mod keys {
    pub const NODE_HARVESTER: &str = "node_harvester";
    pub const BULK_BUYER: &str = "bulk_buyer";
    pub const CLICK_MASTER: &str = "click_master";
    pub const PRESTIGE_VETERAN: &str = "prestige_veteran";
    pub const SURVIVOR: &str = "survivor";
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementProgress {
    #[serde(default)]
    pub level: u32,
    #[serde(default)]
    pub rank: u32,
    #[serde(default)]
    pub badge: u32,
    #[serde(default)]
    pub total_completions: u64,
}

/// Outcome of an explicit achievement prestige.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LadderStep {
    RankUp(u32),
    BadgeUp(u32),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroCard {
    #[serde(default = "HeroCard::default_name")]
    pub name: String,
    #[serde(default)]
    pub total_level: u64,
    #[serde(default)]
    pub achievements: BTreeMap<String, AchievementProgress>,
}

impl Default for HeroCard {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            total_level: 0,
            achievements: BTreeMap::new(),
        }
    }
}

impl HeroCard {
    fn default_name() -> String {
        DEFAULT_HERO_NAME.to_string()
    }

    #[must_use]
    pub fn new(catalog: &Catalog) -> Self {
        let mut card = Self::default();
        card.reconcile(catalog);
        card
    }

    /// Add entries for achievements introduced after this card was saved.
    pub fn reconcile(&mut self, catalog: &Catalog) {
        for def in &catalog.achievements {
            self.achievements.entry(def.id.clone()).or_default();
        }
    }

    #[must_use]
    pub fn progress(&self, key: &str) -> Option<&AchievementProgress> {
        self.achievements.get(key)
    }

    /// Record one completion. Returns the new level, which stops at the level cap.
    ///
    /// # Errors
    ///
    /// Returns `UnknownKey` for achievements absent from the catalog.
    pub fn increment(
        &mut self,
        catalog: &Catalog,
        key: &str,
        cfg: &HeroConfig,
    ) -> ActionResult<u32> {
        if catalog.achievement(key).is_none() {
            return Err(ActionError::unknown("achievement", key));
        }
        let progress = self.achievements.entry(key.to_string()).or_default();
        progress.level = progress.level.saturating_add(1).min(cfg.level_cap);
        progress.total_completions = progress.total_completions.saturating_add(1);
        self.total_level = self.total_level.saturating_add(1);
        Ok(progress.level)
    }

    /// Convert a capped level into a rank, carrying a capped rank into a badge.
    ///
    /// # Errors
    ///
    /// Returns `UnknownKey` for unknown achievements and `PrerequisiteNotMet`
    /// while the level is below the cap.
    pub fn prestige(&mut self, key: &str, cfg: &HeroConfig) -> ActionResult<LadderStep> {
        let progress = self
            .achievements
            .get_mut(key)
            .ok_or_else(|| ActionError::unknown("achievement", key))?;
        if progress.level < cfg.level_cap {
            return Err(ActionError::prerequisite(
                key,
                Requirement::HeroLevel(cfg.level_cap),
            ));
        }
        progress.level = 0;
        progress.rank += 1;
        if progress.rank >= cfg.rank_cap {
            progress.rank = 0;
            progress.badge = progress.badge.saturating_add(1);
            Ok(LadderStep::BadgeUp(progress.badge))
        } else {
            Ok(LadderStep::RankUp(progress.rank))
        }
    }

    /// Bonus contributed by one achievement.
    #[must_use]
    pub fn achievement_bonus(&self, def: &AchievementDef, cfg: &HeroConfig) -> f64 {
        self.achievements.get(&def.id).map_or(0.0, |progress| {
            def.base_bonus
                * f64::from(progress.level)
                * cfg.rank_multiplier.powi(exponent_from_u32(progress.rank))
                * cfg.badge_multiplier.powi(exponent_from_u32(progress.badge))
        })
    }

    /// Sum of bonuses across achievements of one bonus type.
    #[must_use]
    pub fn aggregate(&self, catalog: &Catalog, kind: BonusKind, cfg: &HeroConfig) -> f64 {
        catalog
            .achievements
            .iter()
            .filter(|def| def.bonus_type == kind)
            .map(|def| self.achievement_bonus(def, cfg))
            .sum()
    }

    /// Multipliers the hero card feeds into rate composition.
    ///
    /// The energy-rate aggregate scales every resource rate, so it is
    /// expressed as the `all_rates` catch-all.
    #[must_use]
    pub fn rate_bonus(&self, catalog: &Catalog, cfg: &HeroConfig) -> BonusMap {
        BonusMap::new()
            .with(
                BonusKind::AllRates,
                1.0 + self.aggregate(catalog, BonusKind::EnergyRate, cfg),
            )
            .with(
                BonusKind::ClickPower,
                1.0 + self.aggregate(catalog, BonusKind::ClickPower, cfg),
            )
    }

    /// Floor of the mean badge across achievements completed at least once.
    #[must_use]
    pub fn hero_rank(&self) -> u32 {
        let (sum, count) = self
            .achievements
            .values()
            .filter(|progress| progress.total_completions > 0)
            .fold((0_u64, 0_u64), |(sum, count), progress| {
                (sum + u64::from(progress.badge), count + 1)
            });
        if count == 0 {
            return 0;
        }
        floor_f64_to_u32(u64_to_f64(sum) / u64_to_f64(count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::catalog;

    #[test]
    fn increment_caps_level_but_keeps_counting() {
        let catalog = catalog();
        let cfg = HeroConfig::default();
        let mut card = HeroCard::new(&catalog);
        for _ in 0..105 {
            card.increment(&catalog, keys::CLICK_MASTER, &cfg).unwrap();
        }
        let progress = card.progress(keys::CLICK_MASTER).unwrap();
        assert_eq!(progress.level, 100);
        assert_eq!(progress.total_completions, 105);
        assert_eq!(card.total_level, 105);
        assert!(card.increment(&catalog, "speed_demon", &cfg).is_err());
    }

    #[test]
    fn prestige_requires_cap_and_carries_into_badge() {
        let catalog = catalog();
        let cfg = HeroConfig::default();
        let mut card = HeroCard::new(&catalog);
        assert!(matches!(
            card.prestige(keys::SURVIVOR, &cfg),
            Err(ActionError::PrerequisiteNotMet { .. })
        ));

        let progress = card.achievements.get_mut(keys::SURVIVOR).unwrap();
        progress.level = 100;
        progress.rank = 98;
        assert_eq!(card.prestige(keys::SURVIVOR, &cfg), Ok(LadderStep::RankUp(99)));
        assert_eq!(card.progress(keys::SURVIVOR).unwrap().level, 0);

        card.achievements.get_mut(keys::SURVIVOR).unwrap().level = 100;
        assert_eq!(card.prestige(keys::SURVIVOR, &cfg), Ok(LadderStep::BadgeUp(1)));
        let progress = card.progress(keys::SURVIVOR).unwrap();
        assert_eq!((progress.level, progress.rank, progress.badge), (0, 0, 1));
    }

    #[test]
    fn bonus_scales_with_rank_and_badge() {
        let catalog = catalog();
        let cfg = HeroConfig::default();
        let mut card = HeroCard::new(&catalog);
        let progress = card.achievements.get_mut(keys::NODE_HARVESTER).unwrap();
        progress.level = 10;
        progress.rank = 2;
        progress.badge = 1;

        let def = catalog.achievement(keys::NODE_HARVESTER).unwrap();
        let expected = 0.001 * 10.0 * 1.5 * 1.5 * 2.0;
        assert!((card.achievement_bonus(def, &cfg) - expected).abs() < 1e-12);
        assert!((card.aggregate(&catalog, BonusKind::EnergyRate, &cfg) - expected).abs() < 1e-12);

        let rates = card.rate_bonus(&catalog, &cfg);
        assert!((rates.factor_for(BonusKind::MatterRate) - (1.0 + expected)).abs() < 1e-12);
        assert!((rates.factor_for(BonusKind::ClickPower) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn hero_rank_averages_completed_achievements() {
        let catalog = catalog();
        let mut card = HeroCard::new(&catalog);
        assert_eq!(card.hero_rank(), 0);
        for (key, badge) in [(keys::CLICK_MASTER, 3), (keys::SURVIVOR, 2)] {
            let progress = card.achievements.get_mut(key).unwrap();
            progress.badge = badge;
            progress.total_completions = 1;
        }
        assert_eq!(card.hero_rank(), 2);
    }

    #[test]
    fn missing_fields_load_with_defaults() {
        let catalog = catalog();
        let mut card: HeroCard =
            serde_json::from_str(r#"{"achievements": {"survivor": {"level": 4}}}"#).unwrap();
        card.reconcile(&catalog);
        assert_eq!(card.name, DEFAULT_HERO_NAME);
        assert_eq!(card.progress(keys::SURVIVOR).unwrap().level, 4);
        assert_eq!(card.achievements.len(), catalog.achievements.len());
    }
}
