//! Balance tunables for the economy.
//!
//! Every field carries a serde default so partial JSON overlays stay valid,
//! and [`EconomyConfig::validate`] rejects values that would break the
//! engine's invariants (negative rates, unordered thresholds, zero caps).
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level economy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomyConfig {
    /// Energy per second produced before any upgrade.
    #[serde(default = "EconomyConfig::default_base_energy_rate")]
    pub base_energy_rate: f64,
    /// Seconds of run clock between automatic saves.
    #[serde(default = "EconomyConfig::default_autosave_interval")]
    pub autosave_interval: f64,
    #[serde(default)]
    pub click: ClickConfig,
    #[serde(default)]
    pub milestones: MilestoneConfig,
    #[serde(default)]
    pub hero: HeroConfig,
    #[serde(default)]
    pub cataclysm: CataclysmConfig,
    #[serde(default)]
    pub purchase: PurchaseConfig,
    #[serde(default)]
    pub nodes: NodeConfig,
}

impl EconomyConfig {
    const fn default_base_energy_rate() -> f64 {
        10.0
    }

    const fn default_autosave_interval() -> f64 {
        10.0
    }

    /// Validate configuration invariants.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when any field violates the documented bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_min("base_energy_rate", 0.0, self.base_energy_rate)?;
        require_positive("autosave_interval", self.autosave_interval)?;
        self.click.validate()?;
        self.milestones.validate()?;
        self.hero.validate()?;
        self.cataclysm.validate()?;
        self.purchase.validate()?;
        self.nodes.validate()?;
        Ok(())
    }
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            base_energy_rate: Self::default_base_energy_rate(),
            autosave_interval: Self::default_autosave_interval(),
            click: ClickConfig::default(),
            milestones: MilestoneConfig::default(),
            hero: HeroConfig::default(),
            cataclysm: CataclysmConfig::default(),
            purchase: PurchaseConfig::default(),
            nodes: NodeConfig::default(),
        }
    }
}

/// Manual click tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClickConfig {
    /// Unboosted click power equals this many seconds of energy production.
    #[serde(default = "ClickConfig::default_rate_seconds")]
    pub rate_seconds: f64,
    /// Lower bound on unboosted click power.
    #[serde(default = "ClickConfig::default_floor")]
    pub floor: f64,
    /// Fraction of the unboosted base added per click-boost level.
    #[serde(default = "ClickConfig::default_boost_per_level")]
    pub boost_per_level: f64,
    /// Seconds within which consecutive clicks extend the combo.
    #[serde(default = "ClickConfig::default_combo_window")]
    pub combo_window: f64,
    /// Extra click gain per combo step.
    #[serde(default = "ClickConfig::default_combo_step")]
    pub combo_step: f64,
}

impl ClickConfig {
    const fn default_rate_seconds() -> f64 {
        5.0
    }

    const fn default_floor() -> f64 {
        100.0
    }

    const fn default_boost_per_level() -> f64 {
        0.5
    }

    const fn default_combo_window() -> f64 {
        2.0
    }

    const fn default_combo_step() -> f64 {
        0.1
    }

    fn validate(&self) -> Result<(), ConfigError> {
        require_min("click.rate_seconds", 0.0, self.rate_seconds)?;
        require_min("click.floor", 0.0, self.floor)?;
        require_min("click.boost_per_level", 0.0, self.boost_per_level)?;
        require_positive("click.combo_window", self.combo_window)?;
        require_min("click.combo_step", 0.0, self.combo_step)
    }
}

impl Default for ClickConfig {
    fn default() -> Self {
        Self {
            rate_seconds: Self::default_rate_seconds(),
            floor: Self::default_floor(),
            boost_per_level: Self::default_boost_per_level(),
            combo_window: Self::default_combo_window(),
            combo_step: Self::default_combo_step(),
        }
    }
}

/// Step-function multiplier on energy driven by one upgrade's level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneConfig {
    #[serde(default = "MilestoneConfig::default_upgrade")]
    pub upgrade: String,
    #[serde(default = "MilestoneConfig::default_levels")]
    pub levels: Vec<u32>,
    #[serde(default = "MilestoneConfig::default_factor")]
    pub factor: f64,
}

impl MilestoneConfig {
    fn default_upgrade() -> String {
        "energy_collector".to_string()
    }

    fn default_levels() -> Vec<u32> {
        vec![10, 25, 50, 100]
    }

    const fn default_factor() -> f64 {
        2.0
    }

    /// Multiplier earned at `level`: `factor` for every milestone reached.
    #[must_use]
    pub fn multiplier(&self, level: u32) -> f64 {
        self.levels
            .iter()
            .filter(|milestone| level >= **milestone)
            .fold(1.0, |acc, _| acc * self.factor)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        require_min("milestones.factor", 1.0, self.factor)?;
        if self.levels.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(ConfigError::Unordered {
                field: "milestones.levels",
            });
        }
        Ok(())
    }
}

impl Default for MilestoneConfig {
    fn default() -> Self {
        Self {
            upgrade: Self::default_upgrade(),
            levels: Self::default_levels(),
            factor: Self::default_factor(),
        }
    }
}

/// Hero card ladder tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroConfig {
    #[serde(default = "HeroConfig::default_level_cap")]
    pub level_cap: u32,
    #[serde(default = "HeroConfig::default_rank_cap")]
    pub rank_cap: u32,
    #[serde(default = "HeroConfig::default_rank_multiplier")]
    pub rank_multiplier: f64,
    #[serde(default = "HeroConfig::default_badge_multiplier")]
    pub badge_multiplier: f64,
}

impl HeroConfig {
    const fn default_level_cap() -> u32 {
        100
    }

    const fn default_rank_cap() -> u32 {
        100
    }

    const fn default_rank_multiplier() -> f64 {
        1.5
    }

    const fn default_badge_multiplier() -> f64 {
        2.0
    }

    fn validate(&self) -> Result<(), ConfigError> {
        require_nonzero("hero.level_cap", self.level_cap)?;
        require_nonzero("hero.rank_cap", self.rank_cap)?;
        require_min("hero.rank_multiplier", 1.0, self.rank_multiplier)?;
        require_min("hero.badge_multiplier", 1.0, self.badge_multiplier)
    }
}

impl Default for HeroConfig {
    fn default() -> Self {
        Self {
            level_cap: Self::default_level_cap(),
            rank_cap: Self::default_rank_cap(),
            rank_multiplier: Self::default_rank_multiplier(),
            badge_multiplier: Self::default_badge_multiplier(),
        }
    }
}

/// One band of a [`StepTable`]: applies while progress is below `below`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepTier {
    pub below: f64,
    pub value: f64,
}

/// Ascending step function over cataclysm progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepTable {
    pub tiers: Vec<StepTier>,
    pub otherwise: f64,
}

impl StepTable {
    /// Value of the first band containing `progress`, or `otherwise` past the last band.
    #[must_use]
    pub fn value_at(&self, progress: f64) -> f64 {
        self.tiers
            .iter()
            .find(|tier| progress < tier.below)
            .map_or(self.otherwise, |tier| tier.value)
    }

    fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        if self.tiers.windows(2).any(|pair| pair[0].below >= pair[1].below) {
            return Err(ConfigError::Unordered { field });
        }
        Ok(())
    }
}

/// Cataclysm approach, crisis and evacuation tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CataclysmConfig {
    /// Fraction of a threshold at which its band begins.
    #[serde(default = "CataclysmConfig::default_approach_ratio")]
    pub approach_ratio: f64,
    #[serde(default = "CataclysmConfig::default_warning_ratio")]
    pub warning_ratio: f64,
    #[serde(default = "CataclysmConfig::default_crisis_ratio")]
    pub crisis_ratio: f64,
    /// Exponent applied to `reach / threshold` when computing evacuation gain.
    #[serde(default = "CataclysmConfig::default_gain_exponent")]
    pub gain_exponent: f64,
    #[serde(default = "CataclysmConfig::default_crisis_costs")]
    pub crisis_costs: StepTable,
    #[serde(default = "CataclysmConfig::default_early_bonus")]
    pub early_bonus: StepTable,
}

impl CataclysmConfig {
    const fn default_approach_ratio() -> f64 {
        0.7
    }

    const fn default_warning_ratio() -> f64 {
        0.7
    }

    const fn default_crisis_ratio() -> f64 {
        0.9
    }

    const fn default_gain_exponent() -> f64 {
        1.0 / 3.0
    }

    fn default_crisis_costs() -> StepTable {
        StepTable {
            tiers: vec![
                StepTier {
                    below: 0.95,
                    value: 1.5,
                },
                StepTier {
                    below: 0.99,
                    value: 3.0,
                },
            ],
            otherwise: 10.0,
        }
    }

    fn default_early_bonus() -> StepTable {
        StepTable {
            tiers: vec![
                StepTier {
                    below: 0.90,
                    value: 0.5,
                },
                StepTier {
                    below: 0.95,
                    value: 0.25,
                },
                StepTier {
                    below: 0.99,
                    value: 0.1,
                },
            ],
            otherwise: 0.0,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        require_range("cataclysm.approach_ratio", 0.0, 1.0, self.approach_ratio)?;
        require_range("cataclysm.warning_ratio", 0.0, 1.0, self.warning_ratio)?;
        require_range("cataclysm.crisis_ratio", 0.0, 1.0, self.crisis_ratio)?;
        if self.warning_ratio > self.crisis_ratio {
            return Err(ConfigError::Unordered {
                field: "cataclysm.warning_ratio",
            });
        }
        require_range("cataclysm.gain_exponent", 0.0, 1.0, self.gain_exponent)?;
        self.crisis_costs.validate("cataclysm.crisis_costs")?;
        self.early_bonus.validate("cataclysm.early_bonus")
    }
}

impl Default for CataclysmConfig {
    fn default() -> Self {
        Self {
            approach_ratio: Self::default_approach_ratio(),
            warning_ratio: Self::default_warning_ratio(),
            crisis_ratio: Self::default_crisis_ratio(),
            gain_exponent: Self::default_gain_exponent(),
            crisis_costs: Self::default_crisis_costs(),
            early_bonus: Self::default_early_bonus(),
        }
    }
}

/// Upgrade purchase limits and buy-mode unlock goals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseConfig {
    /// Level count bought by the bulk buy mode.
    #[serde(default = "PurchaseConfig::default_bulk_amount")]
    pub bulk_amount: u32,
    /// Iteration cap for buy-max.
    #[serde(default = "PurchaseConfig::default_max_iterations")]
    pub max_iterations: u32,
    #[serde(default = "PurchaseConfig::default_bulk_unlock")]
    pub bulk_unlock: u64,
    #[serde(default = "PurchaseConfig::default_max_unlock")]
    pub max_unlock: u64,
}

impl PurchaseConfig {
    const fn default_bulk_amount() -> u32 {
        10
    }

    const fn default_max_iterations() -> u32 {
        1000
    }

    const fn default_bulk_unlock() -> u64 {
        25
    }

    const fn default_max_unlock() -> u64 {
        100
    }

    fn validate(&self) -> Result<(), ConfigError> {
        require_nonzero("purchase.bulk_amount", self.bulk_amount)?;
        require_nonzero("purchase.max_iterations", self.max_iterations)?;
        if self.bulk_unlock > self.max_unlock {
            return Err(ConfigError::Unordered {
                field: "purchase.bulk_unlock",
            });
        }
        Ok(())
    }
}

impl Default for PurchaseConfig {
    fn default() -> Self {
        Self {
            bulk_amount: Self::default_bulk_amount(),
            max_iterations: Self::default_max_iterations(),
            bulk_unlock: Self::default_bulk_unlock(),
            max_unlock: Self::default_max_unlock(),
        }
    }
}

/// Resource node harvesting tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Harvest progress gained per second.
    #[serde(default = "NodeConfig::default_harvest_rate")]
    pub harvest_rate: f64,
    /// Gain multiplier applied per prior manual harvest of the same node.
    #[serde(default = "NodeConfig::default_manual_decay")]
    pub manual_decay: f64,
    /// Auto-harvest gain equals this many seconds of energy production.
    #[serde(default = "NodeConfig::default_auto_harvest_seconds")]
    pub auto_harvest_seconds: f64,
    #[serde(default = "NodeConfig::default_auto_reach_base")]
    pub auto_reach_base: f64,
    #[serde(default = "NodeConfig::default_auto_reach_per_level")]
    pub auto_reach_per_level: f64,
    /// Manual harvests needed for the node harvester run achievement.
    #[serde(default = "NodeConfig::default_harvester_goal")]
    pub harvester_goal: u32,
}

impl NodeConfig {
    const fn default_harvest_rate() -> f64 {
        0.5
    }

    const fn default_manual_decay() -> f64 {
        0.7
    }

    const fn default_auto_harvest_seconds() -> f64 {
        5.0
    }

    const fn default_auto_reach_base() -> f64 {
        50.0
    }

    const fn default_auto_reach_per_level() -> f64 {
        20.0
    }

    const fn default_harvester_goal() -> u32 {
        10
    }

    /// Orbit distance covered by an auto-harvester at `level`.
    #[must_use]
    pub fn auto_reach(&self, level: u32) -> f64 {
        self.auto_reach_per_level
            .mul_add(f64::from(level), self.auto_reach_base)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        require_positive("nodes.harvest_rate", self.harvest_rate)?;
        require_range("nodes.manual_decay", 0.0, 1.0, self.manual_decay)?;
        require_min("nodes.auto_harvest_seconds", 0.0, self.auto_harvest_seconds)?;
        require_min("nodes.auto_reach_base", 0.0, self.auto_reach_base)?;
        require_min("nodes.auto_reach_per_level", 0.0, self.auto_reach_per_level)?;
        require_nonzero("nodes.harvester_goal", self.harvester_goal)
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            harvest_rate: Self::default_harvest_rate(),
            manual_decay: Self::default_manual_decay(),
            auto_harvest_seconds: Self::default_auto_harvest_seconds(),
            auto_reach_base: Self::default_auto_reach_base(),
            auto_reach_per_level: Self::default_auto_reach_per_level(),
            harvester_goal: Self::default_harvester_goal(),
        }
    }
}

/// Errors raised when economy configuration invariants are violated.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be between {min:.2} and {max:.2} (got {value:.2})")]
    RangeViolation {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("{field} must be at least {min:.2} (got {value:.2})")]
    MinViolation {
        field: &'static str,
        min: f64,
        value: f64,
    },
    #[error("{field} must be greater than zero")]
    ZeroLimit { field: &'static str },
    #[error("{field} must be strictly ascending")]
    Unordered { field: &'static str },
}

fn require_min(field: &'static str, min: f64, value: f64) -> Result<(), ConfigError> {
    if value.is_nan() || value < min {
        return Err(ConfigError::MinViolation { field, min, value });
    }
    Ok(())
}

fn require_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_nan() || value <= 0.0 {
        return Err(ConfigError::ZeroLimit { field });
    }
    Ok(())
}

fn require_range(field: &'static str, min: f64, max: f64, value: f64) -> Result<(), ConfigError> {
    if !(min..=max).contains(&value) {
        return Err(ConfigError::RangeViolation {
            field,
            min,
            max,
            value,
        });
    }
    Ok(())
}

const fn require_nonzero(field: &'static str, value: u32) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::ZeroLimit { field });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        EconomyConfig::default().validate().unwrap();
    }

    #[test]
    fn missing_fields_use_defaults() {
        let json = r#"{"base_energy_rate": 12.0, "click": {"floor": 50.0}}"#;
        let cfg: EconomyConfig = serde_json::from_str(json).unwrap();
        assert!((cfg.base_energy_rate - 12.0).abs() < f64::EPSILON);
        assert!((cfg.click.floor - 50.0).abs() < f64::EPSILON);
        assert!((cfg.click.rate_seconds - 5.0).abs() < f64::EPSILON);
        assert_eq!(cfg.milestones.levels, vec![10, 25, 50, 100]);
        assert_eq!(cfg.purchase.max_iterations, 1000);
        assert!((cfg.autosave_interval - 10.0).abs() < f64::EPSILON);
    }

    #[test]
    fn milestone_multiplier_is_a_step_function() {
        let milestones = MilestoneConfig::default();
        let expected = [(0, 1.0), (9, 1.0), (10, 2.0), (24, 2.0), (25, 4.0), (50, 8.0)];
        for (level, multiplier) in expected {
            assert!(
                (milestones.multiplier(level) - multiplier).abs() < f64::EPSILON,
                "level {level}"
            );
        }
        assert!((milestones.multiplier(100) - 16.0).abs() < f64::EPSILON);
        assert!((milestones.multiplier(500) - 16.0).abs() < f64::EPSILON);
    }

    #[test]
    fn step_tables_follow_boundaries() {
        let cfg = CataclysmConfig::default();
        assert!((cfg.crisis_costs.value_at(0.90) - 1.5).abs() < f64::EPSILON);
        assert!((cfg.crisis_costs.value_at(0.95) - 3.0).abs() < f64::EPSILON);
        assert!((cfg.crisis_costs.value_at(0.99) - 10.0).abs() < f64::EPSILON);
        assert!((cfg.early_bonus.value_at(0.85) - 0.5).abs() < f64::EPSILON);
        assert!((cfg.early_bonus.value_at(0.90) - 0.25).abs() < f64::EPSILON);
        assert!((cfg.early_bonus.value_at(0.95) - 0.1).abs() < f64::EPSILON);
        assert!(cfg.early_bonus.value_at(0.99).abs() < f64::EPSILON);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = EconomyConfig::default();
        cfg.cataclysm.crisis_ratio = 1.5;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::RangeViolation {
                field: "cataclysm.crisis_ratio",
                ..
            })
        ));

        let mut cfg = EconomyConfig::default();
        cfg.milestones.levels = vec![25, 10];
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::Unordered {
                field: "milestones.levels"
            })
        );

        let mut cfg = EconomyConfig::default();
        cfg.purchase.max_iterations = 0;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::ZeroLimit {
                field: "purchase.max_iterations"
            })
        );

        let mut cfg = EconomyConfig::default();
        cfg.base_energy_rate = -1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn auto_reach_grows_with_level() {
        let nodes = NodeConfig::default();
        assert!((nodes.auto_reach(0) - 50.0).abs() < f64::EPSILON);
        assert!((nodes.auto_reach(3) - 110.0).abs() < f64::EPSILON);
    }
}
