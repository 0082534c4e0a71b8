//! Static definitions for upgrades, tech, projects, challenges, hero achievements and the cosmos.
//!
//! The tables ship as JSON under `data/` and are embedded at compile time.
//! [`catalog`] parses them once per process and hands out a shared handle.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hasher;
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use twox_hash::XxHash64;

use crate::bonus::{BonusKind, BonusMap, Unlock};
use crate::cataclysm::CataclysmKind;
use crate::nodes::{NodeKind, NodeState};
use crate::numbers::exponent_from_u32;
use crate::resources::{PrestigeCurrency, Resource, Wallet};

/// What an upgrade does once purchased.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpgradeRole {
    /// Adds `base_production` per level to its category's rate.
    Producer,
    /// Harvests nearby resource nodes automatically.
    AutoHarvester,
    /// Raises click power.
    ClickBoost,
    /// One-time structure that survives cataclysms.
    Survival,
}

/// Survival-structure parameters, per level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SurvivalSpec {
    pub prestige_bonus: f64,
    #[serde(default)]
    pub matter_preserved: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpgradeDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    pub role: UpgradeRole,
    /// Resource this upgrade produces or is listed under.
    pub category: Resource,
    /// Pool the purchase is paid from.
    pub cost_resource: Resource,
    pub base_cost: f64,
    pub cost_mult: f64,
    #[serde(default)]
    pub base_production: f64,
    #[serde(default)]
    pub unlock_at: Option<f64>,
    #[serde(default)]
    pub max_level: Option<u32>,
    #[serde(default)]
    pub survival: Option<SurvivalSpec>,
    /// Researched bonus that scales this upgrade's production.
    #[serde(default)]
    pub boosted_by: Option<BonusKind>,
}

impl UpgradeDef {
    /// Cost of buying level `level + 1`, before global multipliers.
    #[must_use]
    pub fn cost_at(&self, level: u32) -> f64 {
        (self.base_cost * self.cost_mult.powi(exponent_from_u32(level))).floor()
    }

    #[must_use]
    pub const fn is_survival(&self) -> bool {
        self.survival.is_some()
    }

    #[must_use]
    pub fn is_unlocked(&self, reach: f64) -> bool {
        self.unlock_at.is_none_or(|threshold| reach >= threshold)
    }

    #[must_use]
    pub fn is_maxed(&self, level: u32) -> bool {
        self.max_level.is_some_and(|max| level >= max)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TechPosition {
    pub angle: f64,
    pub ring: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TechRequirements {
    #[serde(default)]
    pub reach: f64,
    #[serde(default)]
    pub techs: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TechCost {
    #[serde(default)]
    pub info: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    pub branch: String,
    pub tier: u8,
    /// Layout only.
    #[serde(default)]
    pub position: TechPosition,
    #[serde(default)]
    pub requirements: TechRequirements,
    #[serde(default)]
    pub cost: TechCost,
    #[serde(default)]
    pub bonus: BonusMap,
    #[serde(default)]
    pub unlocks: Vec<Unlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectRewards {
    #[serde(default)]
    pub bonus: BonusMap,
    #[serde(default)]
    pub unlocks: Vec<Unlock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    pub tier: u8,
    #[serde(default)]
    pub unlock_at: f64,
    pub requirements: Wallet,
    /// Seconds of run clock needed to finish construction.
    pub build_time: f64,
    #[serde(default)]
    pub rewards: ProjectRewards,
    #[serde(default)]
    pub reward_desc: String,
}

/// `base * growth^completions`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GrowthCurve {
    pub base: f64,
    pub growth: f64,
}

impl GrowthCurve {
    #[must_use]
    pub fn at(&self, completions: u32) -> f64 {
        self.base * self.growth.powi(exponent_from_u32(completions))
    }
}

/// `max(floor, start - step * completions)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecayCurve {
    pub start: f64,
    pub step: f64,
    pub floor: f64,
}

impl DecayCurve {
    #[must_use]
    pub fn at(&self, completions: u32) -> f64 {
        self.step
            .mul_add(-f64::from(completions), self.start)
            .max(self.floor)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeGoal {
    pub reach: GrowthCurve,
    /// Seconds allowed, as a function of completions.
    #[serde(default)]
    pub time_limit: Option<DecayCurve>,
    /// Total upgrade levels allowed, as a function of completions.
    #[serde(default)]
    pub max_upgrades: Option<DecayCurve>,
    #[serde(default)]
    pub no_clicks: bool,
    #[serde(default)]
    pub no_prestige: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub unlock_at: f64,
    pub max_completions: u32,
    pub goal: ChallengeGoal,
    /// Per-completion reward, applied as `reward^completions`.
    pub reward: BonusMap,
    #[serde(default)]
    pub reward_desc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    pub base_bonus: f64,
    pub bonus_type: BonusKind,
    #[serde(default)]
    pub bonus_desc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CataclysmDef {
    pub kind: CataclysmKind,
    pub name: String,
    pub threshold: f64,
    #[serde(default)]
    pub warning: String,
    pub currency: PrestigeCurrency,
    /// Rate multiplier contributed per unit of `currency`.
    pub currency_weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KardashevDef {
    pub tier: u8,
    pub threshold: f64,
    #[serde(default)]
    pub goal: String,
    #[serde(default)]
    pub next: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    /// Energy per second while absorbed.
    #[serde(default)]
    pub passive_energy: f64,
    pub initial_state: NodeState,
    #[serde(default)]
    pub orbit_distance: f64,
    #[serde(default)]
    pub orbit_angle: f64,
    /// Seconds an absorbed node takes to become harvestable again.
    #[serde(default)]
    pub max_regen_time: f64,
}

#[derive(Debug, Deserialize)]
struct UpgradeFile {
    upgrades: Vec<UpgradeDef>,
}

#[derive(Debug, Deserialize)]
struct TechFile {
    techs: Vec<TechDef>,
}

#[derive(Debug, Deserialize)]
struct ProjectFile {
    projects: Vec<ProjectDef>,
}

#[derive(Debug, Deserialize)]
struct ChallengeFile {
    challenges: Vec<ChallengeDef>,
}

#[derive(Debug, Deserialize)]
struct HeroFile {
    achievements: Vec<AchievementDef>,
    #[serde(default)]
    badge_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CosmosFile {
    cataclysms: Vec<CataclysmDef>,
    kardashev: Vec<KardashevDef>,
    nodes: Vec<NodeDef>,
}

/// Raw JSON text for each catalog table.
#[derive(Debug, Clone, Copy)]
pub struct CatalogSources<'a> {
    pub upgrades: &'a str,
    pub techs: &'a str,
    pub projects: &'a str,
    pub challenges: &'a str,
    pub hero: &'a str,
    pub cosmos: &'a str,
}

impl CatalogSources<'static> {
    /// Tables compiled into the crate.
    #[must_use]
    pub const fn embedded() -> Self {
        Self {
            upgrades: include_str!("../data/upgrades.json"),
            techs: include_str!("../data/techs.json"),
            projects: include_str!("../data/projects.json"),
            challenges: include_str!("../data/challenges.json"),
            hero: include_str!("../data/hero.json"),
            cosmos: include_str!("../data/cosmos.json"),
        }
    }
}

impl CatalogSources<'_> {
    fn fingerprint(&self) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        for table in [
            self.upgrades,
            self.techs,
            self.projects,
            self.challenges,
            self.hero,
            self.cosmos,
        ] {
            hasher.write(table.as_bytes());
        }
        hasher.finish()
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to parse {table} table: {source}")]
    Parse {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("duplicate {table} id `{id}`")]
    Duplicate { table: &'static str, id: String },
    #[error("tech `{tech}` requires unknown tech `{prerequisite}`")]
    MissingPrerequisite { tech: String, prerequisite: String },
    #[error("upgrade `{upgrade}` has an invalid cost curve")]
    InvalidCostCurve { upgrade: String },
    #[error("survival structure `{upgrade}` must declare a max level")]
    UncappedSurvival { upgrade: String },
    #[error("{table} thresholds must be strictly ascending")]
    UnorderedThresholds { table: &'static str },
}

fn parse_table<T: DeserializeOwned>(table: &'static str, json: &str) -> Result<T, CatalogError> {
    serde_json::from_str(json).map_err(|source| CatalogError::Parse { table, source })
}

/// Complete set of static definitions.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub upgrades: Vec<UpgradeDef>,
    pub techs: Vec<TechDef>,
    pub projects: Vec<ProjectDef>,
    pub challenges: Vec<ChallengeDef>,
    pub achievements: Vec<AchievementDef>,
    pub badge_names: Vec<String>,
    pub cataclysms: Vec<CataclysmDef>,
    pub kardashev: Vec<KardashevDef>,
    pub nodes: Vec<NodeDef>,
    fingerprint: u64,
}

impl Catalog {
    /// Parse every table.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Parse` naming the first table that fails to deserialize.
    pub fn from_sources(sources: &CatalogSources<'_>) -> Result<Self, CatalogError> {
        let upgrades: UpgradeFile = parse_table("upgrades", sources.upgrades)?;
        let techs: TechFile = parse_table("techs", sources.techs)?;
        let projects: ProjectFile = parse_table("projects", sources.projects)?;
        let challenges: ChallengeFile = parse_table("challenges", sources.challenges)?;
        let hero: HeroFile = parse_table("hero", sources.hero)?;
        let cosmos: CosmosFile = parse_table("cosmos", sources.cosmos)?;
        Ok(Self {
            upgrades: upgrades.upgrades,
            techs: techs.techs,
            projects: projects.projects,
            challenges: challenges.challenges,
            achievements: hero.achievements,
            badge_names: hero.badge_names,
            cataclysms: cosmos.cataclysms,
            kardashev: cosmos.kardashev,
            nodes: cosmos.nodes,
            fingerprint: sources.fingerprint(),
        })
    }

    /// Parse and validate the embedded tables, falling back to an empty catalog.
    #[must_use]
    pub fn load_from_static() -> Self {
        match Self::from_sources(&CatalogSources::embedded()).and_then(|catalog| {
            catalog.validate()?;
            Ok(catalog)
        }) {
            Ok(catalog) => catalog,
            Err(err) => {
                log::error!("embedded catalog rejected: {err}");
                Self::default()
            }
        }
    }

    /// Check cross-table invariants.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant: duplicate ids, dangling tech
    /// prerequisites, cost curves below 1, uncapped survival structures or
    /// unordered thresholds.
    pub fn validate(&self) -> Result<(), CatalogError> {
        ensure_unique("upgrade", self.upgrades.iter().map(|u| u.id.as_str()))?;
        ensure_unique("tech", self.techs.iter().map(|t| t.id.as_str()))?;
        ensure_unique("project", self.projects.iter().map(|p| p.id.as_str()))?;
        ensure_unique("challenge", self.challenges.iter().map(|c| c.id.as_str()))?;
        ensure_unique("achievement", self.achievements.iter().map(|a| a.id.as_str()))?;
        ensure_unique("node", self.nodes.iter().map(|n| n.id.as_str()))?;

        for upgrade in &self.upgrades {
            if upgrade.base_cost <= 0.0 || upgrade.cost_mult < 1.0 {
                return Err(CatalogError::InvalidCostCurve {
                    upgrade: upgrade.id.clone(),
                });
            }
            if upgrade.is_survival() && upgrade.max_level.is_none() {
                return Err(CatalogError::UncappedSurvival {
                    upgrade: upgrade.id.clone(),
                });
            }
        }

        for tech in &self.techs {
            if let Some(missing) = tech
                .requirements
                .techs
                .iter()
                .find(|prerequisite| self.tech(prerequisite).is_none())
            {
                return Err(CatalogError::MissingPrerequisite {
                    tech: tech.id.clone(),
                    prerequisite: missing.clone(),
                });
            }
        }

        if self
            .cataclysms
            .windows(2)
            .any(|pair| pair[0].threshold >= pair[1].threshold)
        {
            return Err(CatalogError::UnorderedThresholds { table: "cataclysm" });
        }
        if self
            .kardashev
            .windows(2)
            .any(|pair| pair[0].threshold >= pair[1].threshold)
        {
            return Err(CatalogError::UnorderedThresholds { table: "kardashev" });
        }
        Ok(())
    }

    /// Hash of the raw tables this catalog was parsed from.
    #[must_use]
    pub const fn fingerprint(&self) -> u64 {
        self.fingerprint
    }

    #[must_use]
    pub fn upgrade(&self, id: &str) -> Option<&UpgradeDef> {
        self.upgrades.iter().find(|upgrade| upgrade.id == id)
    }

    #[must_use]
    pub fn tech(&self, id: &str) -> Option<&TechDef> {
        self.techs.iter().find(|tech| tech.id == id)
    }

    #[must_use]
    pub fn project(&self, id: &str) -> Option<&ProjectDef> {
        self.projects.iter().find(|project| project.id == id)
    }

    #[must_use]
    pub fn challenge(&self, id: &str) -> Option<&ChallengeDef> {
        self.challenges.iter().find(|challenge| challenge.id == id)
    }

    #[must_use]
    pub fn achievement(&self, id: &str) -> Option<&AchievementDef> {
        self.achievements.iter().find(|achievement| achievement.id == id)
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&NodeDef> {
        self.nodes.iter().find(|node| node.id == id)
    }

    #[must_use]
    pub fn cataclysm(&self, kind: CataclysmKind) -> Option<&CataclysmDef> {
        self.cataclysms.iter().find(|cataclysm| cataclysm.kind == kind)
    }

    /// Upgrades with the given role.
    pub fn upgrades_with_role(&self, role: UpgradeRole) -> impl Iterator<Item = &UpgradeDef> {
        self.upgrades.iter().filter(move |upgrade| upgrade.role == role)
    }

    /// Kardashev definition for `tier`, if the ladder has one.
    #[must_use]
    pub fn kardashev_tier(&self, tier: u8) -> Option<&KardashevDef> {
        self.kardashev.iter().find(|def| def.tier == tier)
    }

    /// Display name for a hero badge index.
    #[must_use]
    pub fn badge_name(&self, badge: u32) -> String {
        usize::try_from(badge)
            .ok()
            .and_then(|idx| self.badge_names.get(idx))
            .cloned()
            .unwrap_or_else(|| format!("Badge {badge}"))
    }
}

fn ensure_unique<'a>(
    table: &'static str,
    ids: impl Iterator<Item = &'a str>,
) -> Result<(), CatalogError> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(CatalogError::Duplicate {
                table,
                id: id.to_string(),
            });
        }
    }
    Ok(())
}

/// Shared handle to the embedded catalog.
#[must_use]
pub fn catalog() -> Arc<Catalog> {
    static CATALOG: OnceLock<Arc<Catalog>> = OnceLock::new();
    Arc::clone(CATALOG.get_or_init(|| Arc::new(Catalog::load_from_static())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_catalog_parses_and_validates() {
        let catalog = Catalog::from_sources(&CatalogSources::embedded()).unwrap();
        catalog.validate().unwrap();
        assert_eq!(catalog.upgrades.len(), 11);
        assert_eq!(catalog.cataclysms.len(), 3);
        assert_ne!(catalog.fingerprint(), 0);
    }

    #[test]
    fn cost_curve_floors_each_level() {
        let catalog = catalog();
        let collector = catalog.upgrade("energy_collector").unwrap();
        assert!((collector.cost_at(0) - 10.0).abs() < f64::EPSILON);
        assert!((collector.cost_at(5) - 17.0).abs() < f64::EPSILON);
    }

    #[test]
    fn growth_and_decay_curves() {
        let growth = GrowthCurve {
            base: 1e9,
            growth: 2.0,
        };
        assert!((growth.at(3) - 8e9).abs() < 1.0);
        let decay = DecayCurve {
            start: 1800.0,
            step: 150.0,
            floor: 300.0,
        };
        assert!((decay.at(2) - 1500.0).abs() < f64::EPSILON);
        assert!((decay.at(10) - 300.0).abs() < f64::EPSILON);
    }

    #[test]
    fn validate_catches_dangling_prerequisite() {
        let mut catalog = Catalog::load_from_static();
        catalog.techs[0].requirements.techs.push("warp_theory".into());
        assert!(matches!(
            catalog.validate(),
            Err(CatalogError::MissingPrerequisite { prerequisite, .. })
                if prerequisite == "warp_theory"
        ));
    }

    #[test]
    fn parse_errors_name_the_table() {
        let mut sources = CatalogSources::embedded();
        sources.projects = "{\"projects\": 4}";
        let err = Catalog::from_sources(&sources).unwrap_err();
        assert!(matches!(err, CatalogError::Parse { table: "projects", .. }));
    }

    #[test]
    fn badge_names_fall_back_to_numbers() {
        let catalog = catalog();
        assert_eq!(catalog.badge_name(0), "Bronze");
        assert_eq!(catalog.badge_name(8), "Adamantite");
        assert_eq!(catalog.badge_name(9), "Badge 9");
    }
}
