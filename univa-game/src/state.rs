//! The run aggregate: everything a cataclysm or challenge can reset.
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::bonus::{BonusMap, Unlock};
use crate::cataclysm::CataclysmState;
use crate::catalog::Catalog;
use crate::nodes::{ComboState, NodeRuntime};
use crate::rates::Rates;
use crate::resources::{PrestigeWallet, Wallet};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpgradeState {
    #[serde(default)]
    pub level: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechState {
    #[serde(default)]
    pub researched: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub progress: f64,
    /// Run-clock second construction began.
    #[serde(default)]
    pub start_time: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChallengeState {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub click_count: u32,
}

/// Per-run milestones that unlock buy modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunAchievement {
    BulkBuyer,
    MaxBuyer,
    NodeHarvester,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunAchievements {
    #[serde(default)]
    pub bulk_buyer: bool,
    #[serde(default)]
    pub max_buyer: bool,
    #[serde(default)]
    pub node_harvester: bool,
}

impl RunAchievements {
    #[must_use]
    pub const fn has(&self, achievement: RunAchievement) -> bool {
        match achievement {
            RunAchievement::BulkBuyer => self.bulk_buyer,
            RunAchievement::MaxBuyer => self.max_buyer,
            RunAchievement::NodeHarvester => self.node_harvester,
        }
    }

    /// Set the flag, returning `true` when it was not already set.
    pub const fn grant(&mut self, achievement: RunAchievement) -> bool {
        let slot = match achievement {
            RunAchievement::BulkBuyer => &mut self.bulk_buyer,
            RunAchievement::MaxBuyer => &mut self.max_buyer,
            RunAchievement::NodeHarvester => &mut self.node_harvester,
        };
        let newly = !*slot;
        *slot = true;
        newly
    }
}

/// Mutable state of a single run.
///
/// Every field is defaultable so older saves load; [`RunState::reconcile`]
/// then fills in catalog entries the save did not know about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunState {
    pub resources: Wallet,
    /// Energy generated by passive production this run.
    pub reach: f64,
    /// Seconds of simulated play. Drives every timer; never reset.
    pub clock: f64,
    pub kardashev_tier: u8,
    pub kardashev_progress: f64,
    pub prestige: PrestigeWallet,
    pub achievements: RunAchievements,
    pub total_upgrades_purchased: u64,
    pub upgrades: BTreeMap<String, UpgradeState>,
    pub techs: BTreeMap<String, TechState>,
    pub unlocks: BTreeSet<Unlock>,
    pub projects: BTreeMap<String, ProjectState>,
    pub active_projects: Vec<String>,
    /// Reward bundles of completed projects, keyed by project.
    pub project_bonuses: BTreeMap<String, BonusMap>,
    pub challenges: BTreeMap<String, ChallengeState>,
    /// Survives hard resets.
    pub challenge_completions: BTreeMap<String, u32>,
    pub cataclysm: CataclysmState,
    pub nodes: Vec<NodeRuntime>,
    #[serde(skip)]
    pub rates: Rates,
    #[serde(skip)]
    pub combo: ComboState,
}

impl RunState {
    /// Fresh run with an entry for every catalog item.
    #[must_use]
    pub fn new(catalog: &Catalog) -> Self {
        let mut run = Self::default();
        run.reconcile(catalog);
        run
    }

    /// Align keyed entries with the catalog: add missing ids with initial
    /// values and drop ids the catalog no longer defines.
    pub fn reconcile(&mut self, catalog: &Catalog) {
        self.upgrades.retain(|id, _| catalog.upgrade(id).is_some());
        for def in &catalog.upgrades {
            self.upgrades.entry(def.id.clone()).or_default();
        }

        self.techs.retain(|id, _| catalog.tech(id).is_some());
        for def in &catalog.techs {
            self.techs.entry(def.id.clone()).or_default();
        }

        self.projects.retain(|id, _| catalog.project(id).is_some());
        for def in &catalog.projects {
            self.projects.entry(def.id.clone()).or_default();
        }
        let projects = &self.projects;
        self.active_projects
            .retain(|id| projects.get(id).is_some_and(|state| !state.completed));
        self.active_projects.dedup();
        self.project_bonuses
            .retain(|id, _| catalog.project(id).is_some());

        self.challenges.retain(|id, _| catalog.challenge(id).is_some());
        for def in &catalog.challenges {
            self.challenges.entry(def.id.clone()).or_default();
            let completions = self.challenge_completions.entry(def.id.clone()).or_default();
            *completions = (*completions).min(def.max_completions);
        }
        self.challenge_completions
            .retain(|id, _| catalog.challenge(id).is_some());

        let mut saved = std::mem::take(&mut self.nodes);
        self.nodes = catalog
            .nodes
            .iter()
            .map(|def| {
                saved
                    .iter()
                    .position(|node| node.id == def.id)
                    .map_or_else(|| NodeRuntime::from_def(def), |idx| saved.swap_remove(idx))
            })
            .collect();
    }

    /// Wipe all run progress, keeping challenge completions and the run clock.
    pub fn hard_reset(&mut self, catalog: &Catalog) {
        let completions = std::mem::take(&mut self.challenge_completions);
        let clock = self.clock;
        *self = Self::new(catalog);
        for (id, count) in completions {
            self.challenge_completions.insert(id, count);
        }
        self.clock = clock;
    }

    #[must_use]
    pub fn upgrade_level(&self, id: &str) -> u32 {
        self.upgrades.get(id).map_or(0, |state| state.level)
    }

    /// Sum of levels across every upgrade.
    #[must_use]
    pub fn total_upgrade_levels(&self) -> u64 {
        self.upgrades
            .values()
            .map(|state| u64::from(state.level))
            .sum()
    }

    #[must_use]
    pub fn is_researched(&self, id: &str) -> bool {
        self.techs.get(id).is_some_and(|state| state.researched)
    }

    #[must_use]
    pub fn is_project_completed(&self, id: &str) -> bool {
        self.projects.get(id).is_some_and(|state| state.completed)
    }

    #[must_use]
    pub fn is_project_active(&self, id: &str) -> bool {
        self.active_projects.iter().any(|active| active == id)
    }

    #[must_use]
    pub fn challenge_completions(&self, id: &str) -> u32 {
        self.challenge_completions.get(id).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn is_challenge_active(&self, id: &str) -> bool {
        self.challenges.get(id).is_some_and(|state| state.active)
    }

    /// Ids of challenges currently in progress.
    pub fn active_challenges(&self) -> impl Iterator<Item = &str> {
        self.challenges
            .iter()
            .filter(|(_, state)| state.active)
            .map(|(id, _)| id.as_str())
    }

    #[must_use]
    pub fn node(&self, id: &str) -> Option<&NodeRuntime> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut NodeRuntime> {
        self.nodes.iter_mut().find(|node| node.id == id)
    }

    /// Record unlock flags; returns the new Kardashev tier when it advanced.
    pub fn apply_unlocks(&mut self, unlocks: &[Unlock]) -> Option<u8> {
        let before = self.kardashev_tier;
        for unlock in unlocks {
            self.unlocks.insert(*unlock);
            if let Some(tier) = unlock.kardashev_tier() {
                self.kardashev_tier = self.kardashev_tier.max(tier);
            }
        }
        (self.kardashev_tier > before).then_some(self.kardashev_tier)
    }

    /// Refresh progress toward the next Kardashev tier.
    pub fn refresh_kardashev(&mut self, catalog: &Catalog) {
        self.kardashev_progress = catalog
            .kardashev_tier(self.kardashev_tier)
            .and_then(|def| def.next)
            .map_or(1.0, |next| (self.reach / next).min(1.0));
    }
}
