//! Resource pools and prestige currencies.
use serde::{Deserialize, Serialize};

use crate::bonus::BonusKind;

/// Spendable resource kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Energy,
    Matter,
    Info,
}

impl Resource {
    pub const ALL: [Self; 3] = [Self::Energy, Self::Matter, Self::Info];

    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Energy => "energy",
            Self::Matter => "matter",
            Self::Info => "info",
        }
    }

    /// Bonus kind that scales this resource's rate.
    #[must_use]
    pub const fn rate_kind(self) -> BonusKind {
        match self {
            Self::Energy => BonusKind::EnergyRate,
            Self::Matter => BonusKind::MatterRate,
            Self::Info => BonusKind::InfoRate,
        }
    }
}

/// Quantities of each resource. Also used for multi-resource costs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    #[serde(default)]
    pub energy: f64,
    #[serde(default)]
    pub matter: f64,
    #[serde(default)]
    pub info: f64,
}

impl Wallet {
    #[must_use]
    pub const fn new(energy: f64, matter: f64, info: f64) -> Self {
        Self {
            energy,
            matter,
            info,
        }
    }

    #[must_use]
    pub const fn get(&self, resource: Resource) -> f64 {
        match resource {
            Resource::Energy => self.energy,
            Resource::Matter => self.matter,
            Resource::Info => self.info,
        }
    }

    pub const fn get_mut(&mut self, resource: Resource) -> &mut f64 {
        match resource {
            Resource::Energy => &mut self.energy,
            Resource::Matter => &mut self.matter,
            Resource::Info => &mut self.info,
        }
    }

    /// Add `amount` to a pool. Negative and non-finite amounts are ignored.
    pub fn credit(&mut self, resource: Resource, amount: f64) {
        if amount.is_finite() && amount > 0.0 {
            *self.get_mut(resource) += amount;
        }
    }

    #[must_use]
    pub fn can_afford(&self, cost: &Self) -> bool {
        Resource::ALL
            .into_iter()
            .all(|resource| self.get(resource) >= cost.get(resource))
    }

    /// Deduct `amount` from one pool; refuses (returns `false`) rather than going negative.
    pub fn spend(&mut self, resource: Resource, amount: f64) -> bool {
        let pool = self.get_mut(resource);
        if *pool < amount {
            return false;
        }
        *pool = (*pool - amount).max(0.0);
        true
    }

    /// Deduct a multi-resource cost atomically.
    pub fn spend_all(&mut self, cost: &Self) -> bool {
        if !self.can_afford(cost) {
            return false;
        }
        for resource in Resource::ALL {
            let pool = self.get_mut(resource);
            *pool = (*pool - cost.get(resource)).max(0.0);
        }
        true
    }

    /// First resource that falls short of `cost`.
    #[must_use]
    pub fn shortfall(&self, cost: &Self) -> Option<Resource> {
        Resource::ALL
            .into_iter()
            .find(|resource| self.get(*resource) < cost.get(*resource))
    }
}

/// Permanent currencies earned by evacuating a cataclysm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrestigeCurrency {
    ArchivedData,
    HardenedBlueprints,
    GeneticArchives,
}

/// Balances of every prestige currency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrestigeWallet {
    #[serde(default)]
    pub archived_data: u64,
    #[serde(default)]
    pub hardened_blueprints: u64,
    #[serde(default)]
    pub genetic_archives: u64,
}

impl PrestigeWallet {
    #[must_use]
    pub const fn get(&self, currency: PrestigeCurrency) -> u64 {
        match currency {
            PrestigeCurrency::ArchivedData => self.archived_data,
            PrestigeCurrency::HardenedBlueprints => self.hardened_blueprints,
            PrestigeCurrency::GeneticArchives => self.genetic_archives,
        }
    }

    pub const fn credit(&mut self, currency: PrestigeCurrency, amount: u64) {
        let slot = match currency {
            PrestigeCurrency::ArchivedData => &mut self.archived_data,
            PrestigeCurrency::HardenedBlueprints => &mut self.hardened_blueprints,
            PrestigeCurrency::GeneticArchives => &mut self.genetic_archives,
        };
        *slot = slot.saturating_add(amount);
    }

    /// True when no prestige currency has ever been earned this run.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.archived_data == 0 && self.hardened_blueprints == 0 && self.genetic_archives == 0
    }
}
