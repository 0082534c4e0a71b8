//! Rate composition.
//!
//! Rates are rebuilt from scratch in a fixed stage order:
//!
//! 1. base energy: constant + energy producers + absorbed node passives
//! 2. milestone multiplier (energy only)
//! 3. matter and info producers
//! 4. click power from the post-milestone energy rate
//! 5. prestige currencies
//! 6. hero card
//! 7. completed projects
//! 8. researched tech
//! 9. challenge rewards, plus the purchase cost factor
//!
//! Stages 6-9 share [`BonusStack`], so every source applies the same
//! "specific key, then `all_rates`" rule.
use serde::{Deserialize, Serialize};

use crate::bonus::{BonusKind, BonusStack};
use crate::catalog::{Catalog, UpgradeRole};
use crate::challenges::reward_stack;
use crate::config::EconomyConfig;
use crate::hero::HeroCard;
use crate::nodes::absorbed_passive_energy;
use crate::numbers::u64_to_f64;
use crate::projects::completed_stack;
use crate::resources::{Resource, Wallet};
use crate::state::RunState;
use crate::tech::researched_stack;

/// Per-second production plus derived click power and cost factor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rates {
    pub energy: f64,
    pub matter: f64,
    pub info: f64,
    pub click_power: f64,
    /// Multiplier applied to every purchase cost.
    pub cost_factor: f64,
}

impl Default for Rates {
    fn default() -> Self {
        Self {
            energy: 0.0,
            matter: 0.0,
            info: 0.0,
            click_power: 0.0,
            cost_factor: 1.0,
        }
    }
}

impl Rates {
    #[must_use]
    pub const fn get(&self, resource: Resource) -> f64 {
        match resource {
            Resource::Energy => self.energy,
            Resource::Matter => self.matter,
            Resource::Info => self.info,
        }
    }

    const fn set(&mut self, resource: Resource, value: f64) {
        match resource {
            Resource::Energy => self.energy = value,
            Resource::Matter => self.matter = value,
            Resource::Info => self.info = value,
        }
    }
}

/// Multipliers one stage applied to each resource rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageFactors {
    pub energy: f64,
    pub matter: f64,
    pub info: f64,
}

impl StageFactors {
    fn from_stack(stack: &BonusStack<'_>) -> Self {
        Self {
            energy: stack.factor(BonusKind::EnergyRate),
            matter: stack.factor(BonusKind::MatterRate),
            info: stack.factor(BonusKind::InfoRate),
        }
    }

    const fn get(&self, resource: Resource) -> f64 {
        match resource {
            Resource::Energy => self.energy,
            Resource::Matter => self.matter,
            Resource::Info => self.info,
        }
    }
}

/// Every intermediate value of one composition pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateBreakdown {
    pub base_energy: f64,
    pub producer_energy: f64,
    pub node_energy: f64,
    pub milestone: f64,
    pub producer_matter: f64,
    pub producer_info: f64,
    /// Click power before the boost upgrade.
    pub click_base: f64,
    pub click_boost: f64,
    pub prestige: f64,
    pub hero: StageFactors,
    pub hero_click: f64,
    pub projects: StageFactors,
    pub techs: StageFactors,
    pub challenges: StageFactors,
    pub rates: Rates,
}

/// Summed `level * base_production` of producers in `category`.
fn producer_output(
    run: &RunState,
    catalog: &Catalog,
    category: Resource,
    techs: &BonusStack<'_>,
) -> f64 {
    catalog
        .upgrades_with_role(UpgradeRole::Producer)
        .filter(|upgrade| upgrade.category == category)
        .map(|upgrade| {
            let boost = upgrade.boosted_by.map_or(1.0, |kind| techs.factor(kind));
            f64::from(run.upgrade_level(&upgrade.id)) * upgrade.base_production * boost
        })
        .sum()
}

fn role_levels(run: &RunState, catalog: &Catalog, role: UpgradeRole) -> u32 {
    catalog
        .upgrades_with_role(role)
        .map(|upgrade| run.upgrade_level(&upgrade.id))
        .sum()
}

/// Compose all rates for the current run without mutating it.
#[must_use]
pub fn compose_rates(
    run: &RunState,
    hero: &HeroCard,
    catalog: &Catalog,
    cfg: &EconomyConfig,
) -> RateBreakdown {
    let techs = researched_stack(run, catalog);
    let projects = completed_stack(run);
    let challenges = reward_stack(run, catalog);
    let hero_bonus = hero.rate_bonus(catalog, &cfg.hero);
    let mut hero_stack = BonusStack::new();
    hero_stack.push(&hero_bonus);

    // 1-3: base production
    let producer_energy = producer_output(run, catalog, Resource::Energy, &techs);
    let node_energy = absorbed_passive_energy(run, catalog);
    let milestone = cfg
        .milestones
        .multiplier(run.upgrade_level(&cfg.milestones.upgrade));
    let producer_matter = producer_output(run, catalog, Resource::Matter, &techs);
    let producer_info = producer_output(run, catalog, Resource::Info, &techs);
    let produced = Wallet::new(
        (cfg.base_energy_rate + producer_energy + node_energy) * milestone,
        producer_matter,
        producer_info,
    );

    // 4: click power
    let click_base = (produced.energy * cfg.click.rate_seconds).max(cfg.click.floor);
    let boost_levels = role_levels(run, catalog, UpgradeRole::ClickBoost);
    let click_boost = f64::from(boost_levels) * click_base * cfg.click.boost_per_level;
    let unboosted_click = (click_base + click_boost).floor();

    // 5: prestige
    let prestige: f64 = catalog
        .cataclysms
        .iter()
        .map(|def| u64_to_f64(run.prestige.get(def.currency)).mul_add(def.currency_weight, 1.0))
        .product();

    // 6-9: bonus stacks
    let hero_factors = StageFactors::from_stack(&hero_stack);
    let project_factors = StageFactors::from_stack(&projects);
    let tech_factors = StageFactors::from_stack(&techs);
    let challenge_factors = StageFactors::from_stack(&challenges);

    let mut rates = Rates::default();
    for resource in Resource::ALL {
        let value = produced.get(resource)
            * prestige
            * hero_factors.get(resource)
            * project_factors.get(resource)
            * tech_factors.get(resource)
            * challenge_factors.get(resource);
        rates.set(resource, value.max(0.0));
    }

    let hero_click = hero_stack.factor(BonusKind::ClickPower);
    rates.click_power = (unboosted_click * hero_click).floor();
    rates.cost_factor = challenges.factor(BonusKind::CostReduction);

    RateBreakdown {
        base_energy: cfg.base_energy_rate,
        producer_energy,
        node_energy,
        milestone,
        producer_matter,
        producer_info,
        click_base,
        click_boost,
        prestige,
        hero: hero_factors,
        hero_click,
        projects: project_factors,
        techs: tech_factors,
        challenges: challenge_factors,
        rates,
    }
}
