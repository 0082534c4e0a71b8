//! Upgrade purchasing: buy one, buy N, buy max.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::cataclysm::crisis_cost_multiplier;
use crate::catalog::{Catalog, UpgradeDef};
use crate::config::EconomyConfig;
use crate::constants::MAX_BUY_REQUEST;
use crate::error::{ActionError, ActionResult, Requirement};
use crate::nodes::total_harvests;
use crate::resources::Resource;
use crate::state::{RunAchievement, RunState};

/// How many levels a purchase asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuyMode {
    One,
    /// All-or-nothing purchase of up to `n` levels.
    N(u32),
    /// As many levels as the balance covers.
    Max,
}

/// Levels and total price a purchase would settle for right now.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseQuote {
    pub key: String,
    pub resource: Resource,
    pub count: u32,
    pub total_cost: f64,
    /// Level the upgrade reaches after the purchase.
    pub new_level: u32,
}

/// Price of one level at `level`, with crisis and challenge multipliers applied.
#[must_use]
pub fn unit_cost(def: &UpgradeDef, level: u32, run: &RunState, cfg: &EconomyConfig) -> f64 {
    let crisis = crisis_cost_multiplier(&run.cataclysm, &cfg.cataclysm);
    (def.cost_at(level) * crisis * run.rates.cost_factor).floor()
}

fn remaining_levels(def: &UpgradeDef, level: u32) -> u32 {
    def.max_level
        .map_or(u32::MAX, |max| max.saturating_sub(level))
}

/// Price a purchase without mutating the run.
///
/// # Errors
///
/// Returns `UnknownKey` for keys absent from the catalog, `PrerequisiteNotMet`
/// while reach is below the unlock threshold, `CapacityExceeded` at max
/// level and `InsufficientResources` when not even one level is affordable.
pub fn quote(
    run: &RunState,
    catalog: &Catalog,
    cfg: &EconomyConfig,
    key: &str,
    mode: BuyMode,
) -> ActionResult<PurchaseQuote> {
    let def = catalog
        .upgrade(key)
        .ok_or_else(|| ActionError::unknown("upgrade", key))?;
    if !def.is_unlocked(run.reach) {
        let threshold = def.unlock_at.unwrap_or_default();
        return Err(ActionError::prerequisite(key, Requirement::Reach(threshold)));
    }
    let level = run.upgrade_level(key);
    if def.is_maxed(level) {
        return Err(ActionError::capacity(key));
    }

    let balance = run.resources.get(def.cost_resource);
    let remaining = remaining_levels(def, level);
    let (count, total_cost) = match mode {
        BuyMode::One | BuyMode::N(_) => {
            let requested = match mode {
                BuyMode::N(n) => n.min(MAX_BUY_REQUEST),
                _ => 1,
            };
            let count = requested.min(remaining);
            let total: f64 = (0..count)
                .map(|offset| unit_cost(def, level + offset, run, cfg))
                .sum();
            if count == 0 || total > balance {
                return Err(ActionError::insufficient(key, def.cost_resource));
            }
            (count, total)
        }
        BuyMode::Max => {
            let mut count = 0_u32;
            let mut total = 0.0;
            while count < remaining && count < cfg.purchase.max_iterations {
                let next = unit_cost(def, level + count, run, cfg);
                if total + next > balance {
                    break;
                }
                total += next;
                count += 1;
            }
            if count == 0 {
                return Err(ActionError::insufficient(key, def.cost_resource));
            }
            (count, total)
        }
    };

    Ok(PurchaseQuote {
        key: key.to_string(),
        resource: def.cost_resource,
        count,
        total_cost,
        new_level: level + count,
    })
}

/// Buy levels of an upgrade. The run is untouched on error.
///
/// # Errors
///
/// Same conditions as [`quote`].
pub(crate) fn purchase(
    run: &mut RunState,
    catalog: &Catalog,
    cfg: &EconomyConfig,
    key: &str,
    mode: BuyMode,
) -> ActionResult<PurchaseQuote> {
    let quote = quote(run, catalog, cfg, key, mode)?;
    if !run.resources.spend(quote.resource, quote.total_cost) {
        return Err(ActionError::insufficient(key, quote.resource));
    }
    run.upgrades.entry(quote.key.clone()).or_default().level = quote.new_level;
    run.total_upgrades_purchased = run
        .total_upgrades_purchased
        .saturating_add(u64::from(quote.count));
    log::debug!(
        "bought {} x{} for {} {}",
        quote.key,
        quote.count,
        quote.total_cost,
        quote.resource.key()
    );
    Ok(quote)
}

/// Grant run achievements whose thresholds have been crossed.
pub(crate) fn check_run_achievements(
    run: &mut RunState,
    cfg: &EconomyConfig,
) -> SmallVec<[RunAchievement; 3]> {
    let purchased = run.total_upgrades_purchased;
    let harvests = total_harvests(run);
    let reached = [
        (
            RunAchievement::BulkBuyer,
            purchased >= u64::from(cfg.purchase.bulk_unlock),
        ),
        (
            RunAchievement::MaxBuyer,
            purchased >= u64::from(cfg.purchase.max_unlock),
        ),
        (
            RunAchievement::NodeHarvester,
            harvests >= u64::from(cfg.nodes.harvester_goal),
        ),
    ];
    reached
        .into_iter()
        .filter(|(achievement, met)| *met && run.achievements.grant(*achievement))
        .map(|(achievement, _)| achievement)
        .collect()
}

/// Whether the run has unlocked a buy mode.
#[must_use]
pub const fn buy_mode_available(run: &RunState, mode: BuyMode) -> bool {
    match mode {
        BuyMode::One | BuyMode::N(0 | 1) => true,
        BuyMode::N(_) => run.achievements.has(RunAchievement::BulkBuyer),
        BuyMode::Max => run.achievements.has(RunAchievement::MaxBuyer),
    }
}

/// Upgrades unlocked by reach and not yet at max level.
pub fn visible_upgrades<'a>(
    run: &'a RunState,
    catalog: &'a Catalog,
) -> impl Iterator<Item = &'a UpgradeDef> + 'a {
    catalog.upgrades.iter().filter(|def| {
        def.is_unlocked(run.reach) && !def.is_maxed(run.upgrade_level(&def.id))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::catalog;
    use crate::cataclysm::CataclysmKind;

    fn fresh(energy: f64) -> (RunState, std::sync::Arc<Catalog>, EconomyConfig) {
        let catalog = catalog();
        let mut run = RunState::new(&catalog);
        run.resources.energy = energy;
        (run, catalog, EconomyConfig::default())
    }

    #[test]
    fn cost_curve_floors_each_level() {
        let (run, catalog, cfg) = fresh(0.0);
        let collector = catalog.upgrade("energy_collector").unwrap();
        assert!((unit_cost(collector, 0, &run, &cfg) - 10.0).abs() < f64::EPSILON);
        assert!((unit_cost(collector, 5, &run, &cfg) - 17.0).abs() < f64::EPSILON);
    }

    #[test]
    fn buy_one_deducts_and_counts() {
        let (mut run, catalog, cfg) = fresh(25.0);
        let bought = purchase(&mut run, &catalog, &cfg, "energy_collector", BuyMode::One).unwrap();
        assert_eq!(bought.count, 1);
        assert_eq!(run.upgrade_level("energy_collector"), 1);
        assert!((run.resources.energy - 15.0).abs() < f64::EPSILON);
        assert_eq!(run.total_upgrades_purchased, 1);
    }

    #[test]
    fn buy_n_is_all_or_nothing() {
        let (mut run, catalog, cfg) = fresh(30.0);
        let err =
            purchase(&mut run, &catalog, &cfg, "energy_collector", BuyMode::N(3)).unwrap_err();
        assert_eq!(
            err,
            ActionError::InsufficientResources {
                key: "energy_collector".into(),
                resource: Resource::Energy,
            }
        );
        assert_eq!(run.upgrade_level("energy_collector"), 0);
        assert!((run.resources.energy - 30.0).abs() < f64::EPSILON);

        // 10 + 11 + 12
        run.resources.energy = 33.0;
        let bought = purchase(&mut run, &catalog, &cfg, "energy_collector", BuyMode::N(3)).unwrap();
        assert!((bought.total_cost - 33.0).abs() < f64::EPSILON);
        assert!(run.resources.energy.abs() < f64::EPSILON);
    }

    #[test]
    fn buy_max_fills_partially_and_respects_max_level() {
        let (mut run, catalog, cfg) = fresh(1000.0);
        let bought = purchase(&mut run, &catalog, &cfg, "energy_collector", BuyMode::Max).unwrap();
        assert!(bought.count > 1);
        assert!(run.resources.energy >= 0.0);
        let next = unit_cost(
            catalog.upgrade("energy_collector").unwrap(),
            bought.new_level,
            &run,
            &cfg,
        );
        assert!(next > run.resources.energy);

        run.reach = 1e6;
        run.resources.matter = 1e9;
        let bunker = purchase(&mut run, &catalog, &cfg, "survival_bunker", BuyMode::Max).unwrap();
        assert_eq!(bunker.count, 10);
        assert_eq!(
            purchase(&mut run, &catalog, &cfg, "survival_bunker", BuyMode::One),
            Err(ActionError::CapacityExceeded {
                key: "survival_bunker".into()
            })
        );
    }

    #[test]
    fn locked_and_unknown_upgrades_are_rejected() {
        let (mut run, catalog, cfg) = fresh(1e12);
        assert!(matches!(
            purchase(&mut run, &catalog, &cfg, "matter_extractor", BuyMode::One),
            Err(ActionError::PrerequisiteNotMet { .. })
        ));
        assert!(matches!(
            purchase(&mut run, &catalog, &cfg, "warp_drive", BuyMode::One),
            Err(ActionError::UnknownKey { .. })
        ));
        assert_eq!(run.total_upgrades_purchased, 0);
    }

    #[test]
    fn extractor_is_listed_under_matter_but_paid_in_energy() {
        let (mut run, catalog, cfg) = fresh(2e6);
        run.reach = 1e6;
        let bought = purchase(&mut run, &catalog, &cfg, "matter_extractor", BuyMode::One).unwrap();
        assert_eq!(bought.resource, Resource::Energy);
        assert!((run.resources.energy - 1e6).abs() < f64::EPSILON);
    }

    #[test]
    fn crisis_and_challenge_factors_scale_costs() {
        let (mut run, catalog, cfg) = fresh(0.0);
        let collector = catalog.upgrade("energy_collector").unwrap();
        run.cataclysm.kind = Some(CataclysmKind::Asteroid);
        run.cataclysm.crisis_mode = true;
        run.cataclysm.progress = 0.92;
        assert!((unit_cost(collector, 0, &run, &cfg) - 15.0).abs() < f64::EPSILON);

        run.cataclysm.crisis_mode = false;
        run.rates.cost_factor = 0.5;
        assert!((unit_cost(collector, 0, &run, &cfg) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn run_achievements_unlock_buy_modes() {
        let (mut run, _, cfg) = fresh(0.0);
        assert!(!buy_mode_available(&run, BuyMode::N(10)));
        assert!(buy_mode_available(&run, BuyMode::One));

        run.total_upgrades_purchased = 30;
        let granted = check_run_achievements(&mut run, &cfg);
        assert_eq!(granted.as_slice(), &[RunAchievement::BulkBuyer]);
        assert!(buy_mode_available(&run, BuyMode::N(10)));
        assert!(!buy_mode_available(&run, BuyMode::Max));
        assert!(check_run_achievements(&mut run, &cfg).is_empty());

        run.total_upgrades_purchased = 100;
        let granted = check_run_achievements(&mut run, &cfg);
        assert_eq!(granted.as_slice(), &[RunAchievement::MaxBuyer]);
    }

    #[test]
    fn visible_list_hides_locked_and_maxed() {
        let (mut run, catalog, _) = fresh(0.0);
        let visible: Vec<_> = visible_upgrades(&run, &catalog).map(|def| def.id.as_str()).collect();
        assert!(visible.contains(&"energy_collector"));
        assert!(!visible.contains(&"matter_extractor"));

        run.reach = 1e6;
        run.upgrades.get_mut("seed_vault").unwrap().level = 3;
        let visible: Vec<_> = visible_upgrades(&run, &catalog).map(|def| def.id.as_str()).collect();
        assert!(visible.contains(&"matter_extractor"));
        assert!(!visible.contains(&"seed_vault"));
    }
}
