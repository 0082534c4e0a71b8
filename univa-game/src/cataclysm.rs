//! Cataclysm approach tracking, crisis pricing and evacuation.
//!
//! The current cataclysm is derived from reach alone: the first band whose
//! lower edge (`approach_ratio * threshold`) has been crossed and whose upper
//! edge (the next cataclysm's threshold) has not. Evacuating converts the
//! approach into prestige currency and partially resets the run.
use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, CataclysmDef, UpgradeRole};
use crate::config::CataclysmConfig;
use crate::error::{ActionError, ActionResult, Requirement};
use crate::nodes::NodeKind;
use crate::numbers::floor_f64_to_u64;
use crate::resources::PrestigeCurrency;
use crate::state::RunState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CataclysmKind {
    Asteroid,
    SolarFlare,
    GammaRay,
}

/// Persisted cataclysm fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CataclysmState {
    #[serde(default)]
    pub kind: Option<CataclysmKind>,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub warning_shown: bool,
    #[serde(default)]
    pub crisis_mode: bool,
}

/// Observable phase of the cataclysm machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CataclysmPhase {
    Dormant,
    Approaching(CataclysmKind),
    Warning(CataclysmKind),
    Crisis(CataclysmKind),
}

impl CataclysmState {
    #[must_use]
    pub const fn phase(&self) -> CataclysmPhase {
        match self.kind {
            None => CataclysmPhase::Dormant,
            Some(kind) if self.crisis_mode => CataclysmPhase::Crisis(kind),
            Some(kind) if self.warning_shown => CataclysmPhase::Warning(kind),
            Some(kind) => CataclysmPhase::Approaching(kind),
        }
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Transitions observed during one update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CataclysmUpdate {
    pub entered: Option<CataclysmKind>,
    pub warned: Option<CataclysmKind>,
    pub crisis: Option<CataclysmKind>,
    pub cleared: bool,
}

/// Cataclysm whose band contains `reach`, if any.
#[must_use]
pub fn current_band<'a>(
    reach: f64,
    catalog: &'a Catalog,
    cfg: &CataclysmConfig,
) -> Option<&'a CataclysmDef> {
    catalog
        .cataclysms
        .iter()
        .enumerate()
        .find(|(idx, def)| {
            let lower = def.threshold * cfg.approach_ratio;
            let upper = catalog
                .cataclysms
                .get(idx + 1)
                .map_or(f64::INFINITY, |next| next.threshold);
            reach >= lower && reach < upper
        })
        .map(|(_, def)| def)
}

/// Re-derive the cataclysm state from the run's reach.
pub(crate) fn update_cataclysm(
    run: &mut RunState,
    catalog: &Catalog,
    cfg: &CataclysmConfig,
) -> CataclysmUpdate {
    let mut update = CataclysmUpdate::default();
    let Some(def) = current_band(run.reach, catalog, cfg) else {
        if run.cataclysm.kind.is_some() {
            run.cataclysm.clear();
            update.cleared = true;
        }
        return update;
    };

    let state = &mut run.cataclysm;
    if state.kind != Some(def.kind) {
        *state = CataclysmState {
            kind: Some(def.kind),
            ..CataclysmState::default()
        };
        update.entered = Some(def.kind);
    }
    state.progress = (run.reach / def.threshold).min(1.0);
    if state.progress >= cfg.warning_ratio && !state.warning_shown {
        state.warning_shown = true;
        update.warned = Some(def.kind);
    }
    let crisis = state.progress >= cfg.crisis_ratio;
    if crisis && !state.crisis_mode {
        update.crisis = Some(def.kind);
    }
    state.crisis_mode = crisis;
    update
}

/// Purchase cost multiplier imposed by the current crisis depth.
#[must_use]
pub fn crisis_cost_multiplier(state: &CataclysmState, cfg: &CataclysmConfig) -> f64 {
    if state.crisis_mode {
        cfg.crisis_costs.value_at(state.progress)
    } else {
        1.0
    }
}

/// Breakdown of what evacuating right now would pay.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvacuationQuote {
    pub kind: CataclysmKind,
    pub currency: PrestigeCurrency,
    /// `(reach / threshold)^exponent`.
    pub base: f64,
    pub survival_factor: f64,
    pub early_bonus: f64,
    /// Unfloored gain.
    pub raw: f64,
    pub gain: u64,
}

/// Price an evacuation without mutating the run.
///
/// `survival_reward` scales the survival-structure factor (challenge rewards).
///
/// # Errors
///
/// Returns `PrerequisiteNotMet` when no cataclysm is approaching.
pub fn quote_evacuation(
    run: &RunState,
    catalog: &Catalog,
    cfg: &CataclysmConfig,
    survival_reward: f64,
) -> ActionResult<EvacuationQuote> {
    let def = run
        .cataclysm
        .kind
        .and_then(|kind| catalog.cataclysm(kind))
        .ok_or_else(|| ActionError::prerequisite("evacuate", Requirement::ActiveCataclysm))?;

    let base = (run.reach / def.threshold).powf(cfg.gain_exponent);
    let structures: f64 = catalog
        .upgrades_with_role(UpgradeRole::Survival)
        .filter_map(|upgrade| {
            upgrade
                .survival
                .map(|survival| {
                    f64::from(run.upgrade_level(&upgrade.id)) * survival.prestige_bonus
                })
        })
        .sum();
    let survival_factor = (1.0 + structures) * survival_reward;
    let early_bonus = cfg.early_bonus.value_at(run.cataclysm.progress);
    let raw = base * survival_factor * (1.0 + early_bonus);
    Ok(EvacuationQuote {
        kind: def.kind,
        currency: def.currency,
        base,
        survival_factor,
        early_bonus,
        raw,
        gain: floor_f64_to_u64(raw),
    })
}

/// Evacuate the current cataclysm, crediting prestige currency and applying the partial reset.
///
/// # Errors
///
/// Returns `PrerequisiteNotMet` when no cataclysm is approaching or the gain would be below 1.
pub(crate) fn evacuate(
    run: &mut RunState,
    catalog: &Catalog,
    cfg: &CataclysmConfig,
    survival_reward: f64,
) -> ActionResult<EvacuationQuote> {
    let quote = quote_evacuation(run, catalog, cfg, survival_reward)?;
    if quote.gain < 1 {
        return Err(ActionError::prerequisite(
            "evacuate",
            Requirement::MinimumGain,
        ));
    }
    run.prestige.credit(quote.currency, quote.gain);
    apply_post_cataclysm_reset(run, catalog);
    Ok(quote)
}

/// Partial reset after surviving a cataclysm.
///
/// Survival structures, tech, projects, challenges and prestige currencies are kept.
pub(crate) fn apply_post_cataclysm_reset(run: &mut RunState, catalog: &Catalog) {
    let preserved: f64 = catalog
        .upgrades_with_role(UpgradeRole::Survival)
        .filter_map(|upgrade| {
            upgrade
                .survival
                .map(|survival| {
                    f64::from(run.upgrade_level(&upgrade.id)) * survival.matter_preserved
                })
        })
        .sum();
    run.resources.matter *= preserved.clamp(0.0, 1.0);
    run.resources.energy = 0.0;
    run.resources.info = 0.0;
    run.reach = 0.0;
    run.kardashev_progress = 0.0;

    for upgrade in &catalog.upgrades {
        if !upgrade.is_survival()
            && let Some(state) = run.upgrades.get_mut(&upgrade.id)
        {
            state.level = 0;
        }
    }

    for node in &mut run.nodes {
        if catalog
            .node(&node.id)
            .is_some_and(|def| def.kind == NodeKind::Resource)
        {
            node.scatter();
        }
    }

    run.cataclysm.clear();
    run.combo = crate::nodes::ComboState::default();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::catalog;
    use crate::nodes::NodeState;

    fn run_at(reach: f64) -> (RunState, std::sync::Arc<Catalog>) {
        let catalog = catalog();
        let mut run = RunState::new(&catalog);
        run.reach = reach;
        (run, catalog)
    }

    #[test]
    fn bands_select_first_matching_cataclysm() {
        let catalog = catalog();
        let cfg = CataclysmConfig::default();
        assert!(current_band(6.9e5, &catalog, &cfg).is_none());
        assert_eq!(
            current_band(7e5, &catalog, &cfg).map(|def| def.kind),
            Some(CataclysmKind::Asteroid)
        );
        assert_eq!(
            current_band(8e8, &catalog, &cfg).map(|def| def.kind),
            Some(CataclysmKind::Asteroid)
        );
        assert_eq!(
            current_band(1e9, &catalog, &cfg).map(|def| def.kind),
            Some(CataclysmKind::SolarFlare)
        );
        assert_eq!(
            current_band(5e13, &catalog, &cfg).map(|def| def.kind),
            Some(CataclysmKind::GammaRay)
        );
    }

    #[test]
    fn phases_advance_and_warn_once() {
        let (mut run, catalog) = run_at(7.5e5);
        let cfg = CataclysmConfig::default();

        let update = update_cataclysm(&mut run, &catalog, &cfg);
        assert_eq!(update.entered, Some(CataclysmKind::Asteroid));
        assert_eq!(update.warned, Some(CataclysmKind::Asteroid));
        assert_eq!(run.cataclysm.phase(), CataclysmPhase::Warning(CataclysmKind::Asteroid));

        let update = update_cataclysm(&mut run, &catalog, &cfg);
        assert_eq!(update, CataclysmUpdate::default());

        run.reach = 9.2e5;
        let update = update_cataclysm(&mut run, &catalog, &cfg);
        assert_eq!(update.crisis, Some(CataclysmKind::Asteroid));
        assert_eq!(run.cataclysm.phase(), CataclysmPhase::Crisis(CataclysmKind::Asteroid));

        run.reach = 0.0;
        let update = update_cataclysm(&mut run, &catalog, &cfg);
        assert!(update.cleared);
        assert_eq!(run.cataclysm.phase(), CataclysmPhase::Dormant);
        assert!(!run.cataclysm.warning_shown);
    }

    #[test]
    fn crisis_multiplier_tiers() {
        let cfg = CataclysmConfig::default();
        let mut state = CataclysmState {
            kind: Some(CataclysmKind::Asteroid),
            progress: 0.8,
            warning_shown: true,
            crisis_mode: false,
        };
        assert!((crisis_cost_multiplier(&state, &cfg) - 1.0).abs() < f64::EPSILON);
        state.crisis_mode = true;
        let cases = [(0.9, 1.5), (0.949, 1.5), (0.95, 3.0), (0.99, 10.0), (1.0, 10.0)];
        for (progress, expected) in cases {
            state.progress = progress;
            assert!(
                (crisis_cost_multiplier(&state, &cfg) - expected).abs() < f64::EPSILON,
                "progress {progress}"
            );
        }
    }

    #[test]
    fn evacuation_gain_follows_timing_bonus() {
        let cfg = CataclysmConfig::default();

        let (mut late, catalog) = run_at(9e5);
        update_cataclysm(&mut late, &catalog, &cfg);
        let late_quote = quote_evacuation(&late, &catalog, &cfg, 1.0).unwrap();
        assert!((late_quote.early_bonus - 0.25).abs() < f64::EPSILON);
        assert_eq!(late_quote.gain, 1);

        let (mut early, _) = run_at(8.5e5);
        update_cataclysm(&mut early, &catalog, &cfg);
        let early_quote = quote_evacuation(&early, &catalog, &cfg, 1.0).unwrap();
        assert!((early_quote.early_bonus - 0.5).abs() < f64::EPSILON);
        assert!(early_quote.raw > late_quote.raw);
        assert!(early_quote.gain >= late_quote.gain);
    }

    #[test]
    fn evacuation_requires_active_cataclysm_and_minimum_gain() {
        let cfg = CataclysmConfig::default();
        let (mut run, catalog) = run_at(1e5);
        assert!(matches!(
            evacuate(&mut run, &catalog, &cfg, 1.0),
            Err(ActionError::PrerequisiteNotMet {
                requirement: Requirement::ActiveCataclysm,
                ..
            })
        ));

        // A zero survival reward makes the gain 0 without touching the run.
        run.reach = 9e5;
        update_cataclysm(&mut run, &catalog, &cfg);
        let before = run.clone();
        assert!(matches!(
            evacuate(&mut run, &catalog, &cfg, 0.0),
            Err(ActionError::PrerequisiteNotMet {
                requirement: Requirement::MinimumGain,
                ..
            })
        ));
        assert_eq!(run, before);
    }

    #[test]
    fn evacuation_resets_run_but_keeps_survival_structures() {
        let cfg = CataclysmConfig::default();
        let (mut run, catalog) = run_at(9.5e5);
        run.resources.energy = 5e5;
        run.resources.matter = 1000.0;
        run.resources.info = 40.0;
        run.upgrades.get_mut("energy_collector").unwrap().level = 20;
        run.upgrades.get_mut("survival_bunker").unwrap().level = 4;
        run.node_mut("resource-1").unwrap().state = NodeState::Absorbed;
        update_cataclysm(&mut run, &catalog, &cfg);

        let quote = evacuate(&mut run, &catalog, &cfg, 1.0).unwrap();
        assert!((quote.survival_factor - 1.4).abs() < 1e-9);
        assert_eq!(run.prestige.archived_data, quote.gain);
        assert!((run.resources.matter - 200.0).abs() < 1e-9);
        assert!(run.resources.energy.abs() < f64::EPSILON);
        assert!(run.resources.info.abs() < f64::EPSILON);
        assert!(run.reach.abs() < f64::EPSILON);
        assert_eq!(run.upgrade_level("energy_collector"), 0);
        assert_eq!(run.upgrade_level("survival_bunker"), 4);
        assert_eq!(run.node("resource-1").unwrap().state, NodeState::Uncontacted);
        assert_eq!(run.node("earth").unwrap().state, NodeState::Absorbed);
        assert_eq!(run.cataclysm.phase(), CataclysmPhase::Dormant);
    }
}
