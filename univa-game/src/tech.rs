//! Tech tree research.
use serde::{Deserialize, Serialize};

use crate::bonus::BonusStack;
use crate::catalog::{Catalog, TechDef};
use crate::error::{ActionError, ActionResult, Requirement};
use crate::resources::Resource;
use crate::state::RunState;

/// Research state of one node as the tree view presents it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TechStatus {
    Researched,
    Available,
    Locked,
}

/// Bonus bundles of every researched tech.
#[must_use]
pub fn researched_stack<'a>(run: &RunState, catalog: &'a Catalog) -> BonusStack<'a> {
    catalog
        .techs
        .iter()
        .filter(|def| run.is_researched(&def.id))
        .map(|def| &def.bonus)
        .collect()
}

/// First unmet requirement, ignoring the info cost.
fn missing_requirement(run: &RunState, def: &TechDef) -> Option<Requirement> {
    if run.reach < def.requirements.reach {
        return Some(Requirement::Reach(def.requirements.reach));
    }
    if let Some(prereq) = def
        .requirements
        .techs
        .iter()
        .find(|prereq| !run.is_researched(prereq))
    {
        return Some(Requirement::Tech(prereq.clone()));
    }
    (def.tier > run.kardashev_tier).then_some(Requirement::KardashevTier(def.tier))
}

#[must_use]
pub fn tech_status(run: &RunState, def: &TechDef) -> TechStatus {
    if run.is_researched(&def.id) {
        TechStatus::Researched
    } else if missing_requirement(run, def).is_none() {
        TechStatus::Available
    } else {
        TechStatus::Locked
    }
}

/// Techs whose requirements are met but which are not yet researched.
pub fn available_techs<'a>(
    run: &'a RunState,
    catalog: &'a Catalog,
) -> impl Iterator<Item = &'a TechDef> + 'a {
    catalog
        .techs
        .iter()
        .filter(|def| tech_status(run, def) == TechStatus::Available)
}

/// Research a tech, paying its info cost.
///
/// Returns the new Kardashev tier when one of the tech's unlocks advanced it.
///
/// # Errors
///
/// `UnknownKey`, `InvalidTransition` when already researched,
/// `PrerequisiteNotMet` for reach, prerequisite or tier gates, and
/// `InsufficientResources` when info is short. Nothing changes on error.
pub(crate) fn research(
    run: &mut RunState,
    catalog: &Catalog,
    key: &str,
) -> ActionResult<Option<u8>> {
    let def = catalog
        .tech(key)
        .ok_or_else(|| ActionError::unknown("tech", key))?;
    if run.is_researched(key) {
        return Err(ActionError::transition(key, "already researched"));
    }
    if let Some(requirement) = missing_requirement(run, def) {
        return Err(ActionError::prerequisite(key, requirement));
    }
    if !run.resources.spend(Resource::Info, def.cost.info) {
        return Err(ActionError::insufficient(key, Resource::Info));
    }

    run.techs.entry(def.id.clone()).or_default().researched = true;
    let advanced = run.apply_unlocks(&def.unlocks);
    log::debug!("researched {key}");
    Ok(advanced)
}
