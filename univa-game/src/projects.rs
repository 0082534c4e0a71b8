//! Megaprojects: timed builds that grant a permanent reward bundle.
use smallvec::SmallVec;

use crate::bonus::BonusStack;
use crate::catalog::{Catalog, ProjectDef};
use crate::error::{ActionError, ActionResult};
use crate::resources::Resource;
use crate::state::{ProjectState, RunState};

/// A project that finished during a tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectCompletion {
    pub id: String,
    /// New Kardashev tier when the reward advanced it.
    pub tier: Option<u8>,
}

/// Reward bundles of completed projects.
#[must_use]
pub fn completed_stack(run: &RunState) -> BonusStack<'_> {
    run.project_bonuses.values().collect()
}

/// Projects unlocked by reach that are neither running nor finished.
pub fn available_projects<'a>(
    run: &'a RunState,
    catalog: &'a Catalog,
) -> impl Iterator<Item = &'a ProjectDef> + 'a {
    catalog.projects.iter().filter(|def| {
        run.reach >= def.unlock_at
            && !run.is_project_completed(&def.id)
            && !run.is_project_active(&def.id)
    })
}

/// Pay for a project and start its build timer on the run clock.
///
/// # Errors
///
/// `UnknownKey`, `InvalidTransition` when completed or already building, and
/// `InsufficientResources` naming the first short resource.
pub(crate) fn start_project(run: &mut RunState, catalog: &Catalog, key: &str) -> ActionResult<()> {
    let def = catalog
        .project(key)
        .ok_or_else(|| ActionError::unknown("project", key))?;
    if run.is_project_completed(key) {
        return Err(ActionError::transition(key, "already completed"));
    }
    if run.is_project_active(key) {
        return Err(ActionError::transition(key, "already under construction"));
    }
    if !run.resources.spend_all(&def.requirements) {
        let resource = run
            .resources
            .shortfall(&def.requirements)
            .unwrap_or(Resource::Energy);
        return Err(ActionError::insufficient(key, resource));
    }

    let now = run.clock;
    run.projects.insert(
        def.id.clone(),
        ProjectState {
            completed: false,
            progress: 0.0,
            start_time: Some(now),
        },
    );
    run.active_projects.push(def.id.clone());
    log::debug!("started project {key}");
    Ok(())
}

/// Advance active builds and apply the rewards of the ones that finished.
///
/// Completions are collected over the whole active list before any of them
/// is removed.
pub(crate) fn tick_projects(
    run: &mut RunState,
    catalog: &Catalog,
) -> SmallVec<[ProjectCompletion; 2]> {
    let now = run.clock;
    let mut finished: SmallVec<[&ProjectDef; 2]> = SmallVec::new();
    for id in &run.active_projects {
        let Some(def) = catalog.project(id) else {
            continue;
        };
        let Some(state) = run.projects.get_mut(id) else {
            continue;
        };
        // A save without a start time resumes from its recorded progress.
        let started = *state
            .start_time
            .get_or_insert(now - state.progress * def.build_time);
        state.progress = if def.build_time > 0.0 {
            ((now - started) / def.build_time).clamp(0.0, 1.0)
        } else {
            1.0
        };
        if state.progress >= 1.0 {
            finished.push(def);
        }
    }

    let mut completions: SmallVec<[ProjectCompletion; 2]> = SmallVec::new();
    for def in finished {
        if let Some(state) = run.projects.get_mut(&def.id) {
            state.completed = true;
            state.progress = 1.0;
        }
        run.project_bonuses
            .insert(def.id.clone(), def.rewards.bonus.clone());
        let tier = run.apply_unlocks(&def.rewards.unlocks);
        log::debug!("project {} complete", def.id);
        completions.push(ProjectCompletion {
            id: def.id.clone(),
            tier,
        });
    }
    run.active_projects
        .retain(|id| completions.iter().all(|done| &done.id != id));
    completions
}
