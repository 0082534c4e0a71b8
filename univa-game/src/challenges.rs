//! Challenges: restricted runs that pay a permanent reward per completion.
//!
//! Starting a challenge hard-resets the run. Each tick the active challenges
//! are checked for failure first (time limit, upgrade cap, clicks, prestige)
//! and only then for reaching their target.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::bonus::{BonusKind, BonusStack};
use crate::catalog::{Catalog, ChallengeDef};
use crate::error::{ActionError, ActionResult};
use crate::numbers::floor_f64_to_u64;
use crate::state::{ChallengeState, RunState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeFailure {
    TimeLimit,
    UpgradeCap,
    Clicked,
    Prestiged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeOutcome {
    Completed { completions: u32 },
    Failed(ChallengeFailure),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeResult {
    pub id: String,
    pub outcome: ChallengeOutcome,
}

/// Goal of a challenge at a given completion count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GoalTargets {
    pub reach: f64,
    pub time_limit: Option<f64>,
    pub max_upgrades: Option<u64>,
    pub no_clicks: bool,
    pub no_prestige: bool,
}

#[must_use]
pub fn goal_targets(def: &ChallengeDef, completions: u32) -> GoalTargets {
    GoalTargets {
        reach: def.goal.reach.at(completions),
        time_limit: def.goal.time_limit.map(|curve| curve.at(completions)),
        max_upgrades: def
            .goal
            .max_upgrades
            .map(|curve| floor_f64_to_u64(curve.at(completions))),
        no_clicks: def.goal.no_clicks,
        no_prestige: def.goal.no_prestige,
    }
}

/// Rewards of every challenge, each raised to its completion count.
#[must_use]
pub fn reward_stack<'a>(run: &RunState, catalog: &'a Catalog) -> BonusStack<'a> {
    let mut stack = BonusStack::new();
    for def in &catalog.challenges {
        stack.push_scaled(&def.reward, run.challenge_completions(&def.id));
    }
    stack
}

/// Combined challenge reward for one bonus kind.
#[must_use]
pub fn reward_factor(run: &RunState, catalog: &Catalog, kind: BonusKind) -> f64 {
    reward_stack(run, catalog).factor(kind)
}

/// Challenges unlocked by reach, not running and not exhausted.
pub fn available_challenges<'a>(
    run: &'a RunState,
    catalog: &'a Catalog,
) -> impl Iterator<Item = &'a ChallengeDef> + 'a {
    catalog.challenges.iter().filter(|def| {
        run.reach >= def.unlock_at
            && !run.is_challenge_active(&def.id)
            && run.challenge_completions(&def.id) < def.max_completions
    })
}

/// Hard-reset the run and begin a challenge.
///
/// # Errors
///
/// `UnknownKey`, `InvalidTransition` when already active and
/// `CapacityExceeded` once every completion has been earned.
pub(crate) fn start_challenge(
    run: &mut RunState,
    catalog: &Catalog,
    key: &str,
) -> ActionResult<()> {
    let def = catalog
        .challenge(key)
        .ok_or_else(|| ActionError::unknown("challenge", key))?;
    if run.is_challenge_active(key) {
        return Err(ActionError::transition(key, "already active"));
    }
    if run.challenge_completions(key) >= def.max_completions {
        return Err(ActionError::capacity(key));
    }

    run.hard_reset(catalog);
    let start_time = run.clock;
    run.challenges.insert(
        def.id.clone(),
        ChallengeState {
            active: true,
            start_time,
            click_count: 0,
        },
    );
    log::info!("challenge {key} started");
    Ok(())
}

fn failure(
    run: &RunState,
    state: &ChallengeState,
    targets: &GoalTargets,
) -> Option<ChallengeFailure> {
    if targets
        .time_limit
        .is_some_and(|limit| run.clock - state.start_time > limit)
    {
        return Some(ChallengeFailure::TimeLimit);
    }
    if targets
        .max_upgrades
        .is_some_and(|cap| run.total_upgrade_levels() > cap)
    {
        return Some(ChallengeFailure::UpgradeCap);
    }
    if targets.no_clicks && state.click_count > 0 {
        return Some(ChallengeFailure::Clicked);
    }
    if targets.no_prestige && !run.prestige.is_empty() {
        return Some(ChallengeFailure::Prestiged);
    }
    None
}

/// Resolve every active challenge that has failed or reached its target.
pub(crate) fn check_challenges(
    run: &mut RunState,
    catalog: &Catalog,
) -> SmallVec<[ChallengeResult; 1]> {
    let mut results = SmallVec::new();
    for def in &catalog.challenges {
        let Some(state) = run.challenges.get(&def.id).copied() else {
            continue;
        };
        if !state.active {
            continue;
        }
        let completions = run.challenge_completions(&def.id);
        let targets = goal_targets(def, completions);

        let outcome = if let Some(reason) = failure(run, &state, &targets) {
            ChallengeOutcome::Failed(reason)
        } else if run.reach >= targets.reach {
            let completions = (completions + 1).min(def.max_completions);
            run.challenge_completions.insert(def.id.clone(), completions);
            ChallengeOutcome::Completed { completions }
        } else {
            continue;
        };

        if let Some(state) = run.challenges.get_mut(&def.id) {
            state.active = false;
        }
        log::info!("challenge {} resolved: {outcome:?}", def.id);
        results.push(ChallengeResult {
            id: def.id.clone(),
            outcome,
        });
    }
    results
}

/// Count a manual click against every active challenge.
///
/// Returns the challenges that forbid clicking; they fail on the spot.
pub(crate) fn register_click(
    run: &mut RunState,
    catalog: &Catalog,
) -> SmallVec<[ChallengeResult; 1]> {
    let mut failed = SmallVec::new();
    for (id, state) in &mut run.challenges {
        if !state.active {
            continue;
        }
        state.click_count = state.click_count.saturating_add(1);
        if catalog.challenge(id).is_some_and(|def| def.goal.no_clicks) {
            state.active = false;
            log::info!("challenge {id} failed: clicked");
            failed.push(ChallengeResult {
                id: id.clone(),
                outcome: ChallengeOutcome::Failed(ChallengeFailure::Clicked),
            });
        }
    }
    failed
}
