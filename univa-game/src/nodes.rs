//! Harvestable bodies around the home planet and manual click collection.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::catalog::{Catalog, NodeDef, UpgradeRole};
use crate::config::{ClickConfig, NodeConfig};
use crate::error::{ActionError, ActionResult};
use crate::numbers::exponent_from_u32;
use crate::resources::Resource;
use crate::state::RunState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Star,
    Home,
    Resource,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeState {
    #[default]
    Uncontacted,
    Harvesting,
    Absorbed,
}

/// Per-run state of one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRuntime {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub state: NodeState,
    #[serde(default)]
    pub harvest_progress: f64,
    #[serde(default)]
    pub regeneration_time: f64,
    #[serde(default)]
    pub harvest_count: u32,
    /// Set when the current harvest was started by an auto-harvester.
    #[serde(default)]
    pub auto_harvest: bool,
}

impl NodeRuntime {
    #[must_use]
    pub fn from_def(def: &NodeDef) -> Self {
        Self {
            id: def.id.clone(),
            state: def.initial_state,
            harvest_progress: 0.0,
            regeneration_time: 0.0,
            harvest_count: 0,
            auto_harvest: false,
        }
    }

    /// Return to the harvestable state, keeping the lifetime harvest count.
    pub(crate) fn scatter(&mut self) {
        self.state = NodeState::Uncontacted;
        self.harvest_progress = 0.0;
        self.regeneration_time = 0.0;
        self.auto_harvest = false;
    }
}

/// A completed harvest.
#[derive(Debug, Clone, PartialEq)]
pub struct Harvest {
    pub node: String,
    pub gain: f64,
    pub automatic: bool,
}

pub type HarvestBatch = SmallVec<[Harvest; 4]>;

/// Result of a successful node click.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClickOutcome {
    HarvestStarted,
    Collected { gain: f64, combo: u32 },
    /// The click broke a no-clicks challenge and paid nothing.
    Forfeited,
}

/// Click combo bookkeeping, kept out of saves.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ComboState {
    pub count: u32,
    pub last_click: Option<f64>,
}

/// Advance harvesting, regeneration and auto-harvesting by `dt` seconds.
///
/// Gains are credited to energy immediately and returned for reporting.
pub(crate) fn tick_nodes(
    run: &mut RunState,
    catalog: &Catalog,
    cfg: &NodeConfig,
    dt: f64,
    auto_harvest_factor: f64,
) -> HarvestBatch {
    let auto_level: u32 = catalog
        .upgrades_with_role(UpgradeRole::AutoHarvester)
        .map(|upgrade| run.upgrade_level(&upgrade.id))
        .sum();
    let auto_reach = cfg.auto_reach(auto_level);
    let energy_rate = run.rates.energy;
    let click_power = run.rates.click_power;

    let mut harvests = HarvestBatch::new();
    for node in &mut run.nodes {
        let Some(def) = catalog.node(&node.id) else {
            continue;
        };
        if def.kind == NodeKind::Star {
            continue;
        }

        if node.state == NodeState::Harvesting {
            node.harvest_progress += dt * cfg.harvest_rate;
            if node.harvest_progress >= 1.0 {
                node.state = NodeState::Absorbed;
                node.harvest_progress = 0.0;
                let automatic = std::mem::take(&mut node.auto_harvest);
                let gain = if automatic {
                    (energy_rate * cfg.auto_harvest_seconds * auto_harvest_factor).floor()
                } else {
                    node.harvest_count = node.harvest_count.saturating_add(1);
                    let decay = cfg
                        .manual_decay
                        .powi(exponent_from_u32(node.harvest_count - 1));
                    (click_power * decay).floor()
                };
                node.regeneration_time = def.max_regen_time;
                harvests.push(Harvest {
                    node: node.id.clone(),
                    gain,
                    automatic,
                });
            }
        }

        if node.state == NodeState::Absorbed && node.regeneration_time > 0.0 {
            node.regeneration_time -= dt;
            if node.regeneration_time <= 0.0 {
                node.state = NodeState::Uncontacted;
                node.regeneration_time = 0.0;
            }
        }

        if auto_level > 0
            && node.state == NodeState::Uncontacted
            && def.kind == NodeKind::Resource
            && def.orbit_distance < auto_reach
        {
            node.state = NodeState::Harvesting;
            node.auto_harvest = true;
        }
    }

    for harvest in &harvests {
        run.resources.credit(Resource::Energy, harvest.gain);
    }
    harvests
}

/// Start a manual harvest on an uncontacted node.
pub(crate) fn begin_harvest(run: &mut RunState, catalog: &Catalog, id: &str) -> ActionResult<()> {
    let def = catalog
        .node(id)
        .ok_or_else(|| ActionError::unknown("node", id))?;
    if def.kind == NodeKind::Star {
        return Err(ActionError::transition(id, "not harvestable"));
    }
    let node = run
        .node_mut(id)
        .ok_or_else(|| ActionError::unknown("node", id))?;
    match node.state {
        NodeState::Uncontacted => {
            node.state = NodeState::Harvesting;
            node.auto_harvest = false;
            Ok(())
        }
        NodeState::Harvesting => Err(ActionError::transition(id, "already harvesting")),
        NodeState::Absorbed => Err(ActionError::transition(id, "already absorbed")),
    }
}

/// Collect a click on an absorbed node, extending the combo when clicks land within the window.
pub(crate) fn collect_click(run: &mut RunState, cfg: &ClickConfig) -> (f64, u32) {
    let now = run.clock;
    let within_window = run
        .combo
        .last_click
        .is_some_and(|last| now - last < cfg.combo_window);
    run.combo.count = if within_window {
        run.combo.count.saturating_add(1)
    } else {
        1
    };
    run.combo.last_click = Some(now);

    let combo = run.combo.count;
    let gain = (run.rates.click_power * cfg.combo_step.mul_add(f64::from(combo), 1.0)).floor();
    run.resources.credit(Resource::Energy, gain);
    (gain, combo)
}

/// Passive energy of every absorbed node.
#[must_use]
pub fn absorbed_passive_energy(run: &RunState, catalog: &Catalog) -> f64 {
    run.nodes
        .iter()
        .filter(|node| node.state == NodeState::Absorbed)
        .filter_map(|node| catalog.node(&node.id))
        .map(|def| def.passive_energy)
        .sum()
}

/// Lifetime manual harvests across all nodes this run.
#[must_use]
pub fn total_harvests(run: &RunState) -> u64 {
    run.nodes
        .iter()
        .map(|node| u64::from(node.harvest_count))
        .sum()
}
