use std::fmt;

use clap::ValueEnum;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use univa_game::{
    BuyMode, NodeState, Session, available_projects, available_techs, buy_mode_available,
    visible_upgrades,
};

/// Actions a policy attempted during one turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PolicyTurn {
    pub actions: u32,
    pub rejected: u32,
}

impl PolicyTurn {
    fn record<T, E>(&mut self, result: &Result<T, E>) {
        self.actions += 1;
        if result.is_err() {
            self.rejected += 1;
        }
    }
}

/// Policy interface for automated play strategies.
pub trait PlayerPolicy {
    /// Name used for logging/debug output.
    fn name(&self) -> &'static str;

    /// Take this turn's actions against the session.
    fn act(&mut self, session: &mut Session) -> PolicyTurn;
}

/// Built-in player strategies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum GameplayStrategy {
    /// Never acts; measures passive production.
    Idle,
    /// Buys the cheapest upgrade, researches, builds and evacuates in crisis.
    Greedy,
    /// Greedy plus manual node clicks.
    Clicker,
    /// Seeded random actions, including ones expected to be rejected.
    Random,
}

impl GameplayStrategy {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Greedy => "Greedy",
            Self::Clicker => "Clicker",
            Self::Random => "Random",
        }
    }

    #[must_use]
    pub fn create_policy(self, seed: u64) -> Box<dyn PlayerPolicy> {
        match self {
            Self::Idle => Box::new(IdlePolicy),
            Self::Greedy => Box::new(GreedyPolicy),
            Self::Clicker => Box::new(ClickerPolicy),
            Self::Random => Box::new(RandomPolicy::new(seed)),
        }
    }
}

impl fmt::Display for GameplayStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

struct IdlePolicy;
struct GreedyPolicy;
struct ClickerPolicy;

struct RandomPolicy {
    rng: ChaCha20Rng,
}

impl RandomPolicy {
    fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }
}

impl PlayerPolicy for IdlePolicy {
    fn name(&self) -> &'static str {
        "Idle"
    }

    fn act(&mut self, _session: &mut Session) -> PolicyTurn {
        PolicyTurn::default()
    }
}

impl PlayerPolicy for GreedyPolicy {
    fn name(&self) -> &'static str {
        "Greedy"
    }

    fn act(&mut self, session: &mut Session) -> PolicyTurn {
        let mut turn = PolicyTurn::default();
        if evacuate_in_crisis(session, &mut turn) {
            return turn;
        }
        research_everything(session, &mut turn);
        build_affordable_projects(session, &mut turn);
        buy_cheapest(session, &mut turn);
        turn
    }
}

impl PlayerPolicy for ClickerPolicy {
    fn name(&self) -> &'static str {
        "Clicker"
    }

    fn act(&mut self, session: &mut Session) -> PolicyTurn {
        let mut turn = GreedyPolicy.act(session);
        for id in harvestable_nodes(session) {
            let result = session.click_node(&id);
            turn.record(&result);
        }
        let result = session.click_node("earth");
        turn.record(&result);
        turn
    }
}

impl PlayerPolicy for RandomPolicy {
    fn name(&self) -> &'static str {
        "Random"
    }

    fn act(&mut self, session: &mut Session) -> PolicyTurn {
        let mut turn = PolicyTurn::default();
        let catalog = session.shared_catalog();
        match self.rng.gen_range(0..6) {
            0 => {
                if let Some(def) = catalog.upgrades.choose(&mut self.rng) {
                    let mode = match self.rng.gen_range(0..3) {
                        0 => BuyMode::One,
                        1 => BuyMode::N(self.rng.gen_range(2..=25)),
                        _ => BuyMode::Max,
                    };
                    let result = session.purchase(&def.id, mode);
                    turn.record(&result);
                }
            }
            1 => {
                if let Some(def) = catalog.techs.choose(&mut self.rng) {
                    let result = session.research(&def.id);
                    turn.record(&result);
                }
            }
            2 => {
                if let Some(def) = catalog.projects.choose(&mut self.rng) {
                    let result = session.start_project(&def.id);
                    turn.record(&result);
                }
            }
            3 => {
                if let Some(def) = catalog.nodes.choose(&mut self.rng) {
                    let result = session.click_node(&def.id);
                    turn.record(&result);
                }
            }
            4 => {
                let result = session.evacuate();
                turn.record(&result);
            }
            _ => session.click_void(),
        }
        turn
    }
}

fn evacuate_in_crisis(session: &mut Session, turn: &mut PolicyTurn) -> bool {
    if !session.run().cataclysm.crisis_mode {
        return false;
    }
    if !session.quote_evacuation().is_ok_and(|quote| quote.gain >= 1) {
        return false;
    }
    let result = session.evacuate();
    turn.record(&result);
    result.is_ok()
}

fn research_everything(session: &mut Session, turn: &mut PolicyTurn) {
    let catalog = session.shared_catalog();
    let affordable: Vec<String> = available_techs(session.run(), &catalog)
        .filter(|def| session.run().resources.info >= def.cost.info)
        .map(|def| def.id.clone())
        .collect();
    for key in affordable {
        let result = session.research(&key);
        turn.record(&result);
    }
}

fn build_affordable_projects(session: &mut Session, turn: &mut PolicyTurn) {
    let catalog = session.shared_catalog();
    let affordable: Vec<String> = available_projects(session.run(), &catalog)
        .filter(|def| session.run().resources.can_afford(&def.requirements))
        .map(|def| def.id.clone())
        .collect();
    for key in affordable {
        let result = session.start_project(&key);
        turn.record(&result);
    }
}

/// Buy the cheapest affordable level until nothing is affordable.
fn buy_cheapest(session: &mut Session, turn: &mut PolicyTurn) {
    let catalog = session.shared_catalog();
    let mode = if buy_mode_available(session.run(), BuyMode::Max) {
        BuyMode::Max
    } else {
        BuyMode::One
    };
    for _ in 0..catalog.upgrades.len().saturating_mul(64) {
        let cheapest = visible_upgrades(session.run(), &catalog)
            .filter_map(|def| session.quote_purchase(&def.id, BuyMode::One).ok())
            .min_by(|a, b| a.total_cost.total_cmp(&b.total_cost));
        let Some(quote) = cheapest else {
            break;
        };
        let result = session.purchase(&quote.key, mode);
        turn.record(&result);
        if result.is_err() {
            break;
        }
    }
}

fn harvestable_nodes(session: &Session) -> Vec<String> {
    session
        .run()
        .nodes
        .iter()
        .filter(|node| node.state == NodeState::Uncontacted)
        .filter(|node| {
            session
                .catalog()
                .node(&node.id)
                .is_some_and(|def| def.kind == univa_game::NodeKind::Resource)
        })
        .map(|node| node.id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use univa_game::{EconomyConfig, catalog};

    fn session() -> Session {
        Session::new(catalog(), EconomyConfig::default())
    }

    #[test]
    fn idle_policy_never_acts() {
        let mut session = session();
        session.run_mut().resources.energy = 1e6;
        let turn = GameplayStrategy::Idle.create_policy(1).act(&mut session);
        assert_eq!(turn, PolicyTurn::default());
        assert_eq!(session.run().total_upgrades_purchased, 0);
    }

    #[test]
    fn greedy_spends_until_broke() {
        let mut session = session();
        session.run_mut().resources.energy = 500.0;
        let turn = GameplayStrategy::Greedy.create_policy(1).act(&mut session);
        assert!(turn.actions > 3);
        assert!(
            session
                .quote_purchase("energy_collector", univa_game::BuyMode::One)
                .is_err()
        );
    }

    #[test]
    fn greedy_evacuates_only_in_crisis() {
        let mut policy = GameplayStrategy::Greedy.create_policy(1);
        let mut session = session();
        session.run_mut().reach = 8e5;
        session.tick(0.0);
        policy.act(&mut session);
        assert_eq!(session.run().prestige.archived_data, 0);

        session.run_mut().reach = 9.2e5;
        session.tick(0.0);
        policy.act(&mut session);
        assert_eq!(session.run().prestige.archived_data, 1);
    }

    #[test]
    fn clicker_starts_harvests() {
        let mut session = session();
        GameplayStrategy::Clicker
            .create_policy(1)
            .act(&mut session);
        assert_eq!(
            session.run().node("resource-0").map(|node| node.state),
            Some(NodeState::Harvesting)
        );
        assert!(session.run().resources.energy > 0.0);
    }

    #[test]
    fn random_policy_is_seeded() {
        let play = |seed| {
            let mut session = session();
            let mut policy = GameplayStrategy::Random.create_policy(seed);
            for _ in 0..200 {
                session.tick(1.0);
                policy.act(&mut session);
            }
            session.run().clone()
        };
        assert_eq!(play(7), play(7));
    }
}
