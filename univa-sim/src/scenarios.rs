use serde::{Deserialize, Serialize};

use crate::logic::{GameplayStrategy, SimulationPlan, SimulationSummary};

/// Thresholds a summary must meet for a scenario to pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Expectations {
    pub min_peak_reach: f64,
    pub min_evacuations: u64,
    pub min_harvests: u64,
    pub min_hero_level: u64,
    pub min_upgrades: u64,
}

impl Expectations {
    /// Describe the first unmet expectation, if any.
    #[must_use]
    pub fn evaluate(&self, summary: &SimulationSummary) -> Option<String> {
        if let Some(first) = summary.violations.first() {
            return Some(format!("invariant broken: {first}"));
        }
        if summary.peak_reach < self.min_peak_reach {
            return Some(format!(
                "peak reach {:.0} below {:.0}",
                summary.peak_reach, self.min_peak_reach
            ));
        }
        if summary.events.evacuations < self.min_evacuations {
            return Some(format!(
                "{} evacuations, expected at least {}",
                summary.events.evacuations, self.min_evacuations
            ));
        }
        if summary.events.harvests < self.min_harvests {
            return Some(format!(
                "{} node harvests, expected at least {}",
                summary.events.harvests, self.min_harvests
            ));
        }
        if summary.hero_total_level < self.min_hero_level {
            return Some(format!(
                "hero level {} below {}",
                summary.hero_total_level, self.min_hero_level
            ));
        }
        if summary.upgrades_purchased < self.min_upgrades {
            return Some(format!(
                "{} upgrades bought, expected at least {}",
                summary.upgrades_purchased, self.min_upgrades
            ));
        }
        None
    }
}

#[derive(Debug, Clone)]
pub struct TestScenario {
    pub name: &'static str,
    pub description: &'static str,
    pub plan: SimulationPlan,
    pub expect: Expectations,
}

fn smoke() -> TestScenario {
    TestScenario {
        name: "smoke",
        description: "Idle for a minute; passive production only",
        plan: SimulationPlan::new(GameplayStrategy::Idle).with_duration(60.0),
        expect: Expectations {
            min_peak_reach: 1000.0,
            ..Expectations::default()
        },
    }
}

fn first_evacuation() -> TestScenario {
    TestScenario {
        name: "first-evacuation",
        description: "Greedy buyer survives the asteroid within an hour",
        plan: SimulationPlan::new(GameplayStrategy::Greedy),
        expect: Expectations {
            min_peak_reach: 7e5,
            min_evacuations: 1,
            min_upgrades: 25,
            ..Expectations::default()
        },
    }
}

fn node_harvesting() -> TestScenario {
    TestScenario {
        name: "node-harvesting",
        description: "Clicker harvests orbiting nodes and levels the hero card",
        plan: SimulationPlan::new(GameplayStrategy::Clicker).with_duration(600.0),
        expect: Expectations {
            min_harvests: 1,
            min_hero_level: 10,
            ..Expectations::default()
        },
    }
}

fn random_walk() -> TestScenario {
    TestScenario {
        name: "random-walk",
        description: "Seeded random actions never break an invariant",
        plan: SimulationPlan::new(GameplayStrategy::Random).with_duration(1800.0),
        expect: Expectations::default(),
    }
}

fn save_round_trip() -> TestScenario {
    TestScenario {
        name: "save-round-trip",
        description: "Export blob of a played run imports unchanged",
        plan: SimulationPlan::new(GameplayStrategy::Greedy)
            .with_duration(900.0)
            .with_round_trip(),
        expect: Expectations {
            min_upgrades: 10,
            ..Expectations::default()
        },
    }
}

#[must_use]
pub fn get_all_scenarios() -> Vec<TestScenario> {
    vec![
        smoke(),
        first_evacuation(),
        node_harvesting(),
        random_walk(),
        save_round_trip(),
    ]
}

#[must_use]
pub fn get_scenario(name: &str) -> Option<TestScenario> {
    get_all_scenarios()
        .into_iter()
        .find(|scenario| scenario.name == name)
}

#[must_use]
pub fn list_scenarios() -> Vec<(&'static str, &'static str)> {
    get_all_scenarios()
        .iter()
        .map(|scenario| (scenario.name, scenario.description))
        .collect()
}
