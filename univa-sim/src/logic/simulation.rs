use std::sync::Arc;

use serde::{Deserialize, Serialize};
use univa_game::snapshot::{self, ExportBundle, HeroSnapshot, RunSnapshot};
use univa_game::{Catalog, EconomyConfig, GameEvent, PrestigeWallet, Resource, Session};

use crate::logic::policy::{GameplayStrategy, PlayerPolicy};

/// Seconds of run clock simulated by default.
pub const DEFAULT_SIM_SECONDS: f64 = 3600.0;

/// What to play and for how long.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationPlan {
    pub strategy: GameplayStrategy,
    /// Seconds of run clock to simulate.
    pub duration: f64,
    /// Tick delta in seconds.
    pub step: f64,
    /// Export and re-import the session when the run ends.
    pub verify_round_trip: bool,
}

impl SimulationPlan {
    #[must_use]
    pub const fn new(strategy: GameplayStrategy) -> Self {
        Self {
            strategy,
            duration: DEFAULT_SIM_SECONDS,
            step: 1.0,
            verify_round_trip: false,
        }
    }

    #[must_use]
    pub const fn with_duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    #[must_use]
    pub const fn with_step(mut self, step: f64) -> Self {
        self.step = step;
        self
    }

    #[must_use]
    pub const fn with_round_trip(mut self) -> Self {
        self.verify_round_trip = true;
        self
    }
}

/// Event tallies over a whole simulation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCounts {
    pub upgrades: u64,
    pub techs: u64,
    pub projects_completed: u64,
    pub challenges_completed: u64,
    pub evacuations: u64,
    pub crises: u64,
    pub harvests: u64,
    pub hero_level_ups: u64,
    pub run_achievements: u64,
}

impl EventCounts {
    fn observe(&mut self, event: &GameEvent) {
        match event {
            GameEvent::UpgradePurchased { .. } => self.upgrades += 1,
            GameEvent::TechResearched { .. } => self.techs += 1,
            GameEvent::ProjectCompleted { .. } => self.projects_completed += 1,
            GameEvent::ChallengeCompleted { .. } => self.challenges_completed += 1,
            GameEvent::Evacuated { .. } => self.evacuations += 1,
            GameEvent::CataclysmCrisis { .. } => self.crises += 1,
            GameEvent::NodeHarvested { .. } => self.harvests += 1,
            GameEvent::HeroLevelUp { .. } => self.hero_level_ups += 1,
            GameEvent::RunAchievementUnlocked { .. } => self.run_achievements += 1,
            _ => {}
        }
    }
}

/// Outcome of one simulated play-through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub strategy: GameplayStrategy,
    pub seed: u64,
    pub ticks: u64,
    pub clock: f64,
    pub reach: f64,
    /// Highest reach seen before any reset.
    pub peak_reach: f64,
    pub energy_rate: f64,
    pub kardashev_tier: u8,
    pub prestige: PrestigeWallet,
    pub hero_total_level: u64,
    pub upgrades_purchased: u64,
    pub actions: u64,
    pub rejected_actions: u64,
    pub events: EventCounts,
    /// Invariant breaches observed while playing; empty on a healthy run.
    pub violations: Vec<String>,
}

/// Deterministic play-through harness.
pub struct SimulationSession {
    session: Session,
    policy: Box<dyn PlayerPolicy>,
    plan: SimulationPlan,
    seed: u64,
    ticks: u64,
    peak_reach: f64,
    actions: u64,
    rejected_actions: u64,
    events: EventCounts,
    violations: Vec<String>,
}

impl SimulationSession {
    #[must_use]
    pub fn new(
        catalog: Arc<Catalog>,
        config: EconomyConfig,
        plan: SimulationPlan,
        seed: u64,
    ) -> Self {
        Self {
            session: Session::new(catalog, config),
            policy: plan.strategy.create_policy(seed),
            plan,
            seed,
            ticks: 0,
            peak_reach: 0.0,
            actions: 0,
            rejected_actions: 0,
            events: EventCounts::default(),
            violations: Vec::new(),
        }
    }

    /// Advance one step: tick, then let the policy act.
    pub fn step(&mut self) {
        let before = Progress::of(&self.session);
        let batch = self.session.tick(self.plan.step);
        self.ticks += 1;

        let turn = self.policy.act(&mut self.session);
        self.actions += u64::from(turn.actions);
        self.rejected_actions += u64::from(turn.rejected);

        let actions = self.session.drain_events();
        let mut reset = false;
        for event in batch.iter().chain(actions.iter()) {
            if matches!(event, GameEvent::Evacuated { .. } | GameEvent::ChallengeStarted { .. }) {
                reset = true;
            }
            self.events.observe(event);
        }
        self.peak_reach = self.peak_reach.max(self.session.run().reach);
        self.check_invariants(&before, reset);
    }

    fn check_invariants(&mut self, before: &Progress, reset: bool) {
        let after = Progress::of(&self.session);
        let clock = after.clock;
        if !reset && after.reach < before.reach {
            self.violation(format!("reach fell from {} to {}", before.reach, after.reach));
        }
        if after.hero_total < before.hero_total {
            self.violation(format!("hero level fell at clock {clock}"));
        }
        if after.prestige_total < before.prestige_total && !reset {
            self.violation(format!("prestige currency fell at clock {clock}"));
        }
        for resource in Resource::ALL {
            let amount = self.session.run().resources.get(resource);
            if !amount.is_finite() || amount < 0.0 {
                self.violation(format!("{} is {amount} at clock {clock}", resource.key()));
            }
        }
    }

    fn violation(&mut self, message: String) {
        log::warn!("{} seed {}: {message}", self.policy.name(), self.seed);
        self.violations.push(message);
    }

    /// Play the whole plan and summarize it.
    #[must_use]
    pub fn run(mut self) -> SimulationSummary {
        let steps = plan_steps(&self.plan);
        for _ in 0..steps {
            self.step();
        }
        if self.plan.verify_round_trip {
            self.verify_round_trip();
        }
        self.summarize()
    }

    fn verify_round_trip(&mut self) {
        let catalog = self.session.shared_catalog();
        let bundle = ExportBundle {
            run: RunSnapshot::capture(self.session.run(), &catalog),
            hero: HeroSnapshot::capture(self.session.hero()),
        };
        let restored =
            snapshot::export_blob(&bundle).and_then(|blob| snapshot::import_blob(&blob));
        match restored {
            Ok(imported) => {
                let run = imported.run.restore(&catalog);
                if run.upgrades != self.session.run().upgrades
                    || run.techs != self.session.run().techs
                    || run.resources != self.session.run().resources
                {
                    self.violation("export round trip changed the run".to_string());
                }
            }
            Err(err) => self.violation(format!("export round trip failed: {err}")),
        }
    }

    fn summarize(self) -> SimulationSummary {
        let run = self.session.run();
        SimulationSummary {
            strategy: self.plan.strategy,
            seed: self.seed,
            ticks: self.ticks,
            clock: run.clock,
            reach: run.reach,
            peak_reach: self.peak_reach,
            energy_rate: run.rates.energy,
            kardashev_tier: run.kardashev_tier,
            prestige: run.prestige,
            hero_total_level: self.session.hero().total_level,
            upgrades_purchased: run.total_upgrades_purchased,
            actions: self.actions,
            rejected_actions: self.rejected_actions,
            events: self.events,
            violations: self.violations,
        }
    }
}

struct Progress {
    clock: f64,
    reach: f64,
    hero_total: u64,
    prestige_total: u64,
}

impl Progress {
    fn of(session: &Session) -> Self {
        let prestige = session.run().prestige;
        Self {
            clock: session.run().clock,
            reach: session.run().reach,
            hero_total: session.hero().total_level,
            prestige_total: prestige
                .archived_data
                .saturating_add(prestige.hardened_blueprints)
                .saturating_add(prestige.genetic_archives),
        }
    }
}

fn plan_steps(plan: &SimulationPlan) -> u64 {
    if plan.step <= 0.0 || !plan.duration.is_finite() {
        return 0;
    }
    univa_game::numbers::floor_f64_to_u64((plan.duration / plan.step).ceil())
}
