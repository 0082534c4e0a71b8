//! The playable session: one run, one hero card, and the loop that drives them.
//!
//! `Session` owns both aggregates and is the only place that sequences the
//! engines. Every player action ends with a rate recomposition so the rates
//! stored on the run always reflect the state that produced them.
use std::sync::Arc;

use crate::bonus::BonusKind;
use crate::cataclysm::{self, EvacuationQuote};
use crate::catalog::Catalog;
use crate::challenges::{self, ChallengeOutcome, ChallengeResult, reward_factor};
use crate::config::EconomyConfig;
use crate::constants::EVENT_BUFFER_LIMIT;
use crate::error::{ActionError, ActionResult};
use crate::events::{EventBatch, GameEvent};
use crate::hero::{HeroCard, LadderStep, keys};
use crate::nodes::{self, ClickOutcome, ComboState, NodeState};
use crate::numbers::sanitize_delta;
use crate::projects;
use crate::rates::{RateBreakdown, compose_rates};
use crate::resources::Resource;
use crate::state::RunState;
use crate::tech;
use crate::upgrades::{self, BuyMode, PurchaseQuote};

#[derive(Debug, Clone)]
pub struct Session {
    run: RunState,
    hero: HeroCard,
    catalog: Arc<Catalog>,
    config: EconomyConfig,
    breakdown: RateBreakdown,
    events: EventBatch,
    save_requested: bool,
}

impl Session {
    /// Fresh run and hero card.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, config: EconomyConfig) -> Self {
        let run = RunState::new(&catalog);
        let hero = HeroCard::new(&catalog);
        Self::from_parts(run, hero, catalog, config)
    }

    /// Resume from loaded aggregates, aligning both with the catalog.
    #[must_use]
    pub fn from_parts(
        mut run: RunState,
        mut hero: HeroCard,
        catalog: Arc<Catalog>,
        config: EconomyConfig,
    ) -> Self {
        run.reconcile(&catalog);
        run.refresh_kardashev(&catalog);
        hero.reconcile(&catalog);
        let breakdown = compose_rates(&run, &hero, &catalog, &config);
        run.rates = breakdown.rates;
        Self {
            run,
            hero,
            catalog,
            config,
            breakdown,
            events: EventBatch::new(),
            save_requested: false,
        }
    }

    #[must_use]
    pub const fn run(&self) -> &RunState {
        &self.run
    }

    /// Direct access for tooling. Call [`Session::recompose`] after editing.
    pub const fn run_mut(&mut self) -> &mut RunState {
        &mut self.run
    }

    #[must_use]
    pub const fn hero(&self) -> &HeroCard {
        &self.hero
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Shared handle to the catalog this session plays against.
    #[must_use]
    pub fn shared_catalog(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub const fn config(&self) -> &EconomyConfig {
        &self.config
    }

    /// Stage-by-stage result of the last recomposition.
    #[must_use]
    pub const fn breakdown(&self) -> &RateBreakdown {
        &self.breakdown
    }

    /// Split into the run and hero aggregates.
    #[must_use]
    pub fn into_parts(self) -> (RunState, HeroCard) {
        (self.run, self.hero)
    }

    /// Rebuild every rate from the current state.
    pub fn recompose(&mut self) {
        self.breakdown = compose_rates(&self.run, &self.hero, &self.catalog, &self.config);
        self.run.rates = self.breakdown.rates;
    }

    fn emit(&mut self, event: GameEvent) {
        if self.events.len() >= EVENT_BUFFER_LIMIT {
            self.events.remove(0);
        }
        self.events.push(event);
    }

    /// Take the events produced since the last drain.
    pub fn drain_events(&mut self) -> EventBatch {
        std::mem::take(&mut self.events)
    }

    /// Whether an action asked for an immediate save; clears the request.
    pub const fn take_save_request(&mut self) -> bool {
        let requested = self.save_requested;
        self.save_requested = false;
        requested
    }

    /// Advance the run by `dt` seconds and return the events produced since the last drain.
    pub fn tick(&mut self, dt: f64) -> EventBatch {
        let dt = sanitize_delta(dt);
        let rates = self.run.rates;
        for resource in Resource::ALL {
            self.run.resources.credit(resource, rates.get(resource) * dt);
        }
        self.run.reach += rates.energy * dt;
        self.run.clock += dt;
        if self
            .run
            .combo
            .last_click
            .is_some_and(|last| self.run.clock - last >= self.config.click.combo_window)
        {
            self.run.combo = ComboState::default();
        }

        self.run.refresh_kardashev(&self.catalog);
        self.update_cataclysm();
        self.update_nodes(dt);
        self.update_projects();
        self.update_run_achievements();
        self.update_challenges();
        self.recompose();
        self.drain_events()
    }

    fn update_cataclysm(&mut self) {
        let update =
            cataclysm::update_cataclysm(&mut self.run, &self.catalog, &self.config.cataclysm);
        if let Some(kind) = update.entered {
            log::debug!("cataclysm approaching: {kind:?}");
            self.emit(GameEvent::CataclysmApproaching { kind });
        }
        if let Some(kind) = update.warned {
            self.emit(GameEvent::CataclysmWarning { kind });
        }
        if let Some(kind) = update.crisis {
            log::debug!("cataclysm crisis: {kind:?}");
            self.emit(GameEvent::CataclysmCrisis { kind });
        }
        if update.cleared {
            self.emit(GameEvent::CataclysmReceded);
        }
    }

    fn update_nodes(&mut self, dt: f64) {
        let auto_factor = reward_factor(&self.run, &self.catalog, BonusKind::AutoHarvest);
        let harvests =
            nodes::tick_nodes(&mut self.run, &self.catalog, &self.config.nodes, dt, auto_factor);
        for harvest in harvests {
            if !harvest.automatic {
                self.credit_hero(keys::NODE_HARVESTER, 1);
            }
            self.emit(GameEvent::NodeHarvested {
                node: harvest.node,
                gain: harvest.gain,
                automatic: harvest.automatic,
            });
        }
    }

    fn update_projects(&mut self) {
        for completion in projects::tick_projects(&mut self.run, &self.catalog) {
            self.emit(GameEvent::ProjectCompleted { key: completion.id });
            if let Some(tier) = completion.tier {
                self.emit(GameEvent::KardashevAdvanced { tier });
            }
        }
    }

    fn update_run_achievements(&mut self) {
        for achievement in upgrades::check_run_achievements(&mut self.run, &self.config) {
            self.emit(GameEvent::RunAchievementUnlocked { achievement });
        }
    }

    fn update_challenges(&mut self) {
        let results = challenges::check_challenges(&mut self.run, &self.catalog);
        self.push_challenge_results(results);
    }

    fn push_challenge_results(&mut self, results: impl IntoIterator<Item = ChallengeResult>) {
        for ChallengeResult { id, outcome } in results {
            match outcome {
                ChallengeOutcome::Completed { completions } => {
                    self.save_requested = true;
                    self.emit(GameEvent::ChallengeCompleted {
                        key: id,
                        completions,
                    });
                }
                ChallengeOutcome::Failed(reason) => {
                    self.emit(GameEvent::ChallengeFailed { key: id, reason });
                }
            }
        }
    }

    /// Credit `times` completions of a hero achievement, reporting level changes.
    fn credit_hero(&mut self, key: &str, times: u32) {
        let before = self.hero.progress(key).map_or(0, |progress| progress.level);
        let mut level = before;
        for _ in 0..times {
            match self.hero.increment(&self.catalog, key, &self.config.hero) {
                Ok(next) => level = next,
                Err(err) => {
                    log::debug!("hero increment skipped: {err}");
                    return;
                }
            }
        }
        if level != before {
            self.emit(GameEvent::HeroLevelUp {
                key: key.to_string(),
                level,
            });
        }
    }

    /// Price a purchase without performing it.
    ///
    /// # Errors
    ///
    /// See [`upgrades::quote`].
    pub fn quote_purchase(&self, key: &str, mode: BuyMode) -> ActionResult<PurchaseQuote> {
        upgrades::quote(&self.run, &self.catalog, &self.config, key, mode)
    }

    /// Buy upgrade levels.
    ///
    /// # Errors
    ///
    /// See [`upgrades::quote`]; the run is unchanged on error.
    pub fn purchase(&mut self, key: &str, mode: BuyMode) -> ActionResult<PurchaseQuote> {
        let quote = upgrades::purchase(&mut self.run, &self.catalog, &self.config, key, mode)?;
        self.emit(GameEvent::UpgradePurchased {
            key: quote.key.clone(),
            count: quote.count,
            level: quote.new_level,
        });
        self.credit_hero(keys::BULK_BUYER, quote.count);
        self.update_run_achievements();
        self.recompose();
        Ok(quote)
    }

    /// Research a tech node.
    ///
    /// # Errors
    ///
    /// Reach, prerequisite, tier and info-cost rejections; see [`ActionError`].
    pub fn research(&mut self, key: &str) -> ActionResult<()> {
        let advanced = tech::research(&mut self.run, &self.catalog, key)?;
        self.emit(GameEvent::TechResearched { key: key.to_string() });
        if let Some(tier) = advanced {
            log::info!("Kardashev tier {tier} reached");
            self.emit(GameEvent::KardashevAdvanced { tier });
        }
        self.run.refresh_kardashev(&self.catalog);
        self.recompose();
        Ok(())
    }

    /// Start building a project.
    ///
    /// # Errors
    ///
    /// Unknown, completed, already running, or unaffordable projects.
    pub fn start_project(&mut self, key: &str) -> ActionResult<()> {
        projects::start_project(&mut self.run, &self.catalog, key)?;
        self.emit(GameEvent::ProjectStarted { key: key.to_string() });
        self.recompose();
        Ok(())
    }

    /// Hard-reset the run into a challenge.
    ///
    /// # Errors
    ///
    /// Unknown, already active, or exhausted challenges.
    pub fn start_challenge(&mut self, key: &str) -> ActionResult<()> {
        challenges::start_challenge(&mut self.run, &self.catalog, key)?;
        self.emit(GameEvent::ChallengeStarted { key: key.to_string() });
        self.save_requested = true;
        self.recompose();
        Ok(())
    }

    fn survival_reward(&self) -> f64 {
        reward_factor(&self.run, &self.catalog, BonusKind::SurvivalBonus)
    }

    /// What evacuating right now would pay.
    ///
    /// # Errors
    ///
    /// `PrerequisiteNotMet` when no cataclysm is approaching.
    pub fn quote_evacuation(&self) -> ActionResult<EvacuationQuote> {
        cataclysm::quote_evacuation(
            &self.run,
            &self.catalog,
            &self.config.cataclysm,
            self.survival_reward(),
        )
    }

    /// Evacuate the approaching cataclysm.
    ///
    /// # Errors
    ///
    /// `PrerequisiteNotMet` when no cataclysm is approaching or the gain is below 1.
    pub fn evacuate(&mut self) -> ActionResult<EvacuationQuote> {
        let survival = self.survival_reward();
        let quote =
            cataclysm::evacuate(&mut self.run, &self.catalog, &self.config.cataclysm, survival)?;
        log::info!(
            "evacuated {:?}: +{} {:?}",
            quote.kind,
            quote.gain,
            quote.currency
        );
        self.emit(GameEvent::Evacuated {
            kind: quote.kind,
            currency: quote.currency,
            gain: quote.gain,
        });
        self.credit_hero(keys::PRESTIGE_VETERAN, 1);
        self.credit_hero(keys::SURVIVOR, 1);
        self.save_requested = true;
        self.recompose();
        Ok(quote)
    }

    /// Click a node: start a harvest on an uncontacted node or collect from an absorbed one.
    ///
    /// # Errors
    ///
    /// Unknown nodes, stars, and nodes already being harvested.
    pub fn click_node(&mut self, id: &str) -> ActionResult<ClickOutcome> {
        let state = self
            .run
            .node(id)
            .map(|node| node.state)
            .ok_or_else(|| ActionError::unknown("node", id))?;
        match state {
            NodeState::Uncontacted | NodeState::Harvesting => {
                nodes::begin_harvest(&mut self.run, &self.catalog, id)?;
                Ok(ClickOutcome::HarvestStarted)
            }
            NodeState::Absorbed => {
                let failed = challenges::register_click(&mut self.run, &self.catalog);
                if !failed.is_empty() {
                    self.push_challenge_results(failed);
                    self.recompose();
                    return Ok(ClickOutcome::Forfeited);
                }
                let (gain, combo) = nodes::collect_click(&mut self.run, &self.config.click);
                self.credit_hero(keys::CLICK_MASTER, 1);
                self.recompose();
                Ok(ClickOutcome::Collected { gain, combo })
            }
        }
    }

    /// A click that missed every node breaks the combo.
    pub fn click_void(&mut self) {
        self.run.combo = ComboState::default();
    }

    /// Convert a capped hero achievement level into a rank (or badge).
    ///
    /// # Errors
    ///
    /// Unknown achievements and levels below the cap.
    pub fn prestige_achievement(&mut self, key: &str) -> ActionResult<LadderStep> {
        let step = self.hero.prestige(key, &self.config.hero)?;
        let event = match step {
            LadderStep::RankUp(rank) => GameEvent::HeroRankUp {
                key: key.to_string(),
                rank,
            },
            LadderStep::BadgeUp(badge) => GameEvent::HeroBadgeUp {
                key: key.to_string(),
                badge,
                name: self.catalog.badge_name(badge),
            },
        };
        self.emit(event);
        self.save_requested = true;
        self.recompose();
        Ok(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::catalog;

    fn session() -> Session {
        Session::new(catalog(), EconomyConfig::default())
    }

    #[test]
    fn tick_accrues_on_the_run_clock() {
        let mut session = session();
        session.tick(2.0);
        let run = session.run();
        assert!((run.resources.energy - 40.0).abs() < 1e-9);
        assert!((run.reach - 40.0).abs() < 1e-9);
        assert!((run.clock - 2.0).abs() < f64::EPSILON);

        session.tick(-5.0);
        session.tick(f64::NAN);
        assert!((session.run().clock - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn purchase_updates_rates_and_hero() {
        let mut session = session();
        session.run_mut().resources.energy = 100.0;
        session.purchase("energy_collector", BuyMode::N(2)).unwrap();
        assert!((session.run().rates.energy - 24.0).abs() < 1e-9);
        assert_eq!(session.hero().progress(keys::BULK_BUYER).unwrap().level, 2);

        let events = session.drain_events();
        assert!(events.iter().any(|event| matches!(
            event,
            GameEvent::UpgradePurchased { count: 2, level: 2, .. }
        )));
        assert!(session.drain_events().is_empty());
    }

    #[test]
    fn rejected_action_changes_nothing() {
        let mut session = session();
        let before = session.run().clone();
        assert!(session.purchase("fusion_reactor", BuyMode::One).is_err());
        assert!(session.research("computing_logic").is_err());
        assert!(session.evacuate().is_err());
        assert_eq!(session.run(), &before);
        assert!(session.drain_events().is_empty());
    }

    #[test]
    fn crossing_a_band_emits_cataclysm_events() {
        let mut session = session();
        session.run_mut().reach = 9.5e5;
        let events = session.tick(0.0);
        assert!(events.contains(&GameEvent::CataclysmApproaching {
            kind: cataclysm::CataclysmKind::Asteroid
        }));
        assert!(events.contains(&GameEvent::CataclysmWarning {
            kind: cataclysm::CataclysmKind::Asteroid
        }));
        assert!(events.contains(&GameEvent::CataclysmCrisis {
            kind: cataclysm::CataclysmKind::Asteroid
        }));
        assert!(session.tick(0.0).is_empty());
    }

    #[test]
    fn evacuation_credits_currency_and_hero() {
        let mut session = session();
        session.run_mut().reach = 8.5e5;
        session.tick(0.0);
        let quote = session.evacuate().unwrap();
        assert_eq!(quote.gain, 1);
        assert_eq!(session.run().prestige.archived_data, 1);
        assert!(session.run().reach.abs() < f64::EPSILON);
        assert_eq!(session.hero().progress(keys::SURVIVOR).unwrap().level, 1);
        assert!(session.take_save_request());
        assert!(!session.take_save_request());
        assert!((session.breakdown().prestige - 1.01).abs() < 1e-12);
    }

    #[test]
    fn node_clicks_harvest_then_collect() {
        let mut session = session();
        assert_eq!(session.click_node("resource-0"), Ok(ClickOutcome::HarvestStarted));
        assert_eq!(session.hero().progress(keys::NODE_HARVESTER).unwrap().level, 0);
        assert!(session.click_node("resource-0").is_err());

        let outcome = session.click_node("earth").unwrap();
        assert_eq!(outcome, ClickOutcome::Collected { gain: 110.0, combo: 1 });
        let outcome = session.click_node("earth").unwrap();
        assert_eq!(outcome, ClickOutcome::Collected { gain: 120.0, combo: 2 });
        session.click_void();
        let outcome = session.click_node("earth").unwrap();
        assert_eq!(outcome, ClickOutcome::Collected { gain: 110.0, combo: 1 });

        session.tick(2.0);
        assert_eq!(session.hero().progress(keys::NODE_HARVESTER).unwrap().level, 1);
    }

    #[test]
    fn combo_expires_with_the_run_clock() {
        let mut session = session();
        session.click_node("earth").unwrap();
        session.tick(2.5);
        assert_eq!(session.run().combo, ComboState::default());
    }

    #[test]
    fn clicking_during_pacifist_forfeits() {
        let mut session = session();
        session.start_challenge("pacifist").unwrap();
        session.drain_events();
        assert_eq!(session.click_node("earth"), Ok(ClickOutcome::Forfeited));
        assert!(session.run().resources.energy.abs() < f64::EPSILON);
        let events = session.drain_events();
        assert!(matches!(
            events.as_slice(),
            [GameEvent::ChallengeFailed {
                reason: challenges::ChallengeFailure::Clicked,
                ..
            }]
        ));
    }

    #[test]
    fn achievement_prestige_emits_badge_name() {
        let mut session = session();
        let cfg = session.config().hero.clone();
        {
            let progress = session.hero.achievements.get_mut(keys::CLICK_MASTER).unwrap();
            progress.level = cfg.level_cap;
            progress.rank = cfg.rank_cap - 1;
        }
        assert_eq!(
            session.prestige_achievement(keys::CLICK_MASTER),
            Ok(LadderStep::BadgeUp(1))
        );
        assert!(session.drain_events().contains(&GameEvent::HeroBadgeUp {
            key: keys::CLICK_MASTER.into(),
            badge: 1,
            name: "Silver".into(),
        }));
    }
}
