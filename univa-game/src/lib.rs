//! Univa Idle Game Engine
//!
//! Platform-agnostic progression and economy engine for the Univa Idle
//! incremental game: resources, upgrades, tech, projects, challenges,
//! cataclysm prestige, the hero card and resource nodes. No UI and no I/O
//! beyond the [`GameStorage`] trait.

pub mod bonus;
pub mod cataclysm;
pub mod catalog;
pub mod challenges;
pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod hero;
pub mod nodes;
pub mod numbers;
pub mod projects;
pub mod rates;
pub mod resources;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod tech;
pub mod upgrades;

use anyhow::Context;
use std::cell::RefCell;
use std::collections::HashMap;
use std::convert::Infallible;
use std::rc::Rc;
use std::sync::Arc;

// Re-export commonly used types
pub use bonus::{BonusKind, BonusMap, BonusStack, Unlock};
pub use cataclysm::{
    CataclysmKind, CataclysmPhase, CataclysmState, EvacuationQuote, crisis_cost_multiplier,
    current_band, quote_evacuation,
};
pub use catalog::{
    AchievementDef, CataclysmDef, Catalog, CatalogError, CatalogSources, ChallengeDef,
    KardashevDef, NodeDef, ProjectDef, TechDef, UpgradeDef, UpgradeRole, catalog,
};
pub use challenges::{
    ChallengeFailure, ChallengeOutcome, GoalTargets, available_challenges, goal_targets,
};
pub use config::{ConfigError, EconomyConfig};
pub use constants::{HERO_STORAGE_KEY, RUN_STORAGE_KEY, SNAPSHOT_SCHEMA_VERSION};
pub use error::{ActionError, ActionResult, Requirement};
pub use events::{EventBatch, EventSink, GameEvent};
pub use hero::{AchievementProgress, HeroCard, LadderStep};
pub use nodes::{ClickOutcome, NodeKind, NodeRuntime, NodeState};
pub use projects::available_projects;
pub use rates::{RateBreakdown, Rates, compose_rates};
pub use resources::{PrestigeCurrency, PrestigeWallet, Resource, Wallet};
pub use session::Session;
pub use snapshot::{ExportBundle, HeroSnapshot, RunSnapshot, SnapshotError};
pub use state::{RunAchievement, RunState};
pub use tech::{TechStatus, available_techs, tech_status};
pub use upgrades::{BuyMode, PurchaseQuote, buy_mode_available, visible_upgrades};

/// Key-value persistence for snapshots.
/// Platform-specific implementations should provide this
pub trait GameStorage {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn read(&self, key: &str) -> Result<Option<String>, Self::Error>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be written.
    fn write(&self, key: &str, value: &str) -> Result<(), Self::Error>;

    /// Delete the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be removed.
    fn remove(&self, key: &str) -> Result<(), Self::Error>;
}

/// In-process storage; clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl GameStorage for MemoryStorage {
    type Error = Infallible;

    fn read(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// Read and parse one snapshot, discarding it when it does not parse.
fn load_snapshot<S, T>(storage: &S, key: &str) -> anyhow::Result<Option<T>>
where
    S: GameStorage,
    T: serde::de::DeserializeOwned,
{
    let Some(json) = storage
        .read(key)
        .with_context(|| format!("reading `{key}`"))?
    else {
        return Ok(None);
    };
    match snapshot::from_json(&json) {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(err) => {
            log::warn!("discarding unreadable save `{key}`: {err}");
            storage
                .remove(key)
                .with_context(|| format!("removing `{key}`"))?;
            Ok(None)
        }
    }
}

/// Main game engine: a session bound to its storage.
///
/// Saves both aggregates every `autosave_interval` seconds of run clock and
/// immediately after evacuations, challenge starts and completions.
pub struct GameEngine<S>
where
    S: GameStorage,
{
    storage: S,
    session: Session,
    sink: Option<Box<dyn EventSink>>,
    last_save: f64,
}

impl<S> GameEngine<S>
where
    S: GameStorage,
{
    /// Load the saved hero card and run, or start fresh when none is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be read.
    pub fn boot(storage: S, catalog: Arc<Catalog>, config: EconomyConfig) -> anyhow::Result<Self> {
        let session = Self::load_session(&storage, catalog, config)?;
        let last_save = session.run().clock;
        Ok(Self {
            storage,
            session,
            sink: None,
            last_save,
        })
    }

    fn load_session(
        storage: &S,
        catalog: Arc<Catalog>,
        config: EconomyConfig,
    ) -> anyhow::Result<Session> {
        let hero = load_snapshot::<S, HeroSnapshot>(storage, HERO_STORAGE_KEY)?
            .map_or_else(|| HeroCard::new(&catalog), |snapshot| snapshot.restore(&catalog));
        let run = load_snapshot::<S, RunSnapshot>(storage, RUN_STORAGE_KEY)?.map_or_else(
            || {
                log::debug!("no saved run; starting fresh");
                RunState::new(&catalog)
            },
            |snapshot| snapshot.restore(&catalog),
        );
        Ok(Session::from_parts(run, hero, catalog, config))
    }

    /// Forward every future event to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: impl EventSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub const fn storage(&self) -> &S {
        &self.storage
    }

    fn forward(&mut self, events: &EventBatch) {
        if let Some(sink) = self.sink.as_mut() {
            for event in events {
                sink.notify(event);
            }
        }
    }

    fn save_if_due(&mut self) -> anyhow::Result<()> {
        let requested = self.session.take_save_request();
        let elapsed = self.session.run().clock - self.last_save;
        let due = elapsed >= self.session.config().autosave_interval;
        if requested || due {
            self.save()?;
        }
        Ok(())
    }

    /// Advance the session and auto-save when due.
    ///
    /// # Errors
    ///
    /// Returns an error if an auto-save fails.
    pub fn tick(&mut self, dt: f64) -> anyhow::Result<EventBatch> {
        let events = self.session.tick(dt);
        self.forward(&events);
        self.save_if_due()?;
        Ok(events)
    }

    /// Run a player action, forwarding its events and saving if it asked for it.
    ///
    /// # Errors
    ///
    /// The outer error is a storage failure; the inner one is the action's rejection.
    pub fn act<T>(
        &mut self,
        action: impl FnOnce(&mut Session) -> ActionResult<T>,
    ) -> anyhow::Result<ActionResult<T>> {
        let outcome = action(&mut self.session);
        let events = self.session.drain_events();
        self.forward(&events);
        self.save_if_due()?;
        Ok(outcome)
    }

    /// Persist both aggregates.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or storage fails.
    pub fn save(&mut self) -> anyhow::Result<()> {
        let catalog = self.session.catalog();
        let run = snapshot::to_json(&RunSnapshot::capture(self.session.run(), catalog))?;
        let hero = snapshot::to_json(&HeroSnapshot::capture(self.session.hero()))?;
        self.storage
            .write(RUN_STORAGE_KEY, &run)
            .context("writing run snapshot")?;
        self.storage
            .write(HERO_STORAGE_KEY, &hero)
            .context("writing hero snapshot")?;
        self.last_save = self.session.run().clock;
        log::debug!("saved at clock {:.1}", self.last_save);
        Ok(())
    }

    /// Encode the current session as a shareable blob.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn export(&self) -> Result<String, SnapshotError> {
        snapshot::export_blob(&ExportBundle {
            run: RunSnapshot::capture(self.session.run(), self.session.catalog()),
            hero: HeroSnapshot::capture(self.session.hero()),
        })
    }

    /// Replace the stored snapshots with an imported blob and reload.
    ///
    /// # Errors
    ///
    /// Returns an error for a rejected blob or a storage failure; the current
    /// session is kept in either case.
    pub fn import(&mut self, blob: &str) -> anyhow::Result<()> {
        let bundle = snapshot::import_blob(blob).context("importing save")?;
        self.storage
            .write(RUN_STORAGE_KEY, &snapshot::to_json(&bundle.run)?)
            .context("writing imported run")?;
        self.storage
            .write(HERO_STORAGE_KEY, &snapshot::to_json(&bundle.hero)?)
            .context("writing imported hero")?;

        let catalog = self.session.shared_catalog();
        let config = self.session.config().clone();
        self.session = Self::load_session(&self.storage, catalog, config)?;
        self.last_save = self.session.run().clock;
        log::info!("imported save");
        Ok(())
    }

    /// Delete both snapshots and start over with a fresh run and hero card.
    ///
    /// # Errors
    ///
    /// Returns an error if storage cannot be cleared.
    pub fn wipe(&mut self) -> anyhow::Result<()> {
        self.storage.remove(RUN_STORAGE_KEY)?;
        self.storage.remove(HERO_STORAGE_KEY)?;
        let catalog = self.session.shared_catalog();
        let config = self.session.config().clone();
        self.session = Session::new(catalog, config);
        self.last_save = self.session.run().clock;
        Ok(())
    }
}
