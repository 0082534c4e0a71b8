use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use univa_game::snapshot::{self, export_blob, import_blob};
use univa_game::{
    BuyMode, EconomyConfig, ExportBundle, GameEngine, GameStorage, HERO_STORAGE_KEY, HeroCard,
    HeroSnapshot, MemoryStorage, NodeState, RUN_STORAGE_KEY, RunSnapshot, RunState,
    SnapshotError, catalog,
};

fn played_run() -> RunState {
    let catalog = catalog();
    let mut run = RunState::new(&catalog);
    run.resources.energy = 4321.25;
    run.resources.matter = 77.0;
    run.resources.info = 12.5;
    run.reach = 6.5e5;
    run.upgrades.get_mut("energy_collector").unwrap().level = 23;
    run.upgrades.get_mut("survival_bunker").unwrap().level = 2;
    run.techs.get_mut("materials_metallurgy").unwrap().researched = true;
    run.challenge_completions.insert("pacifist".into(), 4);
    run
}

#[test]
fn snapshot_round_trip_preserves_progress() {
    let catalog = catalog();
    let run = played_run();
    let json = snapshot::to_json(&RunSnapshot::capture(&run, &catalog)).unwrap();
    let restored = snapshot::from_json::<RunSnapshot>(&json)
        .unwrap()
        .restore(&catalog);

    for def in &catalog.upgrades {
        assert_eq!(
            restored.upgrade_level(&def.id),
            run.upgrade_level(&def.id),
            "{}",
            def.id
        );
    }
    for def in &catalog.techs {
        assert_eq!(restored.is_researched(&def.id), run.is_researched(&def.id));
    }
    assert_eq!(restored.resources, run.resources);
    assert_eq!(restored.challenge_completions("pacifist"), 4);
}

#[test]
fn snapshot_missing_new_entries_loads_them_fresh() {
    let catalog = catalog();
    let run = played_run();
    let mut value = serde_json::to_value(RunSnapshot::capture(&run, &catalog)).unwrap();
    let techs = value["run"]["techs"].as_object_mut().unwrap();
    techs.remove("computing_logic");
    let upgrades = value["run"]["upgrades"].as_object_mut().unwrap();
    upgrades.remove("auto_clicker");

    let restored = snapshot::from_json::<RunSnapshot>(&value.to_string())
        .unwrap()
        .restore(&catalog);
    assert!(!restored.is_researched("computing_logic"));
    assert!(restored.techs.contains_key("computing_logic"));
    assert_eq!(restored.upgrade_level("auto_clicker"), 0);
    assert_eq!(restored.upgrade_level("energy_collector"), 23);
}

#[test]
fn snapshot_drops_entries_the_catalog_no_longer_has() {
    let catalog = catalog();
    let run = played_run();
    let mut value = serde_json::to_value(RunSnapshot::capture(&run, &catalog)).unwrap();
    value["run"]["upgrades"]["warp_drive"] = serde_json::json!({ "level": 9 });

    let restored = snapshot::from_json::<RunSnapshot>(&value.to_string())
        .unwrap()
        .restore(&catalog);
    assert!(!restored.upgrades.contains_key("warp_drive"));
    assert_eq!(restored.upgrades.len(), catalog.upgrades.len());
}

#[test]
fn partial_node_entries_load_with_defaults() {
    let storage = MemoryStorage::new();
    let saved = serde_json::json!({
        "run": {
            "reach": 12345.0,
            "nodes": [
                { "id": "resource-0" },
                { "state": "absorbed" },
                { "id": "rogue-planet", "state": "harvesting" },
                { "id": "resource-3", "state": "absorbed", "harvest_count": 2 }
            ]
        }
    });
    storage.write(RUN_STORAGE_KEY, &saved.to_string()).unwrap();

    let engine =
        GameEngine::boot(storage.clone(), catalog(), EconomyConfig::default()).unwrap();
    let run = engine.session().run();
    assert!((run.reach - 12345.0).abs() < f64::EPSILON);
    assert_eq!(run.nodes.len(), catalog().nodes.len());
    assert!(run.node("rogue-planet").is_none());
    assert_eq!(run.node("resource-0").unwrap().state, NodeState::Uncontacted);
    let venus = run.node("resource-3").unwrap();
    assert_eq!(venus.state, NodeState::Absorbed);
    assert_eq!(venus.harvest_count, 2);
    assert!(storage.read(RUN_STORAGE_KEY).unwrap().is_some());
}

#[test]
fn hero_snapshot_survives_round_trip() {
    let catalog = catalog();
    let mut session = univa_game::Session::new(catalog.clone(), EconomyConfig::default());
    for _ in 0..3 {
        session.click_node("earth").unwrap();
    }
    let hero = session.hero().clone();
    let json = snapshot::to_json(&HeroSnapshot::capture(&hero)).unwrap();
    let restored = snapshot::from_json::<HeroSnapshot>(&json)
        .unwrap()
        .restore(&catalog);
    assert_eq!(restored, hero);
    assert_eq!(restored.total_level, 3);
}

#[test]
fn export_blob_rejects_tampering() {
    let catalog = catalog();
    let bundle = ExportBundle {
        run: RunSnapshot::capture(&played_run(), &catalog),
        hero: HeroSnapshot::capture(&HeroCard::new(&catalog)),
    };
    let blob = export_blob(&bundle).unwrap();
    assert_eq!(import_blob(&format!("  {blob}\n")).unwrap(), bundle);

    let (head, payload) = blob.rsplit_once(".{").unwrap();
    let forged = format!("{head}.{{{}", payload.replacen("23", "99", 1));
    assert!(matches!(
        import_blob(&forged),
        Err(SnapshotError::ChecksumMismatch)
    ));
    assert!(matches!(
        import_blob("univa1.zz.{}"),
        Err(SnapshotError::BadExportTag)
    ));
    assert!(matches!(
        import_blob("{\"run\": 5}"),
        Err(SnapshotError::Malformed(_))
    ));
}

/// Storage that fails every write after it is switched off.
#[derive(Clone, Default)]
struct FlakyStorage {
    inner: MemoryStorage,
    broken: Rc<RefCell<bool>>,
}

#[derive(Debug, thiserror::Error)]
#[error("disk full")]
struct DiskFull;

impl GameStorage for FlakyStorage {
    type Error = DiskFull;

    fn read(&self, key: &str) -> Result<Option<String>, Self::Error> {
        Ok(self.inner.read(key).unwrap_or_default())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), Self::Error> {
        if *self.broken.borrow() {
            return Err(DiskFull);
        }
        self.inner.write(key, value).map_err(|never| match never {})
    }

    fn remove(&self, key: &str) -> Result<(), Self::Error> {
        self.inner.remove(key).map_err(|never| match never {})
    }
}

#[test]
fn storage_failures_surface_without_losing_the_session() {
    let storage = FlakyStorage::default();
    let mut engine =
        GameEngine::boot(storage.clone(), catalog(), EconomyConfig::default()).unwrap();
    engine.tick(4.0).unwrap();
    *storage.broken.borrow_mut() = true;

    let err = engine.tick(8.0).unwrap_err();
    assert!(format!("{err:#}").contains("disk full"));
    assert!((engine.session().run().clock - 12.0).abs() < f64::EPSILON);

    *storage.broken.borrow_mut() = false;
    engine.save().unwrap();
    assert!(storage.inner.read(RUN_STORAGE_KEY).unwrap().is_some());
}

#[test]
fn engine_saves_on_evacuation_and_reloads() {
    let storage = MemoryStorage::new();
    let mut engine =
        GameEngine::boot(storage.clone(), catalog(), EconomyConfig::default()).unwrap();
    engine
        .act(|session| {
            session.run_mut().reach = 8.5e5;
            session.run_mut().resources.energy = 500.0;
            session.purchase("energy_collector", BuyMode::N(2)).map(|_| ())
        })
        .unwrap()
        .unwrap();
    assert_eq!(storage.read(RUN_STORAGE_KEY).unwrap(), None);

    engine.tick(0.0).unwrap();
    let quote = engine
        .act(univa_game::Session::evacuate)
        .unwrap()
        .unwrap();
    assert!(quote.gain >= 1);
    assert!(storage.read(RUN_STORAGE_KEY).unwrap().is_some());

    let reloaded = GameEngine::boot(storage.clone(), catalog(), EconomyConfig::default()).unwrap();
    let run = reloaded.session().run();
    assert_eq!(run.prestige.archived_data, quote.gain);
    assert_eq!(run.upgrade_level("energy_collector"), 0);
    assert!(reloaded.session().run().rates.energy > 20.0);
    assert!(storage.read(HERO_STORAGE_KEY).unwrap().is_some());
}
