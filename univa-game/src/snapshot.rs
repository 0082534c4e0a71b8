//! Save snapshots and the shareable export blob.
//!
//! Snapshots are plain JSON with every field defaulted, so saves written by
//! older builds load and catalog entries they never knew about start fresh.
//! The export blob wraps both snapshots as `univa1.<tag>.<json>` where the
//! tag is a truncated HMAC-SHA256 of the JSON.
use hmac::{Hmac, Mac};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::catalog::Catalog;
use crate::constants::{EXPORT_HMAC_KEY, EXPORT_PREFIX, EXPORT_TAG_HEX_LEN, SNAPSHOT_SCHEMA_VERSION};
use crate::hero::HeroCard;
use crate::state::RunState;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("malformed snapshot: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("export blob is not in `univa1.<tag>.<json>` form")]
    BadExportTag,
    #[error("export blob failed its integrity check")]
    ChecksumMismatch,
}

const fn current_version() -> u32 {
    SNAPSHOT_SCHEMA_VERSION
}

/// Persisted form of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    #[serde(default = "current_version")]
    pub version: u32,
    /// Fingerprint of the catalog the run was saved against.
    #[serde(default)]
    pub catalog_fingerprint: u64,
    #[serde(default)]
    pub run: RunState,
}

impl RunSnapshot {
    #[must_use]
    pub fn capture(run: &RunState, catalog: &Catalog) -> Self {
        Self {
            version: SNAPSHOT_SCHEMA_VERSION,
            catalog_fingerprint: catalog.fingerprint(),
            run: run.clone(),
        }
    }

    /// Rebuild the run, aligned with the current catalog.
    #[must_use]
    pub fn restore(self, catalog: &Catalog) -> RunState {
        if self.version > SNAPSHOT_SCHEMA_VERSION {
            log::warn!(
                "run snapshot version {} is newer than {SNAPSHOT_SCHEMA_VERSION}; loading best effort",
                self.version
            );
        }
        if self.catalog_fingerprint != catalog.fingerprint() {
            log::debug!("catalog changed since save; reconciling run");
        }
        let mut run = self.run;
        run.reconcile(catalog);
        run.refresh_kardashev(catalog);
        run
    }
}

/// Persisted form of the hero card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeroSnapshot {
    #[serde(default = "current_version")]
    pub version: u32,
    #[serde(default)]
    pub hero: HeroCard,
}

impl HeroSnapshot {
    #[must_use]
    pub fn capture(hero: &HeroCard) -> Self {
        Self {
            version: SNAPSHOT_SCHEMA_VERSION,
            hero: hero.clone(),
        }
    }

    #[must_use]
    pub fn restore(self, catalog: &Catalog) -> HeroCard {
        let mut hero = self.hero;
        hero.reconcile(catalog);
        hero
    }
}

/// Both aggregates, as carried by an export blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub run: RunSnapshot,
    #[serde(default = "ExportBundle::default_hero")]
    pub hero: HeroSnapshot,
}

impl ExportBundle {
    fn default_hero() -> HeroSnapshot {
        HeroSnapshot::capture(&HeroCard::default())
    }
}

/// Serialize a snapshot as compact JSON.
///
/// # Errors
///
/// Returns `Malformed` if serialization fails.
pub fn to_json<T: Serialize>(snapshot: &T) -> Result<String, SnapshotError> {
    Ok(serde_json::to_string(snapshot)?)
}

/// Parse a snapshot; missing fields take their defaults and unknown fields are ignored.
///
/// # Errors
///
/// Returns `Malformed` for invalid JSON or mistyped fields.
pub fn from_json<T: DeserializeOwned>(json: &str) -> Result<T, SnapshotError> {
    Ok(serde_json::from_str(json)?)
}

fn export_tag(payload: &str) -> Result<String, SnapshotError> {
    let mut mac =
        HmacSha256::new_from_slice(EXPORT_HMAC_KEY).map_err(|_| SnapshotError::BadExportTag)?;
    mac.update(payload.as_bytes());
    let digest = mac.finalize().into_bytes();
    Ok(digest
        .iter()
        .take(EXPORT_TAG_HEX_LEN / 2)
        .map(|byte| format!("{byte:02x}"))
        .collect())
}

/// Encode an export blob.
///
/// # Errors
///
/// Returns `Malformed` if the bundle cannot be serialized.
pub fn export_blob(bundle: &ExportBundle) -> Result<String, SnapshotError> {
    let payload = to_json(bundle)?;
    let tag = export_tag(&payload)?;
    Ok(format!("{EXPORT_PREFIX}.{tag}.{payload}"))
}

/// Decode an export blob, verifying its tag.
///
/// Bare JSON bundles from older exports are accepted untagged, so the tag
/// only detects corrupted or truncated blobs. It is not tamper-proofing:
/// the key ships with the engine and the prefix can simply be stripped.
///
/// # Errors
///
/// `BadExportTag` for unrecognized framing, `ChecksumMismatch` when the tag
/// does not match the payload, and `Malformed` for invalid JSON.
pub fn import_blob(blob: &str) -> Result<ExportBundle, SnapshotError> {
    let blob = blob.trim();
    if blob.starts_with('{') {
        return from_json(blob);
    }

    let mut parts = blob.splitn(3, '.');
    let (Some(prefix), Some(tag), Some(payload)) = (parts.next(), parts.next(), parts.next())
    else {
        return Err(SnapshotError::BadExportTag);
    };
    if prefix != EXPORT_PREFIX
        || tag.len() != EXPORT_TAG_HEX_LEN
        || !tag.bytes().all(|byte| byte.is_ascii_hexdigit())
    {
        return Err(SnapshotError::BadExportTag);
    }
    if !export_tag(payload)?.eq_ignore_ascii_case(tag) {
        return Err(SnapshotError::ChecksumMismatch);
    }
    from_json(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::catalog;
    use crate::hero::keys;

    fn sample_run() -> (RunState, std::sync::Arc<Catalog>) {
        let catalog = catalog();
        let mut run = RunState::new(&catalog);
        run.resources.energy = 1234.5;
        run.reach = 9876.0;
        run.clock = 42.0;
        run.upgrades.get_mut("solar_panel").unwrap().level = 7;
        run.techs.get_mut("computing_logic").unwrap().researched = true;
        run.prestige.genetic_archives = 3;
        (run, catalog)
    }

    #[test]
    fn run_round_trips_through_json() {
        let (run, catalog) = sample_run();
        let json = to_json(&RunSnapshot::capture(&run, &catalog)).unwrap();
        let restored = from_json::<RunSnapshot>(&json).unwrap().restore(&catalog);
        assert_eq!(restored.upgrade_level("solar_panel"), 7);
        assert!(restored.is_researched("computing_logic"));
        assert_eq!(restored.prestige.genetic_archives, 3);
        assert!((restored.clock - 42.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_tech_loads_unresearched() {
        let (run, catalog) = sample_run();
        let mut value = serde_json::to_value(RunSnapshot::capture(&run, &catalog)).unwrap();
        value["run"]["techs"]
            .as_object_mut()
            .unwrap()
            .remove("materials_metallurgy");
        value["run"]["future_field"] = serde_json::json!(true);

        let restored = from_json::<RunSnapshot>(&value.to_string())
            .unwrap()
            .restore(&catalog);
        assert!(restored.techs.contains_key("materials_metallurgy"));
        assert!(!restored.is_researched("materials_metallurgy"));
    }

    #[test]
    fn sparse_json_fills_defaults() {
        let catalog = catalog();
        let restored = from_json::<RunSnapshot>(r#"{"run": {"reach": 5.0}}"#)
            .unwrap()
            .restore(&catalog);
        assert_eq!(restored.upgrades.len(), catalog.upgrades.len());
        assert!((restored.reach - 5.0).abs() < f64::EPSILON);
        assert!(matches!(
            from_json::<RunSnapshot>("{not json"),
            Err(SnapshotError::Malformed(_))
        ));
    }

    #[test]
    fn export_round_trip_and_tamper_detection() {
        let (run, catalog) = sample_run();
        let mut hero = HeroCard::new(&catalog);
        hero.increment(&catalog, keys::SURVIVOR, &crate::config::HeroConfig::default())
            .unwrap();
        let bundle = ExportBundle {
            run: RunSnapshot::capture(&run, &catalog),
            hero: HeroSnapshot::capture(&hero),
        };

        let blob = export_blob(&bundle).unwrap();
        assert!(blob.starts_with("univa1."));
        assert_eq!(import_blob(&blob).unwrap(), bundle);

        let tampered = blob.replace("1234.5", "9999999.5");
        assert!(matches!(
            import_blob(&tampered),
            Err(SnapshotError::ChecksumMismatch)
        ));
        assert!(matches!(
            import_blob("univa2.0000000000000000.{}"),
            Err(SnapshotError::BadExportTag)
        ));
        assert!(matches!(import_blob("garbage"), Err(SnapshotError::BadExportTag)));
    }

    #[test]
    fn bare_json_bundles_import_without_tag() {
        let (run, catalog) = sample_run();
        let json = serde_json::json!({ "run": RunSnapshot::capture(&run, &catalog) }).to_string();
        let bundle = import_blob(&json).unwrap();
        assert_eq!(bundle.run.run.upgrade_level("solar_panel"), 7);
        assert_eq!(bundle.hero.hero, HeroCard::default());
    }

    #[test]
    fn tag_catches_truncation_but_not_a_stripped_prefix() {
        let (run, catalog) = sample_run();
        let blob = export_blob(&ExportBundle {
            run: RunSnapshot::capture(&run, &catalog),
            hero: HeroSnapshot::capture(&HeroCard::default()),
        })
        .unwrap();

        let cut = blob.trim_end_matches('}');
        let truncated = format!("{cut}}}");
        assert!(matches!(
            import_blob(&truncated),
            Err(SnapshotError::ChecksumMismatch)
        ));

        let payload = blob.splitn(3, '.').nth(2).unwrap();
        assert_eq!(
            import_blob(payload).unwrap().run.run.upgrade_level("solar_panel"),
            7
        );
    }
}
