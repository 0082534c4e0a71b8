//! Fixed values shared across the engine.
//!
//! Balance tunables live in [`crate::config::EconomyConfig`]; the values here
//! describe storage layout and hard limits that saves depend on.

// Storage keys -------------------------------------------------------------
pub const RUN_STORAGE_KEY: &str = "univa.run";
pub const HERO_STORAGE_KEY: &str = "univa.hero";

// Snapshot format ----------------------------------------------------------
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;
pub(crate) const EXPORT_PREFIX: &str = "univa1";
pub(crate) const EXPORT_TAG_HEX_LEN: usize = 16;
pub(crate) const EXPORT_HMAC_KEY: &[u8] = b"univa-idle/export/v1";

// Hero card ----------------------------------------------------------------
pub const DEFAULT_HERO_NAME: &str = "Wanderer";

// Sanity limits ------------------------------------------------------------
/// Upper bound on a single `buy_n` request.
pub(crate) const MAX_BUY_REQUEST: u32 = 10_000;
/// Maximum number of events buffered between drains.
pub(crate) const EVENT_BUFFER_LIMIT: usize = 512;
