//! Rejection reasons for player actions.
//!
//! Every rejected action leaves the run untouched; callers are free to
//! ignore the error or use it to explain a disabled control.
use std::fmt;
use thiserror::Error;

use crate::resources::Resource;

/// Condition an action was waiting on.
#[derive(Debug, Clone, PartialEq)]
pub enum Requirement {
    Reach(f64),
    Tech(String),
    KardashevTier(u8),
    HeroLevel(u32),
    ActiveCataclysm,
    MinimumGain,
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reach(reach) => write!(f, "reach of {reach:.0}"),
            Self::Tech(tech) => write!(f, "tech `{tech}`"),
            Self::KardashevTier(tier) => write!(f, "Kardashev tier {tier}"),
            Self::HeroLevel(level) => write!(f, "achievement level {level}"),
            Self::ActiveCataclysm => f.write_str("an approaching cataclysm"),
            Self::MinimumGain => f.write_str("a prestige gain of at least 1"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    #[error("unknown {kind} `{key}`")]
    UnknownKey { kind: &'static str, key: String },
    #[error("not enough {} for `{key}`", .resource.key())]
    InsufficientResources { key: String, resource: Resource },
    #[error("`{key}` requires {requirement}")]
    PrerequisiteNotMet { key: String, requirement: Requirement },
    #[error("`{key}` is at capacity")]
    CapacityExceeded { key: String },
    #[error("`{key}` is {state}")]
    InvalidTransition { key: String, state: &'static str },
}

impl ActionError {
    pub(crate) fn unknown(kind: &'static str, key: &str) -> Self {
        Self::UnknownKey {
            kind,
            key: key.to_string(),
        }
    }

    pub(crate) fn insufficient(key: &str, resource: Resource) -> Self {
        Self::InsufficientResources {
            key: key.to_string(),
            resource,
        }
    }

    pub(crate) fn prerequisite(key: &str, requirement: Requirement) -> Self {
        Self::PrerequisiteNotMet {
            key: key.to_string(),
            requirement,
        }
    }

    pub(crate) fn capacity(key: &str) -> Self {
        Self::CapacityExceeded {
            key: key.to_string(),
        }
    }

    pub(crate) fn transition(key: &str, state: &'static str) -> Self {
        Self::InvalidTransition {
            key: key.to_string(),
            state,
        }
    }
}

pub type ActionResult<T> = Result<T, ActionError>;
