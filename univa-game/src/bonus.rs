//! Bonus kinds and the multiplicative bonus stack shared by every bonus source.
//!
//! Projects, tech nodes, challenge rewards and the hero card all describe
//! their effects as a [`BonusMap`]. A [`BonusStack`] composes any number of
//! maps into one factor per [`BonusKind`], always using the same rule: the
//! specific key first, then the `all_rates` catch-all when the target is a
//! resource rate.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::collections::BTreeMap;

use crate::numbers::exponent_from_u32;

/// Closed set of bonus categories understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BonusKind {
    EnergyRate,
    MatterRate,
    InfoRate,
    AllRates,
    ClickPower,
    CostReduction,
    AutoHarvest,
    SurvivalBonus,
    PrestigeGain,
    DysonOutput,
}

impl BonusKind {
    /// Resource-rate kinds receive the `all_rates` catch-all.
    #[must_use]
    pub const fn is_rate(self) -> bool {
        matches!(self, Self::EnergyRate | Self::MatterRate | Self::InfoRate)
    }
}

/// One-shot unlock flags granted by tech nodes and projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unlock {
    TierOne,
    TierTwo,
    ExoticMatter,
}

impl Unlock {
    /// Kardashev tier this unlock advances the civilization to, if any.
    #[must_use]
    pub const fn kardashev_tier(self) -> Option<u8> {
        match self {
            Self::TierOne => Some(1),
            Self::TierTwo => Some(2),
            Self::ExoticMatter => None,
        }
    }
}

/// Multipliers keyed by bonus kind. Absent kinds are neutral.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BonusMap(BTreeMap<BonusKind, f64>);

impl BonusMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, kind: BonusKind, multiplier: f64) -> Self {
        self.0.insert(kind, multiplier);
        self
    }

    #[must_use]
    pub fn get(&self, kind: BonusKind) -> Option<f64> {
        self.0.get(&kind).copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (BonusKind, f64)> + '_ {
        self.0.iter().map(|(kind, value)| (*kind, *value))
    }

    /// Multiplier this map contributes to `target`.
    #[must_use]
    pub fn factor_for(&self, target: BonusKind) -> f64 {
        let mut factor = self.get(target).unwrap_or(1.0);
        if target.is_rate()
            && let Some(all) = self.get(BonusKind::AllRates)
        {
            factor *= all;
        }
        factor
    }
}

impl FromIterator<(BonusKind, f64)> for BonusMap {
    fn from_iter<T: IntoIterator<Item = (BonusKind, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Ordered collection of bonus maps, each raised to an integer weight.
#[derive(Debug, Clone, Default)]
pub struct BonusStack<'a> {
    layers: SmallVec<[(&'a BonusMap, u32); 8]>,
}

impl<'a> BonusStack<'a> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bonus: &'a BonusMap) {
        self.push_scaled(bonus, 1);
    }

    /// Add a source whose factor is applied `weight` times (e.g. once per completion).
    pub fn push_scaled(&mut self, bonus: &'a BonusMap, weight: u32) {
        if weight > 0 && !bonus.is_empty() {
            self.layers.push((bonus, weight));
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Product of every layer's factor for `target`.
    #[must_use]
    pub fn factor(&self, target: BonusKind) -> f64 {
        self.layers
            .iter()
            .map(|(bonus, weight)| bonus.factor_for(target).powi(exponent_from_u32(*weight)))
            .product()
    }
}

impl<'a> FromIterator<&'a BonusMap> for BonusStack<'a> {
    fn from_iter<T: IntoIterator<Item = &'a BonusMap>>(iter: T) -> Self {
        let mut stack = Self::new();
        for bonus in iter {
            stack.push(bonus);
        }
        stack
    }
}
