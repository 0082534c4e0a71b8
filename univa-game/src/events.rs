//! Notifications produced by actions and ticks.
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::cataclysm::CataclysmKind;
use crate::challenges::ChallengeFailure;
use crate::resources::PrestigeCurrency;
use crate::state::RunAchievement;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    UpgradePurchased {
        key: String,
        count: u32,
        level: u32,
    },
    TechResearched {
        key: String,
    },
    ProjectStarted {
        key: String,
    },
    ProjectCompleted {
        key: String,
    },
    ChallengeStarted {
        key: String,
    },
    ChallengeCompleted {
        key: String,
        completions: u32,
    },
    ChallengeFailed {
        key: String,
        reason: ChallengeFailure,
    },
    CataclysmApproaching {
        kind: CataclysmKind,
    },
    CataclysmWarning {
        kind: CataclysmKind,
    },
    CataclysmCrisis {
        kind: CataclysmKind,
    },
    /// Reach left every cataclysm band without an evacuation.
    CataclysmReceded,
    Evacuated {
        kind: CataclysmKind,
        currency: PrestigeCurrency,
        gain: u64,
    },
    RunAchievementUnlocked {
        achievement: RunAchievement,
    },
    HeroLevelUp {
        key: String,
        level: u32,
    },
    HeroRankUp {
        key: String,
        rank: u32,
    },
    HeroBadgeUp {
        key: String,
        badge: u32,
        name: String,
    },
    NodeHarvested {
        node: String,
        gain: f64,
        automatic: bool,
    },
    KardashevAdvanced {
        tier: u8,
    },
}

impl GameEvent {
    /// Events worth surfacing to a player as a toast.
    #[must_use]
    pub const fn is_notable(&self) -> bool {
        !matches!(
            self,
            Self::UpgradePurchased { .. } | Self::HeroLevelUp { .. } | Self::NodeHarvested { .. }
        )
    }
}

pub type EventBatch = SmallVec<[GameEvent; 8]>;

/// Receiver for engine notifications.
pub trait EventSink {
    fn notify(&mut self, event: &GameEvent);
}

impl<F> EventSink for F
where
    F: FnMut(&GameEvent),
{
    fn notify(&mut self, event: &GameEvent) {
        self(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(GameEvent::Evacuated {
            kind: CataclysmKind::SolarFlare,
            currency: PrestigeCurrency::HardenedBlueprints,
            gain: 3,
        })
        .unwrap();
        assert_eq!(json["type"], "evacuated");
        assert_eq!(json["kind"], "solar_flare");
        assert_eq!(json["currency"], "hardened_blueprints");
    }

    #[test]
    fn closures_are_sinks() {
        let mut seen = Vec::new();
        {
            let mut sink = |event: &GameEvent| seen.push(event.clone());
            sink.notify(&GameEvent::KardashevAdvanced { tier: 1 });
        }
        assert_eq!(seen, vec![GameEvent::KardashevAdvanced { tier: 1 }]);
        assert!(GameEvent::CataclysmReceded.is_notable());
        assert!(!GameEvent::NodeHarvested {
            node: "resource-0".into(),
            gain: 1.0,
            automatic: true,
        }
        .is_notable());
    }
}
