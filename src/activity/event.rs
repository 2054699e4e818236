//! Typed game events as delivered by the journal watcher

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::{Influence, InfluenceKind, MissionType};

/// One game event, already parsed from the journal
///
/// Serialized as a flat JSON object with an `"event"` tag, e.g.
///
/// ```text
/// {"event":"influence","timestamp":"...","system":"Wyrd",
///  "faction":"Wyrd Liberals","kind":"primary","amount":4}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_address: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faction: Option<String>,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl GameEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            timestamp: Utc::now(),
            system: None,
            system_address: None,
            faction: None,
            kind,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn in_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn for_faction(mut self, faction: impl Into<String>) -> Self {
        self.faction = Some(faction.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EventKind {
    // === Tally-relevant ===
    MissionCompleted {
        #[serde(default = "default_mission")]
        mission: MissionType,
        #[serde(default)]
        influence: Influence,
    },
    MissionFailed,
    Influence {
        kind: InfluenceKind,
        amount: Influence,
    },
    /// Venue and intensity are raw tags; the classifier decides the bucket
    ConflictZone {
        #[serde(default)]
        venue: Option<String>,
        #[serde(default)]
        intensity: Option<String>,
        won: bool,
    },
    Bounty {
        credits: u64,
    },
    CombatBond {
        credits: u64,
    },
    MarketBuy {
        value: u64,
    },
    MarketSell {
        value: u64,
        #[serde(default)]
        profit: i64,
    },
    CartographicData {
        credits: u64,
    },
    ExobiologyData {
        credits: u64,
    },
    Murder {
        #[serde(default)]
        on_foot: bool,
    },
    SettlementScanned,

    // === Navigation (session context only) ===
    Location,
    FsdJump,
    Docked,
    Undocked,
    ApproachSettlement {
        name: String,
    },
    ShipTargeted,
}

fn default_mission() -> MissionType {
    MissionType::Other
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_flat_event() {
        let json = r#"{
            "event": "influence",
            "timestamp": "2022-11-03T14:02:40Z",
            "system": "Wyrd",
            "faction": "Wyrd Liberals",
            "kind": "secondary",
            "amount": -2
        }"#;
        let event: GameEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.system.as_deref(), Some("Wyrd"));
        assert_eq!(
            event.kind,
            EventKind::Influence {
                kind: InfluenceKind::Secondary,
                amount: -2
            }
        );
    }

    #[test]
    fn test_optional_payloads_default() {
        let json = r#"{"event":"conflict_zone","timestamp":"2022-11-03T14:02:40Z","won":true}"#;
        let event: GameEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event.kind,
            EventKind::ConflictZone {
                venue: None,
                intensity: None,
                won: true
            }
        );
        assert!(event.system.is_none());

        let json = r#"{"event":"mission_completed","timestamp":"2022-11-03T14:02:40Z"}"#;
        let event: GameEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event.kind,
            EventKind::MissionCompleted {
                mission: MissionType::Other,
                influence: 0
            }
        );
    }

    #[test]
    fn test_unknown_event_rejected() {
        let json = r#"{"event":"scan_organic","timestamp":"2022-11-03T14:02:40Z"}"#;
        assert!(serde_json::from_str::<GameEvent>(json).is_err());
    }
}
