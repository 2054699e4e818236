//! Core type definitions used throughout the codebase

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Wall-clock instant of a BGS tick (always UTC)
pub type TickTime = DateTime<Utc>;

/// Signed influence amount
pub type Influence = i64;

/// A server-side tick boundary
///
/// The default tick has an empty id and the Unix epoch as its time, meaning
/// "no tick observed yet". Any real tick compares strictly later.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tick {
    pub id: String,
    pub time: TickTime,
}

impl Tick {
    pub fn new(id: impl Into<String>, time: TickTime) -> Self {
        Self { id: id.into(), time }
    }

    /// A tick raised by the manual override rather than the upstream source
    pub fn forced(time: TickTime) -> Self {
        Self {
            id: format!("forced-{}", Uuid::new_v4()),
            time,
        }
    }

    pub fn is_forced(&self) -> bool {
        self.id.starts_with("forced-")
    }

    pub fn is_known(&self) -> bool {
        !self.id.is_empty()
    }
}

/// Where a conflict zone was fought
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Venue {
    Space,
    Ground,
}

string_enum!(Venue {
    Space => "space",
    Ground => "ground",
});

/// Conflict zone intensity tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Intensity {
    High,
    Medium,
    Low,
}

string_enum!(Intensity {
    High => "high",
    Medium => "medium",
    Low => "low",
});

/// Primary influence comes from the player's own action; secondary is the
/// knock-on effect on other factions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum InfluenceKind {
    Primary,
    Secondary,
}

string_enum!(InfluenceKind {
    Primary => "primary",
    Secondary => "secondary",
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum MissionType {
    Combat,
    Trade,
    Courier,
    Other,
}

string_enum!(MissionType {
    Combat => "combat",
    Trade => "trade",
    Courier => "courier",
    Other => "other",
});
