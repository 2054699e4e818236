//! Activity deltas: one classified change to a faction's counters

use serde::{Deserialize, Serialize};

use crate::core::types::{Influence, InfluenceKind, Intensity, MissionType, Venue};

/// Conflict zone tally bucket
///
/// Six venue × intensity buckets plus a residual bucket for anything the
/// event metadata could not place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum CzBucket {
    SpaceHigh,
    SpaceMedium,
    SpaceLow,
    GroundHigh,
    GroundMedium,
    GroundLow,
    Other,
}

string_enum!(CzBucket {
    SpaceHigh => "space_high",
    SpaceMedium => "space_medium",
    SpaceLow => "space_low",
    GroundHigh => "ground_high",
    GroundMedium => "ground_medium",
    GroundLow => "ground_low",
    Other => "other",
});

impl CzBucket {
    pub fn from_tags(venue: Option<Venue>, intensity: Option<Intensity>) -> Self {
        match (venue, intensity) {
            (Some(Venue::Space), Some(Intensity::High)) => CzBucket::SpaceHigh,
            (Some(Venue::Space), Some(Intensity::Medium)) => CzBucket::SpaceMedium,
            (Some(Venue::Space), Some(Intensity::Low)) => CzBucket::SpaceLow,
            (Some(Venue::Ground), Some(Intensity::High)) => CzBucket::GroundHigh,
            (Some(Venue::Ground), Some(Intensity::Medium)) => CzBucket::GroundMedium,
            (Some(Venue::Ground), Some(Intensity::Low)) => CzBucket::GroundLow,
            _ => CzBucket::Other,
        }
    }
}

/// A single change to one faction's activity counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "delta", rename_all = "snake_case")]
pub enum ActivityDelta {
    Influence { kind: InfluenceKind, amount: Influence },
    MissionCompleted { mission: MissionType, influence: Influence },
    MissionFailed,
    ConflictZone { bucket: CzBucket, won: bool },
    Bounty { credits: u64 },
    CombatBond { credits: u64 },
    MarketBuy { value: u64 },
    MarketSell { value: u64, profit: i64 },
    CartographicData { credits: u64 },
    ExobiologyData { credits: u64 },
    Murder { on_foot: bool },
    SettlementScanned,
}

impl ActivityDelta {
    pub fn primary_inf(amount: Influence) -> Self {
        ActivityDelta::Influence {
            kind: InfluenceKind::Primary,
            amount,
        }
    }

    pub fn secondary_inf(amount: Influence) -> Self {
        ActivityDelta::Influence {
            kind: InfluenceKind::Secondary,
            amount,
        }
    }

    pub fn cz_win(bucket: CzBucket) -> Self {
        ActivityDelta::ConflictZone { bucket, won: true }
    }

    pub fn cz_loss(bucket: CzBucket) -> Self {
        ActivityDelta::ConflictZone { bucket, won: false }
    }
}
