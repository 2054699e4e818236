//! Event classification: typed game event → (system, faction, delta)
//!
//! Classification is pure. The only context it reads is the [`Session`],
//! which fills in the system or faction when an event leaves them out.

use crate::activity::delta::{ActivityDelta, CzBucket};
use crate::activity::event::{EventKind, GameEvent};
use crate::activity::snapshot::SystemRef;
use crate::core::types::{Intensity, Venue};
use crate::state::Session;

/// Result of classifying one event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Tally {
        system: SystemRef,
        faction: String,
        delta: ActivityDelta,
    },
    Ignored,
}

/// Which session fallback, if any, supplies a missing faction
#[derive(Clone, Copy)]
enum FactionFallback {
    None,
    Station,
    TargetedShip,
}

pub fn classify(event: &GameEvent, session: &Session) -> Classification {
    let (delta, fallback) = match &event.kind {
        EventKind::MissionCompleted { mission, influence } => (
            ActivityDelta::MissionCompleted {
                mission: *mission,
                influence: *influence,
            },
            FactionFallback::None,
        ),
        EventKind::MissionFailed => (ActivityDelta::MissionFailed, FactionFallback::None),
        EventKind::Influence { kind, amount } => (
            ActivityDelta::Influence {
                kind: *kind,
                amount: *amount,
            },
            FactionFallback::None,
        ),
        EventKind::ConflictZone {
            venue,
            intensity,
            won,
        } => {
            let bucket = conflict_zone_bucket(venue.as_deref(), intensity.as_deref(), session);
            (
                ActivityDelta::ConflictZone { bucket, won: *won },
                FactionFallback::None,
            )
        }
        EventKind::Bounty { credits } => (
            ActivityDelta::Bounty { credits: *credits },
            FactionFallback::Station,
        ),
        EventKind::CombatBond { credits } => (
            ActivityDelta::CombatBond { credits: *credits },
            FactionFallback::Station,
        ),
        EventKind::MarketBuy { value } => (
            ActivityDelta::MarketBuy { value: *value },
            FactionFallback::Station,
        ),
        EventKind::MarketSell { value, profit } => (
            ActivityDelta::MarketSell {
                value: *value,
                profit: *profit,
            },
            FactionFallback::Station,
        ),
        EventKind::CartographicData { credits } => (
            ActivityDelta::CartographicData { credits: *credits },
            FactionFallback::Station,
        ),
        EventKind::ExobiologyData { credits } => (
            ActivityDelta::ExobiologyData { credits: *credits },
            FactionFallback::Station,
        ),
        EventKind::Murder { on_foot } => (
            ActivityDelta::Murder { on_foot: *on_foot },
            FactionFallback::TargetedShip,
        ),
        EventKind::SettlementScanned => (ActivityDelta::SettlementScanned, FactionFallback::None),
        EventKind::Location
        | EventKind::FsdJump
        | EventKind::Docked
        | EventKind::Undocked
        | EventKind::ApproachSettlement { .. }
        | EventKind::ShipTargeted => return Classification::Ignored,
    };

    let Some(system) = resolve_system(event, session) else {
        return Classification::Ignored;
    };

    let faction = event.faction.clone().or_else(|| match fallback {
        FactionFallback::None => None,
        FactionFallback::Station => session.station_faction.clone(),
        FactionFallback::TargetedShip => session.last_ship_targeted_faction.clone(),
    });
    let Some(faction) = faction.filter(|f| !f.is_empty()) else {
        return Classification::Ignored;
    };

    Classification::Tally {
        system,
        faction,
        delta,
    }
}

fn resolve_system(event: &GameEvent, session: &Session) -> Option<SystemRef> {
    match &event.system {
        Some(name) if !name.is_empty() => {
            let address = event.system_address.or_else(|| {
                // Only borrow the session address when it describes the same system
                (session.current_system.as_deref() == Some(name.as_str()))
                    .then_some(session.current_system_address)
                    .flatten()
            });
            Some(SystemRef::new(name.clone(), address))
        }
        _ => session
            .current_system
            .as_ref()
            .map(|name| SystemRef::new(name.clone(), session.current_system_address)),
    }
}

/// Bucket a conflict zone from its raw tags
///
/// Tags are matched case-insensitively. A missing venue after approaching a
/// settlement is taken to be a ground zone. Anything that still can't be
/// placed lands in [`CzBucket::Other`].
pub fn conflict_zone_bucket(
    venue: Option<&str>,
    intensity: Option<&str>,
    session: &Session,
) -> CzBucket {
    let venue = match venue {
        Some(tag) => parse_venue(tag),
        None if session.last_settlement_approached.is_some() => Some(Venue::Ground),
        None => None,
    };
    let intensity = intensity.and_then(parse_intensity);
    CzBucket::from_tags(venue, intensity)
}

fn parse_venue(tag: &str) -> Option<Venue> {
    tag.trim().to_ascii_lowercase().parse().ok()
}

fn parse_intensity(tag: &str) -> Option<Intensity> {
    let tag = tag.trim().to_ascii_lowercase();
    match tag.as_str() {
        "med" => Some(Intensity::Medium),
        other => other.parse().ok(),
    }
}
