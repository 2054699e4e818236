//! User preferences and session state
//!
//! Preferences are owned by whatever edits them (a settings dialog, the
//! config file). The engine only ever sees an immutable [`Preferences`]
//! value, swapped in when the owner calls [`PreferenceMirror::refresh`].

use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::activity::event::{EventKind, GameEvent};

/// Checkbox-style setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum CheckState {
    Off,
    On,
    Partial,
    Pending,
}

string_enum!(CheckState {
    Off => "No",
    On => "Yes",
    Partial => "Partial",
    Pending => "Pending",
});

impl CheckState {
    pub fn is_on(self) -> bool {
        self == CheckState::On
    }
}

/// Whether incoming activity is being recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TallyStatus {
    Active,
    Paused,
}

string_enum!(TallyStatus {
    Active => "Active",
    Paused => "Paused",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub status: TallyStatus,
    pub show_zero_activity_systems: CheckState,
    /// Presentation only; stored faction names are always canonical
    pub abbreviate_faction_names: CheckState,
    pub include_secondary_inf: CheckState,
    pub enable_overlay: CheckState,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            status: TallyStatus::Active,
            show_zero_activity_systems: CheckState::On,
            abbreviate_faction_names: CheckState::Off,
            include_secondary_inf: CheckState::On,
            enable_overlay: CheckState::On,
        }
    }
}

impl Preferences {
    pub fn is_active(&self) -> bool {
        self.status == TallyStatus::Active
    }
}

/// Thread-safe, read-mostly copy of the user's preferences
#[derive(Debug, Default)]
pub struct PreferenceMirror {
    current: RwLock<Arc<Preferences>>,
}

impl PreferenceMirror {
    pub fn new(preferences: Preferences) -> Self {
        Self {
            current: RwLock::new(Arc::new(preferences)),
        }
    }

    /// The preferences as of the last refresh
    pub fn get(&self) -> Arc<Preferences> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the mirrored value. Only the preference owner calls this.
    pub fn refresh(&self, preferences: Preferences) {
        tracing::debug!(?preferences, "preferences refreshed");
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(preferences);
    }
}

/// Where the player is right now
///
/// Session-scoped: rebuilt from navigation events, never part of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub current_system: Option<String>,
    pub current_system_address: Option<u64>,
    pub station_faction: Option<String>,
    pub last_settlement_approached: Option<String>,
    pub last_ship_targeted_faction: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update session context from a navigation event. Other events are ignored.
    pub fn observe(&mut self, event: &GameEvent) {
        match &event.kind {
            EventKind::Location | EventKind::FsdJump => {
                if event.system.is_some() {
                    self.current_system = event.system.clone();
                    self.current_system_address = event.system_address;
                }
                self.station_faction = None;
                self.last_settlement_approached = None;
                self.last_ship_targeted_faction = None;
            }
            EventKind::Docked => {
                self.station_faction = event.faction.clone();
            }
            EventKind::Undocked => {
                self.station_faction = None;
            }
            EventKind::ApproachSettlement { name } => {
                self.last_settlement_approached = Some(name.clone());
            }
            EventKind::ShipTargeted => {
                self.last_ship_targeted_faction = event.faction.clone();
            }
            _ => {}
        }
    }
}
