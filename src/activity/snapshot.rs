//! Per-tick activity aggregate: systems → factions → counters

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::activity::delta::{ActivityDelta, CzBucket};
use crate::core::types::{Influence, InfluenceKind, MissionType, Tick, TickTime};
use crate::state::Preferences;

/// Counts per conflict zone bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CzCounts {
    pub space_high: u64,
    pub space_medium: u64,
    pub space_low: u64,
    pub ground_high: u64,
    pub ground_medium: u64,
    pub ground_low: u64,
    pub other: u64,
}

impl CzCounts {
    pub fn get(&self, bucket: CzBucket) -> u64 {
        match bucket {
            CzBucket::SpaceHigh => self.space_high,
            CzBucket::SpaceMedium => self.space_medium,
            CzBucket::SpaceLow => self.space_low,
            CzBucket::GroundHigh => self.ground_high,
            CzBucket::GroundMedium => self.ground_medium,
            CzBucket::GroundLow => self.ground_low,
            CzBucket::Other => self.other,
        }
    }

    fn slot_mut(&mut self, bucket: CzBucket) -> &mut u64 {
        match bucket {
            CzBucket::SpaceHigh => &mut self.space_high,
            CzBucket::SpaceMedium => &mut self.space_medium,
            CzBucket::SpaceLow => &mut self.space_low,
            CzBucket::GroundHigh => &mut self.ground_high,
            CzBucket::GroundMedium => &mut self.ground_medium,
            CzBucket::GroundLow => &mut self.ground_low,
            CzBucket::Other => &mut self.other,
        }
    }

    pub fn increment(&mut self, bucket: CzBucket) {
        let slot = self.slot_mut(bucket);
        *slot = slot.saturating_add(1);
    }

    pub fn total(&self) -> u64 {
        CzBucket::ALL
            .iter()
            .fold(0u64, |total, b| total.saturating_add(self.get(*b)))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictZoneTally {
    pub wins: CzCounts,
    pub losses: CzCounts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MissionCounts {
    pub combat: u64,
    pub trade: u64,
    pub courier: u64,
    pub other: u64,
    pub failed: u64,
}

impl MissionCounts {
    pub fn completed(&self, mission: MissionType) -> u64 {
        match mission {
            MissionType::Combat => self.combat,
            MissionType::Trade => self.trade,
            MissionType::Courier => self.courier,
            MissionType::Other => self.other,
        }
    }

    fn record_completed(&mut self, mission: MissionType) {
        let slot = match mission {
            MissionType::Combat => &mut self.combat,
            MissionType::Trade => &mut self.trade,
            MissionType::Courier => &mut self.courier,
            MissionType::Other => &mut self.other,
        };
        *slot = slot.saturating_add(1);
    }
}

/// Everything recorded for one faction in one system during one tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactionActivity {
    pub inf_primary: Influence,
    pub inf_secondary: Influence,
    pub missions: MissionCounts,
    pub bounties: u64,
    pub combat_bonds: u64,
    pub conflict_zones: ConflictZoneTally,
    pub trade_buy: u64,
    pub trade_sell: u64,
    pub trade_profit: i64,
    pub cartographic_data: u64,
    pub exobiology_data: u64,
    pub murders: u64,
    pub ground_murders: u64,
    pub settlements_scanned: u64,
}

impl FactionActivity {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate one delta. Every counter saturates rather than wrapping.
    pub fn apply(&mut self, delta: &ActivityDelta) {
        match *delta {
            ActivityDelta::Influence { kind, amount } => match kind {
                InfluenceKind::Primary => {
                    self.inf_primary = self.inf_primary.saturating_add(amount)
                }
                InfluenceKind::Secondary => {
                    self.inf_secondary = self.inf_secondary.saturating_add(amount)
                }
            },
            ActivityDelta::MissionCompleted { mission, influence } => {
                self.missions.record_completed(mission);
                self.inf_primary = self.inf_primary.saturating_add(influence);
            }
            ActivityDelta::MissionFailed => {
                self.missions.failed = self.missions.failed.saturating_add(1)
            }
            ActivityDelta::ConflictZone { bucket, won } => {
                if won {
                    self.conflict_zones.wins.increment(bucket);
                } else {
                    self.conflict_zones.losses.increment(bucket);
                }
            }
            ActivityDelta::Bounty { credits } => {
                self.bounties = self.bounties.saturating_add(credits)
            }
            ActivityDelta::CombatBond { credits } => {
                self.combat_bonds = self.combat_bonds.saturating_add(credits)
            }
            ActivityDelta::MarketBuy { value } => {
                self.trade_buy = self.trade_buy.saturating_add(value)
            }
            ActivityDelta::MarketSell { value, profit } => {
                self.trade_sell = self.trade_sell.saturating_add(value);
                self.trade_profit = self.trade_profit.saturating_add(profit);
            }
            ActivityDelta::CartographicData { credits } => {
                self.cartographic_data = self.cartographic_data.saturating_add(credits)
            }
            ActivityDelta::ExobiologyData { credits } => {
                self.exobiology_data = self.exobiology_data.saturating_add(credits)
            }
            ActivityDelta::Murder { on_foot } => {
                if on_foot {
                    self.ground_murders = self.ground_murders.saturating_add(1);
                } else {
                    self.murders = self.murders.saturating_add(1);
                }
            }
            ActivityDelta::SettlementScanned => {
                self.settlements_scanned = self.settlements_scanned.saturating_add(1)
            }
        }
    }

    /// Influence to show in reports. Secondary INF is always recorded but
    /// only counted here when the user asks for it.
    pub fn displayed_influence(&self, preferences: &Preferences) -> Influence {
        if preferences.include_secondary_inf.is_on() {
            self.inf_primary.saturating_add(self.inf_secondary)
        } else {
            self.inf_primary
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Identifies a star system in an apply call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemRef {
    pub name: String,
    pub address: Option<u64>,
}

impl SystemRef {
    pub fn new(name: impl Into<String>, address: Option<u64>) -> Self {
        Self {
            name: name.into(),
            address,
        }
    }
}

impl From<&str> for SystemRef {
    fn from(name: &str) -> Self {
        Self::new(name, None)
    }
}

impl From<String> for SystemRef {
    fn from(name: String) -> Self {
        Self::new(name, None)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemActivity {
    pub name: String,
    #[serde(default)]
    pub address: Option<u64>,
    #[serde(default)]
    pub factions: AHashMap<String, FactionActivity>,
}

impl SystemActivity {
    pub fn new(system: &SystemRef) -> Self {
        Self {
            name: system.name.clone(),
            address: system.address,
            factions: AHashMap::new(),
        }
    }

    pub fn faction(&self, name: &str) -> Option<&FactionActivity> {
        self.factions.get(name)
    }

    /// Get or lazily create a faction entry
    pub fn faction_mut(&mut self, name: &str) -> &mut FactionActivity {
        self.factions.entry(name.to_string()).or_default()
    }

    pub fn has_activity(&self) -> bool {
        self.factions.values().any(|f| !f.is_empty())
    }
}

/// All activity recorded during one tick
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick_id: String,
    pub tick_time: TickTime,
    #[serde(default)]
    pub systems: AHashMap<String, SystemActivity>,
}

impl Snapshot {
    /// An empty snapshot opened at the given tick
    pub fn open(tick: &Tick) -> Self {
        Self {
            tick_id: tick.id.clone(),
            tick_time: tick.time,
            systems: AHashMap::new(),
        }
    }

    pub fn tick(&self) -> Tick {
        Tick::new(self.tick_id.clone(), self.tick_time)
    }

    pub fn system(&self, name: &str) -> Option<&SystemActivity> {
        self.systems.get(name)
    }

    pub fn faction(&self, system: &str, faction: &str) -> Option<&FactionActivity> {
        self.systems.get(system).and_then(|s| s.faction(faction))
    }

    /// Get or lazily create a system entry
    pub fn system_mut(&mut self, system: &SystemRef) -> &mut SystemActivity {
        let entry = self
            .systems
            .entry(system.name.clone())
            .or_insert_with(|| SystemActivity::new(system));
        if entry.address.is_none() {
            entry.address = system.address;
        }
        entry
    }

    pub fn apply(&mut self, system: &SystemRef, faction: &str, delta: &ActivityDelta) {
        self.system_mut(system).faction_mut(faction).apply(delta);
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Systems to show in a report, sorted by name
    pub fn reportable_systems(&self, preferences: &Preferences) -> Vec<&SystemActivity> {
        let show_zero = preferences.show_zero_activity_systems.is_on();
        let mut systems: Vec<&SystemActivity> = self
            .systems
            .values()
            .filter(|s| show_zero || s.has_activity())
            .collect();
        systems.sort_by(|a, b| a.name.cmp(&b.name));
        systems
    }

    pub fn summary(&self, preferences: &Preferences) -> String {
        let factions: usize = self.systems.values().map(|s| s.factions.len()).sum();
        let influence: Influence = self
            .systems
            .values()
            .flat_map(|s| s.factions.values())
            .fold(0, |total: Influence, f| {
                total.saturating_add(f.displayed_influence(preferences))
            });
        format!(
            "Tick {} ({}): {} systems, {} factions, {:+} INF",
            self.tick_time.format("%Y-%m-%d %H:%M:%S"),
            if self.tick_id.is_empty() { "unknown" } else { &self.tick_id },
            self.systems.len(),
            factions,
            influence,
        )
    }
}
