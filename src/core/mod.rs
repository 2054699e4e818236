pub mod config;
pub mod error;
pub mod types;

pub use types::{Influence, InfluenceKind, Intensity, MissionType, Tick, TickTime, Venue};
