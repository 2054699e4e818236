//! Engine configuration with documented defaults
//!
//! Loaded from a TOML file. Every field has a default, so an empty file (or
//! no file at all) yields a working configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{Result, TallyError};
use crate::state::Preferences;

/// Default upstream tick endpoint (Elite BGS tick API)
pub const DEFAULT_TICK_URL: &str = "https://elitebgs.app/api/ebgs/v5/ticks";

/// Longest accepted gap between tick polls (one day)
pub const MAX_POLL_INTERVAL_SECS: u64 = 24 * 60 * 60;

/// Longest accepted nominal tick period (one leap year)
pub const MAX_TICK_INTERVAL_HOURS: i64 = 366 * 24;

/// Configuration for the tally engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TallyConfig {
    // === TICK ORACLE ===
    /// Endpoint returning the latest tick as a JSON array of `{ "_id", "time" }`
    pub tick_url: String,

    /// Seconds between tick polls
    ///
    /// Upstream tick detection itself lags by minutes, so polling faster
    /// than once every few seconds gains nothing.
    pub poll_interval_secs: u64,

    /// Upper bound on a single tick fetch, in seconds
    ///
    /// Expiry is reported as an unreachable source and retried next period.
    pub request_timeout_secs: u64,

    /// Nominal length of one tick period, in hours
    ///
    /// Only drives the predicted next tick; never rotation.
    pub tick_interval_hours: i64,

    /// Observed tick times closer than this to the recorded one are the same tick
    pub tick_tolerance_secs: i64,

    /// Minutes either side of the predicted tick that raise an alert
    pub alert_window_minutes: i64,

    // === ACTIVITY STORE ===
    /// Number of previous tick snapshots kept in history
    pub history_retention: usize,

    // === PERSISTENCE ===
    /// Where the saved tick state and snapshots live
    pub state_path: PathBuf,

    /// User preferences mirrored into the engine
    pub preferences: Preferences,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            tick_url: DEFAULT_TICK_URL.to_string(),
            poll_interval_secs: 60,
            request_timeout_secs: 10,
            tick_interval_hours: 24,
            tick_tolerance_secs: 5,
            alert_window_minutes: 60,
            history_retention: 20,
            state_path: PathBuf::from("bgs_tally_state.json"),
            preferences: Preferences::default(),
        }
    }
}

impl TallyConfig {
    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: TallyConfig = toml::from_str(content)?;
        config.validate().map_err(TallyError::Config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if it is missing
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.poll_interval_secs == 0 || self.poll_interval_secs > MAX_POLL_INTERVAL_SECS {
            return Err(format!(
                "poll_interval_secs ({}) must be between 1 and {}",
                self.poll_interval_secs, MAX_POLL_INTERVAL_SECS
            ));
        }

        // A fetch that outlives the poll period would overlap the next one
        if self.request_timeout_secs == 0 || self.request_timeout_secs > self.poll_interval_secs {
            return Err(format!(
                "request_timeout_secs ({}) must be between 1 and poll_interval_secs ({})",
                self.request_timeout_secs, self.poll_interval_secs
            ));
        }

        if self.tick_interval_hours <= 0 || self.tick_interval_hours > MAX_TICK_INTERVAL_HOURS {
            return Err(format!(
                "tick_interval_hours ({}) must be between 1 and {}",
                self.tick_interval_hours, MAX_TICK_INTERVAL_HOURS
            ));
        }
        let tick = chrono::Duration::try_hours(self.tick_interval_hours)
            .ok_or_else(|| "tick_interval_hours is out of range".to_string())?;

        let tolerance_ok = chrono::Duration::try_seconds(self.tick_tolerance_secs)
            .is_some_and(|tolerance| tolerance >= chrono::Duration::zero() && tolerance < tick);
        if !tolerance_ok {
            return Err(format!(
                "tick_tolerance_secs ({}) must be non-negative and shorter than a tick",
                self.tick_tolerance_secs
            ));
        }

        let window_ok = chrono::Duration::try_minutes(self.alert_window_minutes)
            .is_some_and(|window| window >= chrono::Duration::zero() && window <= tick);
        if !window_ok {
            return Err(format!(
                "alert_window_minutes ({}) must be non-negative and no longer than a tick",
                self.alert_window_minutes
            ));
        }

        if self.history_retention == 0 {
            return Err("history_retention must keep at least one snapshot".into());
        }

        Ok(())
    }

    // The accessors below clamp into the validated ranges, so a config built
    // in code without `validate` still cannot panic on conversion

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.clamp(1, MAX_POLL_INTERVAL_SECS))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.clamp(1, MAX_POLL_INTERVAL_SECS))
    }

    pub fn tick_interval(&self) -> chrono::Duration {
        chrono::Duration::hours(self.tick_interval_hours.clamp(1, MAX_TICK_INTERVAL_HOURS))
    }

    pub fn tick_tolerance(&self) -> chrono::Duration {
        let max = self.tick_interval().num_seconds() - 1;
        chrono::Duration::seconds(self.tick_tolerance_secs.clamp(0, max))
    }

    pub fn alert_window(&self) -> chrono::Duration {
        let max = self.tick_interval().num_minutes();
        chrono::Duration::minutes(self.alert_window_minutes.clamp(0, max))
    }
}
