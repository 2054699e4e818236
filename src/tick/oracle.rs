//! Best-effort estimate of the authoritative tick time
//!
//! The oracle never drives rotation by prediction. Only a fetched tick that
//! lands strictly after the recorded one (beyond the jitter tolerance), or a
//! manual force, counts as a new tick.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::core::config::TallyConfig;
use crate::core::types::{Tick, TickTime};
use crate::tick::source::TickSource;
use crate::tick::PollError;

/// Process-wide tick state, persisted across restarts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickState {
    pub last_tick: Tick,
    #[serde(default)]
    pub last_checked: Option<DateTime<Utc>>,
    /// The last tick came from the manual override
    #[serde(default)]
    pub forced: bool,
}

/// What a successful poll learned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A tick strictly later than the recorded one
    Advanced(Tick),
    /// Same tick as before (possibly re-stamped within tolerance), or an older one
    Unchanged(Tick),
}

/// How close the next tick is, relative to the prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum TickAlert {
    Clear,
    Approaching,
    PastEstimate,
    Overdue,
}

string_enum!(TickAlert {
    Clear => "clear",
    Approaching => "approaching",
    PastEstimate => "past_estimate",
    Overdue => "overdue",
});

pub struct TickOracle<S> {
    source: S,
    state: Mutex<TickState>,
    interval: Duration,
    tolerance: Duration,
    alert_window: Duration,
}

impl<S: TickSource> TickOracle<S> {
    pub fn new(source: S, config: &TallyConfig) -> Self {
        Self {
            source,
            state: Mutex::new(TickState::default()),
            interval: config.tick_interval(),
            tolerance: config.tick_tolerance(),
            alert_window: config.alert_window(),
        }
    }

    pub fn with_state(mut self, state: TickState) -> Self {
        self.state = Mutex::new(state);
        self
    }

    fn lock(&self) -> MutexGuard<'_, TickState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch the latest tick from the source and fold it into the estimate
    ///
    /// The fetch runs without any lock held. On error the previous estimate
    /// is left exactly as it was.
    pub async fn poll(&self) -> Result<PollOutcome, PollError> {
        let observed = self.source.fetch().await?;
        Ok(self.observe(observed, Utc::now()))
    }

    fn observe(&self, observed: Tick, now: DateTime<Utc>) -> PollOutcome {
        let mut state = self.lock();
        state.last_checked = Some(now);

        let recorded = state.last_tick.time;
        if observed.time > recorded + self.tolerance {
            state.last_tick = observed.clone();
            state.forced = false;
            return PollOutcome::Advanced(observed);
        }

        if observed.time >= recorded - self.tolerance {
            // Same tick reported with jitter: last write wins, no new tick
            state.last_tick = observed.clone();
            state.forced = false;
            return PollOutcome::Unchanged(observed);
        }

        tracing::debug!(
            observed = %observed.time,
            recorded = %recorded,
            "ignoring tick older than the recorded one"
        );
        PollOutcome::Unchanged(state.last_tick.clone())
    }

    /// Manual override: the last tick is now, whatever the source says
    pub fn force(&self, now: TickTime) -> Tick {
        let tick = Tick::forced(now);
        let mut state = self.lock();
        state.last_tick = tick.clone();
        state.forced = true;
        tick
    }

    pub fn last_tick(&self) -> Tick {
        self.lock().last_tick.clone()
    }

    /// Last known tick plus one nominal tick interval. Display and alerting only.
    pub fn next_predicted(&self) -> TickTime {
        self.lock().last_tick.time + self.interval
    }

    pub fn alert(&self, now: DateTime<Utc>) -> TickAlert {
        if !self.lock().last_tick.is_known() {
            return TickAlert::Clear;
        }
        let predicted = self.next_predicted();
        if now > predicted + self.alert_window {
            TickAlert::Overdue
        } else if now > predicted {
            TickAlert::PastEstimate
        } else if now > predicted - self.alert_window {
            TickAlert::Approaching
        } else {
            TickAlert::Clear
        }
    }

    /// Last tick time for display, or a placeholder when none is known
    pub fn formatted(&self) -> String {
        let tick = self.last_tick();
        if tick.is_known() {
            tick.time.format("%Y-%m-%d %H:%M:%S").to_string()
        } else {
            "Unknown".to_string()
        }
    }

    pub fn state(&self) -> TickState {
        self.lock().clone()
    }

    pub fn restore(&self, state: TickState) {
        *self.lock() = state;
    }

    pub fn source(&self) -> &S {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::VecDeque;

    /// Replays a fixed list of fetch results
    struct Scripted(Mutex<VecDeque<Result<Tick, PollError>>>);

    impl Scripted {
        fn new(results: Vec<Result<Tick, PollError>>) -> Self {
            Self(Mutex::new(results.into()))
        }
    }

    impl TickSource for Scripted {
        async fn fetch(&self) -> Result<Tick, PollError> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(PollError::Unreachable("script exhausted".into())))
        }
    }

    fn at(hour: u32, minute: u32, second: u32) -> TickTime {
        Utc.with_ymd_and_hms(2022, 11, 3, hour, minute, second).unwrap()
    }

    fn oracle(results: Vec<Result<Tick, PollError>>) -> TickOracle<Scripted> {
        TickOracle::new(Scripted::new(results), &TallyConfig::default())
    }

    #[tokio::test]
    async fn test_first_poll_advances() {
        let oracle = oracle(vec![Ok(Tick::new("a", at(14, 2, 40)))]);
        assert_eq!(
            oracle.poll().await,
            Ok(PollOutcome::Advanced(Tick::new("a", at(14, 2, 40))))
        );
        assert_eq!(oracle.next_predicted(), at(14, 2, 40) + Duration::hours(24));
        assert!(oracle.state().last_checked.is_some());
    }

    #[tokio::test]
    async fn test_jitter_within_tolerance_is_same_tick() {
        let oracle = oracle(vec![
            Ok(Tick::new("a", at(14, 2, 40))),
            Ok(Tick::new("a", at(14, 2, 43))),
            Ok(Tick::new("a", at(14, 2, 39))),
        ]);
        assert!(matches!(oracle.poll().await, Ok(PollOutcome::Advanced(_))));
        assert!(matches!(oracle.poll().await, Ok(PollOutcome::Unchanged(_))));
        assert!(matches!(oracle.poll().await, Ok(PollOutcome::Unchanged(_))));
        // Last write wins
        assert_eq!(oracle.last_tick().time, at(14, 2, 39));
    }

    #[tokio::test]
    async fn test_older_tick_ignored() {
        let oracle = oracle(vec![Ok(Tick::new("old", at(10, 0, 0)))]);
        oracle.restore(TickState {
            last_tick: Tick::new("new", at(14, 0, 0)),
            last_checked: None,
            forced: false,
        });
        assert_eq!(
            oracle.poll().await,
            Ok(PollOutcome::Unchanged(Tick::new("new", at(14, 0, 0))))
        );
        assert_eq!(oracle.last_tick().id, "new");
    }

    #[tokio::test]
    async fn test_poll_failure_keeps_prediction() {
        let oracle = oracle(vec![
            Ok(Tick::new("a", at(14, 2, 40))),
            Err(PollError::Unreachable("connection refused".into())),
            Err(PollError::Malformed("[]".into())),
        ]);
        oracle.poll().await.unwrap();
        let predicted = oracle.next_predicted();
        let checked = oracle.state().last_checked;

        assert_eq!(
            oracle.poll().await,
            Err(PollError::Unreachable("connection refused".into()))
        );
        assert_eq!(oracle.next_predicted(), predicted);
        assert!(oracle.poll().await.is_err());
        assert_eq!(oracle.next_predicted(), predicted);
        assert_eq!(oracle.state().last_checked, checked);
    }

    #[tokio::test]
    async fn test_force_overrides_and_real_tick_clears_flag() {
        let oracle = oracle(vec![Ok(Tick::new("real", at(16, 0, 0)))]);
        let forced = oracle.force(at(15, 0, 0));
        assert!(forced.is_forced());
        assert!(oracle.state().forced);
        assert_eq!(oracle.next_predicted(), at(15, 0, 0) + Duration::hours(24));

        assert_eq!(
            oracle.poll().await,
            Ok(PollOutcome::Advanced(Tick::new("real", at(16, 0, 0))))
        );
        assert!(!oracle.state().forced);
    }

    #[test]
    fn test_force_is_unconditional() {
        let oracle = oracle(vec![]);
        oracle.force(at(15, 0, 0));
        oracle.force(at(12, 0, 0));
        assert_eq!(oracle.last_tick().time, at(12, 0, 0));
    }

    #[test]
    fn test_alert_levels() {
        let oracle = oracle(vec![]);
        let now = Utc::now();
        assert_eq!(oracle.alert(now), TickAlert::Clear);

        oracle.restore(TickState {
            last_tick: Tick::new("a", at(14, 0, 0)),
            ..TickState::default()
        });
        let predicted = at(14, 0, 0) + Duration::hours(24);
        assert_eq!(oracle.alert(predicted - Duration::hours(3)), TickAlert::Clear);
        assert_eq!(oracle.alert(predicted - Duration::minutes(30)), TickAlert::Approaching);
        assert_eq!(oracle.alert(predicted + Duration::minutes(30)), TickAlert::PastEstimate);
        assert_eq!(oracle.alert(predicted + Duration::minutes(90)), TickAlert::Overdue);
    }

    #[test]
    fn test_formatted() {
        let oracle = oracle(vec![]);
        assert_eq!(oracle.formatted(), "Unknown");
        oracle.restore(TickState {
            last_tick: Tick::new("a", at(14, 2, 40)),
            ..TickState::default()
        });
        assert_eq!(oracle.formatted(), "2022-11-03 14:02:40");
    }

    #[test]
    fn test_tick_state_round_trip() {
        let state = TickState {
            last_tick: Tick::new("a", at(14, 2, 40)),
            last_checked: Some(at(14, 5, 0)),
            forced: true,
        };
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(serde_json::from_str::<TickState>(&json).unwrap(), state);
    }
}
