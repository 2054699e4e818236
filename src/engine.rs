//! The tally engine: oracle, store, classifier and preferences wired together
//!
//! Ingestion is synchronous and cheap. Tick checks are async because the
//! oracle goes to the network, but the fetch always finishes before the store
//! lock is taken for rotation. Persistence runs on an exported copy after the
//! lock is released; the async paths hand the file write to the blocking pool.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::broadcast;

use crate::activity::classifier::{classify, Classification};
use crate::activity::event::GameEvent;
use crate::activity::snapshot::Snapshot;
use crate::activity::store::{ActivityStore, History, StoreEvent};
use crate::core::config::TallyConfig;
use crate::core::error::{Result, TallyError};
use crate::core::types::{Tick, TickTime};
use crate::persistence::{SavedState, StateStore};
use crate::state::{PreferenceMirror, Preferences, Session};
use crate::tick::{PollError, PollOutcome, TickOracle, TickSource};

pub struct TallyEngine<S> {
    oracle: TickOracle<S>,
    store: ActivityStore,
    preferences: PreferenceMirror,
    session: Mutex<Session>,
    state_store: Option<Arc<dyn StateStore>>,
}

impl<S: TickSource> TallyEngine<S> {
    /// A fresh engine with no known tick and empty history
    pub fn new(source: S, config: &TallyConfig) -> Self {
        Self {
            oracle: TickOracle::new(source, config),
            store: ActivityStore::new(&Tick::default(), config.history_retention),
            preferences: PreferenceMirror::new(config.preferences.clone()),
            session: Mutex::new(Session::new()),
            state_store: None,
        }
    }

    /// An engine resumed from previously saved state
    pub fn from_saved(source: S, config: &TallyConfig, saved: SavedState) -> Self {
        let engine = Self::new(source, config);
        engine.restore(saved);
        engine
    }

    /// Load whatever `state_store` holds and keep saving to it afterwards
    pub fn open(source: S, config: &TallyConfig, state_store: Box<dyn StateStore>) -> Result<Self> {
        let engine = match state_store.load()? {
            Some(saved) => {
                tracing::info!(
                    tick = %saved.tick.last_tick.time,
                    history = saved.history.len(),
                    "resuming saved state"
                );
                Self::from_saved(source, config, saved)
            }
            None => {
                tracing::info!("no saved state, starting fresh");
                Self::new(source, config)
            }
        };
        Ok(engine.with_state_store(state_store))
    }

    pub fn with_state_store(mut self, state_store: Box<dyn StateStore>) -> Self {
        self.state_store = Some(Arc::from(state_store));
        self
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Feed one game event through the session and classifier
    ///
    /// Returns whether the event was tallied. Navigation events always
    /// update the session, even while tallying is paused.
    pub fn ingest(&self, event: &GameEvent) -> bool {
        // The session lock spans classify and apply so events land in arrival order
        let mut session = self.lock_session();
        session.observe(event);

        if !self.preferences.get().is_active() {
            return false;
        }

        match classify(event, &session) {
            Classification::Tally {
                system,
                faction,
                delta,
            } => {
                self.store.apply(system, &faction, &delta);
                true
            }
            Classification::Ignored => {
                tracing::trace!(kind = ?event.kind, "event not tallied");
                false
            }
        }
    }

    /// Poll the oracle once and rotate if it reports a newer tick
    ///
    /// Errors leave every piece of state exactly as it was.
    pub async fn check_tick(&self) -> std::result::Result<bool, PollError> {
        match self.oracle.poll().await? {
            PollOutcome::Advanced(tick) => {
                let rotated = self.rotate_to(&tick);
                if rotated {
                    self.persist_in_background().await;
                }
                Ok(rotated)
            }
            PollOutcome::Unchanged(_) => Ok(false),
        }
    }

    /// Manual override. Behaves exactly like a detected tick at `now`.
    ///
    /// Saves on the calling thread; async callers use [`Self::force_tick_async`].
    pub fn force_tick(&self, now: TickTime) -> bool {
        let rotated = self.force_rotation(now);
        if rotated {
            if let Err(err) = self.save() {
                tracing::warn!(%err, "failed to save state after rotation");
            }
        }
        rotated
    }

    pub async fn force_tick_async(&self, now: TickTime) -> bool {
        let rotated = self.force_rotation(now);
        if rotated {
            self.persist_in_background().await;
        }
        rotated
    }

    fn force_rotation(&self, now: TickTime) -> bool {
        let tick = self.oracle.force(now);
        tracing::info!(id = %tick.id, time = %tick.time, "tick forced");
        self.rotate_to(&tick)
    }

    fn rotate_to(&self, tick: &Tick) -> bool {
        self.store.adopt_first_tick(tick) || self.store.rotate(tick)
    }

    async fn persist_in_background(&self) {
        if let Err(err) = self.save_async().await {
            tracing::warn!(%err, "failed to save state after rotation");
        }
    }

    /// Replace the tick state, the open snapshot and the history wholesale
    pub fn restore(&self, saved: SavedState) {
        self.oracle.restore(saved.tick);
        self.store.restore(saved.current, saved.history);
    }

    pub fn current(&self) -> Arc<Snapshot> {
        self.store.current()
    }

    pub fn history(&self, limit: usize) -> History {
        self.store.history(limit)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    pub fn oracle(&self) -> &TickOracle<S> {
        &self.oracle
    }

    pub fn preferences(&self) -> Arc<Preferences> {
        self.preferences.get()
    }

    /// Push new preferences from their owner
    pub fn refresh_preferences(&self, preferences: Preferences) {
        self.preferences.refresh(preferences);
    }

    pub fn session(&self) -> Session {
        self.lock_session().clone()
    }

    pub fn saved_state(&self) -> SavedState {
        let (current, history) = self.store.export();
        SavedState {
            tick: self.oracle.state(),
            current: (*current).clone(),
            history: history.to_vec(),
        }
    }

    /// Write current state to the attached store, if any. Blocks on file I/O.
    pub fn save(&self) -> Result<()> {
        match &self.state_store {
            Some(store) => store.save(&self.saved_state()),
            None => Ok(()),
        }
    }

    /// Same as [`Self::save`], with the write moved onto tokio's blocking pool
    pub async fn save_async(&self) -> Result<()> {
        let Some(store) = self.state_store.clone() else {
            return Ok(());
        };
        let state = self.saved_state();
        tokio::task::spawn_blocking(move || store.save(&state))
            .await
            .map_err(|err| TallyError::Io(std::io::Error::new(std::io::ErrorKind::Other, err)))?
    }

    /// Final save before the process exits
    pub fn shutdown(&self) -> Result<()> {
        tracing::info!("saving state on shutdown");
        self.save()
    }
}
