//! Background tick polling
//!
//! One task per engine. Each period it asks the oracle for the latest tick,
//! rotates on a new one and logs alert changes. A poll that has started
//! always runs to completion; shutdown is only noticed between periods.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::TallyEngine;
use crate::tick::{TickAlert, TickSource};

pub struct TickPoller {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl TickPoller {
    /// Start polling every `period`, with the first poll immediately
    pub fn spawn<S>(engine: Arc<TallyEngine<S>>, period: Duration) -> Self
    where
        S: TickSource + 'static,
    {
        let (shutdown, mut shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last_alert = TickAlert::Clear;

            tracing::info!(period_secs = period.as_secs_f64(), "tick poller started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    changed = shutdown_rx.changed() => {
                        // A dropped sender means nobody can stop us any more, so stop now
                        if changed.is_err() || *shutdown_rx.borrow() {
                            break;
                        }
                        continue;
                    }
                }

                match engine.check_tick().await {
                    Ok(true) => {
                        tracing::info!(tick = %engine.oracle().formatted(), "new tick detected");
                    }
                    Ok(false) => {}
                    Err(err) => {
                        tracing::warn!(%err, "tick poll failed, keeping previous estimate");
                    }
                }

                let alert = engine.oracle().alert(Utc::now());
                if alert != last_alert {
                    tracing::info!(
                        %alert,
                        next = %engine.oracle().next_predicted(),
                        "tick alert changed"
                    );
                    last_alert = alert;
                }
            }
            tracing::info!("tick poller stopped");
        });

        Self { shutdown, task }
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Signal the task and wait for it to finish its current poll
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(err) = self.task.await {
            tracing::error!(%err, "tick poller task failed");
        }
    }
}
