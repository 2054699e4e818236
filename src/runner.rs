//! Driving a live engine from a line-oriented input stream
//!
//! Each line is either a game event or a control command such as
//! `{"command":"force_tick"}`. A line that cannot be decoded is logged and
//! skipped; it never stops the stream. Whatever ends the run (end of input,
//! a read error, or the stop signal), the poller is shut down and the state is
//! saved before returning.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::activity::event::GameEvent;
use crate::core::error::Result;
use crate::engine::TallyEngine;
use crate::poller::TickPoller;
use crate::tick::TickSource;

/// Instructions for the running engine, sent in band with events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Same as a detected tick at the current time
    ForceTick,
    Save,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub lines: u64,
    pub tallied: u64,
    pub skipped: u64,
    pub forced: u64,
}

enum StreamLine {
    Event(Box<GameEvent>),
    Control(ControlCommand),
}

fn parse_line(line: &str) -> serde_json::Result<StreamLine> {
    let value: serde_json::Value = serde_json::from_str(line)?;
    if value.get("command").is_some() {
        Ok(StreamLine::Control(serde_json::from_value(value)?))
    } else {
        Ok(StreamLine::Event(Box::new(serde_json::from_value(value)?)))
    }
}

/// Feed every line of `reader` into `engine` until end of input
///
/// Counts go into `summary` as they happen, so they survive this future
/// being dropped part way through.
pub async fn ingest_stream<R, S>(
    engine: &TallyEngine<S>,
    reader: R,
    summary: &mut StreamSummary,
)
where
    R: AsyncBufRead + Unpin,
    S: TickSource,
{
    let mut segments = reader.split(b'\n');
    loop {
        let segment = match segments.next_segment().await {
            Ok(Some(segment)) => segment,
            Ok(None) => {
                tracing::info!("end of input");
                break;
            }
            Err(err) => {
                tracing::warn!(%err, "input read failed, stopping");
                break;
            }
        };
        summary.lines += 1;

        let text = match String::from_utf8(segment) {
            Ok(text) => text,
            Err(err) => {
                summary.skipped += 1;
                tracing::warn!(line = summary.lines, %err, "skipping line that is not UTF-8");
                continue;
            }
        };
        let line = text.trim();
        if line.is_empty() {
            continue;
        }

        match parse_line(line) {
            Ok(StreamLine::Event(event)) => {
                if engine.ingest(&event) {
                    summary.tallied += 1;
                }
            }
            Ok(StreamLine::Control(ControlCommand::ForceTick)) => {
                if engine.force_tick_async(Utc::now()).await {
                    summary.forced += 1;
                }
            }
            Ok(StreamLine::Control(ControlCommand::Save)) => {
                if let Err(err) = engine.save_async().await {
                    tracing::warn!(%err, "requested save failed");
                }
            }
            Err(err) => {
                summary.skipped += 1;
                tracing::warn!(line = summary.lines, %err, "skipping unreadable line");
            }
        }
    }
}

/// Run the engine with a background tick poller until the input ends or
/// `stop` resolves, then save
pub async fn run_until<R, S, F>(
    engine: Arc<TallyEngine<S>>,
    reader: R,
    poll_period: Duration,
    stop: F,
) -> Result<StreamSummary>
where
    R: AsyncBufRead + Unpin,
    S: TickSource + 'static,
    F: Future<Output = ()>,
{
    let poller = TickPoller::spawn(Arc::clone(&engine), poll_period);

    let mut summary = StreamSummary::default();
    tokio::select! {
        _ = ingest_stream(&engine, reader, &mut summary) => {}
        _ = stop => tracing::info!("stop requested"),
    }

    poller.shutdown().await;
    tracing::info!(
        lines = summary.lines,
        tallied = summary.tallied,
        skipped = summary.skipped,
        "saving state on shutdown"
    );
    engine.save_async().await?;
    Ok(summary)
}
