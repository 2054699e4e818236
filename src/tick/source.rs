//! Upstream tick sources
//!
//! The oracle treats the source as a black box that either yields the latest
//! tick or fails. [`HttpTickSource`] talks to the Elite BGS tick API.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use crate::core::config::TallyConfig;
use crate::core::error::{Result, TallyError};
use crate::core::types::Tick;
use crate::tick::PollError;

/// Something that can report the most recent server tick
pub trait TickSource: Send + Sync {
    fn fetch(&self) -> impl Future<Output = std::result::Result<Tick, PollError>> + Send;
}

/// HTTP tick source with a bounded request timeout
pub struct HttpTickSource {
    client: Client,
    url: String,
}

impl HttpTickSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("bgs-tally/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TallyError::Config(format!("cannot build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_config(config: &TallyConfig) -> Result<Self> {
        Self::new(config.tick_url.clone(), config.request_timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl TickSource for HttpTickSource {
    async fn fetch(&self) -> std::result::Result<Tick, PollError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| PollError::Unreachable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PollError::Unreachable(format!("HTTP {}: {}", status, error_text)));
        }

        // Timeouts can also fire while the body streams in
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                PollError::Unreachable(e.to_string())
            } else {
                PollError::Malformed(e.to_string())
            }
        })?;

        parse_tick_response(&body)
    }
}

// Elite BGS tick API format
#[derive(Deserialize)]
struct TickEntry {
    #[serde(rename = "_id")]
    id: String,
    time: String,
}

/// Parse a tick API body: a JSON array whose first entry is the latest tick
pub fn parse_tick_response(body: &str) -> std::result::Result<Tick, PollError> {
    let entries: Vec<TickEntry> =
        serde_json::from_str(body).map_err(|e| PollError::Malformed(e.to_string()))?;

    let entry = entries
        .into_iter()
        .next()
        .ok_or_else(|| PollError::Malformed("empty tick list".into()))?;

    let time = DateTime::parse_from_rfc3339(&entry.time)
        .map_err(|e| PollError::Malformed(format!("bad tick time {:?}: {}", entry.time, e)))?
        .with_timezone(&Utc);

    Ok(Tick::new(entry.id, time))
}
