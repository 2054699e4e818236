use std::path::PathBuf;

use thiserror::Error;

use crate::activity::store::StoreError;
use crate::tick::PollError;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Tick poll failed: {0}")]
    Poll(#[from] PollError),

    #[error("Activity store error: {0}")]
    Store(#[from] StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("State file is in use by another process (lock file {})", .0.display())]
    Locked(PathBuf),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, TallyError>;
