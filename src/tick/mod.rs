//! Tick detection: where the last server tick was, and when the next is due

pub mod oracle;
pub mod source;

use thiserror::Error;

pub use oracle::{PollOutcome, TickAlert, TickOracle, TickState};
pub use source::{HttpTickSource, TickSource};

/// Why a tick poll produced no information
///
/// Neither variant is fatal. The oracle keeps its previous estimate and the
/// poller tries again next period.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("tick source unreachable: {0}")]
    Unreachable(String),

    #[error("tick source returned malformed data: {0}")]
    Malformed(String),
}
