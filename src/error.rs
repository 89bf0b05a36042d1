//! Error types for list acquisition.

use thiserror::Error;

/// Diagnostic reported when the acquisition deadline expires.
pub const TIMEOUT_MESSAGE: &str = "Timed out while waiting for first POST request or while scrolling to next batch of IDs. (Timeout length may need to be increased)";

/// Failure of a single acquisition run.
///
/// A run yields either a full result or exactly one of these; partially
/// accumulated identifiers are discarded.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// The owner has restricted the list; nothing was acquired.
    #[error("list is private")]
    PrivateList,

    /// The deadline expired before the final batch arrived.
    #[error("{message}")]
    Timeout { message: String },

    /// The final batch arrived but no identifiers were ever collected.
    #[error("no identifiers found, try again")]
    EmptyResult,

    /// The session stopped delivering traffic before the list completed.
    #[error("network traffic stream closed before the list finished loading")]
    TrafficClosed,

    /// Launch, navigation or page interaction failed.
    #[error("browser session error: {0:#}")]
    Session(#[from] anyhow::Error),
}

impl AcquireError {
    pub fn timeout() -> Self {
        Self::Timeout {
            message: TIMEOUT_MESSAGE.to_string(),
        }
    }

    /// Short machine-friendly name, used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PrivateList => "private_list",
            Self::Timeout { .. } => "timeout",
            Self::EmptyResult => "empty_result",
            Self::TrafficClosed => "traffic_closed",
            Self::Session(_) => "session",
        }
    }
}

pub type Result<T> = std::result::Result<T, AcquireError>;
