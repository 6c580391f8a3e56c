//! Error types for the ingestion pipeline.

use thiserror::Error;

/// Why an ingestion cycle ended without installing a new schedule.
///
/// Every variant leaves the store exactly as it was before the cycle.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Download failed or timed out
    #[error("Fetch error: {message}")]
    Fetch { message: String },

    /// The conversion collaborator failed, timed out, or left no usable grid
    #[error("Conversion error: {message}")]
    Conversion { message: String },

    /// The converted grid contained no valid schedule rows
    #[error("Normalization produced no records; keeping the current schedule")]
    NormalizationEmptyResult,

    /// The atomic swap was rolled back
    #[error("Store replace failed: {message}")]
    StoreReplace { message: String },

    /// Staging or promoting a local artifact failed
    #[error("Artifact error: {message}")]
    Artifact { message: String },

    /// Another cycle holds the pipeline
    #[error("Ingestion cycle already in progress")]
    CycleInProgress,
}

impl IngestError {
    /// True if the next timer tick can simply try again.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, IngestError::StoreReplace { .. })
    }
}

impl From<reqwest::Error> for IngestError {
    fn from(err: reqwest::Error) -> Self {
        IngestError::Fetch {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for IngestError {
    fn from(err: std::io::Error) -> Self {
        IngestError::Artifact {
            message: err.to_string(),
        }
    }
}

/// A single contact could not be notified. Never fails the cycle.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Delivery to chat {chat_id} failed: {message}")]
    Delivery { chat_id: i64, message: String },

    #[error("Delivery to chat {chat_id} rejected with status {status}")]
    Rejected { chat_id: i64, status: u16 },
}
