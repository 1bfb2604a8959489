//! Programme catalogue lookups.
//!
//! The catalogue maps a programme identifier (PID) to the metadata used for
//! naming. `BbcCatalogue` talks to the public programmes JSON API.

mod bbc;
mod types;

pub use bbc::BbcCatalogue;
pub use types::{MediaType, ProgrammeMetadata};

use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur when querying the catalogue.
#[derive(Debug, Error)]
pub enum CatalogueError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The catalogue answered with a non-success status.
    #[error("Unknown programme id: {pid} (status {status})")]
    UnknownProgramme { pid: String, status: u16 },

    /// The body did not match the expected shape.
    #[error("Failed to parse programme response: {0}")]
    Parse(String),
}

impl CatalogueError {
    /// Only transport failures can change outcome on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_))
    }
}

/// Source of programme metadata.
#[async_trait]
pub trait ProgrammeCatalogue: Send + Sync {
    /// Looks up one programme by PID.
    async fn programme(&self, pid: &str) -> Result<ProgrammeMetadata, CatalogueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_classification() {
        let unknown = CatalogueError::UnknownProgramme {
            pid: "b00nope".to_string(),
            status: 404,
        };
        assert!(!unknown.is_retryable());
        assert!(!CatalogueError::Parse("missing field".to_string()).is_retryable());
    }
}
