//! Error types for facsurvey-import
//!
//! `SourceError` covers the HTTP boundary, `TransformError` a malformed
//! payload, and `ImportError` is what record processing and batch entry
//! points return. Record-level variants are folded into
//! `ImportSummary.errors` by the orchestrator; only batch-level variants
//! reach the caller.

use thiserror::Error;
use uuid::Uuid;

use crate::models::RawImportStatus;

/// Source API client errors
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network failure or timeout; retryable by the caller
    #[error("Source unavailable: {0}")]
    Unavailable(String),

    /// Non-2xx response from the source
    #[error("Source rejected request with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    /// 2xx response whose body is not the documented JSON shape
    #[error("Invalid source response: {0}")]
    InvalidResponse(String),
}

impl SourceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, SourceError::Unavailable(_))
    }
}

/// A raw record that cannot be turned into a survey
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransformError {
    #[error("Payload is not a JSON object")]
    NotAnObject,

    #[error("Submission has no external id")]
    MissingExternalId,

    #[error("Submission has no facility name")]
    MissingFacilityName,
}

/// Import pipeline error taxonomy
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Source rejected request with HTTP {status}: {body}")]
    SourceRejected { status: u16, body: String },

    #[error("Invalid source response: {0}")]
    InvalidResponse(String),

    #[error("Transform failed: {0}")]
    Transform(#[from] TransformError),

    /// Concurrent creation of the same facility kept conflicting after retries
    #[error("Facility resolution conflict for '{0}'")]
    FacilityResolutionConflict(String),

    #[error("Persistence error: {0}")]
    Persistence(#[from] facsurvey_common::Error),

    /// Non-monotonic raw import status change
    #[error("Raw import {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: Uuid,
        from: RawImportStatus,
        to: RawImportStatus,
    },
}

impl From<SourceError> for ImportError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::Unavailable(msg) => ImportError::SourceUnavailable(msg),
            SourceError::Rejected { status, body } => ImportError::SourceRejected { status, body },
            SourceError::InvalidResponse(msg) => ImportError::InvalidResponse(msg),
        }
    }
}

impl From<sqlx::Error> for ImportError {
    fn from(err: sqlx::Error) -> Self {
        ImportError::Persistence(facsurvey_common::Error::Database(err))
    }
}

impl From<serde_json::Error> for ImportError {
    fn from(err: serde_json::Error) -> Self {
        ImportError::Persistence(facsurvey_common::Error::Internal(format!(
            "JSON column encoding failed: {}",
            err
        )))
    }
}

/// Result type for import operations
pub type ImportResult<T> = Result<T, ImportError>;
