//! Staged raw payloads and their processing state machine
//!
//! pending → processing → {succeeded | failed}. Going back to pending only
//! happens through an explicit re-queue: of a failed row, or of a row left in
//! processing by a run that died.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RawImportStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
}

impl RawImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RawImportStatus::Pending => "pending",
            RawImportStatus::Processing => "processing",
            RawImportStatus::Succeeded => "succeeded",
            RawImportStatus::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(RawImportStatus::Pending),
            "processing" => Some(RawImportStatus::Processing),
            "succeeded" => Some(RawImportStatus::Succeeded),
            "failed" => Some(RawImportStatus::Failed),
            _ => None,
        }
    }

    /// Whether `self → next` is a legal forward transition
    pub fn can_transition_to(&self, next: RawImportStatus) -> bool {
        matches!(
            (self, next),
            (RawImportStatus::Pending, RawImportStatus::Processing)
                | (RawImportStatus::Processing, RawImportStatus::Succeeded)
                | (RawImportStatus::Processing, RawImportStatus::Failed)
        )
    }

    /// Whether an operator re-queue may move `self` back to `pending`
    pub fn can_requeue(&self) -> bool {
        matches!(self, RawImportStatus::Failed | RawImportStatus::Processing)
    }
}

impl std::fmt::Display for RawImportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fetched submission, stored verbatim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawImport {
    pub id: Uuid,
    /// Source system tag, e.g. "kobo"
    pub source: String,
    /// Exactly as received; never rewritten after staging
    pub payload: serde_json::Value,
    pub status: RawImportStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
