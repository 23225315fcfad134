//! Batch outcome returned to callers
//!
//! Every record fetched in a batch is accounted for: it either counts toward
//! `imported` or appears in `errors`.

use serde::{Deserialize, Serialize};

/// Why one record of a batch did not import
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordError {
    /// External submission id, or `raw-import:<uuid>` when the payload had none
    pub external_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    /// True when the batch ran to completion (record failures are reported
    /// through `failed`/`errors`, not through this flag)
    pub success: bool,
    pub imported: usize,
    pub failed: usize,
    pub message: String,
    pub errors: Vec<RecordError>,
}

impl ImportSummary {
    /// Empty, successful summary
    pub fn new() -> Self {
        Self {
            success: true,
            imported: 0,
            failed: 0,
            message: String::new(),
            errors: Vec::new(),
        }
    }

    /// Summary for a by-id import whose submission does not exist
    pub fn not_found(external_id: &str) -> Self {
        Self {
            success: false,
            message: format!("Submission {} not found in source", external_id),
            ..Self::new()
        }
    }

    pub fn record_imported(&mut self) {
        self.imported += 1;
    }

    pub fn record_failed(&mut self, external_id: impl Into<String>, reason: impl Into<String>) {
        self.failed += 1;
        self.errors.push(RecordError {
            external_id: external_id.into(),
            reason: reason.into(),
        });
    }

    /// Number of records that reached a terminal outcome
    pub fn processed(&self) -> usize {
        self.imported + self.failed
    }

    /// Set `success` and `message` once the batch stops
    pub fn finish(mut self, total: usize, cancelled: bool) -> Self {
        if cancelled {
            self.success = false;
            self.message = format!(
                "Import cancelled after {} of {} submissions ({} imported, {} failed)",
                self.processed(),
                total,
                self.imported,
                self.failed
            );
        } else {
            self.success = true;
            self.message = format!(
                "Imported {} of {} submissions ({} failed)",
                self.imported, total, self.failed
            );
        }
        self
    }
}

impl Default for ImportSummary {
    fn default() -> Self {
        Self::new()
    }
}
