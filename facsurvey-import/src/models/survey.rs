//! Survey entity and the transformer's output shape

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::facility::FacilityHint;
use super::facility_data::FacilityData;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SurveyStatus {
    Draft,
    Completed,
    Archived,
}

impl SurveyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SurveyStatus::Draft => "draft",
            SurveyStatus::Completed => "completed",
            SurveyStatus::Archived => "archived",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "draft" => SurveyStatus::Draft,
            "archived" => SurveyStatus::Archived,
            _ => SurveyStatus::Completed,
        }
    }
}

/// Persisted survey row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Survey {
    pub id: Uuid,
    /// Submission id in the source system; unique across all surveys
    pub external_id: String,
    pub facility_id: Uuid,
    pub raw_import_id: Option<Uuid>,
    pub collection_date: Option<DateTime<Utc>>,
    pub respondent_id: Option<String>,
    pub facility_data: FacilityData,
    /// Originating raw record, kept for traceability
    pub raw_data: serde_json::Value,
    pub status: SurveyStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Survey content produced by the transformer, before facility resolution
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyDraft {
    pub external_id: String,
    pub collection_date: Option<DateTime<Utc>>,
    pub respondent_id: Option<String>,
    pub facility_data: FacilityData,
    pub raw_data: serde_json::Value,
}

/// Output of `transform`: the survey plus what it says about its facility
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedSurvey {
    pub survey: SurveyDraft,
    pub facility: FacilityHint,
}
