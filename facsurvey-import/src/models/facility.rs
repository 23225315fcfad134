//! Facility entity and the identity hint extracted from a submission

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::FacilityType;

/// Lifecycle status of a facility record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacilityStatus {
    /// Created by the survey import, not yet reviewed
    Survey,
    Active,
    Inactive,
}

impl FacilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FacilityStatus::Survey => "survey",
            FacilityStatus::Active => "active",
            FacilityStatus::Inactive => "inactive",
        }
    }

    pub fn from_db(value: &str) -> Self {
        match value {
            "active" => FacilityStatus::Active,
            "inactive" => FacilityStatus::Inactive,
            _ => FacilityStatus::Survey,
        }
    }
}

/// WGS84 point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Returns `None` for non-finite or out-of-range coordinates
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self {
            latitude,
            longitude,
        })
    }

    /// GeoJSON coordinate order
    pub fn to_lon_lat(self) -> [f64; 2] {
        [self.longitude, self.latitude]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Facility {
    pub id: Uuid,
    pub name: String,
    pub facility_type: Option<FacilityType>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: FacilityStatus,
    pub owner_user_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a submission says about the facility it describes
#[derive(Debug, Clone, PartialEq)]
pub struct FacilityHint {
    pub name: String,
    /// `None` when the form left the type unanswered
    pub facility_type: Option<FacilityType>,
    pub coordinates: Option<GeoPoint>,
}

/// Identity key for a facility name: trimmed, lowercased, inner whitespace collapsed
pub fn name_key(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
