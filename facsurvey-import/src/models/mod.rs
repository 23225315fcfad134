//! Data models for the survey import pipeline

pub mod enums;
pub mod facility;
pub mod facility_data;
pub mod import_summary;
pub mod raw_import;
pub mod survey;

pub use enums::{
    ElectricityAvailability, ElectricityReliability, ElectricitySource, FacilityType, Ownership,
    TimeOfDay, TransportationAccess,
};
pub use facility::{name_key, Facility, FacilityHint, FacilityStatus, GeoPoint};
pub use facility_data::{
    Buildings, EquipmentItem, EquipmentSource, FacilityData, Infrastructure, Location,
    OperationalHours, Staff,
};
pub use import_summary::{ImportSummary, RecordError};
pub use raw_import::{RawImport, RawImportStatus};
pub use survey::{Survey, SurveyDraft, SurveyStatus, TransformedSurvey};
