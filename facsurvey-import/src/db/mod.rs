//! Database access for the import pipeline
//!
//! Tables are created by `facsurvey_common::db::init_schema`; this module owns
//! the row-level reads and writes. Ids are stored as UUID text, timestamps as
//! RFC 3339 text with microsecond precision so lexical order is time order.

pub mod facilities;
pub mod raw_imports;
pub mod surveys;

use chrono::{DateTime, SecondsFormat, Utc};
use facsurvey_common::{Error, Result};
use uuid::Uuid;

pub use raw_imports::RawImportStore;

pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_timestamp(column: &str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp in {}: {} ({})", column, value, e)))
}

pub(crate) fn parse_uuid(column: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| Error::Internal(format!("Invalid UUID in {}: {} ({})", column, value, e)))
}

pub(crate) fn decode_json<T: serde::de::DeserializeOwned>(column: &str, value: &str) -> Result<T> {
    serde_json::from_str(value)
        .map_err(|e| Error::Internal(format!("Invalid JSON in {}: {}", column, e)))
}

pub(crate) fn encode_json<T: serde::Serialize>(column: &str, value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| Error::Internal(format!("Failed to serialize {}: {}", column, e)))
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_roundtrip_and_order() {
        let early = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let late = early + chrono::Duration::microseconds(1);

        let early_text = format_timestamp(early);
        let late_text = format_timestamp(late);
        assert!(early_text < late_text);
        assert_eq!(parse_timestamp("t", &early_text).unwrap(), early);
    }

    #[test]
    fn test_parse_errors_name_the_column() {
        let err = parse_uuid("facility_id", "nope").unwrap_err();
        assert!(err.to_string().contains("facility_id"));
        let err = parse_timestamp("created_at", "yesterday").unwrap_err();
        assert!(err.to_string().contains("created_at"));
    }
}
