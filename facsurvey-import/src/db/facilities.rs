//! Facility persistence
//!
//! Lookups go through `name_key` (trimmed, lowercased, whitespace-collapsed
//! name), which carries a UNIQUE index. Creation is a plain INSERT so that a
//! concurrent duplicate surfaces as a unique violation for the resolver to
//! handle.

use chrono::Utc;
use facsurvey_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid};
use crate::models::{name_key, Facility, FacilityHint, FacilityStatus, FacilityType};

const SELECT_COLUMNS: &str = r#"
    SELECT id, name, facility_type, latitude, longitude, status, owner_user_id,
           created_at, updated_at
    FROM facilities
"#;

/// Case-insensitive exact name lookup
///
/// The unique index means at most one row matches; the ordering keeps the
/// "most recently created wins" rule should that index ever be relaxed.
pub async fn find_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Facility>> {
    let row = sqlx::query(&format!(
        "{} WHERE name_key = ? ORDER BY created_at DESC LIMIT 1",
        SELECT_COLUMNS
    ))
    .bind(name_key(name))
    .fetch_optional(pool)
    .await?;

    row.map(|r| facility_from_row(&r)).transpose()
}

pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Facility>> {
    let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.map(|r| facility_from_row(&r)).transpose()
}

/// Build a new facility (status `survey`) from a hint
pub fn new_facility(hint: &FacilityHint, owner_user_id: Option<&str>) -> Facility {
    let now = Utc::now();
    Facility {
        id: Uuid::new_v4(),
        name: hint.name.trim().to_string(),
        facility_type: hint.facility_type,
        latitude: hint.coordinates.map(|c| c.latitude),
        longitude: hint.coordinates.map(|c| c.longitude),
        status: FacilityStatus::Survey,
        owner_user_id: owner_user_id.map(str::to_string),
        created_at: now,
        updated_at: now,
    }
}

/// Insert a facility; a duplicate name fails with a unique violation
pub async fn insert(pool: &SqlitePool, facility: &Facility) -> Result<()> {
    if facility.name.trim().is_empty() {
        return Err(Error::InvalidInput("facility name is empty".to_string()));
    }

    sqlx::query(
        r#"
        INSERT INTO facilities (
            id, name, name_key, facility_type, latitude, longitude,
            status, owner_user_id, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(facility.id.to_string())
    .bind(&facility.name)
    .bind(name_key(&facility.name))
    .bind(facility.facility_type.map(|t| t.as_str()))
    .bind(facility.latitude)
    .bind(facility.longitude)
    .bind(facility.status.as_str())
    .bind(&facility.owner_user_id)
    .bind(format_timestamp(facility.created_at))
    .bind(format_timestamp(facility.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

/// Fill fields that are still NULL from `hint`; set fields are never overwritten
///
/// Latitude and longitude are written together and only when both are NULL.
/// Returns true when the row changed.
pub async fn backfill(pool: &SqlitePool, id: Uuid, hint: &FacilityHint) -> Result<bool> {
    let facility_type = hint.facility_type.map(|t| t.as_str());
    let latitude = hint.coordinates.map(|c| c.latitude);
    let longitude = hint.coordinates.map(|c| c.longitude);

    if facility_type.is_none() && latitude.is_none() {
        return Ok(false);
    }

    let result = sqlx::query(
        r#"
        UPDATE facilities SET
            facility_type = COALESCE(facility_type, ?1),
            latitude = CASE WHEN latitude IS NULL AND longitude IS NULL THEN ?2 ELSE latitude END,
            longitude = CASE WHEN latitude IS NULL AND longitude IS NULL THEN ?3 ELSE longitude END,
            updated_at = ?4
        WHERE id = ?5
          AND ((facility_type IS NULL AND ?1 IS NOT NULL)
               OR (latitude IS NULL AND longitude IS NULL AND ?2 IS NOT NULL))
        "#,
    )
    .bind(facility_type)
    .bind(latitude)
    .bind(longitude)
    .bind(format_timestamp(Utc::now()))
    .bind(id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let n = sqlx::query_scalar("SELECT COUNT(*) FROM facilities")
        .fetch_one(pool)
        .await?;
    Ok(n)
}

fn facility_from_row(row: &SqliteRow) -> Result<Facility> {
    let id: String = row.get("id");
    let facility_type: Option<String> = row.get("facility_type");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Facility {
        id: parse_uuid("facilities.id", &id)?,
        name: row.get("name"),
        facility_type: facility_type.as_deref().map(FacilityType::from_db),
        latitude: row.get("latitude"),
        longitude: row.get("longitude"),
        status: FacilityStatus::from_db(&status),
        owner_user_id: row.get("owner_user_id"),
        created_at: parse_timestamp("facilities.created_at", &created_at)?,
        updated_at: parse_timestamp("facilities.updated_at", &updated_at)?,
    })
}
