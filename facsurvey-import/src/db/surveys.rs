//! Survey persistence
//!
//! `upsert` is the pipeline's idempotence boundary: one row per external id,
//! re-imports update that row in place.

use chrono::Utc;
use facsurvey_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{decode_json, encode_json, format_timestamp, parse_timestamp, parse_uuid};
use crate::models::{Survey, SurveyDraft, SurveyStatus};
use crate::utils::retry_on_lock;

const SELECT_COLUMNS: &str = r#"
    SELECT id, external_id, facility_id, raw_import_id, collection_date, respondent_id,
           facility_data, raw_data, status, created_at, updated_at
    FROM surveys
"#;

/// Insert or update the survey for `draft.external_id`; returns the row id
///
/// On conflict the existing row keeps its id, status and `created_at`; every
/// content column is replaced with the new import's values.
pub async fn upsert(
    pool: &SqlitePool,
    draft: &SurveyDraft,
    facility_id: Uuid,
    raw_import_id: Option<Uuid>,
    max_lock_wait_ms: u64,
) -> Result<Uuid> {
    // Prepare everything before touching the database
    let new_id = Uuid::new_v4().to_string();
    let facility_id = facility_id.to_string();
    let raw_import_id = raw_import_id.map(|id| id.to_string());
    let collection_date = draft.collection_date.map(format_timestamp);
    let facility_data = encode_json("facility_data", &draft.facility_data)?;
    let raw_data = encode_json("raw_data", &draft.raw_data)?;
    let now = format_timestamp(Utc::now());

    let id: String = retry_on_lock("survey upsert", max_lock_wait_ms, || async {
        let id: String = sqlx::query_scalar(
            r#"
            INSERT INTO surveys (
                id, external_id, facility_id, raw_import_id, collection_date, respondent_id,
                facility_data, raw_data, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(external_id) DO UPDATE SET
                facility_id = excluded.facility_id,
                raw_import_id = excluded.raw_import_id,
                collection_date = excluded.collection_date,
                respondent_id = excluded.respondent_id,
                facility_data = excluded.facility_data,
                raw_data = excluded.raw_data,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
        )
        .bind(&new_id)
        .bind(&draft.external_id)
        .bind(&facility_id)
        .bind(&raw_import_id)
        .bind(&collection_date)
        .bind(&draft.respondent_id)
        .bind(&facility_data)
        .bind(&raw_data)
        .bind(SurveyStatus::Completed.as_str())
        .bind(&now)
        .bind(&now)
        .fetch_one(pool)
        .await?;
        Ok(id)
    })
    .await?;

    parse_uuid("surveys.id", &id)
}

pub async fn find_by_external_id(pool: &SqlitePool, external_id: &str) -> Result<Option<Survey>> {
    let row = sqlx::query(&format!("{} WHERE external_id = ?", SELECT_COLUMNS))
        .bind(external_id)
        .fetch_optional(pool)
        .await?;

    row.map(|r| survey_from_row(&r)).transpose()
}

/// Surveys owned by a facility, oldest first
pub async fn list_for_facility(pool: &SqlitePool, facility_id: Uuid) -> Result<Vec<Survey>> {
    let rows = sqlx::query(&format!(
        "{} WHERE facility_id = ? ORDER BY created_at ASC, rowid ASC",
        SELECT_COLUMNS
    ))
    .bind(facility_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(survey_from_row).collect()
}

pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let n = sqlx::query_scalar("SELECT COUNT(*) FROM surveys")
        .fetch_one(pool)
        .await?;
    Ok(n)
}

fn survey_from_row(row: &SqliteRow) -> Result<Survey> {
    let id: String = row.get("id");
    let facility_id: String = row.get("facility_id");
    let raw_import_id: Option<String> = row.get("raw_import_id");
    let collection_date: Option<String> = row.get("collection_date");
    let facility_data: String = row.get("facility_data");
    let raw_data: String = row.get("raw_data");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Survey {
        id: parse_uuid("surveys.id", &id)?,
        external_id: row.get("external_id"),
        facility_id: parse_uuid("surveys.facility_id", &facility_id)?,
        raw_import_id: raw_import_id
            .as_deref()
            .map(|v| parse_uuid("surveys.raw_import_id", v))
            .transpose()?,
        collection_date: collection_date
            .as_deref()
            .map(|v| parse_timestamp("surveys.collection_date", v))
            .transpose()?,
        respondent_id: row.get("respondent_id"),
        facility_data: decode_json("surveys.facility_data", &facility_data)?,
        raw_data: decode_json("surveys.raw_data", &raw_data)?,
        status: SurveyStatus::from_db(&status),
        created_at: parse_timestamp("surveys.created_at", &created_at)?,
        updated_at: parse_timestamp("surveys.updated_at", &updated_at)?,
    })
}
