//! Raw import store
//!
//! Every fetched payload is staged here before any transformation runs, so a
//! record that fails mid-pipeline can be replayed from its stored payload
//! without going back to the source. Status changes are conditional UPDATEs
//! (`WHERE status = <expected>`), which keeps them monotonic even when several
//! workers race on the same row.

use chrono::Utc;
use facsurvey_common::Error;
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use super::{decode_json, encode_json, format_timestamp, parse_timestamp, parse_uuid};
use crate::error::{ImportError, ImportResult};
use crate::models::{RawImport, RawImportStatus};
use crate::utils::retry_on_lock;

const SELECT_COLUMNS: &str =
    "SELECT id, source, payload, status, error, created_at, updated_at FROM raw_imports";

/// Handle on the `raw_imports` table
#[derive(Clone)]
pub struct RawImportStore {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl RawImportStore {
    pub fn new(pool: SqlitePool, max_lock_wait_ms: u64) -> Self {
        Self {
            pool,
            max_lock_wait_ms,
        }
    }

    /// Persist a fetched payload verbatim with status `pending`
    pub async fn stage(&self, source: &str, payload: &Value) -> ImportResult<RawImport> {
        let now = Utc::now();
        let raw = RawImport {
            id: Uuid::new_v4(),
            source: source.to_string(),
            payload: payload.clone(),
            status: RawImportStatus::Pending,
            error: None,
            created_at: now,
            updated_at: now,
        };

        let id = raw.id.to_string();
        let payload_text = encode_json("payload", &raw.payload)?;
        let timestamp = format_timestamp(now);

        retry_on_lock("stage raw import", self.max_lock_wait_ms, || async {
            sqlx::query(
                r#"
                INSERT INTO raw_imports (id, source, payload, status, error, created_at, updated_at)
                VALUES (?, ?, ?, 'pending', NULL, ?, ?)
                "#,
            )
            .bind(&id)
            .bind(source)
            .bind(&payload_text)
            .bind(&timestamp)
            .bind(&timestamp)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await?;

        debug!(raw_import_id = %raw.id, source, "Staged raw import");
        Ok(raw)
    }

    /// pending → processing
    pub async fn mark_processing(&self, id: Uuid) -> ImportResult<()> {
        self.transition(id, RawImportStatus::Pending, RawImportStatus::Processing, None)
            .await
    }

    /// processing → succeeded
    pub async fn mark_succeeded(&self, id: Uuid) -> ImportResult<()> {
        self.transition(id, RawImportStatus::Processing, RawImportStatus::Succeeded, None)
            .await
    }

    /// processing → failed, recording why
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> ImportResult<()> {
        self.transition(
            id,
            RawImportStatus::Processing,
            RawImportStatus::Failed,
            Some(error),
        )
        .await
    }

    /// failed → pending; the only way back out of a terminal state
    pub async fn requeue(&self, id: Uuid) -> ImportResult<()> {
        self.transition(id, RawImportStatus::Failed, RawImportStatus::Pending, None)
            .await
    }

    /// Re-queue every failed row; returns how many moved
    pub async fn requeue_all_failed(&self) -> ImportResult<u64> {
        let timestamp = format_timestamp(Utc::now());

        let moved = retry_on_lock("requeue failed raw imports", self.max_lock_wait_ms, || async {
            let result = sqlx::query(
                "UPDATE raw_imports SET status = 'pending', error = NULL, updated_at = ? WHERE status = 'failed'",
            )
            .bind(&timestamp)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await?;

        Ok(moved)
    }

    /// Re-queue rows stuck in `processing` whose last update is at least
    /// `older_than` ago; returns how many moved
    ///
    /// A run that dies between claiming a row and recording its outcome leaves
    /// it in `processing`. The age threshold keeps rows claimed by a run that
    /// is still going out of reach.
    pub async fn requeue_stale_processing(&self, older_than: Duration) -> ImportResult<u64> {
        let now = Utc::now();
        let cutoff = chrono::Duration::from_std(older_than)
            .ok()
            .and_then(|age| now.checked_sub_signed(age))
            .ok_or_else(|| {
                Error::InvalidInput(format!("Stale age out of range: {:?}", older_than))
            })?;
        let cutoff = format_timestamp(cutoff);
        let timestamp = format_timestamp(now);

        let moved = retry_on_lock("requeue stale raw imports", self.max_lock_wait_ms, || async {
            let result = sqlx::query(
                "UPDATE raw_imports SET status = 'pending', error = NULL, updated_at = ? WHERE status = 'processing' AND updated_at <= ?",
            )
            .bind(&timestamp)
            .bind(&cutoff)
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await?;

        if moved > 0 {
            debug!(moved, "Re-queued stale processing raw imports");
        }
        Ok(moved)
    }

    pub async fn load(&self, id: Uuid) -> ImportResult<Option<RawImport>> {
        let row = sqlx::query(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| raw_import_from_row(&r)).transpose()
    }

    /// Rows in `status`, oldest first
    pub async fn list_by_status(
        &self,
        status: RawImportStatus,
        limit: Option<u32>,
    ) -> ImportResult<Vec<RawImport>> {
        // SQLite treats a negative LIMIT as unbounded
        let limit = limit.map(i64::from).unwrap_or(-1);

        let rows = sqlx::query(&format!(
            "{} WHERE status = ? ORDER BY created_at ASC, rowid ASC LIMIT ?",
            SELECT_COLUMNS
        ))
        .bind(status.as_str())
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(raw_import_from_row).collect()
    }

    /// Row count per status; statuses with no rows are absent
    pub async fn count_by_status(&self) -> ImportResult<HashMap<RawImportStatus, i64>> {
        let rows = sqlx::query("SELECT status, COUNT(*) AS n FROM raw_imports GROUP BY status")
            .fetch_all(&self.pool)
            .await?;

        let mut counts = HashMap::new();
        for row in rows {
            let status: String = row.get("status");
            if let Some(status) = RawImportStatus::parse(&status) {
                counts.insert(status, row.get::<i64, _>("n"));
            }
        }
        Ok(counts)
    }

    async fn transition(
        &self,
        id: Uuid,
        from: RawImportStatus,
        to: RawImportStatus,
        error: Option<&str>,
    ) -> ImportResult<()> {
        let allowed = from.can_transition_to(to)
            || (to == RawImportStatus::Pending && from.can_requeue());
        if !allowed {
            return Err(ImportError::InvalidTransition { id, from, to });
        }

        let id_text = id.to_string();
        let timestamp = format_timestamp(Utc::now());

        let affected = retry_on_lock("raw import status change", self.max_lock_wait_ms, || async {
            let result = sqlx::query(
                "UPDATE raw_imports SET status = ?, error = ?, updated_at = ? WHERE id = ? AND status = ?",
            )
            .bind(to.as_str())
            .bind(error)
            .bind(&timestamp)
            .bind(&id_text)
            .bind(from.as_str())
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected())
        })
        .await?;

        if affected == 1 {
            debug!(raw_import_id = %id, from = %from, to = %to, "Raw import status changed");
            return Ok(());
        }

        // Nothing matched: either the row is gone or it is in another state
        match self.load(id).await? {
            Some(current) => Err(ImportError::InvalidTransition {
                id,
                from: current.status,
                to,
            }),
            None => Err(ImportError::Persistence(Error::NotFound(format!(
                "raw import {}",
                id
            )))),
        }
    }
}

fn raw_import_from_row(row: &SqliteRow) -> ImportResult<RawImport> {
    let id: String = row.get("id");
    let payload: String = row.get("payload");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    let status = RawImportStatus::parse(&status).ok_or_else(|| {
        Error::Internal(format!("Unknown raw import status in database: {}", status))
    })?;

    Ok(RawImport {
        id: parse_uuid("raw_imports.id", &id)?,
        source: row.get("source"),
        payload: decode_json("raw_imports.payload", &payload)?,
        status,
        error: row.get("error"),
        created_at: parse_timestamp("raw_imports.created_at", &created_at)?,
        updated_at: parse_timestamp("raw_imports.updated_at", &updated_at)?,
    })
}
