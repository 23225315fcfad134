//! Batch import orchestrator
//!
//! Per record, strictly in order: stage raw payload → mark processing →
//! transform → resolve facility → upsert survey → mark succeeded/failed.
//! Records run concurrently up to the configured limit and fail in
//! isolation; only an unreachable database or a failed fetch aborts a batch.
//! On cancellation, fetched records that never started are still staged as
//! `pending`, so a later replay picks them up without re-fetching.

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::facility_resolver::FacilityResolver;
use super::source_client::SurveySource;
use crate::db::{surveys, RawImportStore};
use crate::error::{ImportError, ImportResult, SourceError};
use crate::models::{ImportSummary, RawImport, RawImportStatus};
use crate::transform::raw_record::RawRecord;
use crate::transform::{transform, EXTERNAL_ID_KEYS};

/// Tuning values resolved from configuration
#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub concurrency: usize,
    pub owner_user_id: Option<String>,
    pub max_lock_wait_ms: u64,
}

/// A unit of work: fresh from the source, or already staged (replay)
enum WorkItem {
    Fetched(Value),
    Staged(RawImport),
}

enum RecordOutcome {
    Imported,
    Failed { external_id: String, reason: String },
    /// Not started because the batch was cancelled
    Skipped,
}

pub struct ImportOrchestrator {
    pool: SqlitePool,
    source: Arc<dyn SurveySource>,
    raw_store: RawImportStore,
    resolver: FacilityResolver,
    concurrency: usize,
    max_lock_wait_ms: u64,
}

impl ImportOrchestrator {
    pub fn new(pool: SqlitePool, source: Arc<dyn SurveySource>, options: OrchestratorOptions) -> Self {
        Self {
            raw_store: RawImportStore::new(pool.clone(), options.max_lock_wait_ms),
            resolver: FacilityResolver::new(
                pool.clone(),
                options.owner_user_id,
                options.max_lock_wait_ms,
            ),
            pool,
            source,
            concurrency: options.concurrency.max(1),
            max_lock_wait_ms: options.max_lock_wait_ms,
        }
    }

    pub fn raw_store(&self) -> &RawImportStore {
        &self.raw_store
    }

    /// Import every submission collected in `[start, end)`
    pub async fn import_by_date_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        cancel_token: &CancellationToken,
    ) -> ImportResult<ImportSummary> {
        self.ensure_database().await?;

        tracing::info!(start = %start, end = %end, "Starting date range import");
        let records = self
            .source
            .fetch_by_date_range(start, end)
            .await
            .map_err(log_fetch_failure)?;

        let items = records.into_iter().map(WorkItem::Fetched).collect();
        Ok(self.run_batch(items, cancel_token).await)
    }

    /// Import one submission by its external id
    pub async fn import_by_id(
        &self,
        external_id: &str,
        cancel_token: &CancellationToken,
    ) -> ImportResult<ImportSummary> {
        self.ensure_database().await?;

        tracing::info!(external_id, "Starting single submission import");
        match self
            .source
            .fetch_by_id(external_id)
            .await
            .map_err(log_fetch_failure)?
        {
            Some(record) => Ok(self.run_batch(vec![WorkItem::Fetched(record)], cancel_token).await),
            None => Ok(ImportSummary::not_found(external_id)),
        }
    }

    /// Process every `pending` staged row from its stored payload
    pub async fn replay_pending(&self, cancel_token: &CancellationToken) -> ImportResult<ImportSummary> {
        self.ensure_database().await?;

        let pending = self
            .raw_store
            .list_by_status(RawImportStatus::Pending, None)
            .await?;
        tracing::info!(pending = pending.len(), "Replaying staged raw imports");

        let items = pending.into_iter().map(WorkItem::Staged).collect();
        Ok(self.run_batch(items, cancel_token).await)
    }

    /// Re-queue every `failed` row, then replay
    pub async fn retry_failed(&self, cancel_token: &CancellationToken) -> ImportResult<ImportSummary> {
        self.ensure_database().await?;

        let requeued = self.raw_store.requeue_all_failed().await?;
        tracing::info!(requeued, "Re-queued failed raw imports");

        self.replay_pending(cancel_token).await
    }

    /// Re-queue rows left in `processing` for at least `older_than`, then replay
    pub async fn recover_stale(
        &self,
        older_than: Duration,
        cancel_token: &CancellationToken,
    ) -> ImportResult<ImportSummary> {
        self.ensure_database().await?;

        let requeued = self.raw_store.requeue_stale_processing(older_than).await?;
        tracing::info!(
            requeued,
            older_than_secs = older_than.as_secs(),
            "Re-queued stale processing raw imports"
        );

        self.replay_pending(cancel_token).await
    }

    async fn ensure_database(&self) -> ImportResult<()> {
        facsurvey_common::db::ping(&self.pool).await.map_err(|e| {
            tracing::error!(error = %e, "Database unreachable, aborting batch");
            ImportError::Persistence(e)
        })
    }

    async fn run_batch(&self, items: Vec<WorkItem>, cancel_token: &CancellationToken) -> ImportSummary {
        let total = items.len();
        let processed = AtomicUsize::new(0);

        let outcomes: Vec<RecordOutcome> = stream::iter(items)
            .map(|item| {
                let processed = &processed;
                async move {
                    if cancel_token.is_cancelled() {
                        self.park(item).await;
                        return RecordOutcome::Skipped;
                    }

                    let outcome = self.process_item(item).await;

                    let current = processed.fetch_add(1, Ordering::Relaxed) + 1;
                    if current % 25 == 0 || current == total {
                        tracing::info!(
                            progress = format!("{}/{}", current, total),
                            "Import progress update"
                        );
                    }
                    outcome
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut summary = ImportSummary::new();
        let mut skipped = 0usize;
        for outcome in outcomes {
            match outcome {
                RecordOutcome::Imported => summary.record_imported(),
                RecordOutcome::Failed {
                    external_id,
                    reason,
                } => summary.record_failed(external_id, reason),
                RecordOutcome::Skipped => skipped += 1,
            }
        }

        let summary = summary.finish(total, skipped > 0);
        tracing::info!(
            total,
            imported = summary.imported,
            failed = summary.failed,
            skipped,
            "Import batch finished"
        );
        summary
    }

    async fn process_item(&self, item: WorkItem) -> RecordOutcome {
        let raw = match item {
            WorkItem::Staged(raw) => raw,
            WorkItem::Fetched(payload) => {
                match self.raw_store.stage(self.source.source_tag(), &payload).await {
                    Ok(raw) => raw,
                    Err(err) => {
                        let external_id = external_id_hint(&payload)
                            .unwrap_or_else(|| "unstaged".to_string());
                        tracing::warn!(external_id = %external_id, error = %err, "Failed to stage raw record");
                        return RecordOutcome::Failed {
                            external_id,
                            reason: err.to_string(),
                        };
                    }
                }
            }
        };

        let external_id = external_id_hint(&raw.payload)
            .unwrap_or_else(|| format!("raw-import:{}", raw.id));

        if let Err(err) = self.raw_store.mark_processing(raw.id).await {
            tracing::warn!(
                external_id = %external_id,
                raw_import_id = %raw.id,
                error = %err,
                "Raw import could not be claimed"
            );
            return RecordOutcome::Failed {
                external_id,
                reason: err.to_string(),
            };
        }

        match self.import_payload(raw.id, &raw.payload).await {
            Ok(survey_id) => match self.raw_store.mark_succeeded(raw.id).await {
                Ok(()) => {
                    tracing::debug!(
                        external_id = %external_id,
                        raw_import_id = %raw.id,
                        survey_id = %survey_id,
                        "Record imported"
                    );
                    RecordOutcome::Imported
                }
                Err(err) => {
                    tracing::error!(
                        external_id = %external_id,
                        raw_import_id = %raw.id,
                        error = %err,
                        "Survey stored but raw import status update failed"
                    );
                    RecordOutcome::Failed {
                        external_id,
                        reason: err.to_string(),
                    }
                }
            },
            Err(err) => {
                let reason = err.to_string();
                tracing::warn!(
                    external_id = %external_id,
                    raw_import_id = %raw.id,
                    error = %reason,
                    "Record import failed"
                );
                if let Err(mark_err) = self.raw_store.mark_failed(raw.id, &reason).await {
                    tracing::error!(
                        raw_import_id = %raw.id,
                        error = %mark_err,
                        "Failed to record raw import failure"
                    );
                }
                RecordOutcome::Failed { external_id, reason }
            }
        }
    }

    /// Stage a fetched record left unprocessed by cancellation
    async fn park(&self, item: WorkItem) {
        let WorkItem::Fetched(payload) = item else {
            // Already staged and still pending
            return;
        };

        if let Err(err) = self.raw_store.stage(self.source.source_tag(), &payload).await {
            tracing::warn!(
                external_id = ?external_id_hint(&payload),
                error = %err,
                "Failed to stage skipped record; it must be fetched again"
            );
        }
    }

    /// transform → resolve → upsert for one staged payload
    async fn import_payload(&self, raw_import_id: Uuid, payload: &Value) -> ImportResult<Uuid> {
        let transformed = transform(payload)?;
        tracing::debug!(
            external_id = %transformed.survey.external_id,
            equipment_items = transformed.survey.facility_data.equipment.len(),
            "Transformed record"
        );

        let facility = self.resolver.resolve(&transformed.facility).await?;

        let survey_id = surveys::upsert(
            &self.pool,
            &transformed.survey,
            facility.id,
            Some(raw_import_id),
            self.max_lock_wait_ms,
        )
        .await?;

        Ok(survey_id)
    }
}

fn log_fetch_failure(err: SourceError) -> SourceError {
    tracing::error!(
        error = %err,
        retryable = err.is_retryable(),
        "Fetch from source failed, aborting batch"
    );
    err
}

/// External id as reported in summaries, read without a full transform
fn external_id_hint(payload: &Value) -> Option<String> {
    payload
        .as_object()
        .and_then(|map| RawRecord::new(map).text(EXTERNAL_ID_KEYS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_external_id_hint() {
        assert_eq!(external_id_hint(&json!({"_id": 12})), Some("12".to_string()));
        assert_eq!(
            external_id_hint(&json!({"_uuid": "abc"})),
            Some("abc".to_string())
        );
        assert_eq!(external_id_hint(&json!({"facility_name": "x"})), None);
        assert_eq!(external_id_hint(&json!("not an object")), None);
    }
}
