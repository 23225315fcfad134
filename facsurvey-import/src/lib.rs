//! facsurvey-import library interface
//!
//! Pulls facility survey submissions from an external survey platform,
//! stages each payload verbatim, normalizes it into a survey record and
//! links it to a deduplicated facility. Exposed as a library so the binary
//! and the integration tests share one pipeline.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod transform;
pub mod utils;

pub use crate::config::{CliOverrides, ImportConfig, SourceConfig};
pub use crate::error::{ImportError, ImportResult, SourceError, TransformError};
pub use crate::models::ImportSummary;
pub use crate::services::{ImportOrchestrator, OrchestratorOptions, SourceClient, SurveySource};

use facsurvey_common::db::{get_setting_u64, SETTING_MAX_LOCK_WAIT_MS};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Lock wait used when neither configuration nor the settings table sets one
pub const DEFAULT_MAX_LOCK_WAIT_MS: u64 = 5000;

/// Wire an orchestrator from resolved configuration
///
/// The lock wait comes from configuration when set, otherwise from the
/// `import_max_lock_wait_ms` database setting.
pub async fn build_orchestrator(
    config: &ImportConfig,
    pool: SqlitePool,
    source: Arc<dyn SurveySource>,
) -> facsurvey_common::Result<ImportOrchestrator> {
    let max_lock_wait_ms = match config.max_lock_wait_ms {
        Some(ms) => ms,
        None => get_setting_u64(&pool, SETTING_MAX_LOCK_WAIT_MS, DEFAULT_MAX_LOCK_WAIT_MS).await?,
    };

    tracing::debug!(
        concurrency = config.concurrency,
        max_lock_wait_ms,
        "Building import orchestrator"
    );

    Ok(ImportOrchestrator::new(
        pool,
        source,
        OrchestratorOptions {
            concurrency: config.concurrency,
            owner_user_id: config.owner_user_id.clone(),
            max_lock_wait_ms,
        },
    ))
}
