//! Facility get-or-create
//!
//! Concurrency relies on the UNIQUE index over `facilities.name_key` rather
//! than an in-process lock, so parallel workers (or processes) sharing a
//! database stay correct. A worker that loses the insert race re-reads the
//! winner's row.

use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::db::facilities;
use crate::error::{ImportError, ImportResult};
use crate::models::{Facility, FacilityHint};
use crate::utils::retry_on_lock;

/// Lookup/insert rounds before giving up with `FacilityResolutionConflict`
pub const MAX_RESOLVE_ATTEMPTS: u32 = 3;

#[derive(Clone)]
pub struct FacilityResolver {
    pool: SqlitePool,
    owner_user_id: Option<String>,
    max_lock_wait_ms: u64,
}

impl FacilityResolver {
    pub fn new(pool: SqlitePool, owner_user_id: Option<String>, max_lock_wait_ms: u64) -> Self {
        Self {
            pool,
            owner_user_id,
            max_lock_wait_ms,
        }
    }

    /// Existing facility with the hint's name (back-filled), or a new one
    pub async fn resolve(&self, hint: &FacilityHint) -> ImportResult<Facility> {
        for attempt in 1..=MAX_RESOLVE_ATTEMPTS {
            let existing = retry_on_lock("facility lookup", self.max_lock_wait_ms, || {
                facilities::find_by_name(&self.pool, &hint.name)
            })
            .await?;
            if let Some(existing) = existing {
                return self.enrich(existing, hint).await;
            }

            let candidate = facilities::new_facility(hint, self.owner_user_id.as_deref());
            let inserted = retry_on_lock("facility insert", self.max_lock_wait_ms, || {
                facilities::insert(&self.pool, &candidate)
            })
            .await;

            match inserted {
                Ok(()) => {
                    info!(
                        facility_id = %candidate.id,
                        name = %candidate.name,
                        "Created facility"
                    );
                    return Ok(candidate);
                }
                Err(err) if err.is_unique_violation() => {
                    warn!(
                        name = %hint.name,
                        attempt,
                        "Facility created concurrently, re-reading"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }

        tracing::error!(name = %hint.name, "Facility resolution kept conflicting");
        Err(ImportError::FacilityResolutionConflict(hint.name.clone()))
    }

    /// Fill the existing row's unset type/coordinates from the hint
    async fn enrich(&self, existing: Facility, hint: &FacilityHint) -> ImportResult<Facility> {
        let changed = retry_on_lock("facility backfill", self.max_lock_wait_ms, || {
            facilities::backfill(&self.pool, existing.id, hint)
        })
        .await?;

        if !changed {
            debug!(facility_id = %existing.id, "Resolved existing facility");
            return Ok(existing);
        }

        debug!(facility_id = %existing.id, "Back-filled facility from survey");
        let refreshed = retry_on_lock("facility reload", self.max_lock_wait_ms, || {
            facilities::find_by_id(&self.pool, existing.id)
        })
        .await?;
        Ok(refreshed.unwrap_or(existing))
    }
}
