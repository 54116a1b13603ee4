//! Mutual-consent removal of applications.
//!
//! Either side may hide an application from its own listings. The record is
//! only destroyed, and the seeker detached from the job's applicant set, once
//! both sides have asked for it. The decision is always taken on the record
//! returned by the store's atomic flag write, so two near-simultaneous requests
//! from opposite sides cannot both observe "only mine is set".

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{Actor, ApplicationId, ApplicationRecord, DeletedBy, DeletionState, Party};
use super::repository::{ApplicationStore, JobStore, StoreError};

/// Result of a deletion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeletionOutcome {
    /// Hidden from the requesting side only; the other side still sees it.
    PartiallyReleased { by: Party, deleted_by: DeletedBy },
    /// Both sides let go; the record is gone.
    Released,
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("application not found")]
    NotFound,
    #[error("{0}")]
    Unauthorized(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Flags are persisted but the joint cleanup did not finish; a later
    /// `release_pending` pass picks it up.
    #[error("application {application_id} released by both parties but cleanup failed: {source}")]
    ReleaseIncomplete {
        application_id: ApplicationId,
        #[source]
        source: StoreError,
    },
}

pub struct ApplicationLifecycle {
    applications: Arc<dyn ApplicationStore>,
    jobs: Arc<dyn JobStore>,
}

impl ApplicationLifecycle {
    pub fn new(applications: Arc<dyn ApplicationStore>, jobs: Arc<dyn JobStore>) -> Self {
        Self { applications, jobs }
    }

    pub fn request_deletion(
        &self,
        application_id: &ApplicationId,
        actor: &Actor,
    ) -> Result<DeletionOutcome, LifecycleError> {
        let party = Party::for_role(actor.role).ok_or_else(|| {
            LifecycleError::Unauthorized(format!(
                "role {} cannot remove applications",
                actor.role.label()
            ))
        })?;

        let current = self
            .applications
            .fetch(application_id)?
            .ok_or(LifecycleError::NotFound)?;
        if current.party_id(party) != &actor.user_id {
            return Err(LifecycleError::Unauthorized(
                "application belongs to another account".to_string(),
            ));
        }

        let persisted = self
            .applications
            .mark_deleted(application_id, party)?
            .ok_or(LifecycleError::NotFound)?;

        match persisted.deletion_state() {
            DeletionState::Released => {
                self.finalize(&persisted)?;
                Ok(DeletionOutcome::Released)
            }
            DeletionState::PartiallyReleased { by } => {
                debug!(%application_id, ?by, "application hidden by one party");
                Ok(DeletionOutcome::PartiallyReleased {
                    by,
                    deleted_by: persisted.deleted_by,
                })
            }
            // mark_deleted always leaves at least one flag set
            DeletionState::Active => Ok(DeletionOutcome::PartiallyReleased {
                by: party,
                deleted_by: persisted.deleted_by,
            }),
        }
    }

    /// Finishes every application whose flags are both set but which is still
    /// stored, e.g. after a failed cleanup. Returns how many were removed.
    pub fn release_pending(&self) -> Result<usize, LifecycleError> {
        let pending = self.applications.list_released()?;
        let mut released = 0;
        for record in &pending {
            match self.finalize(record) {
                Ok(()) => released += 1,
                Err(err) => warn!(application_id = %record.id, error = %err, "deferred release still failing"),
            }
        }
        if released > 0 {
            info!(released, "released applications left over from earlier requests");
        }
        Ok(released)
    }

    fn finalize(&self, record: &ApplicationRecord) -> Result<(), LifecycleError> {
        let incomplete = |source| LifecycleError::ReleaseIncomplete {
            application_id: record.id.clone(),
            source,
        };

        match self
            .jobs
            .remove_applicant(&record.job.job_id, &record.job_seeker.id)
        {
            Ok(true) => {}
            Ok(false) => debug!(
                job_id = %record.job.job_id,
                seeker_id = %record.job_seeker.id,
                "seeker was not listed on the job"
            ),
            Err(StoreError::NotFound) => debug!(
                job_id = %record.job.job_id,
                "job already gone while releasing application"
            ),
            Err(err) => return Err(incomplete(err)),
        }

        self.applications.delete(&record.id).map_err(incomplete)?;
        info!(application_id = %record.id, job_id = %record.job.job_id, "application released by both parties");
        Ok(())
    }
}
