//! Expired posting sweep.
//!
//! Removes every job whose expiry has passed together with the applications,
//! interviews and saved-job entries that point at it. Dependents go first, and
//! a failed dependent step leaves the job in place for the next sweep. Inserts
//! of new dependents check for the job atomically, so one more dependents pass
//! after the job row is gone catches anything written while the cascade ran.
//! The sweep ignores the mutual-consent rule: once the posting is gone nothing
//! is left to consent about.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::domain::JobId;
use super::repository::{ApplicationStore, InterviewStore, JobStore, SavedJobStore, StoreError};

/// Step at which a job's cleanup stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CleanupStage {
    Applications,
    Interviews,
    SavedJobs,
    Job,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepFailure {
    pub job_id: JobId,
    pub stage: CleanupStage,
    pub reason: String,
}

/// Dependents removed alongside one job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCleanup {
    pub applications: usize,
    pub interviews: usize,
    pub saved: usize,
    pub job_removed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub swept_at: DateTime<Utc>,
    pub removed_jobs: Vec<JobId>,
    pub applications_removed: usize,
    pub interviews_removed: usize,
    pub saved_removed: usize,
    pub failures: Vec<SweepFailure>,
}

impl SweepReport {
    fn empty(swept_at: DateTime<Utc>) -> Self {
        Self {
            swept_at,
            removed_jobs: Vec::new(),
            applications_removed: 0,
            interviews_removed: 0,
            saved_removed: 0,
            failures: Vec::new(),
        }
    }

    pub fn removed_count(&self) -> usize {
        self.removed_jobs.len()
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SweepError {
    #[error("an expiry sweep is already running")]
    AlreadyRunning,
    #[error("unable to list expired jobs: {0}")]
    Store(#[from] StoreError),
}

pub struct ExpiryCollector {
    jobs: Arc<dyn JobStore>,
    applications: Arc<dyn ApplicationStore>,
    interviews: Arc<dyn InterviewStore>,
    saved: Arc<dyn SavedJobStore>,
    running: AtomicBool,
}

struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ExpiryCollector {
    pub fn new(
        jobs: Arc<dyn JobStore>,
        applications: Arc<dyn ApplicationStore>,
        interviews: Arc<dyn InterviewStore>,
        saved: Arc<dyn SavedJobStore>,
    ) -> Self {
        Self {
            jobs,
            applications,
            interviews,
            saved,
            running: AtomicBool::new(false),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn sweep(&self, now: DateTime<Utc>) -> Result<SweepReport, SweepError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SweepError::AlreadyRunning);
        }
        let _guard = RunningGuard(&self.running);

        let expired = self.jobs.list_expired(now)?;
        let mut report = SweepReport::empty(now);
        if expired.is_empty() {
            info!("expiry sweep found no expired jobs");
            return Ok(report);
        }

        for job in &expired {
            match self.remove_job(&job.id) {
                Ok(cleanup) => {
                    report.applications_removed += cleanup.applications;
                    report.interviews_removed += cleanup.interviews;
                    report.saved_removed += cleanup.saved;
                    if cleanup.job_removed {
                        report.removed_jobs.push(job.id.clone());
                    }
                    info!(
                        job_id = %job.id,
                        applications = cleanup.applications,
                        interviews = cleanup.interviews,
                        saved = cleanup.saved,
                        "removed expired job with dependents"
                    );
                }
                Err(failure) => {
                    warn!(
                        job_id = %failure.job_id,
                        stage = ?failure.stage,
                        reason = %failure.reason,
                        "expired job cleanup failed; continuing"
                    );
                    report.failures.push(failure);
                }
            }
        }

        info!(
            removed = report.removed_count(),
            failed = report.failures.len(),
            "expiry sweep finished"
        );
        Ok(report)
    }

    /// Applications, interviews and saved entries, then the job itself, then
    /// the dependents once more. Each step finishes before the next starts.
    pub fn remove_job(&self, job_id: &JobId) -> Result<JobCleanup, SweepFailure> {
        let mut cleanup = self.remove_dependents(job_id)?;
        cleanup.job_removed = self
            .jobs
            .delete(job_id)
            .map_err(|err| stage_failure(job_id, CleanupStage::Job, err))?;

        let late = self.remove_dependents(job_id)?;
        if late.applications + late.interviews + late.saved > 0 {
            info!(
                job_id = %job_id,
                applications = late.applications,
                interviews = late.interviews,
                saved = late.saved,
                "removed dependents written during job removal"
            );
        }
        cleanup.applications += late.applications;
        cleanup.interviews += late.interviews;
        cleanup.saved += late.saved;
        Ok(cleanup)
    }

    fn remove_dependents(&self, job_id: &JobId) -> Result<JobCleanup, SweepFailure> {
        let applications = self
            .applications
            .delete_by_job(job_id)
            .map_err(|err| stage_failure(job_id, CleanupStage::Applications, err))?;
        let interviews = self
            .interviews
            .delete_by_job(job_id)
            .map_err(|err| stage_failure(job_id, CleanupStage::Interviews, err))?;
        let saved = self
            .saved
            .delete_by_job(job_id)
            .map_err(|err| stage_failure(job_id, CleanupStage::SavedJobs, err))?;

        Ok(JobCleanup {
            applications,
            interviews,
            saved,
            job_removed: false,
        })
    }
}

fn stage_failure(job_id: &JobId, stage: CleanupStage, err: StoreError) -> SweepFailure {
    SweepFailure {
        job_id: job_id.clone(),
        stage,
        reason: err.to_string(),
    }
}
