use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, Interview, InterviewId, InterviewStatus,
    Job, JobId, JobQuery, Party, Report, ReportId, ReportStatus, UserId,
};

/// Job postings collection.
pub trait JobStore: Send + Sync {
    fn insert(&self, job: Job) -> Result<Job, StoreError>;
    fn fetch(&self, id: &JobId) -> Result<Option<Job>, StoreError>;
    fn list(&self, query: &JobQuery) -> Result<Vec<Job>, StoreError>;
    fn list_by_owner(&self, employer: &UserId) -> Result<Vec<Job>, StoreError>;
    /// Jobs whose `expiry_date <= now`.
    fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<Job>, StoreError>;
    /// Atomically adds the seeker to the job's applicant set.
    fn add_applicant(&self, id: &JobId, seeker: &UserId) -> Result<(), StoreError>;
    /// Atomically removes the seeker; `Ok(false)` when the id was not listed.
    fn remove_applicant(&self, id: &JobId, seeker: &UserId) -> Result<bool, StoreError>;
    /// Delete-if-exists.
    fn delete(&self, id: &JobId) -> Result<bool, StoreError>;
}

/// Applications collection.
pub trait ApplicationStore: Send + Sync {
    /// Fails with `Conflict` when the seeker already applied to the job and
    /// with `NotFound` when the job is gone. The job check and the write are
    /// one atomic step.
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, StoreError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, StoreError>;
    fn find_for_seeker(
        &self,
        job: &JobId,
        seeker: &UserId,
    ) -> Result<Option<ApplicationRecord>, StoreError>;
    /// Applications addressed to the employer that the employer has not removed.
    fn list_for_employer(&self, employer: &UserId) -> Result<Vec<ApplicationRecord>, StoreError>;
    /// Applications filed by the seeker that the seeker has not removed.
    fn list_for_seeker(&self, seeker: &UserId) -> Result<Vec<ApplicationRecord>, StoreError>;
    fn set_status(
        &self,
        id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<ApplicationRecord, StoreError>;
    /// Sets the party's deletion flag in a single atomic write and returns the
    /// record as persisted afterwards. `Ok(None)` when the record is absent.
    fn mark_deleted(
        &self,
        id: &ApplicationId,
        party: Party,
    ) -> Result<Option<ApplicationRecord>, StoreError>;
    /// Records with both deletion flags set that still await removal.
    fn list_released(&self) -> Result<Vec<ApplicationRecord>, StoreError>;
    fn delete(&self, id: &ApplicationId) -> Result<bool, StoreError>;
    fn delete_by_job(&self, job: &JobId) -> Result<usize, StoreError>;
}

/// Interviews collection.
pub trait InterviewStore: Send + Sync {
    /// Fails with `Conflict` for a repeated (application, job, candidate) triple
    /// and with `NotFound` when the job is gone.
    fn insert(&self, interview: Interview) -> Result<Interview, StoreError>;
    fn fetch(&self, id: &InterviewId) -> Result<Option<Interview>, StoreError>;
    /// Interviews where the user is either the employer or the candidate.
    fn list_for_user(&self, user: &UserId) -> Result<Vec<Interview>, StoreError>;
    fn list_by_job(&self, job: &JobId) -> Result<Vec<Interview>, StoreError>;
    fn set_status(&self, id: &InterviewId, status: InterviewStatus)
        -> Result<Interview, StoreError>;
    fn delete(&self, id: &InterviewId) -> Result<bool, StoreError>;
    fn delete_by_job(&self, job: &JobId) -> Result<usize, StoreError>;
}

/// Moderation reports collection.
pub trait ReportStore: Send + Sync {
    fn insert(&self, report: Report) -> Result<Report, StoreError>;
    fn fetch(&self, id: &ReportId) -> Result<Option<Report>, StoreError>;
    fn list_all(&self) -> Result<Vec<Report>, StoreError>;
    /// Newest first.
    fn list_by_reporter(&self, reporter: &UserId) -> Result<Vec<Report>, StoreError>;
    fn set_status(&self, id: &ReportId, status: ReportStatus) -> Result<Report, StoreError>;
    fn delete(&self, id: &ReportId) -> Result<bool, StoreError>;
}

/// Per-user bookmarks of job postings.
pub trait SavedJobStore: Send + Sync {
    /// Fails with `Conflict` when already saved and `NotFound` when the job is gone.
    fn save(&self, user: &UserId, job: &JobId) -> Result<(), StoreError>;
    /// `Ok(false)` when the job was not saved.
    fn unsave(&self, user: &UserId, job: &JobId) -> Result<bool, StoreError>;
    /// Saved job ids in the order they were saved.
    fn list_saved(&self, user: &UserId) -> Result<Vec<JobId>, StoreError>;
    /// Drops the job from every user's list.
    fn delete_by_job(&self, job: &JobId) -> Result<usize, StoreError>;
}

/// Every collection the board needs, in one backend.
pub trait BoardStore:
    JobStore + ApplicationStore + InterviewStore + ReportStore + SavedJobStore
{
}

impl<T> BoardStore for T where
    T: JobStore + ApplicationStore + InterviewStore + ReportStore + SavedJobStore
{
}

/// Per-collection handles, usually all pointing at the same backend.
#[derive(Clone)]
pub struct BoardStores {
    pub jobs: Arc<dyn JobStore>,
    pub applications: Arc<dyn ApplicationStore>,
    pub interviews: Arc<dyn InterviewStore>,
    pub reports: Arc<dyn ReportStore>,
    pub saved: Arc<dyn SavedJobStore>,
}

impl BoardStores {
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: BoardStore + 'static,
    {
        Self {
            jobs: backend.clone(),
            applications: backend.clone(),
            interviews: backend.clone(),
            reports: backend.clone(),
            saved: backend,
        }
    }
}

/// Outbound message hook (e-mail or similar adapters).
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

/// Message addressed to one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub recipient: UserId,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
