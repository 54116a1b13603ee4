//! Job board core: postings, applications, interviews, and moderation reports.
//!
//! Two behaviors carry the weight here. The [`expiry`] sweep removes expired
//! postings with everything that references them, and the [`lifecycle`] module
//! only destroys an application once both the employer and the seeker have
//! asked for it.

pub mod domain;
pub mod expiry;
pub mod lifecycle;
pub mod memory;
pub mod repository;
pub mod router;
pub mod scheduler;
pub mod service;
pub mod sqlite;

#[cfg(test)]
mod tests;

pub use domain::{
    Actor, ApplicationId, ApplicationRecord, ApplicationStatus, ApplicationSubmission, DeletedBy,
    DeletionState, EmployerInfo, Interview, InterviewId, InterviewStatus, Job, JobId, JobInfo,
    JobPosting, JobQuery, JobSeekerInfo, Party, PersonalWebsite, Report, ReportId, ReportStatus,
    ResumeRef, Role, UserId, ValidityPeriod,
};
pub use expiry::{CleanupStage, ExpiryCollector, JobCleanup, SweepError, SweepFailure, SweepReport};
pub use lifecycle::{ApplicationLifecycle, DeletionOutcome, LifecycleError};
pub use memory::MemoryDocumentStore;
pub use repository::{
    ApplicationStore, BoardStore, BoardStores, InterviewStore, JobStore, Notification, Notifier,
    NotifyError, ReportStore, SavedJobStore, StoreError,
};
pub use router::{board_router, HEADER_USER_ID, HEADER_USER_ROLE};
pub use scheduler::SweepScheduler;
pub use service::{BoardError, InterviewRequest, JobBoardService};
pub use sqlite::SqliteDocumentStore;
