use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::board::domain::{
    Actor, ApplicationId, ApplicationRecord, ApplicationStatus, ApplicationSubmission, Interview,
    InterviewId, InterviewStatus, Job, JobId, JobPosting, JobQuery, Party, ResumeRef, UserId,
    ValidityPeriod,
};
use crate::board::memory::MemoryDocumentStore;
use crate::board::repository::{
    ApplicationStore, BoardStores, InterviewStore, JobStore, Notification, Notifier, NotifyError,
    SavedJobStore, StoreError,
};
use crate::board::service::JobBoardService;
use crate::board::sqlite::SqliteDocumentStore;

pub(super) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn employer() -> Actor {
    Actor::employer("employer-1")
}

pub(super) fn seeker() -> Actor {
    Actor::job_seeker("seeker-1")
}

pub(super) fn admin() -> Actor {
    Actor::admin("admin-1")
}

pub(super) fn posting(title: &str) -> JobPosting {
    JobPosting {
        title: title.to_string(),
        job_type: "Full-time".to_string(),
        location: "Lahore".to_string(),
        company_name: "Acme Logistics".to_string(),
        introduction: "Join the routing team.".to_string(),
        responsibilities: "Plan delivery routes.".to_string(),
        qualifications: "Two years of experience.".to_string(),
        offers: Some("Remote Fridays".to_string()),
        salary: "90000".to_string(),
        hiring_multiple_candidates: false,
        personal_website: None,
        job_niche: "Logistics".to_string(),
        validity_period: ValidityPeriod::ThreeMonths,
    }
}

pub(super) fn submission(name: &str) -> ApplicationSubmission {
    ApplicationSubmission {
        name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        phone: "+92 300 0000000".to_string(),
        address: "12 Mall Road".to_string(),
        cover_letter: "I would like to apply.".to_string(),
        resume: Some(ResumeRef {
            public_id: format!("resumes/{name}"),
            url: format!("https://files.example.com/resumes/{name}.pdf"),
        }),
    }
}

/// Job built directly, bypassing the service, with an explicit expiry.
pub(super) fn job_expiring(title: &str, posted_by: &UserId, expiry: DateTime<Utc>) -> Job {
    let mut job = Job::from_posting(posting(title), posted_by.clone(), expiry - Duration::days(90));
    job.expiry_date = expiry;
    job
}

pub(super) fn memory_stores() -> (BoardStores, Arc<MemoryDocumentStore>) {
    let store = Arc::new(MemoryDocumentStore::new());
    (BoardStores::from_backend(store.clone()), store)
}

pub(super) fn sqlite_stores() -> BoardStores {
    let store = SqliteDocumentStore::open_in_memory().expect("in-memory sqlite opens");
    BoardStores::from_backend(Arc::new(store))
}

/// Runs the check once per backend.
pub(super) fn for_each_backend(check: impl Fn(&'static str, BoardStores)) {
    check("memory", memory_stores().0);
    check("sqlite", sqlite_stores());
}

pub(super) fn build_service() -> (JobBoardService, Arc<MemoryNotifier>) {
    let notifier = Arc::new(MemoryNotifier::default());
    let service = JobBoardService::new(memory_stores().0, notifier.clone());
    (service, notifier)
}

pub(super) fn service_with(stores: BoardStores) -> JobBoardService {
    JobBoardService::new(stores, Arc::new(MemoryNotifier::default()))
}

/// Posts a job as `employer()` and has `seeker()` apply to it.
pub(super) fn seed_application(service: &JobBoardService) -> (Job, ApplicationRecord) {
    let job = service
        .post_job(&employer(), posting("Route Planner"), t0())
        .expect("job posts");
    let application = service
        .apply(&seeker(), &job.id, submission("Sana"), t0())
        .expect("application submits");
    (job, application)
}

pub(super) fn applicants(stores: &BoardStores, job_id: &JobId) -> Vec<UserId> {
    stores
        .jobs
        .fetch(job_id)
        .expect("fetch succeeds")
        .map(|job| job.applicants.into_iter().collect())
        .unwrap_or_default()
}

pub(super) fn all_jobs(stores: &BoardStores) -> Vec<Job> {
    stores.jobs.list(&JobQuery::default()).expect("list succeeds")
}

#[derive(Default)]
pub(super) struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub(super) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }
}

impl Notifier for MemoryNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) struct OfflineNotifier;

impl Notifier for OfflineNotifier {
    fn notify(&self, _notification: Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp relay offline".to_string()))
    }
}

/// Job store whose applicant removal can be switched off.
pub(super) struct FlakyJobs {
    pub(super) inner: Arc<dyn JobStore>,
    pub(super) failing: Mutex<bool>,
}

impl FlakyJobs {
    pub(super) fn new(inner: Arc<dyn JobStore>) -> Self {
        Self {
            inner,
            failing: Mutex::new(true),
        }
    }

    pub(super) fn recover(&self) {
        *self.failing.lock().expect("flag mutex poisoned") = false;
    }
}

impl JobStore for FlakyJobs {
    fn insert(&self, job: Job) -> Result<Job, StoreError> {
        self.inner.insert(job)
    }

    fn fetch(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        self.inner.fetch(id)
    }

    fn list(&self, query: &JobQuery) -> Result<Vec<Job>, StoreError> {
        self.inner.list(query)
    }

    fn list_by_owner(&self, employer: &UserId) -> Result<Vec<Job>, StoreError> {
        self.inner.list_by_owner(employer)
    }

    fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<Job>, StoreError> {
        self.inner.list_expired(now)
    }

    fn add_applicant(&self, id: &JobId, seeker: &UserId) -> Result<(), StoreError> {
        self.inner.add_applicant(id, seeker)
    }

    fn remove_applicant(&self, id: &JobId, seeker: &UserId) -> Result<bool, StoreError> {
        if *self.failing.lock().expect("flag mutex poisoned") {
            return Err(StoreError::Unavailable("jobs collection offline".to_string()));
        }
        self.inner.remove_applicant(id, seeker)
    }

    fn delete(&self, id: &JobId) -> Result<bool, StoreError> {
        self.inner.delete(id)
    }
}

/// Job store that parks inside `list_expired` until released.
pub(super) struct GatedJobs {
    pub(super) inner: Arc<dyn JobStore>,
    pub(super) entered: Mutex<mpsc::Sender<()>>,
    pub(super) release: Mutex<mpsc::Receiver<()>>,
}

impl JobStore for GatedJobs {
    fn insert(&self, job: Job) -> Result<Job, StoreError> {
        self.inner.insert(job)
    }

    fn fetch(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        self.inner.fetch(id)
    }

    fn list(&self, query: &JobQuery) -> Result<Vec<Job>, StoreError> {
        self.inner.list(query)
    }

    fn list_by_owner(&self, employer: &UserId) -> Result<Vec<Job>, StoreError> {
        self.inner.list_by_owner(employer)
    }

    fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<Job>, StoreError> {
        self.entered
            .lock()
            .expect("sender mutex poisoned")
            .send(())
            .expect("test listens for entry");
        self.release
            .lock()
            .expect("receiver mutex poisoned")
            .recv()
            .expect("test releases the sweep");
        self.inner.list_expired(now)
    }

    fn add_applicant(&self, id: &JobId, seeker: &UserId) -> Result<(), StoreError> {
        self.inner.add_applicant(id, seeker)
    }

    fn remove_applicant(&self, id: &JobId, seeker: &UserId) -> Result<bool, StoreError> {
        self.inner.remove_applicant(id, seeker)
    }

    fn delete(&self, id: &JobId) -> Result<bool, StoreError> {
        self.inner.delete(id)
    }
}

/// Application store that refuses cascading deletes for one job.
pub(super) struct StuckApplications {
    pub(super) inner: Arc<dyn ApplicationStore>,
    pub(super) stuck_job: JobId,
}

impl ApplicationStore for StuckApplications {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, StoreError> {
        self.inner.insert(record)
    }

    fn fetch(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        self.inner.fetch(id)
    }

    fn find_for_seeker(
        &self,
        job: &JobId,
        seeker: &UserId,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        self.inner.find_for_seeker(job, seeker)
    }

    fn list_for_employer(&self, employer: &UserId) -> Result<Vec<ApplicationRecord>, StoreError> {
        self.inner.list_for_employer(employer)
    }

    fn list_for_seeker(&self, seeker: &UserId) -> Result<Vec<ApplicationRecord>, StoreError> {
        self.inner.list_for_seeker(seeker)
    }

    fn set_status(
        &self,
        id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<ApplicationRecord, StoreError> {
        self.inner.set_status(id, status)
    }

    fn mark_deleted(
        &self,
        id: &ApplicationId,
        party: Party,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        self.inner.mark_deleted(id, party)
    }

    fn list_released(&self) -> Result<Vec<ApplicationRecord>, StoreError> {
        self.inner.list_released()
    }

    fn delete(&self, id: &ApplicationId) -> Result<bool, StoreError> {
        self.inner.delete(id)
    }

    fn delete_by_job(&self, job: &JobId) -> Result<usize, StoreError> {
        if job == &self.stuck_job {
            return Err(StoreError::Unavailable("write lock timeout".to_string()));
        }
        self.inner.delete_by_job(job)
    }
}

/// Parks the first caller inside a store call until the test releases it.
pub(super) struct Gate {
    armed: AtomicBool,
    entered: Mutex<mpsc::Sender<()>>,
    release: Mutex<mpsc::Receiver<()>>,
}

impl Gate {
    /// Returns the gate, the "caller is parked" signal and the release handle.
    pub(super) fn new() -> (Arc<Self>, mpsc::Receiver<()>, mpsc::Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let gate = Arc::new(Self {
            armed: AtomicBool::new(true),
            entered: Mutex::new(entered_tx),
            release: Mutex::new(release_rx),
        });
        (gate, entered_rx, release_tx)
    }

    fn pass(&self) {
        if !self.armed.swap(false, Ordering::AcqRel) {
            return;
        }
        self.entered
            .lock()
            .expect("sender mutex poisoned")
            .send(())
            .expect("test listens for entry");
        self.release
            .lock()
            .expect("receiver mutex poisoned")
            .recv()
            .expect("test releases the caller");
    }
}

/// Interview store whose first cascading delete waits on a [`Gate`].
pub(super) struct GatedInterviews {
    pub(super) inner: Arc<dyn InterviewStore>,
    pub(super) gate: Arc<Gate>,
}

impl InterviewStore for GatedInterviews {
    fn insert(&self, interview: Interview) -> Result<Interview, StoreError> {
        self.inner.insert(interview)
    }

    fn fetch(&self, id: &InterviewId) -> Result<Option<Interview>, StoreError> {
        self.inner.fetch(id)
    }

    fn list_for_user(&self, user: &UserId) -> Result<Vec<Interview>, StoreError> {
        self.inner.list_for_user(user)
    }

    fn list_by_job(&self, job: &JobId) -> Result<Vec<Interview>, StoreError> {
        self.inner.list_by_job(job)
    }

    fn set_status(
        &self,
        id: &InterviewId,
        status: InterviewStatus,
    ) -> Result<Interview, StoreError> {
        self.inner.set_status(id, status)
    }

    fn delete(&self, id: &InterviewId) -> Result<bool, StoreError> {
        self.inner.delete(id)
    }

    fn delete_by_job(&self, job: &JobId) -> Result<usize, StoreError> {
        self.gate.pass();
        self.inner.delete_by_job(job)
    }
}

/// Saved-job store whose first cascading delete waits on a [`Gate`].
pub(super) struct GatedSaved {
    pub(super) inner: Arc<dyn SavedJobStore>,
    pub(super) gate: Arc<Gate>,
}

impl SavedJobStore for GatedSaved {
    fn save(&self, user: &UserId, job: &JobId) -> Result<(), StoreError> {
        self.inner.save(user, job)
    }

    fn unsave(&self, user: &UserId, job: &JobId) -> Result<bool, StoreError> {
        self.inner.unsave(user, job)
    }

    fn list_saved(&self, user: &UserId) -> Result<Vec<JobId>, StoreError> {
        self.inner.list_saved(user)
    }

    fn delete_by_job(&self, job: &JobId) -> Result<usize, StoreError> {
        self.gate.pass();
        self.inner.delete_by_job(job)
    }
}

/// Job store that is always down.
pub(super) struct UnavailableJobs;

impl JobStore for UnavailableJobs {
    fn insert(&self, _job: Job) -> Result<Job, StoreError> {
        Err(offline())
    }

    fn fetch(&self, _id: &JobId) -> Result<Option<Job>, StoreError> {
        Err(offline())
    }

    fn list(&self, _query: &JobQuery) -> Result<Vec<Job>, StoreError> {
        Err(offline())
    }

    fn list_by_owner(&self, _employer: &UserId) -> Result<Vec<Job>, StoreError> {
        Err(offline())
    }

    fn list_expired(&self, _now: DateTime<Utc>) -> Result<Vec<Job>, StoreError> {
        Err(offline())
    }

    fn add_applicant(&self, _id: &JobId, _seeker: &UserId) -> Result<(), StoreError> {
        Err(offline())
    }

    fn remove_applicant(&self, _id: &JobId, _seeker: &UserId) -> Result<bool, StoreError> {
        Err(offline())
    }

    fn delete(&self, _id: &JobId) -> Result<bool, StoreError> {
        Err(offline())
    }
}

fn offline() -> StoreError {
    StoreError::Unavailable("database offline".to_string())
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
