use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use super::domain::{
    Actor, ApplicationId, ApplicationRecord, ApplicationStatus, ApplicationSubmission,
    EmployerInfo, Interview, InterviewId, InterviewStatus, Job, JobId, JobInfo, JobPosting,
    JobQuery, JobSeekerInfo, Party, Report, ReportId, ReportStatus, Role, UserId,
};
use super::expiry::{ExpiryCollector, SweepError, SweepReport};
use super::lifecycle::{ApplicationLifecycle, DeletionOutcome, LifecycleError};
use super::repository::{BoardStores, Notification, Notifier, StoreError};

/// Employer supplied details for a new interview.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InterviewRequest {
    pub date_time: DateTime<Utc>,
    #[serde(default)]
    pub meeting_link: Option<String>,
}

/// Facade over the stores, the expiry sweep, and the application lifecycle.
pub struct JobBoardService {
    stores: BoardStores,
    lifecycle: ApplicationLifecycle,
    collector: ExpiryCollector,
    notifier: Arc<dyn Notifier>,
}

impl JobBoardService {
    pub fn new(stores: BoardStores, notifier: Arc<dyn Notifier>) -> Self {
        let lifecycle =
            ApplicationLifecycle::new(stores.applications.clone(), stores.jobs.clone());
        let collector = ExpiryCollector::new(
            stores.jobs.clone(),
            stores.applications.clone(),
            stores.interviews.clone(),
            stores.saved.clone(),
        );
        Self {
            stores,
            lifecycle,
            collector,
            notifier,
        }
    }

    pub fn stores(&self) -> &BoardStores {
        &self.stores
    }

    pub fn post_job(
        &self,
        actor: &Actor,
        posting: JobPosting,
        now: DateTime<Utc>,
    ) -> Result<Job, BoardError> {
        require_role(actor, Role::Employer, "post jobs")?;
        let required = [
            &posting.title,
            &posting.job_type,
            &posting.location,
            &posting.company_name,
            &posting.introduction,
            &posting.responsibilities,
            &posting.qualifications,
            &posting.salary,
            &posting.job_niche,
        ];
        if required.iter().any(|value| value.trim().is_empty()) {
            return Err(BoardError::Invalid(
                "please provide full job details".to_string(),
            ));
        }

        let job = Job::from_posting(posting, actor.user_id.clone(), now);
        let job = self.stores.jobs.insert(job)?;
        info!(job_id = %job.id, expiry = %job.expiry_date, "job posted");
        Ok(job)
    }

    pub fn list_jobs(&self, query: &JobQuery) -> Result<Vec<Job>, BoardError> {
        Ok(self.stores.jobs.list(query)?)
    }

    pub fn get_job(&self, id: &JobId) -> Result<Job, BoardError> {
        self.stores
            .jobs
            .fetch(id)?
            .ok_or(BoardError::NotFound("job"))
    }

    pub fn my_jobs(&self, actor: &Actor) -> Result<Vec<Job>, BoardError> {
        require_role(actor, Role::Employer, "list posted jobs")?;
        Ok(self.stores.jobs.list_by_owner(&actor.user_id)?)
    }

    /// Removes an owned posting with the same cascade the expiry sweep uses.
    pub fn delete_job(&self, actor: &Actor, id: &JobId) -> Result<(), BoardError> {
        require_role(actor, Role::Employer, "delete jobs")?;
        let job = self.get_job(id)?;
        if job.posted_by != actor.user_id {
            return Err(BoardError::Unauthorized(
                "you can only delete your own postings".to_string(),
            ));
        }

        let cleanup = self
            .collector
            .remove_job(id)
            .map_err(|failure| BoardError::Store(StoreError::Unavailable(failure.reason)))?;
        info!(
            job_id = %id,
            applications = cleanup.applications,
            interviews = cleanup.interviews,
            saved = cleanup.saved,
            "job deleted by owner"
        );
        Ok(())
    }

    pub fn apply(
        &self,
        actor: &Actor,
        job_id: &JobId,
        submission: ApplicationSubmission,
        now: DateTime<Utc>,
    ) -> Result<ApplicationRecord, BoardError> {
        require_role(actor, Role::JobSeeker, "apply to jobs")?;
        let required = [
            &submission.name,
            &submission.email,
            &submission.phone,
            &submission.address,
            &submission.cover_letter,
        ];
        if required.iter().any(|value| value.trim().is_empty()) {
            return Err(BoardError::Invalid("all fields are required".to_string()));
        }

        let job = self.get_job(job_id)?;
        if job.is_expired(now) {
            return Err(BoardError::Expired);
        }
        if self
            .stores
            .applications
            .find_for_seeker(job_id, &actor.user_id)?
            .is_some()
        {
            return Err(already_applied());
        }
        let resume = submission
            .resume
            .filter(|resume| !resume.url.trim().is_empty())
            .ok_or(BoardError::MissingResume)?;

        let record = ApplicationRecord {
            id: ApplicationId::generate(),
            job_seeker: JobSeekerInfo {
                id: actor.user_id.clone(),
                name: submission.name,
                email: submission.email,
                phone: submission.phone,
                address: submission.address,
                cover_letter: submission.cover_letter,
                resume,
            },
            employer: EmployerInfo {
                id: job.posted_by.clone(),
            },
            job: JobInfo {
                job_id: job.id.clone(),
                job_title: job.title.clone(),
                company_name: job.company_name.clone(),
                expiry_date: job.expiry_date,
            },
            status: ApplicationStatus::Pending,
            deleted_by: Default::default(),
            submitted_on: now,
        };

        let record = match self.stores.applications.insert(record) {
            Ok(record) => record,
            Err(StoreError::Conflict) => return Err(already_applied()),
            Err(err) => return Err(not_found_as(err, "job")),
        };

        if let Err(err) = self.stores.jobs.add_applicant(job_id, &actor.user_id) {
            // the job vanished or the write failed; don't leave a dangling application
            if let Err(rollback) = self.stores.applications.delete(&record.id) {
                warn!(application_id = %record.id, error = %rollback, "failed to roll back application");
            }
            return Err(match err {
                StoreError::NotFound => BoardError::NotFound("job"),
                other => other.into(),
            });
        }

        info!(application_id = %record.id, job_id = %job_id, "application submitted");
        Ok(record)
    }

    pub fn employer_applications(
        &self,
        actor: &Actor,
    ) -> Result<Vec<ApplicationRecord>, BoardError> {
        require_role(actor, Role::Employer, "list received applications")?;
        Ok(self.stores.applications.list_for_employer(&actor.user_id)?)
    }

    pub fn seeker_applications(&self, actor: &Actor) -> Result<Vec<ApplicationRecord>, BoardError> {
        require_role(actor, Role::JobSeeker, "list submitted applications")?;
        Ok(self.stores.applications.list_for_seeker(&actor.user_id)?)
    }

    pub fn get_application(
        &self,
        actor: &Actor,
        id: &ApplicationId,
    ) -> Result<ApplicationRecord, BoardError> {
        let record = self
            .stores
            .applications
            .fetch(id)?
            .ok_or(BoardError::NotFound("application"))?;
        let permitted = match Party::for_role(actor.role) {
            Some(party) => record.party_id(party) == &actor.user_id,
            None => true,
        };
        if !permitted {
            return Err(BoardError::Unauthorized(
                "application belongs to another account".to_string(),
            ));
        }
        Ok(record)
    }

    pub fn update_application_status(
        &self,
        actor: &Actor,
        id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<ApplicationRecord, BoardError> {
        require_role(actor, Role::Employer, "update application status")?;
        let record = self.get_application(actor, id)?;
        let updated = self
            .stores
            .applications
            .set_status(&record.id, status)
            .map_err(|err| not_found_as(err, "application"))?;
        info!(application_id = %id, status = status.label(), "application status updated");
        Ok(updated)
    }

    pub fn delete_application(
        &self,
        actor: &Actor,
        id: &ApplicationId,
    ) -> Result<DeletionOutcome, BoardError> {
        Ok(self.lifecycle.request_deletion(id, actor)?)
    }

    pub fn schedule_interview(
        &self,
        actor: &Actor,
        application_id: &ApplicationId,
        job_id: &JobId,
        candidate_id: &UserId,
        request: InterviewRequest,
    ) -> Result<Interview, BoardError> {
        require_role(actor, Role::Employer, "schedule interviews")?;
        let job = self.get_job(job_id)?;
        if job.posted_by != actor.user_id {
            return Err(BoardError::Unauthorized(
                "you can only schedule interviews for your posted jobs".to_string(),
            ));
        }
        let application = self
            .stores
            .applications
            .fetch(application_id)?
            .ok_or(BoardError::NotFound("application"))?;
        if &application.job.job_id != job_id || &application.job_seeker.id != candidate_id {
            return Err(BoardError::Invalid(
                "application does not match the job and candidate".to_string(),
            ));
        }

        let interview = Interview {
            id: InterviewId::generate(),
            employer_id: actor.user_id.clone(),
            candidate_id: candidate_id.clone(),
            job_id: job_id.clone(),
            application_id: application_id.clone(),
            date_time: request.date_time,
            meeting_link: request.meeting_link,
            status: InterviewStatus::Scheduled,
        };
        let interview = match self.stores.interviews.insert(interview) {
            Ok(interview) => interview,
            Err(StoreError::Conflict) => {
                return Err(BoardError::Conflict(
                    "an interview has already been scheduled for this application".to_string(),
                ))
            }
            Err(err) => return Err(not_found_as(err, "job")),
        };

        let when = interview.date_time.format("%Y-%m-%d %H:%M UTC");
        let link = interview.meeting_link.as_deref().unwrap_or("to be shared");
        self.send(Notification {
            recipient: candidate_id.clone(),
            subject: format!("Interview scheduled for \"{}\"", job.title),
            message: format!(
                "Your interview for \"{}\" is scheduled on {when}. Meeting link: {link}",
                job.title
            ),
        });
        self.send(Notification {
            recipient: actor.user_id.clone(),
            subject: format!("Interview confirmation for \"{}\"", job.title),
            message: format!(
                "You scheduled an interview with {} for \"{}\" on {when}. Meeting link: {link}",
                application.job_seeker.name, job.title
            ),
        });

        info!(interview_id = %interview.id, job_id = %job_id, "interview scheduled");
        Ok(interview)
    }

    pub fn user_interviews(
        &self,
        actor: &Actor,
        user_id: &UserId,
    ) -> Result<Vec<Interview>, BoardError> {
        if &actor.user_id != user_id && actor.role != Role::Employer {
            return Err(BoardError::Unauthorized(
                "unauthorized to view these interviews".to_string(),
            ));
        }
        Ok(self.stores.interviews.list_for_user(user_id)?)
    }

    /// Interviews attached to one of the employer's postings, soonest first.
    pub fn job_interviews(
        &self,
        actor: &Actor,
        job_id: &JobId,
    ) -> Result<Vec<Interview>, BoardError> {
        require_role(actor, Role::Employer, "list interviews for a job")?;
        let job = self.get_job(job_id)?;
        if job.posted_by != actor.user_id {
            return Err(BoardError::Unauthorized(
                "you can only view interviews for your posted jobs".to_string(),
            ));
        }
        Ok(self.stores.interviews.list_by_job(job_id)?)
    }

    pub fn update_interview_status(
        &self,
        actor: &Actor,
        id: &InterviewId,
        status: InterviewStatus,
    ) -> Result<Interview, BoardError> {
        let interview = self.owned_interview(actor, id, "update interview status")?;
        let updated = self
            .stores
            .interviews
            .set_status(&interview.id, status)
            .map_err(|err| not_found_as(err, "interview"))?;
        self.send(Notification {
            recipient: updated.candidate_id.clone(),
            subject: "Interview status updated".to_string(),
            message: format!("Your interview status is now {}.", status.label()),
        });
        Ok(updated)
    }

    pub fn delete_interview(&self, actor: &Actor, id: &InterviewId) -> Result<(), BoardError> {
        let interview = self.owned_interview(actor, id, "delete interviews")?;
        if !self.stores.interviews.delete(id)? {
            return Err(BoardError::NotFound("interview"));
        }
        self.send(Notification {
            recipient: interview.candidate_id.clone(),
            subject: "Interview cancelled".to_string(),
            message: format!(
                "Your interview scheduled on {} has been cancelled.",
                interview.date_time.format("%Y-%m-%d %H:%M UTC")
            ),
        });
        info!(interview_id = %id, "interview deleted");
        Ok(())
    }

    pub fn submit_report(
        &self,
        actor: &Actor,
        job_id: &JobId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Report, BoardError> {
        require_role(actor, Role::JobSeeker, "report jobs")?;
        if reason.trim().is_empty() {
            return Err(BoardError::Invalid("reason is required".to_string()));
        }
        let job = self.get_job(job_id)?;
        let report = Report {
            id: ReportId::generate(),
            job_id: job.id,
            job_title: job.title,
            company_name: job.company_name,
            reason: reason.trim().to_string(),
            employer_id: job.posted_by,
            reported_by: actor.user_id.clone(),
            status: ReportStatus::Pending,
            created_at: now,
        };
        Ok(self.stores.reports.insert(report)?)
    }

    pub fn list_reports(&self, actor: &Actor) -> Result<Vec<Report>, BoardError> {
        require_role(actor, Role::Admin, "review reports")?;
        Ok(self.stores.reports.list_all()?)
    }

    pub fn my_reports(&self, actor: &Actor) -> Result<Vec<Report>, BoardError> {
        Ok(self.stores.reports.list_by_reporter(&actor.user_id)?)
    }

    pub fn update_report_status(
        &self,
        actor: &Actor,
        id: &ReportId,
        status: ReportStatus,
    ) -> Result<Report, BoardError> {
        require_role(actor, Role::Admin, "update reports")?;
        self.stores
            .reports
            .set_status(id, status)
            .map_err(|err| not_found_as(err, "report"))
    }

    pub fn delete_report(&self, actor: &Actor, id: &ReportId) -> Result<(), BoardError> {
        require_role(actor, Role::Admin, "delete reports")?;
        if self.stores.reports.delete(id)? {
            Ok(())
        } else {
            Err(BoardError::NotFound("report"))
        }
    }

    pub fn save_job(&self, actor: &Actor, job_id: &JobId) -> Result<(), BoardError> {
        require_role(actor, Role::JobSeeker, "save jobs")?;
        match self.stores.saved.save(&actor.user_id, job_id) {
            Ok(()) => {
                info!(job_id = %job_id, user_id = %actor.user_id, "job saved");
                Ok(())
            }
            Err(StoreError::Conflict) => {
                Err(BoardError::Conflict("job already saved".to_string()))
            }
            Err(err) => Err(not_found_as(err, "job")),
        }
    }

    /// Removing a job that was never saved is not an error.
    pub fn unsave_job(&self, actor: &Actor, job_id: &JobId) -> Result<(), BoardError> {
        require_role(actor, Role::JobSeeker, "unsave jobs")?;
        self.stores.saved.unsave(&actor.user_id, job_id)?;
        Ok(())
    }

    pub fn saved_jobs(&self, actor: &Actor) -> Result<Vec<Job>, BoardError> {
        require_role(actor, Role::JobSeeker, "list saved jobs")?;
        let mut jobs = Vec::new();
        for id in self.stores.saved.list_saved(&actor.user_id)? {
            if let Some(job) = self.stores.jobs.fetch(&id)? {
                jobs.push(job);
            }
        }
        Ok(jobs)
    }

    /// Postings of one employer, for moderation.
    pub fn employer_jobs(
        &self,
        actor: &Actor,
        employer_id: &UserId,
    ) -> Result<Vec<Job>, BoardError> {
        require_role(actor, Role::Admin, "review employer postings")?;
        let jobs = self.stores.jobs.list_by_owner(employer_id)?;
        if jobs.is_empty() {
            return Err(BoardError::NotFound("jobs for this employer"));
        }
        Ok(jobs)
    }

    pub fn sweep_expired_jobs(&self, now: DateTime<Utc>) -> Result<SweepReport, BoardError> {
        Ok(self.collector.sweep(now)?)
    }

    pub fn release_pending(&self) -> Result<usize, BoardError> {
        Ok(self.lifecycle.release_pending()?)
    }

    pub fn sweep_in_progress(&self) -> bool {
        self.collector.is_running()
    }

    fn owned_interview(
        &self,
        actor: &Actor,
        id: &InterviewId,
        action: &str,
    ) -> Result<Interview, BoardError> {
        require_role(actor, Role::Employer, action)?;
        let interview = self
            .stores
            .interviews
            .fetch(id)?
            .ok_or(BoardError::NotFound("interview"))?;
        if interview.employer_id != actor.user_id {
            return Err(BoardError::Unauthorized(
                "interview belongs to another employer".to_string(),
            ));
        }
        Ok(interview)
    }

    fn send(&self, notification: Notification) {
        let recipient = notification.recipient.clone();
        if let Err(err) = self.notifier.notify(notification) {
            warn!(%recipient, error = %err, "notification not delivered");
        }
    }
}

fn require_role(actor: &Actor, role: Role, action: &str) -> Result<(), BoardError> {
    if actor.role == role {
        Ok(())
    } else {
        Err(BoardError::Unauthorized(format!(
            "{} is not allowed to {action}",
            actor.role.label()
        )))
    }
}

fn already_applied() -> BoardError {
    BoardError::Conflict("you have already applied for this job".to_string())
}

fn not_found_as(err: StoreError, entity: &'static str) -> BoardError {
    match err {
        StoreError::NotFound => BoardError::NotFound(entity),
        other => other.into(),
    }
}

/// Error raised by the board service.
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Invalid(String),
    #[error("this job has expired and cannot be applied for")]
    Expired,
    #[error("please upload a resume to your profile before applying")]
    MissingResume,
    #[error("an expiry sweep is already running")]
    SweepInProgress,
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    ReleaseIncomplete(String),
}

impl From<LifecycleError> for BoardError {
    fn from(value: LifecycleError) -> Self {
        match value {
            LifecycleError::NotFound => BoardError::NotFound("application"),
            LifecycleError::Unauthorized(reason) => BoardError::Unauthorized(reason),
            LifecycleError::Store(err) => BoardError::Store(err),
            incomplete @ LifecycleError::ReleaseIncomplete { .. } => {
                BoardError::ReleaseIncomplete(incomplete.to_string())
            }
        }
    }
}

impl From<SweepError> for BoardError {
    fn from(value: SweepError) -> Self {
        match value {
            SweepError::AlreadyRunning => BoardError::SweepInProgress,
            SweepError::Store(err) => BoardError::Store(err),
        }
    }
}
