//! In-process document store. Each primitive runs inside one critical section,
//! which is what makes the flag and applicant-set updates atomic.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::domain::{
    ApplicationId, ApplicationRecord, ApplicationStatus, Interview, InterviewId, InterviewStatus,
    Job, JobId, JobQuery, Party, Report, ReportId, ReportStatus, UserId,
};
use super::repository::{
    ApplicationStore, InterviewStore, JobStore, ReportStore, SavedJobStore, StoreError,
};

#[derive(Default)]
struct Collections {
    jobs: HashMap<JobId, Job>,
    applications: HashMap<ApplicationId, ApplicationRecord>,
    interviews: HashMap<InterviewId, Interview>,
    reports: HashMap<ReportId, Report>,
    saved: HashMap<UserId, Vec<JobId>>,
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: Mutex<Collections>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>, StoreError> {
        self.collections
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store mutex poisoned".to_string()))
    }
}

fn sorted_jobs<'a>(jobs: impl Iterator<Item = &'a Job>) -> Vec<Job> {
    let mut out: Vec<Job> = jobs.cloned().collect();
    out.sort_by(|a, b| b.posted_on.cmp(&a.posted_on).then_with(|| a.id.cmp(&b.id)));
    out
}

fn sorted_applications<'a>(
    records: impl Iterator<Item = &'a ApplicationRecord>,
) -> Vec<ApplicationRecord> {
    let mut out: Vec<ApplicationRecord> = records.cloned().collect();
    out.sort_by(|a, b| {
        b.submitted_on
            .cmp(&a.submitted_on)
            .then_with(|| a.id.cmp(&b.id))
    });
    out
}

impl JobStore for MemoryDocumentStore {
    fn insert(&self, job: Job) -> Result<Job, StoreError> {
        let mut guard = self.lock()?;
        if guard.jobs.contains_key(&job.id) {
            return Err(StoreError::Conflict);
        }
        guard.jobs.insert(job.id.clone(), job.clone());
        Ok(job)
    }

    fn fetch(&self, id: &JobId) -> Result<Option<Job>, StoreError> {
        Ok(self.lock()?.jobs.get(id).cloned())
    }

    fn list(&self, query: &JobQuery) -> Result<Vec<Job>, StoreError> {
        let guard = self.lock()?;
        Ok(sorted_jobs(guard.jobs.values().filter(|job| query.matches(job))))
    }

    fn list_by_owner(&self, employer: &UserId) -> Result<Vec<Job>, StoreError> {
        let guard = self.lock()?;
        Ok(sorted_jobs(
            guard.jobs.values().filter(|job| &job.posted_by == employer),
        ))
    }

    fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<Job>, StoreError> {
        let guard = self.lock()?;
        Ok(sorted_jobs(guard.jobs.values().filter(|job| job.is_expired(now))))
    }

    fn add_applicant(&self, id: &JobId, seeker: &UserId) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        let job = guard.jobs.get_mut(id).ok_or(StoreError::NotFound)?;
        job.applicants.insert(seeker.clone());
        Ok(())
    }

    fn remove_applicant(&self, id: &JobId, seeker: &UserId) -> Result<bool, StoreError> {
        let mut guard = self.lock()?;
        let job = guard.jobs.get_mut(id).ok_or(StoreError::NotFound)?;
        Ok(job.applicants.remove(seeker))
    }

    fn delete(&self, id: &JobId) -> Result<bool, StoreError> {
        Ok(self.lock()?.jobs.remove(id).is_some())
    }
}

impl ApplicationStore for MemoryDocumentStore {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, StoreError> {
        let mut guard = self.lock()?;
        let duplicate = guard.applications.values().any(|existing| {
            existing.job.job_id == record.job.job_id
                && existing.job_seeker.id == record.job_seeker.id
        });
        if duplicate || guard.applications.contains_key(&record.id) {
            return Err(StoreError::Conflict);
        }
        if !guard.jobs.contains_key(&record.job.job_id) {
            return Err(StoreError::NotFound);
        }
        guard.applications.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, StoreError> {
        Ok(self.lock()?.applications.get(id).cloned())
    }

    fn find_for_seeker(
        &self,
        job: &JobId,
        seeker: &UserId,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        let guard = self.lock()?;
        Ok(guard
            .applications
            .values()
            .find(|record| &record.job.job_id == job && &record.job_seeker.id == seeker)
            .cloned())
    }

    fn list_for_employer(&self, employer: &UserId) -> Result<Vec<ApplicationRecord>, StoreError> {
        let guard = self.lock()?;
        Ok(sorted_applications(guard.applications.values().filter(
            |record| &record.employer.id == employer && !record.deleted_by.employer,
        )))
    }

    fn list_for_seeker(&self, seeker: &UserId) -> Result<Vec<ApplicationRecord>, StoreError> {
        let guard = self.lock()?;
        Ok(sorted_applications(guard.applications.values().filter(
            |record| &record.job_seeker.id == seeker && !record.deleted_by.job_seeker,
        )))
    }

    fn set_status(
        &self,
        id: &ApplicationId,
        status: ApplicationStatus,
    ) -> Result<ApplicationRecord, StoreError> {
        let mut guard = self.lock()?;
        let record = guard.applications.get_mut(id).ok_or(StoreError::NotFound)?;
        record.status = status;
        Ok(record.clone())
    }

    fn mark_deleted(
        &self,
        id: &ApplicationId,
        party: Party,
    ) -> Result<Option<ApplicationRecord>, StoreError> {
        let mut guard = self.lock()?;
        Ok(guard.applications.get_mut(id).map(|record| {
            record.deleted_by.set(party);
            record.clone()
        }))
    }

    fn list_released(&self) -> Result<Vec<ApplicationRecord>, StoreError> {
        let guard = self.lock()?;
        Ok(sorted_applications(guard.applications.values().filter(
            |record| record.deleted_by.employer && record.deleted_by.job_seeker,
        )))
    }

    fn delete(&self, id: &ApplicationId) -> Result<bool, StoreError> {
        Ok(self.lock()?.applications.remove(id).is_some())
    }

    fn delete_by_job(&self, job: &JobId) -> Result<usize, StoreError> {
        let mut guard = self.lock()?;
        let before = guard.applications.len();
        guard
            .applications
            .retain(|_, record| &record.job.job_id != job);
        Ok(before - guard.applications.len())
    }
}

impl InterviewStore for MemoryDocumentStore {
    fn insert(&self, interview: Interview) -> Result<Interview, StoreError> {
        let mut guard = self.lock()?;
        let duplicate = guard.interviews.values().any(|existing| {
            existing.application_id == interview.application_id
                && existing.job_id == interview.job_id
                && existing.candidate_id == interview.candidate_id
        });
        if duplicate || guard.interviews.contains_key(&interview.id) {
            return Err(StoreError::Conflict);
        }
        if !guard.jobs.contains_key(&interview.job_id) {
            return Err(StoreError::NotFound);
        }
        guard.interviews.insert(interview.id.clone(), interview.clone());
        Ok(interview)
    }

    fn fetch(&self, id: &InterviewId) -> Result<Option<Interview>, StoreError> {
        Ok(self.lock()?.interviews.get(id).cloned())
    }

    fn list_for_user(&self, user: &UserId) -> Result<Vec<Interview>, StoreError> {
        let guard = self.lock()?;
        let mut out: Vec<Interview> = guard
            .interviews
            .values()
            .filter(|interview| &interview.employer_id == user || &interview.candidate_id == user)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.date_time.cmp(&b.date_time).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    fn list_by_job(&self, job: &JobId) -> Result<Vec<Interview>, StoreError> {
        let guard = self.lock()?;
        let mut out: Vec<Interview> = guard
            .interviews
            .values()
            .filter(|interview| &interview.job_id == job)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.date_time.cmp(&b.date_time).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    fn set_status(
        &self,
        id: &InterviewId,
        status: InterviewStatus,
    ) -> Result<Interview, StoreError> {
        let mut guard = self.lock()?;
        let interview = guard.interviews.get_mut(id).ok_or(StoreError::NotFound)?;
        interview.status = status;
        Ok(interview.clone())
    }

    fn delete(&self, id: &InterviewId) -> Result<bool, StoreError> {
        Ok(self.lock()?.interviews.remove(id).is_some())
    }

    fn delete_by_job(&self, job: &JobId) -> Result<usize, StoreError> {
        let mut guard = self.lock()?;
        let before = guard.interviews.len();
        guard
            .interviews
            .retain(|_, interview| &interview.job_id != job);
        Ok(before - guard.interviews.len())
    }
}

impl ReportStore for MemoryDocumentStore {
    fn insert(&self, report: Report) -> Result<Report, StoreError> {
        let mut guard = self.lock()?;
        if guard.reports.contains_key(&report.id) {
            return Err(StoreError::Conflict);
        }
        guard.reports.insert(report.id.clone(), report.clone());
        Ok(report)
    }

    fn fetch(&self, id: &ReportId) -> Result<Option<Report>, StoreError> {
        Ok(self.lock()?.reports.get(id).cloned())
    }

    fn list_all(&self) -> Result<Vec<Report>, StoreError> {
        let guard = self.lock()?;
        let mut out: Vec<Report> = guard.reports.values().cloned().collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    fn list_by_reporter(&self, reporter: &UserId) -> Result<Vec<Report>, StoreError> {
        let guard = self.lock()?;
        let mut out: Vec<Report> = guard
            .reports
            .values()
            .filter(|report| &report.reported_by == reporter)
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    fn set_status(&self, id: &ReportId, status: ReportStatus) -> Result<Report, StoreError> {
        let mut guard = self.lock()?;
        let report = guard.reports.get_mut(id).ok_or(StoreError::NotFound)?;
        report.status = status;
        Ok(report.clone())
    }

    fn delete(&self, id: &ReportId) -> Result<bool, StoreError> {
        Ok(self.lock()?.reports.remove(id).is_some())
    }
}

impl SavedJobStore for MemoryDocumentStore {
    fn save(&self, user: &UserId, job: &JobId) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        if !guard.jobs.contains_key(job) {
            return Err(StoreError::NotFound);
        }
        let saved = guard.saved.entry(user.clone()).or_default();
        if saved.contains(job) {
            return Err(StoreError::Conflict);
        }
        saved.push(job.clone());
        Ok(())
    }

    fn unsave(&self, user: &UserId, job: &JobId) -> Result<bool, StoreError> {
        let mut guard = self.lock()?;
        let Some(saved) = guard.saved.get_mut(user) else {
            return Ok(false);
        };
        let before = saved.len();
        saved.retain(|id| id != job);
        Ok(saved.len() < before)
    }

    fn list_saved(&self, user: &UserId) -> Result<Vec<JobId>, StoreError> {
        Ok(self.lock()?.saved.get(user).cloned().unwrap_or_default())
    }

    fn delete_by_job(&self, job: &JobId) -> Result<usize, StoreError> {
        let mut guard = self.lock()?;
        let mut removed = 0;
        for saved in guard.saved.values_mut() {
            let before = saved.len();
            saved.retain(|id| id != job);
            removed += before - saved.len();
        }
        Ok(removed)
    }
}
