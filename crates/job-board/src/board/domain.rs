use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Identity handed to the core by the authentication gate.
    UserId
);
string_id!(JobId);
string_id!(
    /// Identifier wrapper for submitted applications.
    ApplicationId
);
string_id!(InterviewId);
string_id!(ReportId);

/// Account roles recognised by the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "Job Seeker", alias = "job_seeker")]
    JobSeeker,
    #[serde(alias = "employer")]
    Employer,
    #[serde(alias = "admin")]
    Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::JobSeeker => "Job Seeker",
            Role::Employer => "Employer",
            Role::Admin => "Admin",
        }
    }

    /// Accepts both the display label and the snake_case form.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "job_seeker" | "jobseeker" | "seeker" => Some(Role::JobSeeker),
            "employer" => Some(Role::Employer),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// Authenticated caller as resolved upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: UserId(user_id.into()),
            role,
        }
    }

    pub fn job_seeker(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::JobSeeker)
    }

    pub fn employer(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Employer)
    }

    pub fn admin(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Admin)
    }
}

/// How long a posting stays listed before the expiry sweep reclaims it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidityPeriod {
    #[serde(rename = "3-month")]
    ThreeMonths,
    #[serde(rename = "6-month")]
    SixMonths,
    #[serde(rename = "1-year")]
    OneYear,
}

impl ValidityPeriod {
    const fn months(self) -> u32 {
        match self {
            ValidityPeriod::ThreeMonths => 3,
            ValidityPeriod::SixMonths => 6,
            ValidityPeriod::OneYear => 12,
        }
    }

    /// Calendar-month arithmetic; end-of-month dates clamp to the last valid day.
    pub fn expiry_from(self, posted_on: DateTime<Utc>) -> DateTime<Utc> {
        posted_on
            .checked_add_months(Months::new(self.months()))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonalWebsite {
    pub title: String,
    pub url: String,
}

/// Employer supplied fields for a new posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPosting {
    pub title: String,
    pub job_type: String,
    pub location: String,
    pub company_name: String,
    pub introduction: String,
    pub responsibilities: String,
    pub qualifications: String,
    #[serde(default)]
    pub offers: Option<String>,
    pub salary: String,
    #[serde(default)]
    pub hiring_multiple_candidates: bool,
    #[serde(default)]
    pub personal_website: Option<PersonalWebsite>,
    pub job_niche: String,
    pub validity_period: ValidityPeriod,
}

/// Stored job posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub title: String,
    pub job_type: String,
    pub location: String,
    pub company_name: String,
    pub introduction: String,
    pub responsibilities: String,
    pub qualifications: String,
    pub offers: Option<String>,
    pub salary: String,
    pub hiring_multiple_candidates: bool,
    pub personal_website: Option<PersonalWebsite>,
    pub job_niche: String,
    pub posted_by: UserId,
    pub posted_on: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,
    #[serde(default)]
    pub applicants: BTreeSet<UserId>,
}

impl Job {
    pub fn from_posting(posting: JobPosting, posted_by: UserId, posted_on: DateTime<Utc>) -> Self {
        let expiry_date = posting.validity_period.expiry_from(posted_on);
        Self {
            id: JobId::generate(),
            title: posting.title,
            job_type: posting.job_type,
            location: posting.location,
            company_name: posting.company_name,
            introduction: posting.introduction,
            responsibilities: posting.responsibilities,
            qualifications: posting.qualifications,
            offers: posting.offers,
            salary: posting.salary,
            hiring_multiple_candidates: posting.hiring_multiple_candidates,
            personal_website: posting.personal_website,
            job_niche: posting.job_niche,
            posted_by,
            posted_on,
            expiry_date,
            applicants: BTreeSet::new(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date <= now
    }
}

/// Listing filters for the public job search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct JobQuery {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub niche: Option<String>,
    #[serde(default, rename = "searchKeyword", alias = "keyword")]
    pub keyword: Option<String>,
}

impl JobQuery {
    pub fn matches(&self, job: &Job) -> bool {
        if let Some(city) = self.city.as_deref().filter(|value| !value.is_empty()) {
            if job.location != city {
                return false;
            }
        }
        if let Some(niche) = self.niche.as_deref().filter(|value| !value.is_empty()) {
            if job.job_niche != niche {
                return false;
            }
        }
        match self.keyword.as_deref().filter(|value| !value.is_empty()) {
            Some(keyword) => {
                let needle = keyword.to_lowercase();
                [
                    &job.title,
                    &job.company_name,
                    &job.introduction,
                    &job.location,
                    &job.job_niche,
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
            }
            None => true,
        }
    }
}

/// Reference to a resume held by the external file store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeRef {
    pub public_id: String,
    pub url: String,
}

/// Seeker supplied fields for an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationSubmission {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub cover_letter: String,
    /// Resume on file in the seeker's profile, if any.
    #[serde(default)]
    pub resume: Option<ResumeRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSeekerInfo {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub cover_letter: String,
    pub resume: ResumeRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmployerInfo {
    pub id: UserId,
}

/// Snapshot of the job taken when the application was filed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobInfo {
    pub job_id: JobId,
    pub job_title: String,
    pub company_name: String,
    pub expiry_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    #[default]
    Pending,
    Accepted,
    Rejected,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Pending => "pending",
            ApplicationStatus::Accepted => "accepted",
            ApplicationStatus::Rejected => "rejected",
        }
    }
}

/// One side of an application that may withdraw it from view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Party {
    Employer,
    JobSeeker,
}

impl Party {
    pub fn for_role(role: Role) -> Option<Self> {
        match role {
            Role::Employer => Some(Party::Employer),
            Role::JobSeeker => Some(Party::JobSeeker),
            Role::Admin => None,
        }
    }
}

/// Persisted soft-delete flags. Monotonic while the record exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedBy {
    pub employer: bool,
    pub job_seeker: bool,
}

impl DeletedBy {
    pub fn is_set(&self, party: Party) -> bool {
        match party {
            Party::Employer => self.employer,
            Party::JobSeeker => self.job_seeker,
        }
    }

    pub fn set(&mut self, party: Party) {
        match party {
            Party::Employer => self.employer = true,
            Party::JobSeeker => self.job_seeker = true,
        }
    }

    pub fn state(&self) -> DeletionState {
        match (self.employer, self.job_seeker) {
            (false, false) => DeletionState::Active,
            (true, false) => DeletionState::PartiallyReleased { by: Party::Employer },
            (false, true) => DeletionState::PartiallyReleased {
                by: Party::JobSeeker,
            },
            (true, true) => DeletionState::Released,
        }
    }
}

/// Visibility state of an application, derived from the stored flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeletionState {
    Active,
    PartiallyReleased { by: Party },
    Released,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub job_seeker: JobSeekerInfo,
    pub employer: EmployerInfo,
    pub job: JobInfo,
    #[serde(default)]
    pub status: ApplicationStatus,
    #[serde(default)]
    pub deleted_by: DeletedBy,
    pub submitted_on: DateTime<Utc>,
}

impl ApplicationRecord {
    pub fn deletion_state(&self) -> DeletionState {
        self.deleted_by.state()
    }

    /// The user id recorded for the given side of the application.
    pub fn party_id(&self, party: Party) -> &UserId {
        match party {
            Party::Employer => &self.employer.id,
            Party::JobSeeker => &self.job_seeker.id,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterviewStatus {
    #[default]
    Scheduled,
    Pending,
    Accepted,
    Rejected,
}

impl InterviewStatus {
    pub const fn label(self) -> &'static str {
        match self {
            InterviewStatus::Scheduled => "Scheduled",
            InterviewStatus::Pending => "Pending",
            InterviewStatus::Accepted => "Accepted",
            InterviewStatus::Rejected => "Rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interview {
    pub id: InterviewId,
    pub employer_id: UserId,
    pub candidate_id: UserId,
    pub job_id: JobId,
    pub application_id: ApplicationId,
    pub date_time: DateTime<Utc>,
    pub meeting_link: Option<String>,
    pub status: InterviewStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportStatus {
    #[default]
    Pending,
    Reviewed,
    #[serde(rename = "Action Taken")]
    ActionTaken,
}

/// Moderation flag raised by a seeker against a posting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub id: ReportId,
    pub job_id: JobId,
    pub job_title: String,
    pub company_name: String,
    pub reason: String,
    pub employer_id: UserId,
    pub reported_by: UserId,
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}
