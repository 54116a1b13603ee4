use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRequestParts, Path, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{
    Actor, ApplicationId, ApplicationStatus, ApplicationSubmission, InterviewId, InterviewStatus,
    JobId, JobPosting, JobQuery, ReportId, ReportStatus, Role, UserId,
};
use super::lifecycle::DeletionOutcome;
use super::service::{BoardError, InterviewRequest, JobBoardService};

/// Header carrying the caller id resolved by the authentication gateway.
pub const HEADER_USER_ID: &str = "x-user-id";
/// Header carrying the caller role resolved by the authentication gateway.
pub const HEADER_USER_ROLE: &str = "x-user-role";

type SharedService = Arc<JobBoardService>;

/// Router builder exposing the board's HTTP endpoints.
pub fn board_router(service: SharedService) -> Router {
    Router::new()
        .route("/api/v1/job/post", post(post_job_handler))
        .route("/api/v1/job/getall", get(list_jobs_handler))
        .route("/api/v1/job/getmyjobs", get(my_jobs_handler))
        .route("/api/v1/job/get/:job_id", get(get_job_handler))
        .route("/api/v1/job/delete/:job_id", delete(delete_job_handler))
        .route("/api/v1/job/expired", delete(sweep_handler))
        .route("/api/v1/application/post/:job_id", post(apply_handler))
        .route(
            "/api/v1/application/employer/getall",
            get(employer_applications_handler),
        )
        .route(
            "/api/v1/application/jobseeker/getall",
            get(seeker_applications_handler),
        )
        .route(
            "/api/v1/application/get/:application_id",
            get(get_application_handler),
        )
        .route(
            "/api/v1/application/status/:application_id",
            post(application_status_handler),
        )
        .route(
            "/api/v1/application/delete/:application_id",
            delete(delete_application_handler),
        )
        .route(
            "/api/v1/interview/schedule/:application_id/:job_id/:candidate_id",
            post(schedule_interview_handler),
        )
        .route(
            "/api/v1/interview/user/:user_id",
            get(user_interviews_handler),
        )
        .route("/api/v1/interview/job/:job_id", get(job_interviews_handler))
        .route(
            "/api/v1/interview/status/:interview_id",
            post(interview_status_handler),
        )
        .route(
            "/api/v1/interview/delete/:interview_id",
            delete(delete_interview_handler),
        )
        .route("/api/v1/report/:job_id", post(submit_report_handler))
        .route("/api/v1/reports", get(list_reports_handler))
        .route("/api/v1/my-reports", get(my_reports_handler))
        .route(
            "/api/v1/reports/:report_id",
            put(report_status_handler).delete(delete_report_handler),
        )
        .route("/api/v1/user/save-job/:job_id", post(save_job_handler))
        .route("/api/v1/user/unsave-job/:job_id", delete(unsave_job_handler))
        .route("/api/v1/user/saved-jobs", get(saved_jobs_handler))
        .route(
            "/api/v1/admin/employer/:employer_id/jobs",
            get(employer_jobs_handler),
        )
        .with_state(service)
}

/// Rejection when the gateway headers are missing or malformed.
#[derive(Debug)]
pub struct ActorRejection(&'static str);

impl IntoResponse for ActorRejection {
    fn into_response(self) -> Response {
        let payload = json!({ "success": false, "error": self.0 });
        (StatusCode::UNAUTHORIZED, Json(payload)).into_response()
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ActorRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let user_id = header(HEADER_USER_ID).ok_or(ActorRejection("user is not authenticated"))?;
        let role = header(HEADER_USER_ROLE)
            .and_then(Role::parse)
            .ok_or(ActorRejection("user role is missing or unknown"))?;

        Ok(Actor {
            user_id: UserId(user_id.to_string()),
            role,
        })
    }
}

impl IntoResponse for BoardError {
    fn into_response(self) -> Response {
        let status = match &self {
            BoardError::NotFound(_) => StatusCode::NOT_FOUND,
            BoardError::Unauthorized(_) => StatusCode::FORBIDDEN,
            BoardError::Conflict(_) | BoardError::SweepInProgress => StatusCode::CONFLICT,
            BoardError::Invalid(_) | BoardError::Expired | BoardError::MissingResume => {
                StatusCode::BAD_REQUEST
            }
            BoardError::Store(_) | BoardError::ReleaseIncomplete(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let payload = json!({ "success": false, "error": self.to_string() });
        (status, Json(payload)).into_response()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct StatusUpdate<T> {
    pub(crate) status: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReportRequest {
    pub(crate) reason: String,
}

pub(crate) async fn post_job_handler(
    State(service): State<SharedService>,
    actor: Actor,
    Json(posting): Json<JobPosting>,
) -> Result<Response, BoardError> {
    let job = service.post_job(&actor, posting, Utc::now())?;
    let payload = json!({ "success": true, "message": "Job posted successfully.", "job": job });
    Ok((StatusCode::CREATED, Json(payload)).into_response())
}

pub(crate) async fn list_jobs_handler(
    State(service): State<SharedService>,
    Query(query): Query<JobQuery>,
) -> Result<Json<serde_json::Value>, BoardError> {
    let jobs = service.list_jobs(&query)?;
    Ok(Json(
        json!({ "success": true, "count": jobs.len(), "jobs": jobs }),
    ))
}

pub(crate) async fn my_jobs_handler(
    State(service): State<SharedService>,
    actor: Actor,
) -> Result<Json<serde_json::Value>, BoardError> {
    let jobs = service.my_jobs(&actor)?;
    Ok(Json(json!({ "success": true, "myJobs": jobs })))
}

pub(crate) async fn get_job_handler(
    State(service): State<SharedService>,
    Path(job_id): Path<String>,
) -> Result<Json<serde_json::Value>, BoardError> {
    let job = service.get_job(&JobId(job_id))?;
    Ok(Json(json!({ "success": true, "job": job })))
}

pub(crate) async fn delete_job_handler(
    State(service): State<SharedService>,
    actor: Actor,
    Path(job_id): Path<String>,
) -> Result<Json<serde_json::Value>, BoardError> {
    service.delete_job(&actor, &JobId(job_id))?;
    Ok(Json(json!({ "success": true, "message": "Job deleted." })))
}

pub(crate) async fn sweep_handler(
    State(service): State<SharedService>,
    actor: Actor,
) -> Result<Json<serde_json::Value>, BoardError> {
    if actor.role != Role::Admin {
        return Err(BoardError::Unauthorized(
            "only administrators can trigger the expiry sweep".to_string(),
        ));
    }

    let report = tokio::task::spawn_blocking(move || service.sweep_expired_jobs(Utc::now()))
        .await
        .map_err(|err| {
            BoardError::Store(super::repository::StoreError::Unavailable(format!(
                "sweep task failed: {err}"
            )))
        })??;

    let message = if report.removed_count() == 0 {
        "No expired jobs found.".to_string()
    } else {
        format!(
            "Deleted {} expired job(s) along with related applications and interviews.",
            report.removed_count()
        )
    };
    Ok(Json(
        json!({ "success": !report.is_partial(), "message": message, "report": report }),
    ))
}

pub(crate) async fn apply_handler(
    State(service): State<SharedService>,
    actor: Actor,
    Path(job_id): Path<String>,
    Json(submission): Json<ApplicationSubmission>,
) -> Result<Response, BoardError> {
    let application = service.apply(&actor, &JobId(job_id), submission, Utc::now())?;
    let payload = json!({
        "success": true,
        "message": "Application submitted successfully.",
        "application": application,
    });
    Ok((StatusCode::CREATED, Json(payload)).into_response())
}

pub(crate) async fn employer_applications_handler(
    State(service): State<SharedService>,
    actor: Actor,
) -> Result<Json<serde_json::Value>, BoardError> {
    let applications = service.employer_applications(&actor)?;
    Ok(Json(
        json!({ "success": true, "applications": applications }),
    ))
}

pub(crate) async fn seeker_applications_handler(
    State(service): State<SharedService>,
    actor: Actor,
) -> Result<Json<serde_json::Value>, BoardError> {
    let applications = service.seeker_applications(&actor)?;
    Ok(Json(
        json!({ "success": true, "applications": applications }),
    ))
}

pub(crate) async fn get_application_handler(
    State(service): State<SharedService>,
    actor: Actor,
    Path(application_id): Path<String>,
) -> Result<Json<serde_json::Value>, BoardError> {
    let application = service.get_application(&actor, &ApplicationId(application_id))?;
    Ok(Json(json!({ "success": true, "application": application })))
}

pub(crate) async fn application_status_handler(
    State(service): State<SharedService>,
    actor: Actor,
    Path(application_id): Path<String>,
    Json(update): Json<StatusUpdate<ApplicationStatus>>,
) -> Result<Json<serde_json::Value>, BoardError> {
    let application = service.update_application_status(
        &actor,
        &ApplicationId(application_id),
        update.status,
    )?;
    Ok(Json(json!({
        "success": true,
        "message": "Status updated successfully.",
        "application": application,
    })))
}

pub(crate) async fn delete_application_handler(
    State(service): State<SharedService>,
    actor: Actor,
    Path(application_id): Path<String>,
) -> Result<Json<serde_json::Value>, BoardError> {
    let outcome = service.delete_application(&actor, &ApplicationId(application_id))?;
    let message = match outcome {
        DeletionOutcome::PartiallyReleased { .. } => "Application removed from your view.",
        DeletionOutcome::Released => "Application deleted successfully.",
    };
    Ok(Json(json!({
        "success": true,
        "message": message,
        "outcome": outcome,
    })))
}

pub(crate) async fn schedule_interview_handler(
    State(service): State<SharedService>,
    actor: Actor,
    Path((application_id, job_id, candidate_id)): Path<(String, String, String)>,
    Json(request): Json<InterviewRequest>,
) -> Result<Response, BoardError> {
    let interview = service.schedule_interview(
        &actor,
        &ApplicationId(application_id),
        &JobId(job_id),
        &UserId(candidate_id),
        request,
    )?;
    let payload = json!({
        "success": true,
        "message": "Interview scheduled and notifications sent.",
        "interview": interview,
    });
    Ok((StatusCode::CREATED, Json(payload)).into_response())
}

pub(crate) async fn user_interviews_handler(
    State(service): State<SharedService>,
    actor: Actor,
    Path(user_id): Path<String>,
) -> Result<Json<serde_json::Value>, BoardError> {
    let interviews = service.user_interviews(&actor, &UserId(user_id))?;
    Ok(Json(json!({ "success": true, "interviews": interviews })))
}

pub(crate) async fn job_interviews_handler(
    State(service): State<SharedService>,
    actor: Actor,
    Path(job_id): Path<String>,
) -> Result<Json<serde_json::Value>, BoardError> {
    let interviews = service.job_interviews(&actor, &JobId(job_id))?;
    Ok(Json(json!({ "success": true, "interviews": interviews })))
}

pub(crate) async fn interview_status_handler(
    State(service): State<SharedService>,
    actor: Actor,
    Path(interview_id): Path<String>,
    Json(update): Json<StatusUpdate<InterviewStatus>>,
) -> Result<Json<serde_json::Value>, BoardError> {
    let interview =
        service.update_interview_status(&actor, &InterviewId(interview_id), update.status)?;
    Ok(Json(json!({
        "success": true,
        "message": "Interview status updated.",
        "interview": interview,
    })))
}

pub(crate) async fn delete_interview_handler(
    State(service): State<SharedService>,
    actor: Actor,
    Path(interview_id): Path<String>,
) -> Result<Json<serde_json::Value>, BoardError> {
    service.delete_interview(&actor, &InterviewId(interview_id))?;
    Ok(Json(
        json!({ "success": true, "message": "Interview deleted successfully." }),
    ))
}

pub(crate) async fn submit_report_handler(
    State(service): State<SharedService>,
    actor: Actor,
    Path(job_id): Path<String>,
    Json(request): Json<ReportRequest>,
) -> Result<Response, BoardError> {
    let report = service.submit_report(&actor, &JobId(job_id), &request.reason, Utc::now())?;
    let payload = json!({
        "success": true,
        "message": "Report submitted successfully.",
        "report": report,
    });
    Ok((StatusCode::CREATED, Json(payload)).into_response())
}

pub(crate) async fn list_reports_handler(
    State(service): State<SharedService>,
    actor: Actor,
) -> Result<Json<serde_json::Value>, BoardError> {
    let reports = service.list_reports(&actor)?;
    Ok(Json(json!({ "success": true, "reports": reports })))
}

pub(crate) async fn my_reports_handler(
    State(service): State<SharedService>,
    actor: Actor,
) -> Result<Json<serde_json::Value>, BoardError> {
    let reports = service.my_reports(&actor)?;
    Ok(Json(json!({ "success": true, "reports": reports })))
}

pub(crate) async fn report_status_handler(
    State(service): State<SharedService>,
    actor: Actor,
    Path(report_id): Path<String>,
    Json(update): Json<StatusUpdate<ReportStatus>>,
) -> Result<Json<serde_json::Value>, BoardError> {
    let report = service.update_report_status(&actor, &ReportId(report_id), update.status)?;
    Ok(Json(json!({
        "success": true,
        "message": "Report status updated successfully.",
        "report": report,
    })))
}

pub(crate) async fn delete_report_handler(
    State(service): State<SharedService>,
    actor: Actor,
    Path(report_id): Path<String>,
) -> Result<Json<serde_json::Value>, BoardError> {
    service.delete_report(&actor, &ReportId(report_id))?;
    Ok(Json(
        json!({ "success": true, "message": "Report deleted successfully." }),
    ))
}

pub(crate) async fn save_job_handler(
    State(service): State<SharedService>,
    actor: Actor,
    Path(job_id): Path<String>,
) -> Result<Json<serde_json::Value>, BoardError> {
    service.save_job(&actor, &JobId(job_id))?;
    Ok(Json(
        json!({ "success": true, "message": "Job saved successfully." }),
    ))
}

pub(crate) async fn unsave_job_handler(
    State(service): State<SharedService>,
    actor: Actor,
    Path(job_id): Path<String>,
) -> Result<Json<serde_json::Value>, BoardError> {
    service.unsave_job(&actor, &JobId(job_id))?;
    Ok(Json(
        json!({ "success": true, "message": "Job removed from saved jobs." }),
    ))
}

pub(crate) async fn saved_jobs_handler(
    State(service): State<SharedService>,
    actor: Actor,
) -> Result<Json<serde_json::Value>, BoardError> {
    let jobs = service.saved_jobs(&actor)?;
    Ok(Json(json!({ "success": true, "savedJobs": jobs })))
}

pub(crate) async fn employer_jobs_handler(
    State(service): State<SharedService>,
    actor: Actor,
    Path(employer_id): Path<String>,
) -> Result<Json<serde_json::Value>, BoardError> {
    let jobs = service.employer_jobs(&actor, &UserId(employer_id))?;
    Ok(Json(json!({ "success": true, "myJobs": jobs })))
}
