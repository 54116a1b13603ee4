use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use job_board::board::{board_router, Actor, JobBoardService, Role};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_board_routes(service: Arc<JobBoardService>) -> axum::Router {
    board_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/sweep/trigger",
            axum::routing::post(trigger_sweep_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Wakes the background scheduler; the pass itself runs asynchronously.
pub(crate) async fn trigger_sweep_endpoint(
    Extension(state): Extension<AppState>,
    actor: Actor,
) -> impl IntoResponse {
    if actor.role != Role::Admin {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({
                "success": false,
                "error": "only administrators can trigger the expiry sweep",
            })),
        );
    }
    match state.scheduler {
        Some(scheduler) => {
            scheduler.trigger();
            (
                StatusCode::ACCEPTED,
                Json(json!({ "success": true, "message": "Expiry sweep scheduled." })),
            )
        }
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "success": false,
                "error": "sweep scheduler is not running",
            })),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::LoggingNotifier;
    use axum::body::Body;
    use axum::http::Request;
    use job_board::board::{BoardStores, MemoryDocumentStore, HEADER_USER_ID, HEADER_USER_ROLE};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn state(ready: bool) -> AppState {
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
            scheduler: None,
        }
    }

    fn service() -> Arc<JobBoardService> {
        let stores = BoardStores::from_backend(Arc::new(MemoryDocumentStore::new()));
        Arc::new(JobBoardService::new(stores, Arc::new(LoggingNotifier)))
    }

    #[tokio::test]
    async fn readiness_reports_initializing_until_bound() {
        let response = readiness_endpoint(Extension(state(false)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let response = readiness_endpoint(Extension(state(true)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn operational_routes_sit_next_to_board_routes() {
        let app = with_board_routes(service()).layer(Extension(state(true)));

        let response = app
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::get("/api/v1/job/getall")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn trigger_requires_admin_and_a_running_scheduler() {
        let app = with_board_routes(service()).layer(Extension(state(true)));
        let trigger = |role: &str| {
            Request::post("/api/v1/sweep/trigger")
                .header(HEADER_USER_ID, "user-1")
                .header(HEADER_USER_ROLE, role)
                .body(Body::empty())
                .unwrap()
        };

        let response = app.clone().oneshot(trigger("Employer")).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app.oneshot(trigger("Admin")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
