use crate::cli::{ServeArgs, SweepArgs};
use crate::infra::{open_stores, AppState, LoggingNotifier};
use crate::routes::with_board_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use job_board::board::{JobBoardService, SweepScheduler};
use job_board::config::AppConfig;
use job_board::error::AppError;
use job_board::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let stores = open_stores(&config.storage)?;
    let service = Arc::new(JobBoardService::new(stores, Arc::new(LoggingNotifier)));

    let scheduler = Arc::new(
        SweepScheduler::new(service.clone(), config.sweep.interval)
            .run_on_startup(config.sweep.on_startup),
    );
    let sweep_task = scheduler.start();

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        scheduler: Some(scheduler.clone()),
    };

    let app = with_board_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        sweep_interval_secs = config.sweep.interval.as_secs(),
        "job board service ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    readiness_flag.store(false, Ordering::Release);
    scheduler.stop();
    if let Err(err) = sweep_task.await {
        warn!(error = %err, "sweep scheduler did not shut down cleanly");
    }
    Ok(())
}

/// One-shot sweep against the configured store, for cron-style deployments.
pub(crate) async fn run_sweep(args: SweepArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let stores = open_stores(&config.storage)?;
    let service = JobBoardService::new(stores, Arc::new(LoggingNotifier));
    let now = args.now.unwrap_or_else(Utc::now);

    let report = service.sweep_expired_jobs(now)?;
    let released = service.release_pending()?;

    println!(
        "Swept at {}: removed {} job(s), {} application(s), {} interview(s), {} saved job(s); released {} pending application(s).",
        report.swept_at.to_rfc3339(),
        report.removed_count(),
        report.applications_removed,
        report.interviews_removed,
        report.saved_removed,
        released
    );
    for failure in &report.failures {
        println!(
            "  failed: job {} at {:?} stage ({})",
            failure.job_id, failure.stage, failure.reason
        );
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
