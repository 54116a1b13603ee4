use chrono::{DateTime, Utc};
use job_board::board::{
    BoardStores, MemoryDocumentStore, Notification, Notifier, NotifyError, SqliteDocumentStore,
    SweepScheduler,
};
use job_board::config::StorageConfig;
use job_board::error::AppError;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) scheduler: Option<Arc<SweepScheduler>>,
}

/// Notification sink that writes to the log until a mail relay is wired in.
#[derive(Debug, Default, Clone)]
pub(crate) struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        info!(
            recipient = %notification.recipient,
            subject = %notification.subject,
            "notification queued"
        );
        Ok(())
    }
}

/// SQLite when a path is configured, otherwise process memory.
pub(crate) fn open_stores(config: &StorageConfig) -> Result<BoardStores, AppError> {
    match &config.database_path {
        Some(path) => {
            let store = SqliteDocumentStore::open(path)?;
            info!(path = %path.display(), "using sqlite document store");
            Ok(BoardStores::from_backend(Arc::new(store)))
        }
        None => {
            info!("using in-memory document store");
            Ok(BoardStores::from_backend(Arc::new(MemoryDocumentStore::new())))
        }
    }
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as an RFC 3339 timestamp ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_timestamp_normalizes_offsets() {
        let parsed = parse_timestamp("2025-06-01T05:00:00+05:00").expect("parses");
        assert_eq!(parsed.to_rfc3339(), "2025-06-01T00:00:00+00:00");
    }

    #[test]
    fn missing_database_path_selects_memory_store() {
        let stores = open_stores(&StorageConfig::default()).expect("memory store opens");
        assert!(stores
            .jobs
            .list(&job_board::board::JobQuery::default())
            .expect("list succeeds")
            .is_empty());
    }
}
