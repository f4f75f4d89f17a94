use std::future::Future;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;
use sqlx::PgPool;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tracing::{instrument, warn};

use crate::error::ApiError;
use crate::state::AppState;

const RETRY_BACKOFF: Duration = Duration::from_secs(1);

pub async fn ping(db: &PgPool) -> sqlx::Result<()> {
    sqlx::query("SELECT 1").execute(db).await.map(|_| ())
}

/// The one error class the original deployment saw recover after a short wait.
pub fn is_transient(err: &anyhow::Error) -> bool {
    format!("{err:#}").contains("prepared statement")
}

/// Runs `op`, retrying exactly once after a fixed backoff when the failure is
/// transient. Everything else surfaces immediately.
pub async fn with_retry<T, F, Fut>(op: F) -> anyhow::Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    match op().await {
        Err(e) if is_transient(&e) => {
            warn!(error = %e, "transient storage failure, retrying once");
            tokio::time::sleep(RETRY_BACKOFF).await;
            op().await
        }
        other => other,
    }
}

/// Health probe run before sensitive operations. One bounded retry, then 503.
pub async fn ensure_healthy(db: &PgPool) -> Result<(), ApiError> {
    if ping(db).await.is_ok() {
        return Ok(());
    }
    tokio::time::sleep(RETRY_BACKOFF).await;
    ping(db).await.map(|_| ()).map_err(|e| {
        warn!(error = %e, "database health probe failed");
        ApiError::StorageUnavailable("Database connection error. Please try again.".into())
    })
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    timestamp: String,
}

pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health/db", get(db_health))
}

#[instrument(skip(state))]
async fn db_health(State(state): State<AppState>) -> impl IntoResponse {
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    match ping(&state.db).await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "healthy",
                database: "connected",
                timestamp,
            }),
        ),
        Err(e) => {
            warn!(error = %e, "db health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy",
                    database: "disconnected",
                    timestamp,
                }),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn transient_detection_matches_prepared_statement_errors() {
        let transient = anyhow::anyhow!("prepared statement \"s1\" already exists");
        assert!(is_transient(&transient));

        let wrapped = transient.context("fetch order");
        assert!(is_transient(&wrapped));

        let other = anyhow::anyhow!("connection refused");
        assert!(!is_transient(&other));
    }

    #[tokio::test]
    async fn retries_transient_failure_once() {
        let calls = AtomicUsize::new(0);
        let result: anyhow::Result<u32> = with_retry(|| async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(anyhow::anyhow!("prepared statement conflict"))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_second_transient_failure() {
        let calls = AtomicUsize::new(0);
        let result: anyhow::Result<u32> = with_retry(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!("prepared statement conflict"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_other_failures() {
        let calls = AtomicUsize::new(0);
        let result: anyhow::Result<u32> = with_retry(|| async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!("syntax error at or near"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
