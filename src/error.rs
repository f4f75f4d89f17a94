use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Application-level error, mapped to a JSON `{"error": ...}` response.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed or out-of-range input, rejected before any mutation.
    #[error("{0}")]
    Validation(String),

    /// Missing, invalid or stale session.
    #[error("{0}")]
    Unauthenticated(String),

    /// Absent entity; owner-scoped misses report the same way.
    #[error("{0}")]
    NotFound(String),

    /// Storage health probe failed after the bounded retry.
    #[error("{0}")]
    StorageUnavailable(String),

    /// Payment processor failure, relayed with the processor's status.
    #[error("{message}")]
    Upstream { status: Option<u16>, message: String },

    /// Anything else. Full chain is logged, the client gets a generic message.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(m) => (StatusCode::BAD_REQUEST, m.clone()),
            Self::Unauthenticated(m) => (StatusCode::UNAUTHORIZED, m.clone()),
            Self::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            Self::StorageUnavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
            Self::Upstream { status, message } => (
                status
                    .and_then(|s| StatusCode::from_u16(s).ok())
                    .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                message.clone(),
            ),
            Self::Internal(e) => {
                let chain = format!("{e:#}");
                error!(error = %chain, "unhandled error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// `Json<T>` that rejects malformed bodies with a 400 `{"error": ...}` instead
/// of axum's default rejection.
pub struct ApiJson<T>(pub T);

#[axum::async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::Validation(rejection.body_text())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn statuses_map_per_taxonomy() {
        assert_eq!(
            ApiError::Validation("bad".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthenticated("no".into())
                .into_response()
                .status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::NotFound("gone".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::StorageUnavailable("down".into())
                .into_response()
                .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn upstream_relays_processor_status() {
        let resp = ApiError::Upstream {
            status: Some(402),
            message: "Your card was declined.".into(),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::PAYMENT_REQUIRED);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "Your card was declined.");
    }

    #[tokio::test]
    async fn upstream_without_status_is_500() {
        let resp = ApiError::Upstream {
            status: None,
            message: "boom".into(),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn internal_hides_detail() {
        let resp = ApiError::Internal(anyhow::anyhow!("secret database detail")).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(resp).await;
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn not_found_bodies_share_one_shape() {
        // Owner-scoped misses and truly missing rows must be indistinguishable.
        let a = body_json(
            ApiError::NotFound("Order not found or unauthorized".into()).into_response(),
        )
        .await;
        let b = body_json(
            ApiError::NotFound("Order not found or unauthorized".into()).into_response(),
        )
        .await;
        assert_eq!(a, b);
    }
}
