use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use tracing::warn;
use uuid::Uuid;

use super::jwt::JwtKeys;
use super::repo::{Role, User};
use crate::error::ApiError;
use crate::state::AppState;

/// Verified session: token checked, then the user re-fetched from storage.
/// A token whose user no longer exists is rejected, never trusted.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    pub user_id: Uuid,
    pub role: Role,
}

/// Token from the `token` cookie, falling back to `Authorization: Bearer`.
pub(crate) fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(cookies) = headers.get(header::COOKIE).and_then(|v| v.to_str().ok()) {
        for pair in cookies.split(';') {
            if let Some((name, value)) = pair.trim().split_once('=') {
                if name == "token" && !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(|t| t.to_string())
}

#[async_trait]
impl FromRequestParts<AppState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = token_from_headers(&parts.headers)
            .ok_or_else(|| ApiError::Unauthenticated("Unauthorized".into()))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(&token).map_err(|_| {
            warn!("invalid or expired token");
            ApiError::Unauthenticated("Unauthorized".into())
        })?;

        // Role comes from the user row, not the token.
        let user = User::find_by_id(&state.db, claims.sub)
            .await
            .map_err(ApiError::Internal)?
            .ok_or_else(|| {
                warn!(user_id = %claims.sub, "token references a missing user");
                ApiError::Unauthenticated("Unauthorized".into())
            })?;

        Ok(Session {
            user_id: user.id,
            role: user.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(name: header::HeaderName, value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn reads_token_cookie() {
        let headers = headers_with(header::COOKIE, "token=abc.def.ghi");
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc.def.ghi"));
    }

    #[test]
    fn finds_token_among_other_cookies() {
        let headers = headers_with(header::COOKIE, "theme=dark; token=abc; locale=en");
        assert_eq!(token_from_headers(&headers).as_deref(), Some("abc"));
    }

    #[test]
    fn falls_back_to_bearer_header() {
        let headers = headers_with(header::AUTHORIZATION, "Bearer xyz");
        assert_eq!(token_from_headers(&headers).as_deref(), Some("xyz"));
    }

    #[test]
    fn cookie_wins_over_bearer() {
        let mut headers = headers_with(header::COOKIE, "token=from-cookie");
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_static("Bearer from-header"),
        );
        assert_eq!(token_from_headers(&headers).as_deref(), Some("from-cookie"));
    }

    #[test]
    fn empty_or_absent_token_is_none() {
        assert_eq!(token_from_headers(&HeaderMap::new()), None);
        let headers = headers_with(header::COOKIE, "token=");
        assert_eq!(token_from_headers(&headers), None);
        let headers = headers_with(header::AUTHORIZATION, "Basic abc");
        assert_eq!(token_from_headers(&headers), None);
    }
}
