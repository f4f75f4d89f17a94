use axum::{
    extract::{FromRef, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use super::dto::{AuthAction, AuthRequest, AuthResponse, WhoAmIResponse};
use super::extractors::Session;
use super::jwt::JwtKeys;
use super::password::{hash_password, verify_password};
use super::repo::User;
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth", post(authenticate))
        .route("/auth/whoami", get(whoami))
}

fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Session cookie set on both sign-up and sign-in; lifetime matches the token.
fn session_cookie(token: &str, max_age_secs: u64) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(&format!(
        "token={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={max_age_secs}"
    ))
    .map_err(|e| ApiError::Internal(anyhow::Error::new(e)))
}

fn auth_reply(
    status: StatusCode,
    keys: &JwtKeys,
    user: User,
    token: String,
) -> Result<Response, ApiError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        session_cookie(&token, keys.ttl.as_secs())?,
    );
    Ok((
        status,
        headers,
        Json(AuthResponse {
            user: user.into(),
            token,
        }),
    )
        .into_response())
}

#[instrument(skip(state, payload))]
async fn authenticate(
    State(state): State<AppState>,
    ApiJson(mut payload): ApiJson<AuthRequest>,
) -> Result<Response, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::Validation("Invalid email".into()));
    }
    if payload.password.len() < 6 {
        warn!("password too short");
        return Err(ApiError::Validation("Password too short".into()));
    }

    let keys = JwtKeys::from_ref(&state);
    match payload.action {
        AuthAction::Signup => {
            let name = payload.name.as_deref().map(str::trim).unwrap_or_default();
            if name.is_empty() {
                return Err(ApiError::Validation("Name is required".into()));
            }

            if User::find_by_email(&state.db, &payload.email)
                .await
                .map_err(ApiError::Internal)?
                .is_some()
            {
                warn!(email = %payload.email, "email already registered");
                return Err(ApiError::Validation("User already exists".into()));
            }

            let hash = hash_password(&payload.password).map_err(ApiError::Internal)?;
            let user = User::create(&state.db, &payload.email, name, &hash)
                .await
                .map_err(ApiError::Internal)?;
            let token = keys.sign(user.id).map_err(ApiError::Internal)?;

            info!(user_id = %user.id, email = %user.email, "user registered");
            auth_reply(StatusCode::CREATED, &keys, user, token)
        }
        AuthAction::Signin => {
            let user = User::find_by_email(&state.db, &payload.email)
                .await
                .map_err(ApiError::Internal)?
                .ok_or_else(|| {
                    warn!(email = %payload.email, "signin unknown email");
                    ApiError::Validation("Invalid credentials".into())
                })?;

            let ok = verify_password(&payload.password, &user.password_hash)
                .map_err(ApiError::Internal)?;
            if !ok {
                warn!(user_id = %user.id, "signin invalid password");
                return Err(ApiError::Validation("Invalid credentials".into()));
            }

            let token = keys.sign(user.id).map_err(ApiError::Internal)?;
            info!(user_id = %user.id, email = %user.email, "user signed in");
            auth_reply(StatusCode::OK, &keys, user, token)
        }
    }
}

#[instrument(skip(session))]
async fn whoami(session: Session) -> Json<WhoAmIResponse> {
    Json(WhoAmIResponse { role: session.role })
}
