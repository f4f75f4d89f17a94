use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::dto::{PaymentRequest, PaymentResponse, WebhookEvent};
use super::processor::{verify_webhook_signature, IntentRequest, PaymentProcessor, ProcessorError};
use crate::auth::Session;
use crate::db;
use crate::error::{ApiError, ApiJson};
use crate::orders::repo as orders;
use crate::state::AppState;

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/payments", post(create_payment_intent))
        .route("/payments/webhook", post(webhook))
}

/// Two-decimal money to integer minor units, rounding half away from zero.
fn to_minor_units(amount: Decimal) -> Option<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

#[instrument(skip(state, session, payload))]
async fn create_payment_intent(
    State(state): State<AppState>,
    session: Session,
    ApiJson(payload): ApiJson<PaymentRequest>,
) -> Result<Json<PaymentResponse>, ApiError> {
    if payload.amount <= Decimal::ZERO {
        return Err(ApiError::Validation("Amount must be positive".into()));
    }
    let amount_minor = to_minor_units(payload.amount)
        .ok_or_else(|| ApiError::Validation("Amount must be positive".into()))?;

    // Probe storage before touching the processor; a charge against an order
    // we cannot read back helps nobody.
    db::ensure_healthy(&state.db).await?;

    let order = db::with_retry(|| orders::find_owned(&state.db, session.user_id, payload.order_id))
        .await
        .map_err(|e| {
            if db::is_transient(&e) {
                ApiError::StorageUnavailable("Database connection error. Please try again.".into())
            } else {
                ApiError::Internal(e)
            }
        })?
        .ok_or_else(|| ApiError::NotFound("Order not found or unauthorized".into()))?;

    let intent = state
        .payments
        .create_intent(IntentRequest {
            amount_minor,
            currency: state.config.stripe.currency.clone(),
            order_id: order.id,
            user_id: session.user_id,
            description: format!("Payment for order {}", order.id),
        })
        .await
        .map_err(|e| match e {
            ProcessorError::Api { status, message } => {
                warn!(order_id = %order.id, status, %message, "processor rejected intent");
                ApiError::Upstream {
                    status: Some(status),
                    message,
                }
            }
            ProcessorError::Transport(err) => {
                ApiError::Internal(anyhow::Error::new(err).context("create payment intent"))
            }
        })?;

    info!(order_id = %order.id, user_id = %session.user_id, "payment intent created");
    Ok(Json(PaymentResponse {
        client_secret: intent.client_secret,
    }))
}

/// Processor-initiated reconciliation: the signed callback, not the client,
/// is the source of truth for marking an order paid.
#[instrument(skip(state, headers, body))]
async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let signature = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthenticated("Missing signature".into()))?;

    if !verify_webhook_signature(&body, signature, &state.config.stripe.webhook_secret) {
        warn!("webhook signature verification failed");
        return Err(ApiError::Unauthenticated("Invalid signature".into()));
    }

    let event: WebhookEvent = serde_json::from_slice(&body)
        .map_err(|_| ApiError::Validation("Invalid payload".into()))?;

    if event.kind != "payment_intent.succeeded" {
        // Acknowledged so the processor stops retrying; nothing to do.
        return Ok(StatusCode::OK);
    }

    let metadata = &event.data.object.metadata;
    let ids = metadata
        .get("order_id")
        .zip(metadata.get("user_id"))
        .and_then(|(o, u)| Some((o.parse::<Uuid>().ok()?, u.parse::<Uuid>().ok()?)));
    let Some((order_id, user_id)) = ids else {
        warn!(intent_id = %event.data.object.id, "succeeded intent without usable metadata");
        return Ok(StatusCode::OK);
    };

    let updated = orders::mark_paid(&state.db, user_id, order_id)
        .await
        .map_err(ApiError::Internal)?;
    if updated {
        info!(%order_id, intent_id = %event.data.object.id, "order reconciled as paid");
    } else {
        warn!(%order_id, intent_id = %event.data.object.id, "paid intent references unknown order");
    }
    Ok(StatusCode::OK)
}
