use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{CreateOrderRequest, SetStatusRequest};
use super::repo::{self, OrderStatus, OrderWithItems};
use crate::auth::Session;
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

pub fn order_routes() -> Router<AppState> {
    Router::new().route(
        "/orders",
        get(list_orders).post(create_order).patch(set_order_status),
    )
}

#[instrument(skip(state, session))]
async fn list_orders(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<OrderWithItems>>, ApiError> {
    let orders = repo::list_by_user(&state.db, session.user_id)
        .await
        .map_err(ApiError::Internal)?;
    Ok(Json(orders))
}

#[instrument(skip(state, session, payload))]
async fn create_order(
    State(state): State<AppState>,
    session: Session,
    ApiJson(payload): ApiJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderWithItems>), ApiError> {
    let address = payload.address.trim();
    if address.is_empty() {
        return Err(ApiError::Validation("Address is required".into()));
    }
    if payload.items.iter().any(|item| item.quantity < 1) {
        return Err(ApiError::Validation("Quantity must be at least 1".into()));
    }

    let items: Vec<(uuid::Uuid, i32)> = payload
        .items
        .iter()
        .map(|item| (item.product_id, item.quantity))
        .collect();

    let order = repo::create(&state.db, session.user_id, address, &items)
        .await
        .map_err(ApiError::Internal)?;

    info!(
        user_id = %session.user_id,
        order_id = %order.order.id,
        items = order.items.len(),
        "order created"
    );
    Ok((StatusCode::CREATED, Json(order)))
}

#[instrument(skip(state, session, payload))]
async fn set_order_status(
    State(state): State<AppState>,
    session: Session,
    ApiJson(payload): ApiJson<SetStatusRequest>,
) -> Result<Json<OrderWithItems>, ApiError> {
    let status: OrderStatus = payload
        .status
        .parse()
        .map_err(|_| ApiError::Validation("Invalid status".into()))?;

    let order = repo::set_status(&state.db, session.user_id, payload.order_id, status)
        .await
        .map_err(ApiError::Internal)?
        .ok_or_else(|| ApiError::NotFound("Order not found or unauthorized".into()))?;

    info!(
        user_id = %session.user_id,
        order_id = %payload.order_id,
        status = %status,
        "order status updated"
    );
    Ok(Json(order))
}
