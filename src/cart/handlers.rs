use axum::{
    extract::State,
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::{info, instrument};

use super::dto::{AddToCartRequest, CartLineResponse, MessageResponse};
use super::repo::Cart;
use crate::auth::Session;
use crate::error::{ApiError, ApiJson};
use crate::products::repo::Product;
use crate::state::AppState;

pub fn cart_routes() -> Router<AppState> {
    Router::new().route("/cart", get(read_cart).post(add_to_cart))
}

#[instrument(skip(state, session))]
async fn read_cart(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<Vec<CartLineResponse>>, ApiError> {
    let lines = Cart::lines_for_user(&state.db, session.user_id)
        .await
        .map_err(ApiError::Internal)?;
    Ok(Json(lines.into_iter().map(CartLineResponse::from).collect()))
}

#[instrument(skip(state, session, payload))]
async fn add_to_cart(
    State(state): State<AppState>,
    session: Session,
    ApiJson(payload): ApiJson<AddToCartRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    if payload.quantity < 1 {
        return Err(ApiError::Validation("Quantity must be at least 1".into()));
    }

    // Never create a line item for an unknown product.
    Product::find_by_id(&state.db, payload.product_id)
        .await
        .map_err(ApiError::Internal)?
        .ok_or_else(|| ApiError::NotFound("Product not found".into()))?;

    let cart = Cart::find_or_create(&state.db, session.user_id)
        .await
        .map_err(ApiError::Internal)?;
    Cart::add_item(&state.db, cart.id, payload.product_id, payload.quantity)
        .await
        .map_err(ApiError::Internal)?;

    info!(
        user_id = %session.user_id,
        product_id = %payload.product_id,
        quantity = payload.quantity,
        "cart item added"
    );
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Item added to cart",
        }),
    ))
}
