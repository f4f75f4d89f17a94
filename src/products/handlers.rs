use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use url::Url;

use super::dto::{CreateProductRequest, ProductQuery};
use super::repo::Product;
use crate::auth::{Role, Session};
use crate::error::{ApiError, ApiJson};
use crate::state::AppState;

pub fn product_routes() -> Router<AppState> {
    Router::new().route("/products", get(list_or_get).post(create_product))
}

#[instrument(skip(state))]
async fn list_or_get(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> Result<Response, ApiError> {
    match query.id {
        Some(raw) => {
            let id = raw
                .parse::<uuid::Uuid>()
                .map_err(|_| ApiError::NotFound("Product not found".into()))?;
            let product = Product::find_by_id(&state.db, id)
                .await
                .map_err(ApiError::Internal)?
                .ok_or_else(|| ApiError::NotFound("Product not found".into()))?;
            Ok(Json(product).into_response())
        }
        None => {
            let products = Product::find_all(&state.db)
                .await
                .map_err(ApiError::Internal)?;
            Ok(Json(products).into_response())
        }
    }
}

#[instrument(skip(state, session, payload))]
async fn create_product(
    State(state): State<AppState>,
    session: Session,
    ApiJson(payload): ApiJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), ApiError> {
    if session.role != Role::Admin {
        warn!(user_id = %session.user_id, "non-admin product creation attempt");
        return Err(ApiError::Unauthenticated("Unauthorized".into()));
    }

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Name is required".into()));
    }
    if payload.price <= Decimal::ZERO {
        return Err(ApiError::Validation("Price must be positive".into()));
    }
    if let Some(image) = payload.image.as_deref() {
        if Url::parse(image).is_err() {
            return Err(ApiError::Validation("Image must be a valid URL".into()));
        }
    }

    let product = Product::create(
        &state.db,
        name,
        payload.price,
        payload.description.as_deref(),
        payload.image.as_deref(),
    )
    .await
    .map_err(ApiError::Internal)?;

    info!(product_id = %product.id, name = %product.name, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}
