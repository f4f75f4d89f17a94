use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;
pub mod processor;

pub fn router() -> Router<AppState> {
    handlers::payment_routes()
}
