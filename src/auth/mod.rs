use crate::state::AppState;
use axum::Router;

pub mod dto;
pub(crate) mod extractors;
pub mod handlers;
pub mod password;
pub mod service;
pub mod tokens;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
