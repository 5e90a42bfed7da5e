use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod gateway;
pub mod handlers;
pub mod ledger;
pub mod service;

pub fn router() -> Router<AppState> {
    handlers::billing_routes()
}
