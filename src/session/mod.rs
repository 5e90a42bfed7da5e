use axum::{routing::post, Router};
use tracing::instrument;

use crate::error::ApiError;
use crate::state::AppState;

/// Gym-floor check-in/check-out. Routed so clients get an honest 501 instead
/// of a placeholder success.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/session/check-in", post(check_in))
        .route("/session/check-out", post(check_out))
}

#[instrument]
async fn check_in() -> ApiError {
    ApiError::NotImplemented("Check-in is not implemented yet".into())
}

#[instrument]
async fn check_out() -> ApiError {
    ApiError::NotImplemented("Check-out is not implemented yet".into())
}
