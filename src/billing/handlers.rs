use axum::{extract::State, routing::post, Json, Router};
use tracing::instrument;

use crate::auth::extractors::CurrentUser;
use crate::billing::dto::{PurchaseRequest, PurchaseResponse};
use crate::billing::service;
use crate::error::ApiError;
use crate::state::AppState;

pub fn billing_routes() -> Router<AppState> {
    Router::new().route("/billing/purchase-membership", post(purchase_membership))
}

#[instrument(skip(state, current, payload), fields(user_id = %current.id))]
async fn purchase_membership(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(payload): Json<PurchaseRequest>,
) -> Result<Json<PurchaseResponse>, ApiError> {
    let out = service::purchase_membership(&state, current.id, payload.payment_details).await?;
    Ok(Json(out))
}
