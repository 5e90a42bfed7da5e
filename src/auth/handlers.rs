use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use crate::auth::dto::{
    LoginRequest, LoginResponse, MeResponse, RegisterRequest, RegisterResponse,
    ResetConfirmRequest, ResetConfirmResponse, ResetRequest, ResetRequestResponse,
};
use crate::auth::extractors::CurrentUser;
use crate::auth::service;
use crate::error::ApiError;
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/register", post(register))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me))
        .route("/auth/password-reset/request", post(request_password_reset))
        .route("/auth/password-reset/confirm", post(confirm_password_reset))
}

#[instrument(skip(state, payload))]
async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let out = service::authenticate(&state, &payload.email, &payload.password).await?;
    Ok(Json(out))
}

#[instrument(skip(state, payload))]
async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let out =
        service::register(&state, &payload.username, &payload.email, &payload.password).await?;
    Ok(Json(out))
}

#[instrument]
async fn logout() -> ApiError {
    ApiError::NotImplemented("Logout endpoint is not implemented yet".into())
}

#[instrument(skip(current))]
async fn me(current: CurrentUser) -> Json<MeResponse> {
    Json(MeResponse {
        id: current.id,
        username: current.username,
    })
}

#[instrument(skip(state, payload))]
async fn request_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<ResetRequest>,
) -> Result<Json<ResetRequestResponse>, ApiError> {
    let out = service::request_password_reset(&state, &payload.email).await?;
    Ok(Json(out))
}

#[instrument(skip(state, payload))]
async fn confirm_password_reset(
    State(state): State<AppState>,
    Json(payload): Json<ResetConfirmRequest>,
) -> Result<Json<ResetConfirmResponse>, ApiError> {
    let out =
        service::confirm_password_reset(&state, &payload.token, &payload.new_password).await?;
    Ok(Json(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn me_response_serializes_snake_case() {
        let response = MeResponse {
            id: Uuid::new_v4(),
            username: "ada".to_string(),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"username\":\"ada\""));
        assert!(json.contains("\"id\""));
    }
}
