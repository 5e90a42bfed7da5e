use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for login.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Returned after a successful login.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
}

/// Request body for user registration.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub name: String,
}

/// Request body for a password-reset request.
#[derive(Debug, Deserialize)]
pub struct ResetRequest {
    pub email: String,
}

/// Mail delivery is out of scope, so the reset token goes straight back to
/// the caller.
#[derive(Debug, Serialize)]
pub struct ResetRequestResponse {
    pub reset_token: String,
}

/// Request body for confirming a password reset.
#[derive(Debug, Deserialize)]
pub struct ResetConfirmRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct ResetConfirmResponse {
    pub success: bool,
}

/// Identity of the bearer, answered from the verified claims alone.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub id: Uuid,
    pub username: String,
}
