use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
///
/// The session and reset tokens live in separate slots so that requesting a
/// password reset does not invalidate an active session.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String, // Argon2 hash, never exposed in JSON
    #[serde(skip_serializing, default)]
    pub session_token: Option<String>,
    #[serde(skip_serializing, default)]
    pub reset_token: Option<String>,
    pub is_member: bool,
    pub created_at: OffsetDateTime,
}

/// Fields for creating a user. The password has already been hashed by the
/// time the store sees it.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}
