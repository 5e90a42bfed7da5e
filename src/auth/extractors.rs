use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use crate::auth::tokens::JwtKeys;
use crate::error::ApiError;

/// Identity taken from a verified session token. Handlers that accept this
/// parameter are only reachable with a live bearer credential. Verification
/// never consults the store, so a deleted user keeps access until the token
/// expires.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);

        let header = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Authorization token is missing".into()))?;
        let token = header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::Unauthorized("Authorization token is missing".into()))?;

        let claims = match keys.verify_session(token) {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "session token rejected");
                return Err(ApiError::Unauthorized("Invalid token".into()));
            }
        };

        Ok(CurrentUser {
            id: claims.sub,
            username: claims.username.unwrap_or_default(),
        })
    }
}
