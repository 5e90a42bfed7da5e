use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::dto::{
    LoginResponse, RegisterResponse, ResetConfirmResponse, ResetRequestResponse,
};
use crate::auth::password;
use crate::auth::tokens::{JwtKeys, TokenError};
use crate::error::{ApiError, StoreError};
use crate::state::AppState;
use crate::users::model::NewUser;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Email and password are required")]
    MissingCredentials,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    Validation(String),
    #[error("{field} already taken")]
    Taken { field: &'static str },
    #[error("User not found")]
    UnknownEmail,
    #[error("User not found")]
    UnknownUser,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials | AuthError::Validation(_) => {
                ApiError::Validation(err.to_string())
            }
            AuthError::InvalidCredentials | AuthError::UnknownEmail => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::Taken { .. } => ApiError::Conflict(err.to_string()),
            AuthError::UnknownUser => ApiError::NotFound(err.to_string()),
            AuthError::Token(TokenError::Expired) => ApiError::Unauthorized("Token expired".into()),
            AuthError::Token(TokenError::Invalid) => ApiError::Unauthorized("Invalid token".into()),
            AuthError::Store(e) => ApiError::Store(e),
            AuthError::Internal(e) => ApiError::Internal(e),
        }
    }
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Check credentials, mint a session token and persist it in the user's
/// session slot. Unknown email and wrong password collapse into the same
/// error so the response never reveals which check failed.
pub async fn authenticate(
    state: &AppState,
    email: &str,
    password_plain: &str,
) -> Result<LoginResponse, AuthError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || password_plain.is_empty() {
        warn!("login with missing credentials");
        return Err(AuthError::MissingCredentials);
    }

    let user = match state.users.find_by_email(&email).await? {
        Some(u) => u,
        None => {
            warn!(email = %email, "login unknown email");
            return Err(AuthError::InvalidCredentials);
        }
    };

    if !password::verify_password(password_plain, &user.password_hash)? {
        warn!(user_id = %user.id, "login invalid password");
        return Err(AuthError::InvalidCredentials);
    }

    let keys = JwtKeys::from_ref(state);
    let token = keys.sign_session(&user)?;
    state.users.update_session_token(user.id, &token).await?;

    info!(user_id = %user.id, "user logged in");
    Ok(LoginResponse {
        token,
        user_id: user.id,
        name: user.username,
        email: user.email,
    })
}

pub async fn register(
    state: &AppState,
    username: &str,
    email: &str,
    password_plain: &str,
) -> Result<RegisterResponse, AuthError> {
    let username = username.trim();
    let email = email.trim().to_lowercase();

    if username.is_empty() {
        return Err(AuthError::Validation("Username is required".into()));
    }
    if !is_valid_email(&email) {
        warn!(email = %email, "register invalid email");
        return Err(AuthError::Validation("Invalid email".into()));
    }
    if !password::meets_policy(password_plain) {
        warn!("register password too short");
        return Err(AuthError::Validation("Password too short".into()));
    }

    if state.users.find_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AuthError::Taken { field: "email" });
    }
    if state.users.find_by_username(username).await?.is_some() {
        warn!(username = %username, "username already registered");
        return Err(AuthError::Taken { field: "username" });
    }

    // The store only ever sees the hash.
    let password_hash = password::hash_password(password_plain)?;
    let created = state
        .users
        .create(NewUser {
            username: username.to_string(),
            email,
            password_hash,
        })
        .await;
    let user = match created {
        Ok(u) => u,
        // A concurrent register can still trip the unique constraint between
        // the pre-check and the insert.
        Err(StoreError::Duplicate { field }) => {
            warn!(field, "register lost uniqueness race");
            return Err(AuthError::Taken { field });
        }
        Err(e) => return Err(e.into()),
    };

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(RegisterResponse {
        user_id: user.id,
        name: user.username,
    })
}

/// Mint a one-hour reset token and persist it in the user's reset slot.
/// The session slot stays untouched, so requesting a reset does not log the
/// user out. Delivery is the caller's problem; the token is returned.
pub async fn request_password_reset(
    state: &AppState,
    email: &str,
) -> Result<ResetRequestResponse, AuthError> {
    let email = email.trim().to_lowercase();
    let user = state
        .users
        .find_by_email(&email)
        .await?
        .ok_or(AuthError::UnknownEmail)?;

    let keys = JwtKeys::from_ref(state);
    let token = keys.sign_reset(&user)?;
    state.users.update_reset_token(user.id, &token).await?;

    // Log issuance, never the token itself.
    info!(user_id = %user.id, "password reset requested");
    Ok(ResetRequestResponse { reset_token: token })
}

pub async fn confirm_password_reset(
    state: &AppState,
    token: &str,
    new_password: &str,
) -> Result<ResetConfirmResponse, AuthError> {
    let keys = JwtKeys::from_ref(state);
    let claims = keys.verify_reset(token)?;

    if !password::meets_policy(new_password) {
        return Err(AuthError::Validation("Password too short".into()));
    }

    let user = state
        .users
        .find_by_email(&claims.email)
        .await?
        .ok_or(AuthError::UnknownUser)?;
    if user.id != claims.sub {
        warn!(user_id = %user.id, sub = %claims.sub, "reset token subject mismatch");
        return Err(AuthError::Token(TokenError::Invalid));
    }
    // Single use: the presented token must still be the one on record, and
    // the guarded write below re-checks that while spending it, so two
    // concurrent confirms cannot both succeed with the same token.
    if user.reset_token.as_deref() != Some(token) {
        warn!(user_id = %user.id, "reset token no longer on record");
        return Err(AuthError::Token(TokenError::Invalid));
    }

    let password_hash = password::hash_password(new_password)?;
    match state.users.update_password(user.id, &password_hash, token).await {
        Ok(_) => {}
        Err(StoreError::RowNotFound) => {
            warn!(user_id = %user.id, "reset token spent concurrently");
            return Err(AuthError::Token(TokenError::Invalid));
        }
        Err(e) => return Err(e.into()),
    }

    info!(user_id = %user.id, "password reset confirmed");
    Ok(ResetConfirmResponse { success: true })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::tokens::TokenKind;
    use crate::testing::{test_state, user_fixture, MemoryUserStore};
    use std::sync::Arc;

    #[tokio::test]
    async fn authenticate_rejects_missing_credentials_before_store() {
        let users = Arc::new(MemoryUserStore::default());
        let harness = test_state(users.clone());

        let err = authenticate(&harness.state, "", "whatever").await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredentials));
        let err = authenticate(&harness.state, "a@b.io", "").await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredentials));
        let err = authenticate(&harness.state, "   ", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredentials));

        assert!(users.calls().is_empty(), "store must not be touched");
    }

    #[tokio::test]
    async fn authenticate_collapses_unknown_email_and_wrong_password() {
        let users = Arc::new(MemoryUserStore::default());
        users.seed(user_fixture("ada", "ada@example.com", "hunter2hunter2"));
        let harness = test_state(users);

        let unknown = authenticate(&harness.state, "ghost@example.com", "hunter2hunter2")
            .await
            .unwrap_err();
        let wrong = authenticate(&harness.state, "ada@example.com", "not-the-password")
            .await
            .unwrap_err();

        assert!(matches!(unknown, AuthError::InvalidCredentials));
        assert!(matches!(wrong, AuthError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn authenticate_persists_session_token_only() {
        let users = Arc::new(MemoryUserStore::default());
        let seeded = user_fixture("ada", "ada@example.com", "hunter2hunter2");
        users.seed(seeded.clone());
        let harness = test_state(users.clone());

        let out = authenticate(&harness.state, "Ada@Example.com ", "hunter2hunter2")
            .await
            .expect("login succeeds");
        assert_eq!(out.user_id, seeded.id);
        assert_eq!(out.name, "ada");
        assert_eq!(out.email, "ada@example.com");

        let keys = JwtKeys::from_ref(&harness.state);
        let claims = keys.verify_session(&out.token).expect("session token");
        assert_eq!(claims.sub, seeded.id);

        let stored = users.get(seeded.id).expect("user still there");
        assert_eq!(stored.session_token.as_deref(), Some(out.token.as_str()));
        assert_eq!(stored.reset_token, None);
    }

    #[tokio::test]
    async fn register_validates_input() {
        let harness = test_state(Arc::new(MemoryUserStore::default()));

        let err = register(&harness.state, "  ", "a@b.io", "long-enough")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));

        let err = register(&harness.state, "ada", "not-an-email", "long-enough")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));

        let err = register(&harness.state, "ada", "a@b.io", "short")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }

    #[tokio::test]
    async fn register_rejects_taken_email_and_username() {
        let users = Arc::new(MemoryUserStore::default());
        users.seed(user_fixture("ada", "ada@example.com", "hunter2hunter2"));
        let harness = test_state(users);

        let err = register(&harness.state, "other", "ada@example.com", "long-enough")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Taken { field: "email" }));

        let err = register(&harness.state, "ada", "new@example.com", "long-enough")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Taken { field: "username" }));
    }

    #[tokio::test]
    async fn register_stores_a_hash_not_the_password() {
        let users = Arc::new(MemoryUserStore::default());
        let harness = test_state(users.clone());

        let out = register(&harness.state, "ada", "ada@example.com", "hunter2hunter2")
            .await
            .expect("register succeeds");
        assert_eq!(out.name, "ada");

        let stored = users.get(out.user_id).expect("created");
        assert_ne!(stored.password_hash, "hunter2hunter2");
        assert!(password::verify_password("hunter2hunter2", &stored.password_hash).unwrap());
    }

    #[tokio::test]
    async fn register_surfaces_a_lost_uniqueness_race_as_taken() {
        let users = Arc::new(MemoryUserStore::default());
        // Pre-checks see nothing, the insert itself then collides.
        users.force_duplicate_on_create("email");
        let harness = test_state(users);

        let err = register(&harness.state, "ada", "ada@example.com", "long-enough")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Taken { field: "email" }));
    }

    #[tokio::test]
    async fn reset_request_refuses_unknown_email_as_unauthorized() {
        let harness = test_state(Arc::new(MemoryUserStore::default()));
        let err = request_password_reset(&harness.state, "ghost@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::UnknownEmail));
        let api: ApiError = err.into();
        assert!(matches!(api, ApiError::Unauthorized(msg) if msg == "User not found"));
    }

    #[tokio::test]
    async fn reset_request_leaves_the_session_slot_alone() {
        let users = Arc::new(MemoryUserStore::default());
        let mut seeded = user_fixture("ada", "ada@example.com", "hunter2hunter2");
        seeded.session_token = Some("live-session".into());
        users.seed(seeded.clone());
        let harness = test_state(users.clone());

        let out = request_password_reset(&harness.state, "ada@example.com")
            .await
            .expect("reset request succeeds");

        let keys = JwtKeys::from_ref(&harness.state);
        assert!(keys.verify_reset(&out.reset_token).is_ok());

        let stored = users.get(seeded.id).expect("user still there");
        assert_eq!(stored.reset_token.as_deref(), Some(out.reset_token.as_str()));
        assert_eq!(stored.session_token.as_deref(), Some("live-session"));
    }

    #[tokio::test]
    async fn reset_confirm_works_exactly_once() {
        let users = Arc::new(MemoryUserStore::default());
        let seeded = user_fixture("ada", "ada@example.com", "old-password-1");
        users.seed(seeded.clone());
        let harness = test_state(users.clone());

        let token = request_password_reset(&harness.state, "ada@example.com")
            .await
            .expect("reset request")
            .reset_token;

        let out = confirm_password_reset(&harness.state, &token, "new-password-9")
            .await
            .expect("first confirm succeeds");
        assert!(out.success);

        let stored = users.get(seeded.id).expect("user still there");
        assert!(password::verify_password("new-password-9", &stored.password_hash).unwrap());
        assert!(!password::verify_password("old-password-1", &stored.password_hash).unwrap());
        assert_eq!(stored.reset_token, None, "slot cleared on confirm");

        let err = confirm_password_reset(&harness.state, &token, "another-pass-3")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Token(TokenError::Invalid)));
    }

    #[tokio::test]
    async fn reset_confirm_rejects_a_token_spent_between_check_and_write() {
        let users = Arc::new(MemoryUserStore::default());
        let seeded = user_fixture("ada", "ada@example.com", "old-password-1");
        users.seed(seeded.clone());
        let harness = test_state(users.clone());

        let token = request_password_reset(&harness.state, "ada@example.com")
            .await
            .expect("reset request")
            .reset_token;
        // The slot check passes, then a concurrent confirm wins the write.
        users.conflict_next_password_update();

        let err = confirm_password_reset(&harness.state, &token, "new-password-9")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Token(TokenError::Invalid)));

        let stored = users.get(seeded.id).expect("user still there");
        assert!(password::verify_password("old-password-1", &stored.password_hash).unwrap());
    }

    #[tokio::test]
    async fn reset_confirm_rejects_a_session_token() {
        let users = Arc::new(MemoryUserStore::default());
        let seeded = user_fixture("ada", "ada@example.com", "old-password-1");
        users.seed(seeded.clone());
        let harness = test_state(users);

        let keys = JwtKeys::from_ref(&harness.state);
        let session = keys.sign_session(&seeded).expect("sign session");
        let err = confirm_password_reset(&harness.state, &session, "new-password-9")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Token(TokenError::Invalid)));
    }

    #[tokio::test]
    async fn reset_confirm_rejects_an_expired_token() {
        let users = Arc::new(MemoryUserStore::default());
        let mut seeded = user_fixture("ada", "ada@example.com", "old-password-1");
        let harness = test_state(users.clone());

        let keys = JwtKeys::from_ref(&harness.state);
        let expired = keys
            .sign_with_ttl(&seeded, TokenKind::Reset, -120)
            .expect("sign expired");
        seeded.reset_token = Some(expired.clone());
        users.seed(seeded);

        let err = confirm_password_reset(&harness.state, &expired, "new-password-9")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Token(TokenError::Expired)));
    }

    #[tokio::test]
    async fn reset_confirm_rejects_a_subject_mismatch() {
        let users = Arc::new(MemoryUserStore::default());
        let seeded = user_fixture("ada", "ada@example.com", "old-password-1");
        users.seed(seeded.clone());
        let harness = test_state(users);

        // Same email, different subject: the token was minted for someone else.
        let mut imposter = user_fixture("eve", "eve@example.com", "irrelevant-pw");
        imposter.email = seeded.email.clone();
        let keys = JwtKeys::from_ref(&harness.state);
        let token = keys.sign_reset(&imposter).expect("sign reset");

        let err = confirm_password_reset(&harness.state, &token, "new-password-9")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Token(TokenError::Invalid)));
    }

    #[tokio::test]
    async fn reset_confirm_rejects_short_replacement_password() {
        let users = Arc::new(MemoryUserStore::default());
        let seeded = user_fixture("ada", "ada@example.com", "old-password-1");
        users.seed(seeded.clone());
        let harness = test_state(users);

        let token = request_password_reset(&harness.state, "ada@example.com")
            .await
            .expect("reset request")
            .reset_token;
        let err = confirm_password_reset(&harness.state, &token, "tiny")
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }
}
