use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::StoreError;
use crate::users::model::{NewUser, User};

/// Narrow persistence contract for user records. The auth and billing
/// workflows only ever touch the database through this trait, which lets
/// tests swap in an in-memory store.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Create a user; a taken email or username surfaces as
    /// `StoreError::Duplicate`.
    async fn create(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Overwrite the session-token slot. The reset slot is untouched.
    async fn update_session_token(&self, user_id: Uuid, token: &str) -> Result<(), StoreError>;

    /// Overwrite the reset-token slot. The session slot is untouched.
    async fn update_reset_token(&self, user_id: Uuid, token: &str) -> Result<(), StoreError>;

    /// Store a new password hash, guarded by the presented reset token: the
    /// write only matches while that token is still on record and clears the
    /// slot in the same statement. `RowNotFound` means the token was already
    /// spent.
    async fn update_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
        reset_token: &str,
    ) -> Result<User, StoreError>;

    /// Guarded flip: only a row whose flag actually differs is updated.
    /// `RowNotFound` therefore covers both a missing user and a lost race
    /// between concurrent purchases for the same user.
    async fn update_membership(&self, user_id: Uuid, is_member: bool)
        -> Result<User, StoreError>;
}

pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, session_token, reset_token, is_member, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, session_token, reset_token, is_member, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, email, password_hash, session_token, reset_token, is_member, created_at
            FROM users
            WHERE username = $1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn create(&self, new_user: NewUser) -> Result<User, StoreError> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, username, email, password_hash, session_token, reset_token, is_member, created_at
            "#,
        )
        .bind(&new_user.username)
        .bind(&new_user.email)
        .bind(&new_user.password_hash)
        .fetch_one(&self.pool)
        .await;

        match created {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(db))
                if db.kind() == sqlx::error::ErrorKind::UniqueViolation =>
            {
                let field = match db.constraint() {
                    Some("users_username_key") => "username",
                    _ => "email",
                };
                Err(StoreError::Duplicate { field })
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_session_token(&self, user_id: Uuid, token: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET session_token = $2 WHERE id = $1")
            .bind(user_id)
            .bind(token)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound);
        }
        Ok(())
    }

    async fn update_reset_token(&self, user_id: Uuid, token: &str) -> Result<(), StoreError> {
        let result = sqlx::query("UPDATE users SET reset_token = $2 WHERE id = $1")
            .bind(user_id)
            .bind(token)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound);
        }
        Ok(())
    }

    async fn update_password(
        &self,
        user_id: Uuid,
        password_hash: &str,
        reset_token: &str,
    ) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET password_hash = $2, reset_token = NULL
            WHERE id = $1 AND reset_token = $3
            RETURNING id, username, email, password_hash, session_token, reset_token, is_member, created_at
            "#,
        )
        .bind(user_id)
        .bind(password_hash)
        .bind(reset_token)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::RowNotFound)?;
        Ok(user)
    }

    async fn update_membership(
        &self,
        user_id: Uuid,
        is_member: bool,
    ) -> Result<User, StoreError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET is_member = $2
            WHERE id = $1 AND is_member <> $2
            RETURNING id, username, email, password_hash, session_token, reset_token, is_member, created_at
            "#,
        )
        .bind(user_id)
        .bind(is_member)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::RowNotFound)?;
        Ok(user)
    }
}
