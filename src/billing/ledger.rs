use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::StoreError;

/// Direction of a ledger entry. Stored as TEXT behind a CHECK constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Credit,
    Debit,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Credit => "credit",
            EntryKind::Debit => "debit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "credit" => Some(EntryKind::Credit),
            "debit" => Some(EntryKind::Debit),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub id: String,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub kind: EntryKind,
    pub details: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct NewLedgerEntry {
    pub id: String,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub kind: EntryKind,
    pub details: String,
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn create_entry(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError>;

    async fn entries_for_user(&self, user_id: Uuid) -> Result<Vec<LedgerEntry>, StoreError>;
}

#[derive(FromRow)]
struct LedgerRow {
    id: String,
    user_id: Uuid,
    amount: Decimal,
    kind: String,
    details: String,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl LedgerRow {
    fn into_entry(self) -> Result<LedgerEntry, StoreError> {
        let kind = EntryKind::parse(&self.kind).ok_or_else(|| {
            StoreError::Database(sqlx::Error::Decode(
                format!("unknown ledger entry kind: {}", self.kind).into(),
            ))
        })?;
        Ok(LedgerEntry {
            id: self.id,
            user_id: self.user_id,
            amount: self.amount,
            kind,
            details: self.details,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerStore for PgLedgerStore {
    async fn create_entry(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, StoreError> {
        let row = sqlx::query_as::<_, LedgerRow>(
            r#"
            INSERT INTO transactions (id, user_id, amount, kind, details)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, amount, kind, details, created_at, updated_at
            "#,
        )
        .bind(&entry.id)
        .bind(entry.user_id)
        .bind(entry.amount)
        .bind(entry.kind.as_str())
        .bind(&entry.details)
        .fetch_one(&self.pool)
        .await?;
        row.into_entry()
    }

    async fn entries_for_user(&self, user_id: Uuid) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT id, user_id, amount, kind, details, created_at, updated_at
            FROM transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(LedgerRow::into_entry).collect()
    }
}
