use rust_decimal::Decimal;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::billing::dto::{PaymentDetails, PurchaseResponse};
use crate::billing::ledger::{EntryKind, NewLedgerEntry};
use crate::error::{ApiError, StoreError};
use crate::state::AppState;

/// Flat membership fee. Whatever the customer pays, the ledger credits
/// exactly this much.
pub const MEMBERSHIP_FEE: i64 = 100;

#[derive(Debug, Error)]
pub enum PurchaseError {
    #[error("Insufficient amount for membership purchase")]
    InsufficientAmount,
    #[error("User not found")]
    UserNotFound,
    #[error("User is already a member")]
    AlreadyMember,
    #[error("Membership purchase failed")]
    CaptureFailed,
    #[error("User not found or update failed")]
    UserUpdateFailed,
    #[error("Failed to save transaction details")]
    LedgerWriteFailed,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<PurchaseError> for ApiError {
    fn from(err: PurchaseError) -> Self {
        match err {
            PurchaseError::InsufficientAmount => ApiError::InsufficientFunds(err.to_string()),
            PurchaseError::UserNotFound => ApiError::NotFound(err.to_string()),
            PurchaseError::AlreadyMember | PurchaseError::UserUpdateFailed => {
                ApiError::Conflict(err.to_string())
            }
            PurchaseError::CaptureFailed | PurchaseError::LedgerWriteFailed => {
                ApiError::Internal(anyhow::Error::msg(err.to_string()))
            }
            PurchaseError::Store(e) => ApiError::Store(e),
        }
    }
}

/// Grant a membership against a captured payment and record the credit.
///
/// Order matters: nothing is written before the capture succeeds, the
/// membership flip is conditional so concurrent purchases cannot both pass,
/// and a failed ledger write reverts the flip.
pub async fn purchase_membership(
    state: &AppState,
    user_id: Uuid,
    payment: PaymentDetails,
) -> Result<PurchaseResponse, PurchaseError> {
    let fee = Decimal::from(MEMBERSHIP_FEE);
    if payment.amount < fee {
        warn!(user_id = %user_id, amount = %payment.amount, "purchase below membership fee");
        return Err(PurchaseError::InsufficientAmount);
    }

    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or(PurchaseError::UserNotFound)?;
    if user.is_member {
        warn!(user_id = %user_id, "purchase for an existing member");
        return Err(PurchaseError::AlreadyMember);
    }

    let captured = state
        .payments
        .capture(&payment.payment_id, payment.amount)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user_id, "payment capture errored");
            PurchaseError::CaptureFailed
        })?;
    if !captured {
        warn!(user_id = %user_id, payment_id = %payment.payment_id, "payment capture declined");
        return Err(PurchaseError::CaptureFailed);
    }

    // Conditional flip: if a concurrent purchase got here first there is no
    // row left to update, and this request must not credit the ledger.
    match state.users.update_membership(user_id, true).await {
        Ok(_) => {}
        Err(StoreError::RowNotFound) => {
            warn!(user_id = %user_id, "membership update matched no row");
            return Err(PurchaseError::UserUpdateFailed);
        }
        Err(e) => return Err(e.into()),
    }

    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let new_entry = NewLedgerEntry {
        id: format!("txn_{}_{}", millis, payment.payment_id),
        user_id,
        amount: fee,
        kind: EntryKind::Credit,
        details: "Membership purchase transaction.".to_string(),
    };
    let entry = match state.ledger.create_entry(new_entry).await {
        Ok(e) => e,
        Err(e) => {
            error!(error = %e, user_id = %user_id, "ledger write failed, reverting membership");
            if let Err(revert_err) = state.users.update_membership(user_id, false).await {
                // User record and ledger now disagree; operators have to
                // reconcile by hand.
                error!(
                    error = %revert_err,
                    user_id = %user_id,
                    "membership revert failed after ledger write failure"
                );
            }
            return Err(PurchaseError::LedgerWriteFailed);
        }
    };

    info!(user_id = %user_id, transaction_id = %entry.id, "membership purchased");
    Ok(PurchaseResponse {
        success: true,
        transaction_id: entry.id,
        message: format!(
            "Membership purchased successfully. Credit: ${:.2}",
            entry.amount
        ),
    })
}
