use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Request body for a membership purchase.
#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub payment_details: PaymentDetails,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentDetails {
    pub payment_id: String,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct PurchaseResponse {
    pub success: bool,
    pub transaction_id: String,
    pub message: String,
}
