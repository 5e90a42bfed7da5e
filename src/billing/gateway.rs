use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;

/// Payment capture seam. `Ok(false)` is a decline; `Err` is a transport or
/// processor fault.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn capture(&self, payment_id: &str, amount: Decimal) -> anyhow::Result<bool>;
}

/// No processor is wired up in this deployment, so every capture is approved.
pub struct SimulatedGateway;

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn capture(&self, payment_id: &str, amount: Decimal) -> anyhow::Result<bool> {
        info!(payment_id = %payment_id, amount = %amount, "simulated payment capture");
        Ok(true)
    }
}
