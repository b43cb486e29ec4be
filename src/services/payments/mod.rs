pub mod razorpay;

use async_trait::async_trait;

/// Gateway order created before payment capture; its id rides on the
/// booking until the client returns with proof of payment.
#[derive(Debug, Clone)]
pub struct OrderHandle {
    pub order_id: String,
}

/// Client-supplied proof that a gateway payment went through.
#[derive(Debug, Clone)]
pub struct PaymentProof {
    pub order_id: String,
    pub payment_id: String,
    pub signature: String,
}

/// Narrow payment-gateway contract. The lifecycle manager receives an
/// implementation at construction, so the core never touches a concrete
/// provider and tests can substitute a fake.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create an order for the amount (in minor units). The booking is not
    /// persisted if this fails.
    async fn charge(&self, amount_minor: i64, currency: &str, receipt: &str)
        -> anyhow::Result<OrderHandle>;

    /// Verify proof of payment. `Ok(true)` means the payment is captured;
    /// `Ok(false)` means the proof is invalid or the payment not captured.
    async fn verify(&self, proof: &PaymentProof) -> anyhow::Result<bool>;

    /// Refund a captured transaction, returning the gateway's refund id.
    async fn refund(&self, transaction_id: &str, amount_minor: i64) -> anyhow::Result<String>;
}
