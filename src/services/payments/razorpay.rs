use anyhow::Context;
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use super::{OrderHandle, PaymentProof, PaymentProvider};

const API_BASE: &str = "https://api.razorpay.com/v1";

pub struct RazorpayProvider {
    key_id: String,
    key_secret: String,
    client: reqwest::Client,
}

impl RazorpayProvider {
    pub fn new(key_id: String, key_secret: String) -> Self {
        Self {
            key_id,
            key_secret,
            client: reqwest::Client::new(),
        }
    }

    /// The gateway signs `order_id|payment_id` with HMAC-SHA256 over the
    /// key secret and sends the hex digest back with the client.
    fn signature_matches(&self, proof: &PaymentProof) -> bool {
        let mut mac = match Hmac::<Sha256>::new_from_slice(self.key_secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(format!("{}|{}", proof.order_id, proof.payment_id).as_bytes());
        let expected: String = mac
            .finalize()
            .into_bytes()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        expected == proof.signature
    }
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
}

#[derive(Deserialize)]
struct PaymentResponse {
    status: String,
}

#[derive(Deserialize)]
struct RefundResponse {
    id: String,
}

#[async_trait]
impl PaymentProvider for RazorpayProvider {
    async fn charge(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> anyhow::Result<OrderHandle> {
        let order: OrderResponse = self
            .client
            .post(format!("{API_BASE}/orders"))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&serde_json::json!({
                "amount": amount_minor,
                "currency": currency,
                "receipt": receipt,
            }))
            .send()
            .await
            .context("failed to reach payment gateway")?
            .error_for_status()
            .context("payment gateway rejected order")?
            .json()
            .await
            .context("payment gateway returned malformed order")?;

        Ok(OrderHandle { order_id: order.id })
    }

    async fn verify(&self, proof: &PaymentProof) -> anyhow::Result<bool> {
        if !self.signature_matches(proof) {
            return Ok(false);
        }

        let payment: PaymentResponse = self
            .client
            .get(format!("{API_BASE}/payments/{}", proof.payment_id))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .send()
            .await
            .context("failed to reach payment gateway")?
            .error_for_status()
            .context("payment gateway rejected payment lookup")?
            .json()
            .await
            .context("payment gateway returned malformed payment")?;

        Ok(payment.status == "captured")
    }

    async fn refund(&self, transaction_id: &str, amount_minor: i64) -> anyhow::Result<String> {
        let refund: RefundResponse = self
            .client
            .post(format!("{API_BASE}/payments/{transaction_id}/refund"))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&serde_json::json!({ "amount": amount_minor }))
            .send()
            .await
            .context("failed to reach payment gateway")?
            .error_for_status()
            .context("payment gateway rejected refund")?
            .json()
            .await
            .context("payment gateway returned malformed refund")?;

        Ok(refund.id)
    }
}
