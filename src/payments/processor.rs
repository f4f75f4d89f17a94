use axum::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

use crate::config::StripeConfig;

/// Webhook signatures older than this are rejected.
const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, Clone)]
pub struct IntentRequest {
    pub amount_minor: i64,
    pub currency: String,
    pub order_id: Uuid,
    pub user_id: Uuid,
    pub description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
    pub status: String,
}

#[derive(Debug, Error)]
pub enum ProcessorError {
    /// The processor answered with an error; status and message are its own.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("payment processor unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Seam for the external payment processor.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_intent(&self, req: IntentRequest) -> Result<PaymentIntent, ProcessorError>;
}

pub struct StripeProcessor {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl StripeProcessor {
    pub fn new(cfg: &StripeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            secret_key: cfg.secret_key.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: String,
}

#[async_trait]
impl PaymentProcessor for StripeProcessor {
    async fn create_intent(&self, req: IntentRequest) -> Result<PaymentIntent, ProcessorError> {
        let params = [
            ("amount", req.amount_minor.to_string()),
            ("currency", req.currency.clone()),
            ("description", req.description.clone()),
            ("metadata[order_id]", req.order_id.to_string()),
            ("metadata[user_id]", req.user_id.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];

        let response = self
            .http
            .post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<StripeErrorBody>()
                .await
                .map(|body| body.error.message)
                .unwrap_or_else(|_| "payment processor error".to_string());
            return Err(ProcessorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let intent = response.json::<PaymentIntent>().await?;
        debug!(intent_id = %intent.id, order_id = %req.order_id, "payment intent created");
        Ok(intent)
    }
}

/// Verifies a `t=<ts>,v1=<hex hmac>` signature header over `"{ts}.{payload}"`.
/// Malformed headers and stale timestamps read as invalid, not as errors.
pub fn verify_webhook_signature(payload: &[u8], signature_header: &str, secret: &str) -> bool {
    let mut timestamp = None;
    let mut signature = None;
    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signature = Some(value),
            _ => {}
        }
    }
    let (Some(timestamp), Some(signature)) = (timestamp, signature) else {
        return false;
    };
    let Ok(timestamp) = timestamp.parse::<i64>() else {
        return false;
    };

    let now = OffsetDateTime::now_utc().unix_timestamp();
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return false;
    }

    let Ok(expected) = hex::decode(signature) else {
        return false;
    };

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac =
            Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("hmac key");
        mac.update(format!("{timestamp}.").as_bytes());
        mac.update(payload);
        format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    fn now() -> i64 {
        OffsetDateTime::now_utc().unix_timestamp()
    }

    #[test]
    fn accepts_valid_signature() {
        let payload = br#"{"type":"payment_intent.succeeded"}"#;
        let header = sign(payload, SECRET, now());
        assert!(verify_webhook_signature(payload, &header, SECRET));
    }

    #[test]
    fn rejects_wrong_secret() {
        let payload = br#"{"type":"payment_intent.succeeded"}"#;
        let header = sign(payload, "wrong_secret", now());
        assert!(!verify_webhook_signature(payload, &header, SECRET));
    }

    #[test]
    fn rejects_modified_payload() {
        let header = sign(br#"{"amount":100}"#, SECRET, now());
        assert!(!verify_webhook_signature(
            br#"{"amount":99999}"#,
            &header,
            SECRET
        ));
    }

    #[test]
    fn rejects_stale_timestamp() {
        let payload = b"{}";
        // Ten minutes old, beyond the five-minute tolerance.
        let header = sign(payload, SECRET, now() - 600);
        assert!(!verify_webhook_signature(payload, &header, SECRET));
    }

    #[test]
    fn rejects_malformed_headers() {
        let payload = b"{}";
        assert!(!verify_webhook_signature(payload, "", SECRET));
        assert!(!verify_webhook_signature(payload, "v1=abcd", SECRET));
        assert!(!verify_webhook_signature(
            payload,
            &format!("t={}", now()),
            SECRET
        ));
        assert!(!verify_webhook_signature(
            payload,
            &format!("t={},v1=not-hex", now()),
            SECRET
        ));
    }

    #[test]
    fn intent_decodes_stripe_shape() {
        let intent: PaymentIntent = serde_json::from_str(
            r#"{"id":"pi_123","client_secret":"pi_123_secret_456","status":"requires_payment_method","object":"payment_intent"}"#,
        )
        .unwrap();
        assert_eq!(intent.id, "pi_123");
        assert_eq!(intent.client_secret, "pi_123_secret_456");
    }

    #[test]
    fn error_body_decodes_with_and_without_message() {
        let body: StripeErrorBody = serde_json::from_str(
            r#"{"error":{"message":"Amount must be at least 50 cents","type":"invalid_request_error"}}"#,
        )
        .unwrap();
        assert_eq!(body.error.message, "Amount must be at least 50 cents");

        let body: StripeErrorBody = serde_json::from_str(r#"{"error":{}}"#).unwrap();
        assert_eq!(body.error.message, "");
    }
}
