use std::time::Duration;

use reqwest::{Client, StatusCode};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{info, warn};

use redress_core::config::StripeConfig;
use redress_core::workflow::{
    PaymentProcessor, ProcessorError, ProcessorRefund, ProcessorRefundRequest,
};

const REFUND_REASON: &str = "requested_by_customer";

/// Stripe refund client. One `POST /v1/refunds` per call; the caller's
/// idempotency key makes repeats after a timeout safe.
pub struct StripeProcessor {
    client: Client,
    base_url: String,
    api_key: SecretString,
}

impl StripeProcessor {
    pub fn new(api_key: SecretString, base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProcessorError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ProcessorError::Permanent(format!("http client build failed: {error}")))?;

        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_owned(), api_key })
    }

    pub fn from_config(config: &StripeConfig) -> Result<Self, ProcessorError> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            ProcessorError::Permanent("stripe.api_key is not configured".to_string())
        })?;
        Self::new(api_key, config.base_url.clone(), Duration::from_secs(config.timeout_secs))
    }
}

/// Stripe takes amounts in the currency's minor unit. Only two-decimal
/// currencies are supported here; anything that does not fit `i64` cents
/// exactly is rejected before the wire.
pub fn minor_units(amount: Decimal, currency: &str) -> Result<i64, ProcessorError> {
    let scaled = amount * Decimal::from(100);
    if scaled.fract() != Decimal::ZERO {
        return Err(ProcessorError::Permanent(format!(
            "amount {amount} {currency} does not convert exactly to minor units"
        )));
    }
    scaled.to_i64().ok_or_else(|| {
        ProcessorError::Permanent(format!("amount {amount} {currency} overflows minor units"))
    })
}

fn classify_status(status: StatusCode, body: &str) -> ProcessorError {
    let summary = error_summary(body).unwrap_or_else(|| format!("http {status}"));
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        ProcessorError::Retriable(summary)
    } else {
        ProcessorError::Permanent(summary)
    }
}

fn error_summary(body: &str) -> Option<String> {
    let parsed: StripeErrorEnvelope = serde_json::from_str(body).ok()?;
    Some(parsed.error.message)
}

#[derive(Debug, Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct RefundResponse {
    id: String,
    status: String,
}

#[async_trait::async_trait]
impl PaymentProcessor for StripeProcessor {
    async fn refund(
        &self,
        request: ProcessorRefundRequest,
    ) -> Result<ProcessorRefund, ProcessorError> {
        let amount = minor_units(request.amount, &request.currency)?;
        let url = format!("{}/v1/refunds", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .header("Idempotency-Key", &request.idempotency_key)
            .form(&[
                ("payment_intent", request.processor_reference.as_str()),
                ("amount", &amount.to_string()),
                ("reason", REFUND_REASON),
            ])
            .send()
            .await
            .map_err(|error| {
                // Connection and timeout failures leave the outcome unknown.
                warn!(
                    event_name = "stripe.refund_transport_error",
                    idempotency_key = %request.idempotency_key,
                    error = %error,
                    "refund request did not complete"
                );
                ProcessorError::Retriable(format!("refund request failed: {error}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(
                event_name = "stripe.refund_rejected",
                idempotency_key = %request.idempotency_key,
                http_status = status.as_u16(),
                "refund endpoint returned an error"
            );
            return Err(classify_status(status, &body));
        }

        let refund: RefundResponse = response.json().await.map_err(|error| {
            ProcessorError::Retriable(format!("failed to decode refund response: {error}"))
        })?;

        info!(
            event_name = "stripe.refund_created",
            idempotency_key = %request.idempotency_key,
            refund_id = %refund.id,
            refund_status = %refund.status,
            "refund accepted by processor"
        );

        Ok(ProcessorRefund { refund_id: refund.id, status: refund.status })
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use rust_decimal::Decimal;

    use redress_core::workflow::ProcessorError;

    use super::{classify_status, minor_units};

    #[test]
    fn minor_units_converts_exact_cents() {
        assert_eq!(minor_units(Decimal::new(4_500, 2), "USD").unwrap(), 4_500);
        assert_eq!(minor_units(Decimal::new(97_957, 2), "USD").unwrap(), 97_957);
        assert_eq!(minor_units(Decimal::from(12), "USD").unwrap(), 1_200);
    }

    #[test]
    fn minor_units_rejects_sub_cent_amounts() {
        let error = minor_units(Decimal::new(45_001, 3), "USD").unwrap_err();
        assert!(matches!(error, ProcessorError::Permanent(_)));
    }

    #[test]
    fn server_errors_and_rate_limits_are_retriable() {
        assert!(classify_status(StatusCode::INTERNAL_SERVER_ERROR, "").is_retriable());
        assert!(classify_status(StatusCode::BAD_GATEWAY, "").is_retriable());
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "").is_retriable());
    }

    #[test]
    fn client_errors_are_permanent_with_stripe_message() {
        let body = r#"{"error":{"message":"Charge ch_1 has already been refunded."}}"#;
        let error = classify_status(StatusCode::BAD_REQUEST, body);
        match error {
            ProcessorError::Permanent(message) => {
                assert_eq!(message, "Charge ch_1 has already been refunded.");
            }
            other => panic!("expected permanent error, got {other:?}"),
        }
    }
}
