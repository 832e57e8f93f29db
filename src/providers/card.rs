//! Card processor gateway.
//!
//! The external processor is opaque to this core: everything behind
//! [`CardGateway`] is a network detail. [`CardProcessorClient`] is the HTTP
//! implementation; tests substitute their own gateway.

use crate::error::{CoreError, CoreResult};
use crate::providers::types::{ChargeRequest, PaymentStatus, ProviderOutcome, ReversalOutcome};
use async_trait::async_trait;
use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};
use serde_json::Value as JsonValue;
use std::env;
use std::time::Duration;
use tracing::info;

/// Capability interface to the external card processor.
#[async_trait]
pub trait CardGateway: Send + Sync {
    async fn charge(&self, request: &ChargeRequest) -> CoreResult<ProviderOutcome>;

    async fn reverse(
        &self,
        provider_transaction_id: &str,
        amount: &BigDecimal,
    ) -> CoreResult<ReversalOutcome>;
}

#[derive(Debug, Clone)]
pub struct CardProcessorConfig {
    pub secret_key: String,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for CardProcessorConfig {
    fn default() -> Self {
        CardProcessorConfig {
            secret_key: String::new(),
            base_url: "https://api.cardprocessor.dev".to_string(),
            timeout_secs: 30,
        }
    }
}

impl CardProcessorConfig {
    pub fn from_env() -> CoreResult<Self> {
        let secret_key = env::var("CARD_PROCESSOR_SECRET_KEY").map_err(|_| {
            CoreError::validation_field(
                "CARD_PROCESSOR_SECRET_KEY environment variable is required",
                "CARD_PROCESSOR_SECRET_KEY",
            )
        })?;

        Ok(CardProcessorConfig {
            secret_key,
            base_url: env::var("CARD_PROCESSOR_BASE_URL")
                .unwrap_or_else(|_| "https://api.cardprocessor.dev".to_string()),
            timeout_secs: env::var("CARD_PROCESSOR_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
        })
    }
}

/// HTTP client for the card processor API.
///
/// Calls carry a bounded timeout and are made exactly once: a timeout is a
/// failure, never an assumed success, and retries are a caller concern.
pub struct CardProcessorClient {
    config: CardProcessorConfig,
    http: reqwest::Client,
}

impl CardProcessorClient {
    pub fn new(config: CardProcessorConfig) -> CoreResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CoreError::Provider {
                provider: "card".to_string(),
                message: format!("failed to initialize HTTP client: {}", e),
                retryable: false,
            })?;
        Ok(CardProcessorClient { config, http })
    }

    pub fn from_env() -> CoreResult<Self> {
        Self::new(CardProcessorConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn post_json(&self, url: &str, payload: &JsonValue) -> CoreResult<JsonValue> {
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.secret_key)
            .json(payload)
            .send()
            .await
            .map_err(|e| CoreError::Provider {
                provider: "card".to_string(),
                message: format!("processor request failed: {}", e),
                retryable: e.is_timeout() || e.is_connect(),
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(CoreError::Provider {
                provider: "card".to_string(),
                message: format!("HTTP {}: {}", status, text),
                retryable: status.is_server_error(),
            });
        }

        serde_json::from_str::<JsonValue>(&text).map_err(|e| CoreError::Provider {
            provider: "card".to_string(),
            message: format!("invalid processor JSON response: {}", e),
            retryable: false,
        })
    }
}

#[async_trait]
impl CardGateway for CardProcessorClient {
    async fn charge(&self, request: &ChargeRequest) -> CoreResult<ProviderOutcome> {
        let payload = serde_json::json!({
            "amount": minor_units(&request.amount)?,
            "currency": request.currency.to_lowercase(),
            "customer": request.customer_id,
            "payment_method": request.payment_method,
            "confirm": true,
            "metadata": request.metadata,
        });

        let raw = self.post_json(&self.endpoint("/v1/charges"), &payload).await?;
        let transaction_id = require_id(&raw, "charge")?;
        let status = raw
            .get("status")
            .and_then(JsonValue::as_str)
            .map(map_processor_status)
            .unwrap_or(PaymentStatus::Pending);

        info!(transaction_id = %transaction_id, status = %status, "card charge processed");

        Ok(ProviderOutcome {
            transaction_id,
            status,
            raw,
        })
    }

    async fn reverse(
        &self,
        provider_transaction_id: &str,
        amount: &BigDecimal,
    ) -> CoreResult<ReversalOutcome> {
        let payload = serde_json::json!({
            "charge": provider_transaction_id,
            "amount": minor_units(amount)?,
        });

        let raw = self.post_json(&self.endpoint("/v1/refunds"), &payload).await?;
        let provider_refund_id = require_id(&raw, "refund")?;
        let status = raw
            .get("status")
            .and_then(JsonValue::as_str)
            .map(map_processor_status)
            .unwrap_or(PaymentStatus::Pending);

        info!(
            provider_refund_id = %provider_refund_id,
            status = %status,
            "card reversal processed"
        );

        Ok(ReversalOutcome {
            provider_refund_id,
            status,
        })
    }
}

/// Fixed lookup from the processor's status vocabulary into the canonical
/// one. Unknown values default to `pending` rather than assuming success.
pub fn map_processor_status(processor_status: &str) -> PaymentStatus {
    match processor_status {
        "succeeded" => PaymentStatus::Completed,
        "pending" => PaymentStatus::Pending,
        "requires_payment_method" => PaymentStatus::Failed,
        "requires_confirmation" => PaymentStatus::Pending,
        "requires_action" => PaymentStatus::Pending,
        "processing" => PaymentStatus::Processing,
        "requires_capture" => PaymentStatus::Pending,
        "canceled" => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    }
}

/// Convert a decimal major-unit amount to processor minor units (cents).
fn minor_units(amount: &BigDecimal) -> CoreResult<i64> {
    (amount * BigDecimal::from(100))
        .with_scale_round(0, RoundingMode::HalfUp)
        .to_i64()
        .ok_or_else(|| CoreError::validation_field("amount out of range", "amount"))
}

fn require_id(raw: &JsonValue, entity: &str) -> CoreResult<String> {
    raw.get("id")
        .and_then(JsonValue::as_str)
        .map(str::to_owned)
        .ok_or_else(|| CoreError::Provider {
            provider: "card".to_string(),
            message: format!("processor response missing {} id", entity),
            retryable: false,
        })
}
