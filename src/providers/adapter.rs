//! The closed provider union.
//!
//! Dispatch is a single exhaustive `match`: a new payment channel means a new
//! variant and the compiler walks every call site. Cash, check, and bank
//! transfer are synchronous local recordings; only the card variant leaves
//! the process.

use crate::error::{CoreError, CoreResult};
use crate::ids;
use crate::providers::card::CardGateway;
use crate::providers::types::{
    ChargeRequest, PaymentStatus, Provider, ProviderOutcome, ReversalOutcome,
};
use bigdecimal::BigDecimal;
use serde_json::Value as JsonValue;
use std::sync::Arc;

pub enum ProviderAdapter {
    Card(Arc<dyn CardGateway>),
    Cash,
    Check,
    BankTransfer,
    PayPal,
}

impl ProviderAdapter {
    /// Process a charge through this provider and return the canonical
    /// outcome. No persistence happens here.
    pub async fn process(&self, request: &ChargeRequest) -> CoreResult<ProviderOutcome> {
        match self {
            ProviderAdapter::Card(gateway) => gateway.charge(request).await,
            ProviderAdapter::Cash => Ok(ProviderOutcome {
                transaction_id: ids::provider_reference("CASH"),
                status: PaymentStatus::Completed,
                raw: serde_json::json!({
                    "type": "cash",
                    "amount": request.amount.to_string(),
                    "receivedBy": metadata_field(&request.metadata, "receivedBy")
                        .unwrap_or_else(|| JsonValue::String("Unknown".to_string())),
                    "receiptNumber": metadata_field(&request.metadata, "receiptNumber"),
                }),
            }),
            // Check clearing happens outside this system, so the canonical
            // status stays pending until an operator settles it.
            ProviderAdapter::Check => Ok(ProviderOutcome {
                transaction_id: ids::provider_reference("CHECK"),
                status: PaymentStatus::Pending,
                raw: serde_json::json!({
                    "type": "check",
                    "amount": request.amount.to_string(),
                    "checkNumber": metadata_field(&request.metadata, "checkNumber"),
                    "bankName": metadata_field(&request.metadata, "bankName"),
                    "checkDate": metadata_field(&request.metadata, "checkDate"),
                }),
            }),
            ProviderAdapter::BankTransfer => Ok(ProviderOutcome {
                transaction_id: ids::provider_reference("BANK"),
                status: PaymentStatus::Pending,
                raw: serde_json::json!({
                    "type": "bank_transfer",
                    "amount": request.amount.to_string(),
                    "referenceNumber": metadata_field(&request.metadata, "referenceNumber"),
                    "bankName": metadata_field(&request.metadata, "bankName"),
                    // Only the last four digits are ever stored.
                    "accountNumber": metadata_field(&request.metadata, "accountNumber")
                        .and_then(|v| v.as_str().map(last_four))
                        .map(JsonValue::String),
                }),
            }),
            ProviderAdapter::PayPal => Err(CoreError::Provider {
                provider: "paypal".to_string(),
                message: "PayPal integration is not available".to_string(),
                retryable: false,
            }),
        }
    }

    /// Reverse a prior charge. Providers without an online reversal path
    /// synthesize a pending marker for the manual back-office process.
    pub async fn reverse(
        &self,
        provider_transaction_id: &str,
        amount: &BigDecimal,
    ) -> CoreResult<ReversalOutcome> {
        match self {
            ProviderAdapter::Card(gateway) => gateway.reverse(provider_transaction_id, amount).await,
            ProviderAdapter::Cash | ProviderAdapter::Check | ProviderAdapter::BankTransfer => {
                Ok(ReversalOutcome {
                    provider_refund_id: ids::provider_reference("REFUND"),
                    status: PaymentStatus::Pending,
                })
            }
            ProviderAdapter::PayPal => Err(CoreError::Provider {
                provider: "paypal".to_string(),
                message: "PayPal integration is not available".to_string(),
                retryable: false,
            }),
        }
    }
}

/// Routes a provider kind to its adapter. The card gateway is the only
/// injected collaborator; the rest are stateless.
#[derive(Clone)]
pub struct ProviderAdapters {
    card: Arc<dyn CardGateway>,
}

impl ProviderAdapters {
    pub fn new(card: Arc<dyn CardGateway>) -> Self {
        ProviderAdapters { card }
    }

    pub fn select(&self, provider: Provider) -> ProviderAdapter {
        match provider {
            Provider::Card => ProviderAdapter::Card(Arc::clone(&self.card)),
            Provider::Cash => ProviderAdapter::Cash,
            Provider::Check => ProviderAdapter::Check,
            Provider::BankTransfer => ProviderAdapter::BankTransfer,
            Provider::PayPal => ProviderAdapter::PayPal,
        }
    }
}

fn metadata_field(metadata: &JsonValue, key: &str) -> Option<JsonValue> {
    metadata.get(key).cloned()
}

fn last_four(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    let start = chars.len().saturating_sub(4);
    chars[start..].iter().collect()
}
