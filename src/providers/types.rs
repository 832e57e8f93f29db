use crate::error::CoreError;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;

/// Closed set of payment channels. Adding a variant forces every dispatch
/// site to handle it at compile time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Card,
    Cash,
    Check,
    BankTransfer,
    #[serde(rename = "paypal")]
    PayPal,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Card => "card",
            Provider::Cash => "cash",
            Provider::Check => "check",
            Provider::BankTransfer => "bank_transfer",
            Provider::PayPal => "paypal",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Provider {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "card" => Ok(Provider::Card),
            "cash" => Ok(Provider::Cash),
            "check" => Ok(Provider::Check),
            "bank_transfer" | "bank-transfer" => Ok(Provider::BankTransfer),
            "paypal" => Ok(Provider::PayPal),
            _ => Err(CoreError::UnsupportedProvider {
                provider: value.to_string(),
            }),
        }
    }
}

/// Canonical payment status every provider vocabulary maps into.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Processing => "processing",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn from_db_str(status: &str) -> Option<Self> {
        match status {
            "pending" => Some(PaymentStatus::Pending),
            "processing" => Some(PaymentStatus::Processing),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }

    /// Valid transitions. `processing -> pending` exists for providers that
    /// report interim states; `completed -> refunded` is reserved for the
    /// refund processor.
    pub fn valid_transitions(&self) -> &'static [PaymentStatus] {
        match self {
            PaymentStatus::Pending => &[
                PaymentStatus::Processing,
                PaymentStatus::Completed,
                PaymentStatus::Failed,
            ],
            PaymentStatus::Processing => &[
                PaymentStatus::Completed,
                PaymentStatus::Failed,
                PaymentStatus::Pending,
            ],
            PaymentStatus::Completed => &[PaymentStatus::Refunded],
            PaymentStatus::Failed => &[],
            PaymentStatus::Refunded => &[],
        }
    }

    pub fn can_transition_to(&self, target: PaymentStatus) -> bool {
        self.valid_transitions().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentStatus::Failed | PaymentStatus::Refunded)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

/// Invoice financial status, derived deterministically from paid amount and
/// balance by the reconciler.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Partial,
    Paid,
}

impl InvoiceStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Partial => "partial",
            InvoiceStatus::Paid => "paid",
        }
    }

    pub fn from_db_str(status: &str) -> Option<Self> {
        match status {
            "pending" => Some(InvoiceStatus::Pending),
            "partial" => Some(InvoiceStatus::Partial),
            "paid" => Some(InvoiceStatus::Paid),
            _ => None,
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

/// Settlement status of a refund. Tracked on the refund row itself; the
/// owning payment flips to `refunded` as soon as the refund is recorded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefundStatus {
    Pending,
    Completed,
}

impl RefundStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            RefundStatus::Pending => "pending",
            RefundStatus::Completed => "completed",
        }
    }

    pub fn from_db_str(status: &str) -> Option<Self> {
        match status {
            "pending" => Some(RefundStatus::Pending),
            "completed" => Some(RefundStatus::Completed),
            _ => None,
        }
    }
}

/// Request shape at the adapter boundary.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub amount: BigDecimal,
    pub currency: String,
    pub customer_id: String,
    pub payment_method: Option<String>,
    /// Opaque audit payload. Adapters echo documented fields (receivedBy,
    /// checkNumber, ...) into the raw response but never branch on it.
    pub metadata: JsonValue,
}

/// Canonical outcome of a provider charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderOutcome {
    pub transaction_id: String,
    pub status: PaymentStatus,
    /// Provider response captured verbatim for audit.
    pub raw: JsonValue,
}

/// Canonical outcome of a provider-side reversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReversalOutcome {
    pub provider_refund_id: String,
    pub status: PaymentStatus,
}
