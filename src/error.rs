//! Unified error taxonomy for the payment core.
//!
//! Every operation surfaces one of these variants; callers receive a stable
//! `code()` for programmatic handling and a `user_message()` that never leaks
//! provider internals or secrets.

use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Payment provider not supported: {provider}")]
    UnsupportedProvider { provider: String },

    #[error("Provider error: provider={provider}, message={message}")]
    Provider {
        provider: String,
        message: String,
        retryable: bool,
    },

    #[error("Persistence error: {message}")]
    Persistence { message: String },

    #[error("Invoice not found: {invoice_id}")]
    InvoiceNotFound { invoice_id: String },

    #[error("Payment not found: {payment_id}")]
    PaymentNotFound { payment_id: String },

    #[error("Can only refund completed payments: payment {payment_id} is {status}")]
    InvalidRefundState { payment_id: String, status: String },
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation {
            message: message.into(),
            field: None,
        }
    }

    pub fn validation_field(message: impl Into<String>, field: impl Into<String>) -> Self {
        CoreError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn persistence(err: sqlx::Error) -> Self {
        CoreError::Persistence {
            message: err.to_string(),
        }
    }

    /// Stable code recorded on failure rows and returned to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::Validation { .. } => "VALIDATION_ERROR",
            CoreError::UnsupportedProvider { .. } => "UNSUPPORTED_PROVIDER",
            CoreError::Provider { .. } => "PROVIDER_ERROR",
            CoreError::Persistence { .. } => "PERSISTENCE_ERROR",
            CoreError::InvoiceNotFound { .. } => "INVOICE_NOT_FOUND",
            CoreError::PaymentNotFound { .. } => "PAYMENT_NOT_FOUND",
            CoreError::InvalidRefundState { .. } => "INVALID_REFUND_STATE",
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            CoreError::Validation { .. } => false,
            CoreError::UnsupportedProvider { .. } => false,
            CoreError::Provider { retryable, .. } => *retryable,
            CoreError::Persistence { .. } => true,
            CoreError::InvoiceNotFound { .. } => false,
            CoreError::PaymentNotFound { .. } => false,
            CoreError::InvalidRefundState { .. } => false,
        }
    }

    pub fn http_status_code(&self) -> u16 {
        match self {
            CoreError::Validation { .. } => 400,
            CoreError::UnsupportedProvider { .. } => 400,
            CoreError::Provider { .. } => 502,
            CoreError::Persistence { .. } => 503,
            CoreError::InvoiceNotFound { .. } => 404,
            CoreError::PaymentNotFound { .. } => 404,
            CoreError::InvalidRefundState { .. } => 409,
        }
    }

    /// Caller-facing message. Provider and store internals are collapsed into
    /// generic phrasing so raw responses and connection strings never reach
    /// API clients.
    pub fn user_message(&self) -> String {
        match self {
            CoreError::Validation { message, .. } => message.clone(),
            CoreError::UnsupportedProvider { provider } => {
                format!("Payment provider {} is not supported", provider)
            }
            CoreError::Provider { .. } => "Payment provider returned an error".to_string(),
            CoreError::Persistence { .. } => "Payment store is temporarily unavailable".to_string(),
            CoreError::InvoiceNotFound { .. } => "Invoice not found".to_string(),
            CoreError::PaymentNotFound { .. } => "Payment not found".to_string(),
            CoreError::InvalidRefundState { .. } => {
                "Can only refund completed payments".to_string()
            }
        }
    }
}
