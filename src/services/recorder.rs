//! Payment recorder.
//!
//! Entry point for every inbound payment: validates, routes to the provider
//! adapter, persists the payment row, and reconciles the linked invoice
//! inline. Exactly one of {payment row, failure row} is created per
//! invocation, never both.

use crate::database::invoice_repository::Invoice;
use crate::database::payment_repository::{NewPayment, NewPaymentFailure, Payment, PaymentRepository};
use crate::error::{CoreError, CoreResult};
use crate::providers::adapter::ProviderAdapters;
use crate::providers::types::{ChargeRequest, Provider, ProviderOutcome};
use crate::services::reconciler::InvoiceReconciler;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};

/// Inbound payment request from the caller-facing layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub tenant_id: String,
    pub customer_id: String,
    pub invoice_id: Option<String>,
    pub amount: BigDecimal,
    pub currency: String,
    pub provider: String,
    pub payment_method: Option<String>,
    #[serde(default)]
    pub metadata: JsonValue,
}

/// Result of a successful `process_payment`.
#[derive(Debug, Clone)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub transaction: ProviderOutcome,
    /// Post-reconciliation invoice state, when the payment carried an
    /// invoice link.
    pub invoice: Option<Invoice>,
}

pub struct PaymentRecorder {
    adapters: ProviderAdapters,
    payments: Arc<PaymentRepository>,
    reconciler: Arc<InvoiceReconciler>,
}

impl PaymentRecorder {
    pub fn new(
        adapters: ProviderAdapters,
        payments: Arc<PaymentRepository>,
        reconciler: Arc<InvoiceReconciler>,
    ) -> Self {
        Self {
            adapters,
            payments,
            reconciler,
        }
    }

    /// Process a payment end to end. The caller sees the invoice's updated
    /// state reflected before this returns; reconciliation is never deferred.
    pub async fn process_payment(&self, request: PaymentRequest) -> CoreResult<PaymentReceipt> {
        let (provider, outcome) = match self.charge_provider(&request).await {
            Ok(result) => result,
            Err(err) => return Err(self.record_failure(&request, err).await),
        };

        let new_payment = NewPayment {
            tenant_id: request.tenant_id.clone(),
            customer_id: request.customer_id.clone(),
            invoice_id: request.invoice_id.clone(),
            amount: request.amount.clone(),
            currency: request.currency.clone(),
            payment_method: request.payment_method.clone(),
            provider: provider.as_str().to_string(),
            provider_transaction_id: outcome.transaction_id.clone(),
            status: outcome.status.as_db_str().to_string(),
            metadata: request.metadata.clone(),
            provider_response: outcome.raw.clone(),
        };

        let payment = match self.payments.insert_payment(&new_payment).await {
            Ok(payment) => payment,
            Err(err) => return Err(self.record_failure(&request, err).await),
        };

        // The payment row exists from here on. A reconciliation failure must
        // surface loudly so operators catch the divergence; it is never
        // converted into a failure row (which would violate the
        // one-row-per-attempt side effect) and never swallowed.
        let invoice = match &payment.invoice_id {
            Some(invoice_id) => {
                let reconciled = self
                    .reconciler
                    .apply_payment(invoice_id, &payment.amount)
                    .await
                    .map_err(|err| {
                        error!(
                            payment_id = %payment.id,
                            invoice_id = %invoice_id,
                            error = %err,
                            "payment recorded but invoice reconciliation failed"
                        );
                        err
                    })?;
                Some(reconciled)
            }
            None => None,
        };

        info!(
            payment_id = %payment.id,
            provider = %provider,
            amount = %payment.amount,
            currency = %payment.currency,
            "payment processed"
        );

        Ok(PaymentReceipt {
            payment,
            transaction: outcome,
            invoice,
        })
    }

    /// Validate, resolve the provider, and run the charge. No persistence
    /// happens in here; failures leave no partial state.
    async fn charge_provider(
        &self,
        request: &PaymentRequest,
    ) -> CoreResult<(Provider, ProviderOutcome)> {
        validate(request)?;
        let provider = Provider::from_str(&request.provider)?;

        let charge = ChargeRequest {
            amount: request.amount.clone(),
            currency: request.currency.clone(),
            customer_id: request.customer_id.clone(),
            payment_method: request.payment_method.clone(),
            metadata: request.metadata.clone(),
        };

        let outcome = self.adapters.select(provider).process(&charge).await?;
        Ok((provider, outcome))
    }

    /// Record the failed attempt, best-effort. A failure of the failure
    /// write is logged and must not mask the original error.
    async fn record_failure(&self, request: &PaymentRequest, err: CoreError) -> CoreError {
        let snapshot = serde_json::to_value(request).unwrap_or(JsonValue::Null);
        let failure = NewPaymentFailure {
            tenant_id: non_empty(&request.tenant_id),
            customer_id: non_empty(&request.customer_id),
            invoice_id: request.invoice_id.clone(),
            amount: Some(request.amount.clone()),
            currency: non_empty(&request.currency),
            provider: non_empty(&request.provider),
            error_message: err.to_string(),
            error_code: err.code().to_string(),
            request_snapshot: snapshot,
        };

        if let Err(write_err) = self.payments.insert_failure(&failure).await {
            error!(
                error = %write_err,
                original_error = %err,
                "failed to record payment failure"
            );
        }

        err
    }
}

fn validate(request: &PaymentRequest) -> CoreResult<()> {
    if request.amount <= BigDecimal::from(0) {
        return Err(CoreError::validation_field(
            "payment amount must be greater than zero",
            "amount",
        ));
    }
    if request.currency.trim().is_empty() {
        return Err(CoreError::validation_field("currency is required", "currency"));
    }
    if request.customer_id.trim().is_empty() {
        return Err(CoreError::validation_field(
            "customer id is required",
            "customer_id",
        ));
    }
    if request.tenant_id.trim().is_empty() {
        return Err(CoreError::validation_field(
            "tenant id is required",
            "tenant_id",
        ));
    }
    Ok(())
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
