//! Refund processor.
//!
//! Validates refund eligibility before any side effect (validate-then-act):
//! the payment must exist in the tenant's scope, be `completed`, and the
//! requested amount must keep cumulative refunds within the payment amount.
//! Only then is the provider-side reversal attempted, the refund recorded,
//! the payment flipped, and the invoice re-reconciled.

use crate::database::payment_repository::PaymentRepository;
use crate::database::refund_repository::{NewRefund, Refund, RefundRepository};
use crate::error::{CoreError, CoreResult};
use crate::providers::adapter::ProviderAdapters;
use crate::providers::types::{PaymentStatus, Provider, RefundStatus};
use crate::services::reconciler::InvoiceReconciler;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundRequest {
    pub tenant_id: String,
    pub payment_id: String,
    pub amount: BigDecimal,
    pub reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RefundReceipt {
    pub refund: Refund,
}

pub struct RefundProcessor {
    adapters: ProviderAdapters,
    payments: Arc<PaymentRepository>,
    refunds: Arc<RefundRepository>,
    reconciler: Arc<InvoiceReconciler>,
}

impl RefundProcessor {
    pub fn new(
        adapters: ProviderAdapters,
        payments: Arc<PaymentRepository>,
        refunds: Arc<RefundRepository>,
        reconciler: Arc<InvoiceReconciler>,
    ) -> Self {
        Self {
            adapters,
            payments,
            refunds,
            reconciler,
        }
    }

    pub async fn create_refund(&self, request: RefundRequest) -> CoreResult<RefundReceipt> {
        if request.amount <= BigDecimal::from(0) {
            return Err(CoreError::validation_field(
                "refund amount must be greater than zero",
                "amount",
            ));
        }

        // Tenant isolation is enforced at the lookup.
        let payment = self
            .payments
            .find_for_tenant(&request.payment_id, &request.tenant_id)
            .await?
            .ok_or_else(|| CoreError::PaymentNotFound {
                payment_id: request.payment_id.clone(),
            })?;

        // Only `completed` can transition to `refunded`; pending, failed,
        // and already-refunded payments are rejected outright, not queued.
        let status = PaymentStatus::from_db_str(&payment.status);
        let refundable =
            matches!(status, Some(current) if current.can_transition_to(PaymentStatus::Refunded));
        if !refundable {
            return Err(CoreError::InvalidRefundState {
                payment_id: payment.id.clone(),
                status: payment.status.clone(),
            });
        }

        if request.amount > payment.amount {
            return Err(CoreError::validation_field(
                "refund amount exceeds payment amount",
                "amount",
            ));
        }

        let already_refunded = self.refunds.total_refunded(&payment.id).await?;
        if &already_refunded + &request.amount > payment.amount {
            return Err(CoreError::validation_field(
                "cumulative refunds exceed payment amount",
                "amount",
            ));
        }

        let provider = Provider::from_str(&payment.provider)?;
        let reversal = self
            .adapters
            .select(provider)
            .reverse(&payment.provider_transaction_id, &request.amount)
            .await?;

        // Provider-side settlement is tracked on the refund row; anything
        // short of a completed reversal stays pending.
        let refund_status = if reversal.status == PaymentStatus::Completed {
            RefundStatus::Completed
        } else {
            RefundStatus::Pending
        };

        let refund = self
            .refunds
            .insert_refund(&NewRefund {
                tenant_id: request.tenant_id.clone(),
                payment_id: payment.id.clone(),
                invoice_id: payment.invoice_id.clone(),
                amount: request.amount.clone(),
                reason: request.reason.clone(),
                provider_refund_id: reversal.provider_refund_id,
                status: refund_status.as_db_str().to_string(),
            })
            .await?;

        // The payment is refunded from the ledger's perspective as soon as
        // the refund row exists, regardless of provider-side settlement.
        self.payments.mark_refunded(&payment.id).await?;

        if let Some(invoice_id) = &payment.invoice_id {
            self.reconciler
                .apply_refund(invoice_id, &request.amount)
                .await?;
        }

        info!(
            refund_id = %refund.id,
            payment_id = %payment.id,
            amount = %refund.amount,
            status = %refund.status,
            "refund processed"
        );

        Ok(RefundReceipt { refund })
    }
}
