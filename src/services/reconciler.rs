//! Invoice reconciler.
//!
//! Sole owner of invoice paid-amount, balance, and status. Every
//! recomputation runs as one scoped transaction around a `SELECT ... FOR
//! UPDATE` so concurrent payment and refund applications against the same
//! invoice serialize instead of computing from stale reads. Rollback on any
//! error path is automatic: the transaction guard is dropped uncommitted.

use crate::database::invoice_repository::{Invoice, InvoiceRepository};
use crate::error::{CoreError, CoreResult};
use crate::providers::types::InvoiceStatus;
use bigdecimal::BigDecimal;
use tracing::{debug, info};

pub struct InvoiceReconciler {
    invoices: InvoiceRepository,
}

impl InvoiceReconciler {
    pub fn new(invoices: InvoiceRepository) -> Self {
        Self { invoices }
    }

    /// Apply a completed payment amount to an invoice and recompute its
    /// financial state atomically.
    pub async fn apply_payment(
        &self,
        invoice_id: &str,
        amount: &BigDecimal,
    ) -> CoreResult<Invoice> {
        let mut tx = self
            .invoices
            .pool()
            .begin()
            .await
            .map_err(CoreError::persistence)?;

        let invoice = self
            .invoices
            .lock(&mut tx, invoice_id)
            .await?
            .ok_or_else(|| CoreError::InvoiceNotFound {
                invoice_id: invoice_id.to_string(),
            })?;

        let new_paid = &invoice.paid_amount + amount;
        let new_balance = &invoice.total_amount - &new_paid;
        let status = status_after_payment(&new_paid, &new_balance);

        let updated = self
            .invoices
            .update_financials(&mut tx, invoice_id, &new_paid, &new_balance, status.as_db_str())
            .await?;

        tx.commit().await.map_err(CoreError::persistence)?;

        info!(
            invoice_id = %invoice_id,
            paid_amount = %updated.paid_amount,
            balance = %updated.balance,
            status = %updated.status,
            "invoice reconciled after payment"
        );

        Ok(updated)
    }

    /// Apply a refund amount (a negative delta on paid) to an invoice. A
    /// missing invoice is a silent no-op: the payment's invoice link may have
    /// been cleared upstream, and a refund must not be blocked by that.
    pub async fn apply_refund(
        &self,
        invoice_id: &str,
        refund_amount: &BigDecimal,
    ) -> CoreResult<Option<Invoice>> {
        let mut tx = self
            .invoices
            .pool()
            .begin()
            .await
            .map_err(CoreError::persistence)?;

        let Some(invoice) = self.invoices.lock(&mut tx, invoice_id).await? else {
            debug!(invoice_id = %invoice_id, "invoice missing during refund reconciliation, skipping");
            return Ok(None);
        };

        let new_paid = &invoice.paid_amount - refund_amount;
        let new_balance = &invoice.total_amount - &new_paid;
        let status = status_after_refund(&new_paid);

        let updated = self
            .invoices
            .update_financials(&mut tx, invoice_id, &new_paid, &new_balance, status.as_db_str())
            .await?;

        tx.commit().await.map_err(CoreError::persistence)?;

        info!(
            invoice_id = %invoice_id,
            paid_amount = %updated.paid_amount,
            balance = %updated.balance,
            status = %updated.status,
            "invoice reconciled after refund"
        );

        Ok(Some(updated))
    }
}

fn status_after_payment(new_paid: &BigDecimal, new_balance: &BigDecimal) -> InvoiceStatus {
    let zero = BigDecimal::from(0);
    if new_balance <= &zero {
        InvoiceStatus::Paid
    } else if new_paid == &zero {
        InvoiceStatus::Pending
    } else {
        InvoiceStatus::Partial
    }
}

/// A refund can never directly produce `paid`.
fn status_after_refund(new_paid: &BigDecimal) -> InvoiceStatus {
    if new_paid <= &BigDecimal::from(0) {
        InvoiceStatus::Pending
    } else {
        InvoiceStatus::Partial
    }
}
