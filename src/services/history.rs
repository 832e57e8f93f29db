//! Read paths for payment history and aggregate statistics.
//!
//! No write side effects. Reads run against the transactional store and
//! tolerate concurrent writers: each query sees a consistent point-in-time
//! snapshot, which is all the callers need.

use crate::database::payment_repository::{Payment, PaymentRepository};
use crate::database::refund_repository::{Refund, RefundRepository};
use crate::error::{CoreError, CoreResult};
use crate::providers::types::PaymentStatus;
use bigdecimal::BigDecimal;
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};
use std::sync::Arc;

const DEFAULT_PAGE_SIZE: i64 = 50;

/// Payment joined with its invoice number and customer name.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentHistoryEntry {
    pub id: String,
    pub tenant_id: String,
    pub customer_id: String,
    pub invoice_id: Option<String>,
    pub amount: BigDecimal,
    pub currency: String,
    pub payment_method: Option<String>,
    pub provider: String,
    pub provider_transaction_id: String,
    pub status: String,
    pub metadata: JsonValue,
    pub provider_response: JsonValue,
    pub invoice_number: Option<String>,
    pub customer_name: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Per-status counts and sums for a tenant.
#[derive(Debug, Clone, FromRow)]
pub struct StatusAggregate {
    pub status: String,
    pub count: i64,
    pub total_amount: BigDecimal,
}

#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub status: Option<PaymentStatus>,
}

pub struct PaymentHistoryService {
    pool: PgPool,
    payments: Arc<PaymentRepository>,
    refunds: Arc<RefundRepository>,
}

impl PaymentHistoryService {
    pub fn new(
        pool: PgPool,
        payments: Arc<PaymentRepository>,
        refunds: Arc<RefundRepository>,
    ) -> Self {
        Self {
            pool,
            payments,
            refunds,
        }
    }

    /// Payment history for a customer, newest first.
    pub async fn customer_payments(
        &self,
        tenant_id: &str,
        customer_id: &str,
        filter: HistoryFilter,
    ) -> CoreResult<Vec<PaymentHistoryEntry>> {
        let limit = filter.limit.unwrap_or(DEFAULT_PAGE_SIZE);
        let offset = filter.offset.unwrap_or(0);
        let status = filter.status.map(|s| s.as_db_str());

        sqlx::query_as::<_, PaymentHistoryEntry>(
            "SELECT p.id, p.tenant_id, p.customer_id, p.invoice_id, p.amount, p.currency, \
                    p.payment_method, p.provider, p.provider_transaction_id, p.status, \
                    p.metadata, p.provider_response, \
                    i.invoice_number, c.name AS customer_name, \
                    p.created_at, p.updated_at \
             FROM payments p \
             LEFT JOIN invoices i ON p.invoice_id = i.id \
             LEFT JOIN customers c ON p.customer_id = c.id \
             WHERE p.tenant_id = $1 AND p.customer_id = $2 \
               AND ($3::text IS NULL OR p.status = $3) \
             ORDER BY p.created_at DESC \
             LIMIT $4 OFFSET $5",
        )
        .bind(tenant_id)
        .bind(customer_id)
        .bind(status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::persistence)
    }

    /// Aggregate payment counts and sums grouped by status for a tenant.
    pub async fn payment_stats(&self, tenant_id: &str) -> CoreResult<Vec<StatusAggregate>> {
        sqlx::query_as::<_, StatusAggregate>(
            "SELECT status, COUNT(*) AS count, COALESCE(SUM(amount), 0) AS total_amount \
             FROM payments \
             WHERE tenant_id = $1 \
             GROUP BY status \
             ORDER BY status",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::persistence)
    }

    /// Tenant-scoped single payment lookup.
    pub async fn find_payment(
        &self,
        tenant_id: &str,
        payment_id: &str,
    ) -> CoreResult<Option<Payment>> {
        self.payments.find_for_tenant(payment_id, tenant_id).await
    }

    /// Refund trail for a payment, newest first.
    pub async fn refunds_for_payment(
        &self,
        tenant_id: &str,
        payment_id: &str,
    ) -> CoreResult<Vec<Refund>> {
        self.refunds.list_for_payment(tenant_id, payment_id).await
    }
}
