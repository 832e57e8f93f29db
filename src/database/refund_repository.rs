use crate::error::{CoreError, CoreResult};
use crate::ids;
use bigdecimal::BigDecimal;
use sqlx::{FromRow, PgPool};

const REFUND_COLUMNS: &str = "id, tenant_id, payment_id, invoice_id, amount, reason, \
     provider_refund_id, status, created_at, updated_at";

/// Refund entity. One row per refund attempt against a payment.
#[derive(Debug, Clone, FromRow)]
pub struct Refund {
    pub id: String,
    pub tenant_id: String,
    pub payment_id: String,
    pub invoice_id: Option<String>,
    pub amount: BigDecimal,
    pub reason: Option<String>,
    pub provider_refund_id: String,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRefund {
    pub tenant_id: String,
    pub payment_id: String,
    pub invoice_id: Option<String>,
    pub amount: BigDecimal,
    pub reason: Option<String>,
    pub provider_refund_id: String,
    pub status: String,
}

/// Repository for refunds. Only the refund processor writes here.
pub struct RefundRepository {
    pool: PgPool,
}

impl RefundRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_refund(&self, refund: &NewRefund) -> CoreResult<Refund> {
        sqlx::query_as::<_, Refund>(&format!(
            "INSERT INTO refunds \
             (id, tenant_id, payment_id, invoice_id, amount, reason, provider_refund_id, status) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {REFUND_COLUMNS}"
        ))
        .bind(ids::generate_id("ref"))
        .bind(&refund.tenant_id)
        .bind(&refund.payment_id)
        .bind(&refund.invoice_id)
        .bind(&refund.amount)
        .bind(&refund.reason)
        .bind(&refund.provider_refund_id)
        .bind(&refund.status)
        .fetch_one(&self.pool)
        .await
        .map_err(CoreError::persistence)
    }

    /// Total amount already refunded against a payment, across all recorded
    /// refund attempts. Backs the over-refund guard.
    pub async fn total_refunded(&self, payment_id: &str) -> CoreResult<BigDecimal> {
        sqlx::query_scalar::<_, BigDecimal>(
            "SELECT COALESCE(SUM(amount), 0) FROM refunds WHERE payment_id = $1",
        )
        .bind(payment_id)
        .fetch_one(&self.pool)
        .await
        .map_err(CoreError::persistence)
    }

    pub async fn list_for_payment(
        &self,
        tenant_id: &str,
        payment_id: &str,
    ) -> CoreResult<Vec<Refund>> {
        sqlx::query_as::<_, Refund>(&format!(
            "SELECT {REFUND_COLUMNS} FROM refunds \
             WHERE tenant_id = $1 AND payment_id = $2 \
             ORDER BY created_at DESC"
        ))
        .bind(tenant_id)
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::persistence)
    }
}
