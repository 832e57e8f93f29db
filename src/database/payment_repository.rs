use crate::error::{CoreError, CoreResult};
use crate::ids;
use bigdecimal::BigDecimal;
use serde_json::Value as JsonValue;
use sqlx::{FromRow, PgPool};

const PAYMENT_COLUMNS: &str = "id, tenant_id, customer_id, invoice_id, amount, currency, \
     payment_method, provider, provider_transaction_id, status, metadata, \
     provider_response, created_at, updated_at";

/// Payment entity. `status` holds the canonical db string; callers convert
/// through `PaymentStatus::from_db_str`.
#[derive(Debug, Clone, FromRow)]
pub struct Payment {
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
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Failed payment attempt. Append-only audit record.
#[derive(Debug, Clone, FromRow)]
pub struct PaymentFailure {
    pub id: String,
    pub tenant_id: Option<String>,
    pub customer_id: Option<String>,
    pub invoice_id: Option<String>,
    pub amount: Option<BigDecimal>,
    pub currency: Option<String>,
    pub provider: Option<String>,
    pub error_message: String,
    pub error_code: String,
    pub request_snapshot: JsonValue,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Insert parameters for a payment row.
#[derive(Debug, Clone)]
pub struct NewPayment {
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
}

/// Insert parameters for a failure row.
#[derive(Debug, Clone)]
pub struct NewPaymentFailure {
    pub tenant_id: Option<String>,
    pub customer_id: Option<String>,
    pub invoice_id: Option<String>,
    pub amount: Option<BigDecimal>,
    pub currency: Option<String>,
    pub provider: Option<String>,
    pub error_message: String,
    pub error_code: String,
    pub request_snapshot: JsonValue,
}

/// Repository for payments and payment failures. The only writer of both
/// tables apart from the refund processor's status flip.
pub struct PaymentRepository {
    pool: PgPool,
}

impl PaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_payment(&self, payment: &NewPayment) -> CoreResult<Payment> {
        sqlx::query_as::<_, Payment>(&format!(
            "INSERT INTO payments \
             (id, tenant_id, customer_id, invoice_id, amount, currency, payment_method, \
              provider, provider_transaction_id, status, metadata, provider_response) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(ids::generate_id("pay"))
        .bind(&payment.tenant_id)
        .bind(&payment.customer_id)
        .bind(&payment.invoice_id)
        .bind(&payment.amount)
        .bind(&payment.currency)
        .bind(&payment.payment_method)
        .bind(&payment.provider)
        .bind(&payment.provider_transaction_id)
        .bind(&payment.status)
        .bind(&payment.metadata)
        .bind(&payment.provider_response)
        .fetch_one(&self.pool)
        .await
        .map_err(CoreError::persistence)
    }

    /// Tenant isolation is enforced here, at the lookup, not post-hoc.
    pub async fn find_for_tenant(
        &self,
        payment_id: &str,
        tenant_id: &str,
    ) -> CoreResult<Option<Payment>> {
        sqlx::query_as::<_, Payment>(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1 AND tenant_id = $2"
        ))
        .bind(payment_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::persistence)
    }

    /// Flip a payment to `refunded`. Single-writer transition owned by the
    /// refund processor; the payment was verified `completed` beforehand.
    pub async fn mark_refunded(&self, payment_id: &str) -> CoreResult<Payment> {
        sqlx::query_as::<_, Payment>(&format!(
            "UPDATE payments SET status = 'refunded', updated_at = NOW() \
             WHERE id = $1 RETURNING {PAYMENT_COLUMNS}"
        ))
        .bind(payment_id)
        .fetch_one(&self.pool)
        .await
        .map_err(CoreError::persistence)
    }

    pub async fn insert_failure(
        &self,
        failure: &NewPaymentFailure,
    ) -> CoreResult<PaymentFailure> {
        sqlx::query_as::<_, PaymentFailure>(
            "INSERT INTO payment_failures \
             (id, tenant_id, customer_id, invoice_id, amount, currency, provider, \
              error_message, error_code, request_snapshot) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING id, tenant_id, customer_id, invoice_id, amount, currency, provider, \
                       error_message, error_code, request_snapshot, created_at",
        )
        .bind(ids::generate_id("fail"))
        .bind(&failure.tenant_id)
        .bind(&failure.customer_id)
        .bind(&failure.invoice_id)
        .bind(&failure.amount)
        .bind(&failure.currency)
        .bind(&failure.provider)
        .bind(&failure.error_message)
        .bind(&failure.error_code)
        .bind(&failure.request_snapshot)
        .fetch_one(&self.pool)
        .await
        .map_err(CoreError::persistence)
    }
}
