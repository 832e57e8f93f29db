use crate::error::{CoreError, CoreResult};
use bigdecimal::BigDecimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};

const INVOICE_COLUMNS: &str = "id, tenant_id, customer_id, invoice_number, total_amount, \
     paid_amount, balance, status, created_at, updated_at";

/// Invoice entity. Created upstream; this core mutates only the financial
/// fields (paid_amount, balance, status), and only through the reconciler.
#[derive(Debug, Clone, FromRow)]
pub struct Invoice {
    pub id: String,
    pub tenant_id: String,
    pub customer_id: Option<String>,
    pub invoice_number: Option<String>,
    pub total_amount: BigDecimal,
    pub paid_amount: BigDecimal,
    pub balance: BigDecimal,
    pub status: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// Repository for invoice financial fields.
pub struct InvoiceRepository {
    pool: PgPool,
}

impl InvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Load an invoice with a row lock. Concurrent reconciliations of the
    /// same invoice serialize here; the second transaction blocks until the
    /// first commits and then sees its result.
    pub async fn lock(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        invoice_id: &str,
    ) -> CoreResult<Option<Invoice>> {
        sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1 FOR UPDATE"
        ))
        .bind(invoice_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(CoreError::persistence)
    }

    /// Persist recomputed financials inside the caller's transaction.
    pub async fn update_financials(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        invoice_id: &str,
        paid_amount: &BigDecimal,
        balance: &BigDecimal,
        status: &str,
    ) -> CoreResult<Invoice> {
        sqlx::query_as::<_, Invoice>(&format!(
            "UPDATE invoices \
             SET paid_amount = $2, balance = $3, status = $4, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {INVOICE_COLUMNS}"
        ))
        .bind(invoice_id)
        .bind(paid_amount)
        .bind(balance)
        .bind(status)
        .fetch_one(&mut **tx)
        .await
        .map_err(CoreError::persistence)
    }

    /// Plain read, outside any reconciliation transaction.
    pub async fn find_by_id(&self, invoice_id: &str) -> CoreResult<Option<Invoice>> {
        sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1"
        ))
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::persistence)
    }
}
