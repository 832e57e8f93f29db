//! End-to-end tests for the payment core against a real PostgreSQL.
//!
//! A single shared container backs all tests; each test works in its own
//! tenant so the suite can run in parallel. Run with:
//!
//! ```bash
//! cargo test --test payment_core_integration
//! ```

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use fieldpay_core::database::invoice_repository::InvoiceRepository;
use fieldpay_core::database::payment_repository::PaymentRepository;
use fieldpay_core::database::refund_repository::RefundRepository;
use fieldpay_core::error::CoreError;
use fieldpay_core::providers::{
    CardGateway, ChargeRequest, PaymentStatus, ProviderAdapters, ProviderOutcome, ReversalOutcome,
};
use fieldpay_core::services::{
    HistoryFilter, InvoiceReconciler, PaymentHistoryService, PaymentRecorder, PaymentRequest,
    RefundProcessor, RefundRequest,
};
use sqlx::PgPool;
use testcontainers::{runners::AsyncRunner, ContainerAsync};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();
            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!("../migrations/001_payment_core.sql"))
                .execute(&temp_pool)
                .await
                .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

async fn fresh_pool() -> PgPool {
    let info = get_container_info().await;
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(10)
        .connect(&info.connection_string)
        .await
        .unwrap()
}

/// Card gateway double that approves everything and counts calls.
#[derive(Default)]
struct ApprovingCardGateway {
    charges: AtomicUsize,
    reversals: AtomicUsize,
}

#[async_trait]
impl CardGateway for ApprovingCardGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<ProviderOutcome, CoreError> {
        let n = self.charges.fetch_add(1, Ordering::SeqCst);
        let id = format!("ch_test_{}", n);
        Ok(ProviderOutcome {
            transaction_id: id.clone(),
            status: PaymentStatus::Completed,
            raw: serde_json::json!({
                "id": id,
                "status": "succeeded",
                "amount": request.amount.to_string(),
                "currency": request.currency,
            }),
        })
    }

    async fn reverse(
        &self,
        _provider_transaction_id: &str,
        _amount: &BigDecimal,
    ) -> Result<ReversalOutcome, CoreError> {
        let n = self.reversals.fetch_add(1, Ordering::SeqCst);
        Ok(ReversalOutcome {
            provider_refund_id: format!("re_test_{}", n),
            status: PaymentStatus::Completed,
        })
    }
}

/// Card gateway double that declines every charge.
struct DecliningCardGateway;

#[async_trait]
impl CardGateway for DecliningCardGateway {
    async fn charge(&self, _request: &ChargeRequest) -> Result<ProviderOutcome, CoreError> {
        Err(CoreError::Provider {
            provider: "card".to_string(),
            message: "card declined".to_string(),
            retryable: false,
        })
    }

    async fn reverse(
        &self,
        _provider_transaction_id: &str,
        _amount: &BigDecimal,
    ) -> Result<ReversalOutcome, CoreError> {
        Err(CoreError::Provider {
            provider: "card".to_string(),
            message: "reversal declined".to_string(),
            retryable: false,
        })
    }
}

struct TestCore {
    pool: PgPool,
    recorder: PaymentRecorder,
    refund_processor: RefundProcessor,
    reconciler: Arc<InvoiceReconciler>,
    history: PaymentHistoryService,
}

async fn build_core(gateway: Arc<dyn CardGateway>) -> TestCore {
    let pool = fresh_pool().await;
    let payments = Arc::new(PaymentRepository::new(pool.clone()));
    let refunds = Arc::new(RefundRepository::new(pool.clone()));
    let reconciler = Arc::new(InvoiceReconciler::new(InvoiceRepository::new(pool.clone())));
    let adapters = ProviderAdapters::new(gateway);

    let recorder = PaymentRecorder::new(adapters.clone(), payments.clone(), reconciler.clone());
    let refund_processor = RefundProcessor::new(
        adapters,
        payments.clone(),
        refunds.clone(),
        reconciler.clone(),
    );
    let history = PaymentHistoryService::new(pool.clone(), payments, refunds);

    TestCore {
        pool,
        recorder,
        refund_processor,
        reconciler,
        history,
    }
}

async fn test_core() -> (TestCore, Arc<ApprovingCardGateway>) {
    let gateway = Arc::new(ApprovingCardGateway::default());
    let core = build_core(gateway.clone()).await;
    (core, gateway)
}

fn uid(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

fn dec(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

async fn seed_customer(pool: &PgPool, tenant_id: &str, customer_id: &str, name: &str) {
    sqlx::query("INSERT INTO customers (id, tenant_id, name) VALUES ($1, $2, $3)")
        .bind(customer_id)
        .bind(tenant_id)
        .bind(name)
        .execute(pool)
        .await
        .unwrap();
}

async fn seed_invoice(
    pool: &PgPool,
    tenant_id: &str,
    invoice_id: &str,
    customer_id: Option<&str>,
    invoice_number: &str,
    total: &str,
) {
    sqlx::query(
        "INSERT INTO invoices \
         (id, tenant_id, customer_id, invoice_number, total_amount, paid_amount, balance, status) \
         VALUES ($1, $2, $3, $4, $5, 0, $6, 'pending')",
    )
    .bind(invoice_id)
    .bind(tenant_id)
    .bind(customer_id)
    .bind(invoice_number)
    .bind(dec(total))
    .bind(dec(total))
    .execute(pool)
    .await
    .unwrap();
}

fn payment_request(
    tenant_id: &str,
    customer_id: &str,
    invoice_id: Option<&str>,
    amount: &str,
    provider: &str,
) -> PaymentRequest {
    PaymentRequest {
        tenant_id: tenant_id.to_string(),
        customer_id: customer_id.to_string(),
        invoice_id: invoice_id.map(str::to_string),
        amount: dec(amount),
        currency: "USD".to_string(),
        provider: provider.to_string(),
        payment_method: None,
        metadata: serde_json::json!({}),
    }
}

async fn count_rows(pool: &PgPool, table: &str, tenant_id: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(&format!(
        "SELECT COUNT(*) FROM {} WHERE tenant_id = $1",
        table
    ))
    .bind(tenant_id)
    .fetch_one(pool)
    .await
    .unwrap()
}

// ---------------------------------------------------------------------------
// Payment recording and reconciliation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn payments_accumulate_until_invoice_is_paid() {
    let (core, _) = test_core().await;
    let tenant = uid("tenant");
    let invoice = uid("inv");
    seed_invoice(&core.pool, &tenant, &invoice, None, "INV-1001", "100").await;

    // 40 against 100 -> partial
    let receipt = core
        .recorder
        .process_payment(payment_request(&tenant, "cust-1", Some(&invoice), "40", "cash"))
        .await
        .unwrap();
    assert_eq!(receipt.payment.status, "completed");
    let state = receipt.invoice.expect("invoice state in receipt");
    assert_eq!(state.paid_amount, dec("40"));
    assert_eq!(state.balance, dec("60"));
    assert_eq!(state.status, "partial");
    assert_eq!(&state.paid_amount + &state.balance, state.total_amount);

    // the remaining 60 -> paid
    let receipt = core
        .recorder
        .process_payment(payment_request(&tenant, "cust-1", Some(&invoice), "60", "cash"))
        .await
        .unwrap();
    let state = receipt.invoice.expect("invoice state in receipt");
    assert_eq!(state.paid_amount, dec("100"));
    assert_eq!(state.balance, dec("0"));
    assert_eq!(state.status, "paid");
    assert_eq!(&state.paid_amount + &state.balance, state.total_amount);
}

#[tokio::test]
async fn overpayment_still_marks_invoice_paid() {
    let (core, _) = test_core().await;
    let tenant = uid("tenant");
    let invoice = uid("inv");
    seed_invoice(&core.pool, &tenant, &invoice, None, "INV-1002", "100").await;

    let receipt = core
        .recorder
        .process_payment(payment_request(&tenant, "cust-1", Some(&invoice), "120", "cash"))
        .await
        .unwrap();
    let state = receipt.invoice.unwrap();
    assert_eq!(state.status, "paid");
    assert_eq!(state.balance, dec("-20"));
    assert_eq!(&state.paid_amount + &state.balance, state.total_amount);
}

#[tokio::test]
async fn check_payment_is_recorded_pending_and_still_reconciles() {
    let (core, _) = test_core().await;
    let tenant = uid("tenant");
    let invoice = uid("inv");
    seed_invoice(&core.pool, &tenant, &invoice, None, "INV-1003", "200").await;

    let mut request = payment_request(&tenant, "cust-1", Some(&invoice), "50", "check");
    request.metadata = serde_json::json!({"checkNumber": "0042", "bankName": "First Field Bank"});

    let receipt = core.recorder.process_payment(request).await.unwrap();
    assert_eq!(receipt.payment.status, "pending");
    assert!(receipt.payment.provider_transaction_id.starts_with("CHECK-"));
    assert_eq!(receipt.payment.provider_response["checkNumber"], "0042");

    let state = receipt.invoice.unwrap();
    assert_eq!(state.paid_amount, dec("50"));
    assert_eq!(state.status, "partial");
}

#[tokio::test]
async fn payment_without_invoice_skips_reconciliation() {
    let (core, _) = test_core().await;
    let tenant = uid("tenant");

    let receipt = core
        .recorder
        .process_payment(payment_request(&tenant, "cust-1", None, "25", "cash"))
        .await
        .unwrap();
    assert!(receipt.invoice.is_none());
    assert_eq!(receipt.payment.status, "completed");
}

#[tokio::test]
async fn card_payment_records_verbatim_provider_response() {
    let (core, gateway) = test_core().await;
    let tenant = uid("tenant");

    let receipt = core
        .recorder
        .process_payment(payment_request(&tenant, "cust-1", None, "75", "card"))
        .await
        .unwrap();
    assert_eq!(gateway.charges.load(Ordering::SeqCst), 1);
    assert_eq!(receipt.payment.status, "completed");
    assert_eq!(receipt.payment.provider_response["status"], "succeeded");
    assert_eq!(
        receipt.payment.provider_transaction_id,
        receipt.transaction.transaction_id
    );
}

// ---------------------------------------------------------------------------
// Failure recording
// ---------------------------------------------------------------------------

#[tokio::test]
async fn zero_amount_fails_validation_before_any_provider_call() {
    let (core, gateway) = test_core().await;
    let tenant = uid("tenant");

    let err = core
        .recorder
        .process_payment(payment_request(&tenant, "cust-1", None, "0", "card"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));
    assert_eq!(gateway.charges.load(Ordering::SeqCst), 0);

    assert_eq!(count_rows(&core.pool, "payments", &tenant).await, 0);
    assert_eq!(count_rows(&core.pool, "payment_failures", &tenant).await, 1);

    let code = sqlx::query_scalar::<_, String>(
        "SELECT error_code FROM payment_failures WHERE tenant_id = $1",
    )
    .bind(&tenant)
    .fetch_one(&core.pool)
    .await
    .unwrap();
    assert_eq!(code, "VALIDATION_ERROR");
}

#[tokio::test]
async fn declined_charge_records_exactly_one_failure_row() {
    let core = build_core(Arc::new(DecliningCardGateway)).await;
    let tenant = uid("tenant");

    let err = core
        .recorder
        .process_payment(payment_request(&tenant, "cust-1", None, "75", "card"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Provider { .. }));

    assert_eq!(count_rows(&core.pool, "payments", &tenant).await, 0);
    assert_eq!(count_rows(&core.pool, "payment_failures", &tenant).await, 1);
}

#[tokio::test]
async fn unknown_provider_is_rejected_and_recorded() {
    let (core, _) = test_core().await;
    let tenant = uid("tenant");

    let err = core
        .recorder
        .process_payment(payment_request(&tenant, "cust-1", None, "10", "crypto"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::UnsupportedProvider { .. }));

    let code = sqlx::query_scalar::<_, String>(
        "SELECT error_code FROM payment_failures WHERE tenant_id = $1",
    )
    .bind(&tenant)
    .fetch_one(&core.pool)
    .await
    .unwrap();
    assert_eq!(code, "UNSUPPORTED_PROVIDER");
}

// ---------------------------------------------------------------------------
// Refunds
// ---------------------------------------------------------------------------

#[tokio::test]
async fn refund_reverses_invoice_and_flips_payment() {
    let (core, _) = test_core().await;
    let tenant = uid("tenant");
    let invoice = uid("inv");
    seed_invoice(&core.pool, &tenant, &invoice, None, "INV-2001", "100").await;

    let receipt = core
        .recorder
        .process_payment(payment_request(&tenant, "cust-1", Some(&invoice), "100", "card"))
        .await
        .unwrap();
    assert_eq!(receipt.invoice.as_ref().unwrap().status, "paid");

    let refund = core
        .refund_processor
        .create_refund(RefundRequest {
            tenant_id: tenant.clone(),
            payment_id: receipt.payment.id.clone(),
            amount: dec("30"),
            reason: Some("damaged goods".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(refund.refund.status, "completed");
    assert_eq!(refund.refund.amount, dec("30"));

    let payment = core
        .history
        .find_payment(&tenant, &receipt.payment.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, "refunded");

    let invoice_row = sqlx::query_as::<_, (BigDecimal, BigDecimal, String)>(
        "SELECT paid_amount, balance, status FROM invoices WHERE id = $1",
    )
    .bind(&invoice)
    .fetch_one(&core.pool)
    .await
    .unwrap();
    assert_eq!(invoice_row.0, dec("70"));
    assert_eq!(invoice_row.1, dec("30"));
    assert_eq!(invoice_row.2, "partial");
}

#[tokio::test]
async fn refund_of_pending_payment_is_rejected_without_a_row() {
    let (core, _) = test_core().await;
    let tenant = uid("tenant");

    // check payments stay pending until cleared
    let receipt = core
        .recorder
        .process_payment(payment_request(&tenant, "cust-1", None, "50", "check"))
        .await
        .unwrap();
    assert_eq!(receipt.payment.status, "pending");

    let err = core
        .refund_processor
        .create_refund(RefundRequest {
            tenant_id: tenant.clone(),
            payment_id: receipt.payment.id.clone(),
            amount: dec("10"),
            reason: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidRefundState { .. }));

    let refunds = core
        .history
        .refunds_for_payment(&tenant, &receipt.payment.id)
        .await
        .unwrap();
    assert!(refunds.is_empty());
}

#[tokio::test]
async fn cash_refund_synthesizes_pending_manual_marker() {
    let (core, _) = test_core().await;
    let tenant = uid("tenant");

    let receipt = core
        .recorder
        .process_payment(payment_request(&tenant, "cust-1", None, "80", "cash"))
        .await
        .unwrap();

    let refund = core
        .refund_processor
        .create_refund(RefundRequest {
            tenant_id: tenant.clone(),
            payment_id: receipt.payment.id.clone(),
            amount: dec("80"),
            reason: Some("order cancelled".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(refund.refund.status, "pending");
    assert!(refund.refund.provider_refund_id.starts_with("REFUND-"));
}

#[tokio::test]
async fn refund_exceeding_payment_amount_is_rejected() {
    let (core, _) = test_core().await;
    let tenant = uid("tenant");

    let receipt = core
        .recorder
        .process_payment(payment_request(&tenant, "cust-1", None, "50", "cash"))
        .await
        .unwrap();

    let err = core
        .refund_processor
        .create_refund(RefundRequest {
            tenant_id: tenant.clone(),
            payment_id: receipt.payment.id.clone(),
            amount: dec("80"),
            reason: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::Validation { .. }));

    let refunds = core
        .history
        .refunds_for_payment(&tenant, &receipt.payment.id)
        .await
        .unwrap();
    assert!(refunds.is_empty());
}

#[tokio::test]
async fn refunded_payment_cannot_be_refunded_again() {
    let (core, _) = test_core().await;
    let tenant = uid("tenant");

    let receipt = core
        .recorder
        .process_payment(payment_request(&tenant, "cust-1", None, "100", "cash"))
        .await
        .unwrap();

    core.refund_processor
        .create_refund(RefundRequest {
            tenant_id: tenant.clone(),
            payment_id: receipt.payment.id.clone(),
            amount: dec("30"),
            reason: None,
        })
        .await
        .unwrap();

    let err = core
        .refund_processor
        .create_refund(RefundRequest {
            tenant_id: tenant.clone(),
            payment_id: receipt.payment.id.clone(),
            amount: dec("30"),
            reason: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidRefundState { .. }));

    // the over-refund invariant holds: one recorded refund, within the amount
    let refunds = core
        .history
        .refunds_for_payment(&tenant, &receipt.payment.id)
        .await
        .unwrap();
    assert_eq!(refunds.len(), 1);
    assert!(refunds[0].amount <= receipt.payment.amount);
}

#[tokio::test]
async fn refund_lookup_is_tenant_scoped() {
    let (core, _) = test_core().await;
    let tenant = uid("tenant");
    let other_tenant = uid("tenant");

    let receipt = core
        .recorder
        .process_payment(payment_request(&tenant, "cust-1", None, "40", "cash"))
        .await
        .unwrap();

    let err = core
        .refund_processor
        .create_refund(RefundRequest {
            tenant_id: other_tenant,
            payment_id: receipt.payment.id.clone(),
            amount: dec("40"),
            reason: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::PaymentNotFound { .. }));
}

// ---------------------------------------------------------------------------
// Reconciler edge cases and concurrency
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reconciling_a_missing_invoice_fails_for_payments_and_noops_for_refunds() {
    let (core, _) = test_core().await;

    let err = core
        .reconciler
        .apply_payment("no-such-invoice", &dec("10"))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvoiceNotFound { .. }));

    let result = core
        .reconciler
        .apply_refund("no-such-invoice", &dec("10"))
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn concurrent_payment_applications_lose_no_updates() {
    let (core, _) = test_core().await;
    let tenant = uid("tenant");
    let invoice = uid("inv");
    seed_invoice(&core.pool, &tenant, &invoice, None, "INV-3001", "1000").await;

    let tasks: Vec<_> = (0..10)
        .map(|_| {
            let reconciler = core.reconciler.clone();
            let invoice = invoice.clone();
            tokio::spawn(async move { reconciler.apply_payment(&invoice, &dec("10")).await })
        })
        .collect();

    for result in futures::future::join_all(tasks).await {
        result.unwrap().unwrap();
    }

    let invoice_row = sqlx::query_as::<_, (BigDecimal, BigDecimal, BigDecimal)>(
        "SELECT total_amount, paid_amount, balance FROM invoices WHERE id = $1",
    )
    .bind(&invoice)
    .fetch_one(&core.pool)
    .await
    .unwrap();
    assert_eq!(invoice_row.1, dec("100"));
    assert_eq!(&invoice_row.1 + &invoice_row.2, invoice_row.0);
}

// ---------------------------------------------------------------------------
// History and stats
// ---------------------------------------------------------------------------

#[tokio::test]
async fn history_joins_invoice_and_customer_context_newest_first() {
    let (core, _) = test_core().await;
    let tenant = uid("tenant");
    let customer = uid("cust");
    let invoice = uid("inv");
    seed_customer(&core.pool, &tenant, &customer, "Okafor Trading").await;
    seed_invoice(&core.pool, &tenant, &invoice, Some(&customer), "INV-4001", "500").await;

    core.recorder
        .process_payment(payment_request(&tenant, &customer, Some(&invoice), "40", "cash"))
        .await
        .unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    core.recorder
        .process_payment(payment_request(&tenant, &customer, Some(&invoice), "60", "check"))
        .await
        .unwrap();

    let entries = core
        .history
        .customer_payments(&tenant, &customer, HistoryFilter::default())
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    // newest first: the check payment came last
    assert_eq!(entries[0].provider, "check");
    assert_eq!(entries[0].invoice_number.as_deref(), Some("INV-4001"));
    assert_eq!(entries[0].customer_name.as_deref(), Some("Okafor Trading"));
    assert!(entries[0].created_at >= entries[1].created_at);

    // status filter narrows to the pending check payment
    let pending_only = core
        .history
        .customer_payments(
            &tenant,
            &customer,
            HistoryFilter {
                status: Some(PaymentStatus::Pending),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(pending_only.len(), 1);
    assert_eq!(pending_only[0].provider, "check");

    // limit caps the page
    let limited = core
        .history
        .customer_payments(
            &tenant,
            &customer,
            HistoryFilter {
                limit: Some(1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn stats_group_by_status_and_are_idempotent() {
    let (core, _) = test_core().await;
    let tenant = uid("tenant");

    core.recorder
        .process_payment(payment_request(&tenant, "cust-1", None, "40", "cash"))
        .await
        .unwrap();
    core.recorder
        .process_payment(payment_request(&tenant, "cust-1", None, "60", "cash"))
        .await
        .unwrap();
    core.recorder
        .process_payment(payment_request(&tenant, "cust-2", None, "25", "check"))
        .await
        .unwrap();

    let first = core.history.payment_stats(&tenant).await.unwrap();
    let second = core.history.payment_stats(&tenant).await.unwrap();

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.status, b.status);
        assert_eq!(a.count, b.count);
        assert_eq!(a.total_amount, b.total_amount);
    }

    let completed = first.iter().find(|a| a.status == "completed").unwrap();
    assert_eq!(completed.count, 2);
    assert_eq!(completed.total_amount, dec("100"));
    let pending = first.iter().find(|a| a.status == "pending").unwrap();
    assert_eq!(pending.count, 1);
    assert_eq!(pending.total_amount, dec("25"));
}
