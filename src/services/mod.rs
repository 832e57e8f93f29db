//! Service layer: the four components of the payment core.

pub mod history;
pub mod reconciler;
pub mod recorder;
pub mod refund;

pub use history::{HistoryFilter, PaymentHistoryEntry, PaymentHistoryService, StatusAggregate};
pub use reconciler::InvoiceReconciler;
pub use recorder::{PaymentReceipt, PaymentRecorder, PaymentRequest};
pub use refund::{RefundProcessor, RefundReceipt, RefundRequest};
