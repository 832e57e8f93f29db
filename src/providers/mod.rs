//! Provider adapter layer.
//!
//! Translates heterogeneous payment channels (card processor, cash, check,
//! bank transfer) into one canonical outcome vocabulary. Nothing in this
//! layer persists state; the recorder and refund processor own the trail.

pub mod adapter;
pub mod card;
pub mod types;

pub use adapter::{ProviderAdapter, ProviderAdapters};
pub use card::{CardGateway, CardProcessorClient, CardProcessorConfig};
pub use types::{
    ChargeRequest, InvoiceStatus, PaymentStatus, Provider, ProviderOutcome, RefundStatus,
    ReversalOutcome,
};
