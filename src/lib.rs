//! Payment and ledger reconciliation core for the field-sales platform.
//!
//! This crate owns the transactional heart of the billing stack: it accepts
//! payment requests across heterogeneous providers, keeps a consistent
//! financial trail (payments, failures, refunds), and reconciles invoice
//! balances so that money received never silently diverges from money
//! recorded. The HTTP surface, auth, and UI live in other services and
//! consume this crate as a library.

pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod providers;
pub mod services;

mod ids;

pub use error::{CoreError, CoreResult};
