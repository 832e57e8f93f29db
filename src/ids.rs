//! Identifier generation for ledger rows and synthesized provider references.

use chrono::Utc;
use uuid::Uuid;

/// Generate a row id of the form `<prefix>_<millis>_<random>`, e.g.
/// `pay_1760000000123_9f3c01ab2`. Globally unique per tenant via the random
/// suffix; the timestamp keeps ids roughly sortable for operators.
pub(crate) fn generate_id(prefix: &str) -> String {
    format!("{}_{}_{}", prefix, Utc::now().timestamp_millis(), suffix())
}

/// Synthesized provider transaction references (`CASH-<millis>-<random>`)
/// for providers that record locally instead of calling out.
pub(crate) fn provider_reference(prefix: &str) -> String {
    format!("{}-{}-{}", prefix, Utc::now().timestamp_millis(), suffix())
}

fn suffix() -> String {
    Uuid::new_v4().simple().to_string().chars().take(9).collect()
}
