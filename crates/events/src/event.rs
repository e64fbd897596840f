use chrono::{DateTime, Utc};

/// A fact about a persisted ledger, procurement or DPR change.
///
/// Events are only raised after the repository write they describe has
/// succeeded, and they travel to the audit trail inside an
/// [`crate::EventEnvelope`]. The payload schema of an `event_type` is
/// identified by `version`.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Dotted identifier, e.g. `"procurement.receipt.accepted"`.
    fn event_type(&self) -> &'static str;

    fn version(&self) -> u32;

    /// Business time of the change.
    fn occurred_at(&self) -> DateTime<Utc>;
}
