//! Shared building blocks for the reconciliation engine.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the caller identity attached to records, the error taxonomy and
//! the optimistic-concurrency contract used by every repository.

pub mod actor;
pub mod aggregate;
pub mod error;
pub mod id;
pub mod quantity;

pub use actor::Actor;
pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, ProjectId, UserId, VendorId};
