//! Domain events and their best-effort distribution.
//!
//! Domain crates describe *what happened* with types implementing [`Event`];
//! infrastructure wraps them in an [`EventEnvelope`] and fans them out over an
//! [`EventBus`] to consumers such as the audit trail.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
