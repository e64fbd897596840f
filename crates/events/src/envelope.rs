use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use siteledger_core::{Actor, AggregateId};

use crate::event::Event;

/// Envelope for an event, carrying who did it and which document it touched.
///
/// This is the unit handed to the bus. `payload` is usually the event
/// serialized to JSON so consumers do not need the domain types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope<P> {
    event_id: Uuid,
    actor: Actor,

    aggregate_id: AggregateId,
    aggregate_type: String,

    event_type: String,
    event_version: u32,
    occurred_at: DateTime<Utc>,

    payload: P,
}

impl<P> EventEnvelope<P> {
    pub fn new(
        actor: Actor,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_type: impl Into<String>,
        event_version: u32,
        occurred_at: DateTime<Utc>,
        payload: P,
    ) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            actor,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event_type.into(),
            event_version,
            occurred_at,
            payload,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn event_version(&self) -> u32 {
        self.event_version
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn into_payload(self) -> P {
        self.payload
    }
}

impl EventEnvelope<serde_json::Value> {
    /// Wrap a typed domain event, serializing it to JSON.
    pub fn from_typed<E>(
        actor: Actor,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event: &E,
    ) -> Result<Self, serde_json::Error>
    where
        E: Event + Serialize,
    {
        let payload = serde_json::to_value(event)?;
        Ok(Self::new(
            actor,
            aggregate_id,
            aggregate_type,
            event.event_type(),
            event.version(),
            event.occurred_at(),
            payload,
        ))
    }
}
