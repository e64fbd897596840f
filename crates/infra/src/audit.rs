//! Fire-and-forget audit dispatch.
//!
//! Services publish an [`AuditRecord`] after a mutation has been persisted.
//! Publishing never fails the caller: serialization or bus errors are logged
//! and dropped. A background [`AuditWorker`] drains the bus and writes each
//! record to the `audit` tracing target.

use std::sync::{Arc, mpsc};
use std::thread;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use siteledger_core::{Actor, AggregateId};
use siteledger_events::{Event, EventBus, EventEnvelope, Subscription};

pub type AuditRecord = EventEnvelope<JsonValue>;

/// Anything that can carry audit records (usually an event bus).
pub trait AuditSink: Send + Sync {
    fn deliver(&self, record: AuditRecord) -> Result<(), String>;
}

impl<B> AuditSink for B
where
    B: EventBus<AuditRecord>,
{
    fn deliver(&self, record: AuditRecord) -> Result<(), String> {
        EventBus::publish(self, record).map_err(|e| format!("{e:?}"))
    }
}

/// Best-effort audit publisher shared by the engine services.
#[derive(Clone)]
pub struct AuditTrail {
    sink: Option<Arc<dyn AuditSink>>,
}

impl core::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuditTrail")
            .field("enabled", &self.sink.is_some())
            .finish()
    }
}

impl AuditTrail {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink: Some(sink) }
    }

    /// Trail that drops every record.
    pub fn disabled() -> Self {
        Self { sink: None }
    }

    pub fn record<E>(&self, actor: &Actor, aggregate_id: AggregateId, aggregate_type: &str, event: &E)
    where
        E: Event + Serialize,
    {
        let Some(sink) = &self.sink else {
            return;
        };

        let record = match EventEnvelope::from_typed(actor.clone(), aggregate_id, aggregate_type, event) {
            Ok(r) => r,
            Err(err) => {
                warn!(event_type = event.event_type(), error = %err, "audit record serialization failed");
                return;
            }
        };

        if let Err(err) = sink.deliver(record) {
            warn!(event_type = event.event_type(), error = %err, "audit publish failed");
        }
    }
}

/// Handle to control and join the audit worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
}

impl WorkerHandle {
    /// Request graceful shutdown and wait for the worker to stop.
    pub fn shutdown(mut self) {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}

/// Background consumer that logs audit records.
#[derive(Debug)]
pub struct AuditWorker;

impl AuditWorker {
    /// Subscribe to `bus` and spawn the draining thread.
    ///
    /// The subscription is taken before this returns, so nothing published
    /// afterwards is missed.
    pub fn spawn<B>(bus: &B) -> std::io::Result<WorkerHandle>
    where
        B: EventBus<AuditRecord>,
    {
        Self::spawn_with(bus, |record| {
            info!(
                target: "audit",
                event_id = %record.event_id(),
                event_type = record.event_type(),
                aggregate_type = record.aggregate_type(),
                aggregate_id = %record.aggregate_id(),
                actor_id = %record.actor().id,
                actor_name = %record.actor().name,
                occurred_at = %record.occurred_at(),
                payload = %record.payload(),
                "audit"
            );
        })
    }

    /// Like [`AuditWorker::spawn`] with a custom handler.
    pub fn spawn_with<B, H>(bus: &B, mut handler: H) -> std::io::Result<WorkerHandle>
    where
        B: EventBus<AuditRecord>,
        H: FnMut(AuditRecord) + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let sub: Subscription<AuditRecord> = bus.subscribe();

        let join = thread::Builder::new()
            .name("audit-worker".to_string())
            .spawn(move || worker_loop(sub, shutdown_rx, &mut handler))?;

        Ok(WorkerHandle {
            shutdown: shutdown_tx,
            join: Some(join),
        })
    }
}

fn worker_loop<H>(sub: Subscription<AuditRecord>, shutdown_rx: mpsc::Receiver<()>, handler: &mut H)
where
    H: FnMut(AuditRecord),
{
    let tick = Duration::from_millis(250);

    loop {
        if shutdown_rx.try_recv().is_ok() {
            // Drain what is already queued before stopping.
            while let Ok(record) = sub.try_recv() {
                handler(record);
            }
            break;
        }

        match sub.recv_timeout(tick) {
            Ok(record) => handler(record),
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }
}
