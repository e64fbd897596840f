use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use siteledger_core::ProjectId;
use siteledger_events::Event;

use crate::order::{PurchaseOrderId, PurchaseOrderStatus};
use crate::receipt::GoodsReceiptId;

/// Event: PurchaseOrderIssued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderIssued {
    pub order_id: PurchaseOrderId,
    pub po_number: String,
    pub project_id: ProjectId,
    pub total: f64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PurchaseOrderStatusChanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderStatusChanged {
    pub order_id: PurchaseOrderId,
    pub from: PurchaseOrderStatus,
    pub to: PurchaseOrderStatus,
    pub occurred_at: DateTime<Utc>,
}

/// Event: GoodsReceiptAccepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoodsReceiptAccepted {
    pub receipt_id: GoodsReceiptId,
    pub grn_number: String,
    pub order_id: PurchaseOrderId,
    pub line_count: usize,
    /// Lines whose ledger update did not go through.
    pub sync_failures: usize,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProcurementEvent {
    PurchaseOrderIssued(PurchaseOrderIssued),
    PurchaseOrderStatusChanged(PurchaseOrderStatusChanged),
    GoodsReceiptAccepted(GoodsReceiptAccepted),
}

impl Event for ProcurementEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProcurementEvent::PurchaseOrderIssued(_) => "procurement.order.issued",
            ProcurementEvent::PurchaseOrderStatusChanged(_) => "procurement.order.status_changed",
            ProcurementEvent::GoodsReceiptAccepted(_) => "procurement.receipt.accepted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProcurementEvent::PurchaseOrderIssued(e) => e.occurred_at,
            ProcurementEvent::PurchaseOrderStatusChanged(e) => e.occurred_at,
            ProcurementEvent::GoodsReceiptAccepted(e) => e.occurred_at,
        }
    }
}

impl ProcurementEvent {
    /// The purchase order the event belongs to.
    pub fn order_id(&self) -> PurchaseOrderId {
        match self {
            ProcurementEvent::PurchaseOrderIssued(e) => e.order_id,
            ProcurementEvent::PurchaseOrderStatusChanged(e) => e.order_id,
            ProcurementEvent::GoodsReceiptAccepted(e) => e.order_id,
        }
    }
}
