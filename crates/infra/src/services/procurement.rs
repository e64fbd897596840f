//! Purchase orders and goods receipts.
//!
//! Receiving is the one multi-step pipeline in the engine:
//!
//! ```text
//! load PO + receipt stream -> ReceivedTotals::check -> reserve GRN number
//!   -> append (expects the stream length and order version that were checked)
//!   -> post each line to inventory (failures are reported, never undone)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use tracing::info;

use siteledger_core::{Actor, AggregateId, AggregateRoot, DomainError, ExpectedVersion, UserId};
use siteledger_purchasing::{
    DocumentKind, DocumentPeriod, GoodsReceipt, GoodsReceiptAccepted, GoodsReceiptId, LineMatch,
    NewPurchaseOrder, ProcurementEvent, PurchaseOrder, PurchaseOrderId, PurchaseOrderIssued,
    PurchaseOrderStatus, PurchaseOrderStatusChanged, ReceiptStatus, ReceiptSubmission,
    ReceivedTotals, line_summaries,
};

use super::ledger_sync::{self, LineSyncOutcome};
use super::{AttemptError, EngineContext, retry_on_conflict};
use crate::error::ServiceResult;
use crate::repository::PurchaseOrderFilter;

const ORDER_AGGREGATE: &str = "procurement.purchase_order";

/// Purchase order with its receiving progress per line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchaseOrderDetail {
    #[serde(flatten)]
    pub order: PurchaseOrder,
    pub line_status: Vec<LineMatch>,
}

/// Result of an accepted goods receipt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiptOutcome {
    pub receipt: GoodsReceipt,
    /// Receiving progress of the order after this receipt.
    pub line_status: Vec<LineMatch>,
    pub inventory_sync: Vec<LineSyncOutcome>,
}

/// Receipt listing row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiptSummary {
    #[serde(flatten)]
    pub receipt: GoodsReceipt,
    pub po_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiptDetailLine {
    pub po_item_index: usize,
    pub received_quantity: f64,
    pub remarks: Option<String>,
    pub description: String,
    pub unit: String,
    pub ordered_quantity: f64,
    pub rate: f64,
}

/// Goods receipt with each line resolved against its purchase order line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiptDetail {
    pub id: GoodsReceiptId,
    pub grn_number: String,
    pub po_id: PurchaseOrderId,
    pub po_number: String,
    pub grn_date: NaiveDate,
    pub notes: Option<String>,
    pub status: ReceiptStatus,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub items: Vec<ReceiptDetailLine>,
}

#[derive(Clone)]
pub struct ProcurementService {
    ctx: Arc<EngineContext>,
}

impl ProcurementService {
    pub(crate) fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    pub fn issue_order(&self, actor: &Actor, input: NewPurchaseOrder) -> ServiceResult<PurchaseOrder> {
        let now = Utc::now();
        // Rejected orders must not consume a number.
        input.validate()?;

        let po_number = self
            .ctx
            .stores
            .sequence
            .next_number(DocumentKind::PurchaseOrder, DocumentPeriod::of(now.date_naive()))?;
        let id = PurchaseOrderId::new(AggregateId::new());
        let order = PurchaseOrder::issue(id, po_number, input, Some(actor.id), now)?;
        self.ctx.stores.orders.insert(order.clone())?;

        info!(order_id = %id, po_number = order.po_number(), total = order.total(), "purchase order issued");
        self.audit(
            actor,
            id,
            ProcurementEvent::PurchaseOrderIssued(PurchaseOrderIssued {
                order_id: id,
                po_number: order.po_number().to_string(),
                project_id: order.project_id(),
                total: order.total(),
                occurred_at: now,
            }),
        );
        Ok(order)
    }

    pub fn get_order(&self, id: PurchaseOrderId) -> ServiceResult<PurchaseOrder> {
        self.ctx
            .stores
            .orders
            .get(id)?
            .ok_or_else(|| DomainError::not_found("purchase order", id).into())
    }

    pub fn order_detail(&self, id: PurchaseOrderId) -> ServiceResult<PurchaseOrderDetail> {
        let order = self.get_order(id)?;
        let receipts = self.ctx.stores.receipts.load_for_order(id)?;
        let totals = ReceivedTotals::from_receipts(&order, &receipts);
        Ok(PurchaseOrderDetail {
            line_status: line_summaries(&order, &totals),
            order,
        })
    }

    pub fn list_orders(&self, filter: &PurchaseOrderFilter) -> ServiceResult<Vec<PurchaseOrder>> {
        Ok(self.ctx.stores.orders.list(filter)?)
    }

    pub fn change_status(
        &self,
        actor: &Actor,
        id: PurchaseOrderId,
        next: PurchaseOrderStatus,
    ) -> ServiceResult<PurchaseOrder> {
        let (from, order) = retry_on_conflict("change purchase order status", self.ctx.config.cas_retries, || {
            let mut order = self.get_order(id)?;
            let from = order.status();
            let expected = ExpectedVersion::Exact(order.version());
            order.transition(next, Utc::now())?;
            self.ctx.stores.orders.save(order.clone(), expected)?;
            Ok::<_, AttemptError>((from, order))
        })?;

        info!(order_id = %id, from = %from, to = %next, "purchase order status changed");
        self.audit(
            actor,
            id,
            ProcurementEvent::PurchaseOrderStatusChanged(PurchaseOrderStatusChanged {
                order_id: id,
                from,
                to: next,
                occurred_at: order.updated_at().unwrap_or_else(Utc::now),
            }),
        );
        Ok(order)
    }

    /// Validate and record a goods receipt, then post it to inventory.
    ///
    /// The over-receipt check always runs against the complete receipt
    /// history: if another receipt for the same order lands, or the order
    /// changes status, between the check and the append, the append is
    /// refused and the check repeats.
    pub fn submit_receipt(
        &self,
        actor: &Actor,
        submission: ReceiptSubmission,
    ) -> ServiceResult<ReceiptOutcome> {
        let receipt_id = GoodsReceiptId::new(AggregateId::new());
        let mut grn_number: Option<String> = None;

        let (order, receipt, accepted, totals) =
            retry_on_conflict("submit goods receipt", self.ctx.config.cas_retries, || {
                let order = self.get_order(submission.po_id)?;
                let history = self.ctx.stores.receipts.load_for_order(submission.po_id)?;
                let mut totals = ReceivedTotals::from_receipts(&order, &history);
                let accepted = totals.check(&order, &submission.items)?;

                let number = match grn_number.clone() {
                    Some(n) => n,
                    None => {
                        let now = Utc::now();
                        let n = self
                            .ctx
                            .stores
                            .sequence
                            .next_number(DocumentKind::GoodsReceipt, DocumentPeriod::of(now.date_naive()))?;
                        grn_number = Some(n.clone());
                        n
                    }
                };

                let receipt = GoodsReceipt::record(
                    receipt_id,
                    number,
                    submission.clone(),
                    Some(actor.id),
                    Utc::now(),
                );
                let expected = match history.len() {
                    0 => ExpectedVersion::NoStream,
                    n => ExpectedVersion::Exact(n as u64),
                };
                self.ctx
                    .stores
                    .receipts
                    .append(receipt.clone(), expected, order.version())?;
                totals.record(&receipt.items);

                Ok::<_, AttemptError>((order, receipt, accepted, totals))
            })?;

        info!(
            grn_number = %receipt.grn_number,
            po_id = %order.id_typed(),
            lines = receipt.items.len(),
            "goods receipt accepted"
        );

        let inventory_sync =
            ledger_sync::post_lines(&self.ctx, actor, &order, &receipt.grn_number, &accepted);
        let sync_failures = inventory_sync.iter().filter(|o| o.is_failed()).count();

        self.audit(
            actor,
            order.id_typed(),
            ProcurementEvent::GoodsReceiptAccepted(GoodsReceiptAccepted {
                receipt_id: receipt.id,
                grn_number: receipt.grn_number.clone(),
                order_id: order.id_typed(),
                line_count: receipt.items.len(),
                sync_failures,
                occurred_at: receipt.created_at,
            }),
        );

        Ok(ReceiptOutcome {
            line_status: line_summaries(&order, &totals),
            receipt,
            inventory_sync,
        })
    }

    /// Receipts, newest first, optionally for one order.
    pub fn list_receipts(&self, po_id: Option<PurchaseOrderId>) -> ServiceResult<Vec<ReceiptSummary>> {
        let receipts = self.ctx.stores.receipts.list(po_id)?;
        let mut numbers: HashMap<PurchaseOrderId, String> = HashMap::new();
        let mut rows = Vec::with_capacity(receipts.len());
        for receipt in receipts {
            let po_number = match numbers.get(&receipt.po_id) {
                Some(n) => n.clone(),
                None => {
                    let n = self
                        .ctx
                        .stores
                        .orders
                        .get(receipt.po_id)?
                        .map(|o| o.po_number().to_string())
                        .unwrap_or_default();
                    numbers.insert(receipt.po_id, n.clone());
                    n
                }
            };
            rows.push(ReceiptSummary { receipt, po_number });
        }
        Ok(rows)
    }

    pub fn receipt_detail(&self, id: GoodsReceiptId) -> ServiceResult<ReceiptDetail> {
        let receipt = self
            .ctx
            .stores
            .receipts
            .get(id)?
            .ok_or_else(|| DomainError::not_found("goods receipt", id))?;
        let order = self.get_order(receipt.po_id)?;

        let items = receipt
            .items
            .iter()
            .map(|line| {
                let po_line = order.items().get(line.po_item_index);
                ReceiptDetailLine {
                    po_item_index: line.po_item_index,
                    received_quantity: line.received_quantity,
                    remarks: line.remarks.clone(),
                    description: po_line.map(|l| l.description.clone()).unwrap_or_default(),
                    unit: po_line.map(|l| l.unit.clone()).unwrap_or_default(),
                    ordered_quantity: po_line.map(|l| l.quantity).unwrap_or_default(),
                    rate: po_line.map(|l| l.rate).unwrap_or_default(),
                }
            })
            .collect();

        Ok(ReceiptDetail {
            id: receipt.id,
            grn_number: receipt.grn_number,
            po_id: receipt.po_id,
            po_number: order.po_number().to_string(),
            grn_date: receipt.grn_date,
            notes: receipt.notes,
            status: receipt.status,
            created_by: receipt.created_by,
            created_at: receipt.created_at,
            items,
        })
    }

    fn audit(&self, actor: &Actor, id: PurchaseOrderId, event: ProcurementEvent) {
        self.ctx.audit.record(actor, id.0, ORDER_AGGREGATE, &event);
    }
}
