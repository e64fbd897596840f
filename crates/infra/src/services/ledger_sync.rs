//! Posting accepted goods receipt lines into the inventory ledger.
//!
//! Each line merges into the project's stock line with the same name
//! (case-insensitive) or creates one. A line that fails to post is reported
//! back to the caller and logged; it never undoes the accepted receipt.

use chrono::Utc;
use serde::Serialize;
use tracing::warn;

use siteledger_core::{Actor, AggregateId, AggregateRoot, ExpectedVersion};
use siteledger_inventory::{
    InventoryEvent, InventoryItem, InventoryItemId, ItemCreated, NewInventoryItem, QuantityAdjusted,
};
use siteledger_purchasing::{AcceptedLine, PoLineItem, PurchaseOrder};

use super::inventory::ITEM_AGGREGATE;
use super::{AttemptError, EngineContext, retry_on_conflict};
use crate::repository::ItemChange;

/// Category given to stock lines first created by a goods receipt.
pub const AUTO_CREATED_CATEGORY: &str = "Other";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum SyncResult {
    Merged { item_id: InventoryItemId },
    Created { item_id: InventoryItemId },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineSyncOutcome {
    pub po_item_index: usize,
    pub item_name: String,
    pub quantity: f64,
    #[serde(flatten)]
    pub result: SyncResult,
}

impl LineSyncOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self.result, SyncResult::Failed { .. })
    }
}

enum Posted {
    Merged { item: InventoryItem, previous: f64 },
    Created(InventoryItem),
}

pub(crate) fn post_lines(
    ctx: &EngineContext,
    actor: &Actor,
    order: &PurchaseOrder,
    grn_number: &str,
    lines: &[AcceptedLine],
) -> Vec<LineSyncOutcome> {
    lines
        .iter()
        .filter_map(|accepted| {
            let po_line = order.items().get(accepted.po_item_index)?;
            Some(post_line(ctx, actor, order, grn_number, po_line, accepted))
        })
        .collect()
}

fn post_line(
    ctx: &EngineContext,
    actor: &Actor,
    order: &PurchaseOrder,
    grn_number: &str,
    po_line: &PoLineItem,
    accepted: &AcceptedLine,
) -> LineSyncOutcome {
    let quantity = accepted.received_quantity;
    let attempt = retry_on_conflict("post goods receipt line", ctx.config.cas_retries, || {
        let now = Utc::now();
        match ctx
            .stores
            .inventory
            .find_by_name(order.project_id(), &po_line.description)?
        {
            Some(mut item) => {
                let previous = item.quantity();
                let expected = ExpectedVersion::Exact(item.version());
                item.receive(quantity, po_line.rate, Some(order.vendor_id()), now)?;
                ctx.stores.inventory.save(item.clone(), expected)?;
                Ok::<_, AttemptError>(Posted::Merged { item, previous })
            }
            None => {
                let mut input = NewInventoryItem::material(
                    order.project_id(),
                    po_line.description.clone(),
                    AUTO_CREATED_CATEGORY,
                    po_line.unit.clone(),
                );
                input.quantity = quantity;
                input.unit_price = po_line.rate;
                input.gst_rate = po_line.gst_rate;
                input.vendor_id = Some(order.vendor_id());
                input.notes = Some(format!("Auto-created from GRN {grn_number}"));

                let item = InventoryItem::create(
                    InventoryItemId::new(AggregateId::new()),
                    input,
                    Some(actor.id),
                    now,
                )?;
                // A concurrent receipt may create the same name first; the
                // retry then merges into that line.
                ctx.stores
                    .inventory
                    .commit(vec![ItemChange::InsertUniqueName(item.clone())])?;
                Ok(Posted::Created(item))
            }
        }
    });

    let result = match attempt {
        Ok(Posted::Merged { item, previous }) => {
            ctx.audit.record(
                actor,
                item.id_typed().0,
                ITEM_AGGREGATE,
                &InventoryEvent::QuantityAdjusted(QuantityAdjusted {
                    item_id: item.id_typed(),
                    previous_quantity: previous,
                    new_quantity: item.quantity(),
                    reason: format!("grn:{grn_number}"),
                    occurred_at: item.updated_at().unwrap_or_else(Utc::now),
                }),
            );
            SyncResult::Merged {
                item_id: item.id_typed(),
            }
        }
        Ok(Posted::Created(item)) => {
            ctx.audit.record(
                actor,
                item.id_typed().0,
                ITEM_AGGREGATE,
                &InventoryEvent::ItemCreated(ItemCreated {
                    item_id: item.id_typed(),
                    project_id: item.project_id(),
                    item_name: item.item_name().to_string(),
                    quantity: item.quantity(),
                    source: format!("grn:{grn_number}"),
                    occurred_at: item.created_at(),
                }),
            );
            SyncResult::Created {
                item_id: item.id_typed(),
            }
        }
        Err(err) => {
            warn!(
                grn_number,
                po_item_index = accepted.po_item_index,
                item_name = %po_line.description,
                quantity,
                error = %err,
                "goods receipt line not posted to inventory"
            );
            SyncResult::Failed {
                reason: err.to_string(),
            }
        }
    };

    LineSyncOutcome {
        po_item_index: accepted.po_item_index,
        item_name: po_line.description.clone(),
        quantity,
        result,
    }
}
