use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use siteledger_core::{Actor, AggregateId, AggregateRoot, DomainError, ExpectedVersion};
use siteledger_inventory::{
    InventoryEvent, InventoryItemId, StockTransferred, TransferDestination, TransferReceipt,
    TransferRequest,
};

use super::inventory::ITEM_AGGREGATE;
use super::{AttemptError, EngineContext, retry_on_conflict};
use crate::error::ServiceResult;
use crate::repository::ItemChange;

/// Moves stock between projects.
///
/// Both sides are written in one all-or-nothing commit guarded by the
/// versions read at the start of the attempt, so a concurrent withdrawal from
/// the source forces a re-read and a fresh availability check.
#[derive(Clone)]
pub struct TransferService {
    ctx: Arc<EngineContext>,
}

impl TransferService {
    pub(crate) fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    pub fn transfer(&self, actor: &Actor, request: &TransferRequest) -> ServiceResult<TransferReceipt> {
        let inventory = &self.ctx.stores.inventory;

        let receipt = retry_on_conflict("transfer stock", self.ctx.config.cas_retries, || {
            let mut source = inventory
                .get(request.from_item_id)?
                .ok_or_else(|| DomainError::not_found("source item", request.from_item_id))?;
            request.check_preconditions(&source)?;

            let mut destination = match request.to_item_id {
                Some(id) => Some(
                    inventory
                        .get(id)?
                        .ok_or_else(|| DomainError::not_found("destination item", id))?,
                ),
                None => None,
            };

            let source_expected = ExpectedVersion::Exact(source.version());
            let destination_expected = destination.as_ref().map(|d| ExpectedVersion::Exact(d.version()));

            let target = match destination.as_mut() {
                Some(dest) => TransferDestination::Existing(dest),
                None => TransferDestination::NewItem {
                    id: InventoryItemId::new(AggregateId::new()),
                    created_by: Some(actor.id),
                },
            };
            let outcome = request.execute(&mut source, target, Utc::now())?;

            let mut changes = vec![ItemChange::Update {
                item: source,
                expected: source_expected,
            }];
            match (destination, destination_expected, outcome.created) {
                (Some(item), Some(expected), _) => changes.push(ItemChange::Update { item, expected }),
                (_, _, Some(created)) => changes.push(ItemChange::Insert(created)),
                _ => {}
            }
            inventory.commit(changes)?;

            Ok::<_, AttemptError>(outcome.receipt)
        })?;

        info!(
            source_item_id = %receipt.source_item_id,
            destination_item_id = %receipt.destination_item_id,
            to_project_id = %request.to_project_id,
            quantity = receipt.transferred_quantity,
            destination_created = receipt.destination_created,
            "stock transferred"
        );
        self.ctx.audit.record(
            actor,
            receipt.source_item_id.0,
            ITEM_AGGREGATE,
            &InventoryEvent::StockTransferred(StockTransferred {
                source_item_id: receipt.source_item_id,
                destination_item_id: receipt.destination_item_id,
                to_project_id: request.to_project_id,
                quantity: receipt.transferred_quantity,
                destination_created: receipt.destination_created,
                occurred_at: Utc::now(),
            }),
        );
        Ok(receipt)
    }
}
