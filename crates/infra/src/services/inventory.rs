//! Stock line administration: create, edit, adjust, delete, dashboard.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::info;

use siteledger_core::{
    Actor, AggregateId, AggregateRoot, DomainError, ExpectedVersion, ProjectId,
};
use siteledger_inventory::{
    InventoryEvent, InventoryItem, InventoryItemId, ItemChanges, ItemCreated, ItemDeleted,
    ItemUpdated, NewInventoryItem, QuantityAdjusted, QuantityAdjustment, StockStatus,
};

use super::{AttemptError, EngineContext, retry_on_conflict};
use crate::error::ServiceResult;
use crate::repository::InventoryFilter;

pub(crate) const ITEM_AGGREGATE: &str = "inventory.item";

/// Aggregate view over the stock lines of one project (or all projects).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InventoryDashboard {
    pub total_items: usize,
    pub total_value: f64,
    pub low_stock_count: usize,
    pub out_of_stock_count: usize,
    pub by_category: BTreeMap<String, usize>,
    pub by_project: BTreeMap<ProjectId, usize>,
}

impl InventoryDashboard {
    fn tally<'a>(items: impl IntoIterator<Item = &'a InventoryItem>) -> Self {
        let mut dashboard = Self::default();
        for item in items {
            dashboard.total_items += 1;
            dashboard.total_value += item.total_value();
            match item.status() {
                StockStatus::LowStock => dashboard.low_stock_count += 1,
                StockStatus::OutOfStock => dashboard.out_of_stock_count += 1,
                StockStatus::InStock => {}
            }
            *dashboard
                .by_category
                .entry(item.category().to_string())
                .or_default() += 1;
            *dashboard.by_project.entry(item.project_id()).or_default() += 1;
        }
        dashboard
    }
}

#[derive(Clone)]
pub struct InventoryService {
    ctx: Arc<EngineContext>,
}

impl InventoryService {
    pub(crate) fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    pub fn create(&self, actor: &Actor, input: NewInventoryItem) -> ServiceResult<InventoryItem> {
        let now = Utc::now();
        let id = InventoryItemId::new(AggregateId::new());
        let item = InventoryItem::create(id, input, Some(actor.id), now)?;
        self.ctx.stores.inventory.insert(item.clone())?;

        info!(item_id = %id, project_id = %item.project_id(), item_name = item.item_name(), "inventory item created");
        self.audit(
            actor,
            id,
            InventoryEvent::ItemCreated(ItemCreated {
                item_id: id,
                project_id: item.project_id(),
                item_name: item.item_name().to_string(),
                quantity: item.quantity(),
                source: "manual".to_string(),
                occurred_at: now,
            }),
        );
        Ok(item)
    }

    pub fn get(&self, id: InventoryItemId) -> ServiceResult<InventoryItem> {
        self.ctx
            .stores
            .inventory
            .get(id)?
            .ok_or_else(|| DomainError::not_found("inventory item", id).into())
    }

    pub fn list(&self, filter: &InventoryFilter) -> ServiceResult<Vec<InventoryItem>> {
        Ok(self.ctx.stores.inventory.list(filter)?)
    }

    /// Edit descriptive fields. Quantity only moves through [`Self::adjust`].
    pub fn update(
        &self,
        actor: &Actor,
        id: InventoryItemId,
        changes: ItemChanges,
    ) -> ServiceResult<InventoryItem> {
        let updated = retry_on_conflict("update inventory item", self.ctx.config.cas_retries, || {
            let mut item = self.get(id)?;
            let expected = ExpectedVersion::Exact(item.version());
            item.update_details(changes.clone(), Utc::now())?;
            self.ctx.stores.inventory.save(item.clone(), expected)?;
            Ok::<_, AttemptError>(item)
        })?;

        self.audit(
            actor,
            id,
            InventoryEvent::ItemUpdated(ItemUpdated {
                item_id: id,
                occurred_at: updated.updated_at().unwrap_or_else(Utc::now),
            }),
        );
        Ok(updated)
    }

    /// Administrative set / add / subtract.
    pub fn adjust(
        &self,
        actor: &Actor,
        id: InventoryItemId,
        adjustment: QuantityAdjustment,
    ) -> ServiceResult<InventoryItem> {
        let (previous, updated) =
            retry_on_conflict("adjust inventory quantity", self.ctx.config.cas_retries, || {
                let mut item = self.get(id)?;
                let previous = item.quantity();
                let expected = ExpectedVersion::Exact(item.version());
                item.adjust(adjustment, Utc::now())?;
                self.ctx.stores.inventory.save(item.clone(), expected)?;
                Ok::<_, AttemptError>((previous, item))
            })?;

        let reason = match adjustment {
            QuantityAdjustment::Set(_) => "set",
            QuantityAdjustment::Add(_) => "add",
            QuantityAdjustment::Subtract(_) => "subtract",
        };
        info!(
            item_id = %id,
            reason,
            previous_quantity = previous,
            new_quantity = updated.quantity(),
            "inventory quantity adjusted"
        );
        self.audit(
            actor,
            id,
            InventoryEvent::QuantityAdjusted(QuantityAdjusted {
                item_id: id,
                previous_quantity: previous,
                new_quantity: updated.quantity(),
                reason: reason.to_string(),
                occurred_at: updated.updated_at().unwrap_or_else(Utc::now),
            }),
        );
        Ok(updated)
    }

    pub fn delete(&self, actor: &Actor, id: InventoryItemId) -> ServiceResult<()> {
        retry_on_conflict("delete inventory item", self.ctx.config.cas_retries, || {
            let item = self.get(id)?;
            self.ctx
                .stores
                .inventory
                .delete(id, ExpectedVersion::Exact(item.version()))?;
            Ok::<_, AttemptError>(())
        })?;

        info!(item_id = %id, "inventory item deleted");
        self.audit(
            actor,
            id,
            InventoryEvent::ItemDeleted(ItemDeleted {
                item_id: id,
                occurred_at: Utc::now(),
            }),
        );
        Ok(())
    }

    pub fn dashboard(&self, project_id: Option<ProjectId>) -> ServiceResult<InventoryDashboard> {
        let filter = InventoryFilter {
            project_id,
            ..InventoryFilter::default()
        };
        let items = self.ctx.stores.inventory.list(&filter)?;
        Ok(InventoryDashboard::tally(&items))
    }

    fn audit(&self, actor: &Actor, id: InventoryItemId, event: InventoryEvent) {
        self.ctx.audit.record(actor, id.0, ITEM_AGGREGATE, &event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Engine;
    use siteledger_core::UserId;

    fn actor() -> Actor {
        Actor::new(UserId::new(), "storekeeper")
    }

    fn line(project: ProjectId, name: &str, category: &str, qty: f64, min: f64, price: f64) -> NewInventoryItem {
        let mut input = NewInventoryItem::material(project, name, category, "Bags");
        input.quantity = qty;
        input.minimum_quantity = min;
        input.unit_price = price;
        input
    }

    #[test]
    fn adjust_keeps_status_derived() {
        let engine = Engine::in_memory();
        let item = engine
            .inventory
            .create(&actor(), line(ProjectId::new(), "Cement", "Cement", 5.0, 10.0, 1.0))
            .unwrap();
        assert_eq!(item.status(), StockStatus::LowStock);

        let item = engine
            .inventory
            .adjust(&actor(), item.id_typed(), QuantityAdjustment::Set(0.0))
            .unwrap();
        assert_eq!(item.status(), StockStatus::OutOfStock);

        let item = engine
            .inventory
            .adjust(&actor(), item.id_typed(), QuantityAdjustment::Set(20.0))
            .unwrap();
        assert_eq!(item.status(), StockStatus::InStock);
        assert_eq!(item.version(), 3);
    }

    #[test]
    fn missing_item_is_not_found() {
        let engine = Engine::in_memory();
        let id = InventoryItemId::new(AggregateId::new());
        let err = engine
            .inventory
            .adjust(&actor(), id, QuantityAdjustment::Add(1.0))
            .unwrap_err();
        assert_eq!(err.code(), "not_found");
        assert_eq!(engine.inventory.delete(&actor(), id).unwrap_err().code(), "not_found");
    }

    #[test]
    fn dashboard_counts_by_status_category_and_project() {
        let engine = Engine::in_memory();
        let (a, b) = (ProjectId::new(), ProjectId::new());
        let who = actor();
        engine.inventory.create(&who, line(a, "Cement", "Cement", 0.0, 5.0, 400.0)).unwrap();
        engine.inventory.create(&who, line(a, "Sand", "Aggregate", 3.0, 5.0, 100.0)).unwrap();
        engine.inventory.create(&who, line(b, "Gravel", "Aggregate", 10.0, 5.0, 50.0)).unwrap();

        let all = engine.inventory.dashboard(None).unwrap();
        assert_eq!(all.total_items, 3);
        assert_eq!(all.total_value, 800.0);
        assert_eq!(all.low_stock_count, 1);
        assert_eq!(all.out_of_stock_count, 1);
        assert_eq!(all.by_category.get("Aggregate"), Some(&2));
        assert_eq!(all.by_project.get(&a), Some(&2));

        let only_b = engine.inventory.dashboard(Some(b)).unwrap();
        assert_eq!(only_b.total_items, 1);
        assert_eq!(only_b.total_value, 500.0);
    }

    #[test]
    fn update_rejects_empty_changes() {
        let engine = Engine::in_memory();
        let item = engine
            .inventory
            .create(&actor(), line(ProjectId::new(), "Cement", "Cement", 1.0, 0.0, 1.0))
            .unwrap();
        let err = engine
            .inventory
            .update(&actor(), item.id_typed(), ItemChanges::default())
            .unwrap_err();
        assert_eq!(err.code(), "validation_failed");
    }
}
