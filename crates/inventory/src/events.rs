use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use siteledger_core::ProjectId;
use siteledger_events::Event;

use crate::item::InventoryItemId;

/// Event: ItemCreated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemCreated {
    pub item_id: InventoryItemId,
    pub project_id: ProjectId,
    pub item_name: String,
    pub quantity: f64,
    /// `manual`, `grn:<number>` or `transfer`.
    pub source: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemUpdated (descriptive fields only).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemUpdated {
    pub item_id: InventoryItemId,
    pub occurred_at: DateTime<Utc>,
}

/// Event: QuantityAdjusted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantityAdjusted {
    pub item_id: InventoryItemId,
    pub previous_quantity: f64,
    pub new_quantity: f64,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockTransferred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockTransferred {
    pub source_item_id: InventoryItemId,
    pub destination_item_id: InventoryItemId,
    pub to_project_id: ProjectId,
    pub quantity: f64,
    pub destination_created: bool,
    pub occurred_at: DateTime<Utc>,
}

/// Event: EquipmentInUse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentInUse {
    pub item_id: InventoryItemId,
    pub hours: f64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ItemDeleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDeleted {
    pub item_id: InventoryItemId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InventoryEvent {
    ItemCreated(ItemCreated),
    ItemUpdated(ItemUpdated),
    QuantityAdjusted(QuantityAdjusted),
    StockTransferred(StockTransferred),
    EquipmentInUse(EquipmentInUse),
    ItemDeleted(ItemDeleted),
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::ItemCreated(_) => "inventory.item.created",
            InventoryEvent::ItemUpdated(_) => "inventory.item.updated",
            InventoryEvent::QuantityAdjusted(_) => "inventory.item.quantity_adjusted",
            InventoryEvent::StockTransferred(_) => "inventory.stock.transferred",
            InventoryEvent::EquipmentInUse(_) => "inventory.equipment.in_use",
            InventoryEvent::ItemDeleted(_) => "inventory.item.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::ItemCreated(e) => e.occurred_at,
            InventoryEvent::ItemUpdated(e) => e.occurred_at,
            InventoryEvent::QuantityAdjusted(e) => e.occurred_at,
            InventoryEvent::StockTransferred(e) => e.occurred_at,
            InventoryEvent::EquipmentInUse(e) => e.occurred_at,
            InventoryEvent::ItemDeleted(e) => e.occurred_at,
        }
    }
}

impl InventoryEvent {
    /// The inventory line the event is about (the source line for transfers).
    pub fn item_id(&self) -> InventoryItemId {
        match self {
            InventoryEvent::ItemCreated(e) => e.item_id,
            InventoryEvent::ItemUpdated(e) => e.item_id,
            InventoryEvent::QuantityAdjusted(e) => e.item_id,
            InventoryEvent::StockTransferred(e) => e.source_item_id,
            InventoryEvent::EquipmentInUse(e) => e.item_id,
            InventoryEvent::ItemDeleted(e) => e.item_id,
        }
    }
}
