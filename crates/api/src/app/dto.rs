use chrono::NaiveDate;
use serde::Deserialize;

use siteledger_core::{AggregateId, DomainError, DomainResult, ProjectId, VendorId};
use siteledger_infra::repository::{InventoryFilter, PurchaseOrderFilter};
use siteledger_inventory::{
    DEFAULT_GST_RATE, EquipmentCondition, EquipmentDetails, EquipmentStatus, InventoryItemId,
    ItemKind, NewInventoryItem, QuantityAdjustment, StockStatus,
};
use siteledger_purchasing::{PurchaseOrderId, PurchaseOrderStatus};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    #[default]
    Material,
    Equipment,
}

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub project_id: ProjectId,
    pub item_name: String,
    pub category: String,
    pub unit: Option<String>,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default)]
    pub minimum_quantity: f64,
    #[serde(default)]
    pub unit_price: f64,
    pub gst_rate: Option<f64>,
    pub hsn_code: Option<String>,
    pub vendor_id: Option<VendorId>,
    pub location: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    pub item_type: ItemType,
    pub serial_number: Option<String>,
    pub condition: Option<EquipmentCondition>,
    pub purchase_date: Option<NaiveDate>,
    pub equipment_status: Option<EquipmentStatus>,
}

impl CreateItemRequest {
    pub fn into_new_item(self) -> DomainResult<NewInventoryItem> {
        let has_equipment_fields = self.serial_number.is_some()
            || self.condition.is_some()
            || self.purchase_date.is_some()
            || self.equipment_status.is_some();

        let kind = match self.item_type {
            ItemType::Material if has_equipment_fields => {
                return Err(DomainError::validation(
                    "equipment fields require item_type 'equipment'",
                ));
            }
            ItemType::Material => ItemKind::Material,
            ItemType::Equipment => ItemKind::Equipment(EquipmentDetails {
                serial_number: self.serial_number,
                condition: self.condition,
                purchase_date: self.purchase_date,
                equipment_status: self.equipment_status.unwrap_or(EquipmentStatus::Available),
            }),
        };

        Ok(NewInventoryItem {
            project_id: self.project_id,
            item_name: self.item_name,
            category: self.category,
            unit: self.unit,
            quantity: self.quantity,
            minimum_quantity: self.minimum_quantity,
            unit_price: self.unit_price,
            gst_rate: self.gst_rate.unwrap_or(DEFAULT_GST_RATE),
            hsn_code: self.hsn_code,
            vendor_id: self.vendor_id,
            location: self.location,
            notes: self.notes,
            kind,
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantityOperation {
    #[default]
    Set,
    Add,
    Subtract,
}

#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: f64,
    #[serde(default)]
    pub operation: QuantityOperation,
}

impl UpdateQuantityRequest {
    pub fn adjustment(&self) -> QuantityAdjustment {
        match self.operation {
            QuantityOperation::Set => QuantityAdjustment::Set(self.quantity),
            QuantityOperation::Add => QuantityAdjustment::Add(self.quantity),
            QuantityOperation::Subtract => QuantityAdjustment::Subtract(self.quantity),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: String,
}

// -------------------------
// Query parameters
// -------------------------
//
// Kept as strings so malformed values produce the JSON error body rather than
// the extractor's plain-text rejection.

#[derive(Debug, Default, Deserialize)]
pub struct InventoryListQuery {
    pub project_id: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
}

impl InventoryListQuery {
    pub fn into_filter(self) -> DomainResult<InventoryFilter> {
        Ok(InventoryFilter {
            project_id: parse_opt(self.project_id.as_deref())?,
            category: self.category.filter(|c| !c.trim().is_empty()),
            status: parse_opt::<StockStatus>(self.status.as_deref())?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProjectQuery {
    pub project_id: Option<String>,
}

impl ProjectQuery {
    pub fn project_id(&self) -> DomainResult<Option<ProjectId>> {
        parse_opt(self.project_id.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub project_id: Option<String>,
    pub vendor_id: Option<String>,
    pub status: Option<String>,
}

impl OrderListQuery {
    pub fn into_filter(self) -> DomainResult<PurchaseOrderFilter> {
        Ok(PurchaseOrderFilter {
            project_id: parse_opt(self.project_id.as_deref())?,
            vendor_id: parse_opt(self.vendor_id.as_deref())?,
            status: parse_opt::<PurchaseOrderStatus>(self.status.as_deref())?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReceiptListQuery {
    pub po_id: Option<String>,
}

impl ReceiptListQuery {
    pub fn po_id(&self) -> DomainResult<Option<PurchaseOrderId>> {
        Ok(parse_opt::<AggregateId>(self.po_id.as_deref())?.map(PurchaseOrderId::new))
    }
}

#[derive(Debug, Deserialize)]
pub struct OpeningStockQuery {
    pub project_id: String,
    pub inventory_id: String,
    pub date: String,
}

impl OpeningStockQuery {
    pub fn parse(&self) -> DomainResult<(ProjectId, InventoryItemId, NaiveDate)> {
        let project_id = self.project_id.parse::<ProjectId>()?;
        let inventory_id = InventoryItemId::new(self.inventory_id.parse::<AggregateId>()?);
        let date = self
            .date
            .trim()
            .parse::<NaiveDate>()
            .map_err(|e| DomainError::validation(format!("date must be YYYY-MM-DD: {e}")))?;
        Ok((project_id, inventory_id, date))
    }
}

/// Blank values count as absent.
fn parse_opt<T>(raw: Option<&str>) -> DomainResult<Option<T>>
where
    T: core::str::FromStr<Err = DomainError>,
{
    match raw.map(str::trim) {
        Some(s) if !s.is_empty() => s.parse().map(Some),
        _ => Ok(None),
    }
}
