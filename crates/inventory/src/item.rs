use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use siteledger_core::quantity::{ensure_non_negative, ensure_positive, exceeds};
use siteledger_core::{
    AggregateId, AggregateRoot, DomainError, DomainResult, ProjectId, UserId, VendorId,
};

use crate::status::StockStatus;

/// GST rate applied when a new stock line does not specify one.
pub const DEFAULT_GST_RATE: f64 = 18.0;

/// Unit of measure used when none is given.
pub const DEFAULT_UNIT: &str = "Nos";

/// Inventory item identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventoryItemId(pub AggregateId);

impl InventoryItemId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InventoryItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentStatus {
    Available,
    InUse,
    Maintenance,
    Retired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentCondition {
    Good,
    Fair,
    Poor,
}

/// Fields that only exist on equipment lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentDetails {
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub condition: Option<EquipmentCondition>,
    #[serde(default)]
    pub purchase_date: Option<NaiveDate>,
    pub equipment_status: EquipmentStatus,
}

impl Default for EquipmentDetails {
    fn default() -> Self {
        Self {
            serial_number: None,
            condition: None,
            purchase_date: None,
            equipment_status: EquipmentStatus::Available,
        }
    }
}

/// What kind of stock line this is. Serialized as `item_type`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "item_type", rename_all = "snake_case")]
pub enum ItemKind {
    #[default]
    Material,
    Equipment(EquipmentDetails),
}

/// Input for creating a stock line.
#[derive(Debug, Clone, PartialEq)]
pub struct NewInventoryItem {
    pub project_id: ProjectId,
    pub item_name: String,
    pub category: String,
    pub unit: Option<String>,
    pub quantity: f64,
    pub minimum_quantity: f64,
    pub unit_price: f64,
    pub gst_rate: f64,
    pub hsn_code: Option<String>,
    pub vendor_id: Option<VendorId>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub kind: ItemKind,
}

impl NewInventoryItem {
    /// Minimal material line; the remaining fields take their defaults.
    pub fn material(
        project_id: ProjectId,
        item_name: impl Into<String>,
        category: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            project_id,
            item_name: item_name.into(),
            category: category.into(),
            unit: Some(unit.into()),
            quantity: 0.0,
            minimum_quantity: 0.0,
            unit_price: 0.0,
            gst_rate: DEFAULT_GST_RATE,
            hsn_code: None,
            vendor_id: None,
            location: None,
            notes: None,
            kind: ItemKind::Material,
        }
    }
}

/// Partial update of descriptive fields. Quantity is never part of it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemChanges {
    pub item_name: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub minimum_quantity: Option<f64>,
    pub unit_price: Option<f64>,
    pub gst_rate: Option<f64>,
    pub hsn_code: Option<String>,
    pub vendor_id: Option<VendorId>,
    pub location: Option<String>,
    pub notes: Option<String>,
    pub serial_number: Option<String>,
    pub condition: Option<EquipmentCondition>,
    pub equipment_status: Option<EquipmentStatus>,
}

impl ItemChanges {
    pub fn is_empty(&self) -> bool {
        *self == ItemChanges::default()
    }

    fn touches_equipment(&self) -> bool {
        self.serial_number.is_some() || self.condition.is_some() || self.equipment_status.is_some()
    }
}

/// Administrative quantity change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", content = "quantity", rename_all = "snake_case")]
pub enum QuantityAdjustment {
    Set(f64),
    Add(f64),
    Subtract(f64),
}

/// Result of a clamped consumption (daily report deductions).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClampedConsumption {
    pub previous_quantity: f64,
    pub new_quantity: f64,
    /// Portion of the requested usage that could not be covered.
    pub shortfall: f64,
}

/// One stock line of one project: the authoritative ledger entry.
///
/// `total_value` and `status` are derived and recomputed by every mutator;
/// there is no way to set them directly. Deserializing only restores a stored
/// document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryItem {
    id: InventoryItemId,
    project_id: ProjectId,
    item_name: String,
    category: String,
    unit: String,
    quantity: f64,
    minimum_quantity: f64,
    unit_price: f64,
    gst_rate: f64,
    hsn_code: Option<String>,
    total_value: f64,
    status: StockStatus,
    vendor_id: Option<VendorId>,
    location: Option<String>,
    notes: Option<String>,
    #[serde(flatten)]
    kind: ItemKind,
    created_by: Option<UserId>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    version: u64,
}

impl InventoryItem {
    /// Validate the input and create a fresh stock line at version 1.
    pub fn create(
        id: InventoryItemId,
        input: NewInventoryItem,
        created_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let item_name = input.item_name.trim().to_string();
        if item_name.is_empty() {
            return Err(DomainError::validation("item_name cannot be empty"));
        }
        let category = input.category.trim().to_string();
        if category.is_empty() {
            return Err(DomainError::validation("category cannot be empty"));
        }
        let unit = match input.unit.as_deref().map(str::trim) {
            Some(u) if !u.is_empty() => u.to_string(),
            _ => DEFAULT_UNIT.to_string(),
        };

        let quantity = ensure_non_negative(input.quantity, "quantity")?;
        let minimum_quantity = ensure_non_negative(input.minimum_quantity, "minimum_quantity")?;
        let unit_price = ensure_non_negative(input.unit_price, "unit_price")?;
        let gst_rate = ensure_non_negative(input.gst_rate, "gst_rate")?;

        Ok(Self {
            id,
            project_id: input.project_id,
            item_name,
            category,
            unit,
            quantity,
            minimum_quantity,
            unit_price,
            gst_rate,
            hsn_code: input.hsn_code,
            total_value: quantity * unit_price,
            status: StockStatus::classify(quantity, minimum_quantity),
            vendor_id: input.vendor_id,
            location: input.location,
            notes: input.notes,
            kind: input.kind,
            created_by,
            created_at: now,
            updated_at: None,
            version: 1,
        })
    }

    pub fn id_typed(&self) -> InventoryItemId {
        self.id
    }

    pub fn project_id(&self) -> ProjectId {
        self.project_id
    }

    pub fn item_name(&self) -> &str {
        &self.item_name
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn minimum_quantity(&self) -> f64 {
        self.minimum_quantity
    }

    pub fn unit_price(&self) -> f64 {
        self.unit_price
    }

    pub fn gst_rate(&self) -> f64 {
        self.gst_rate
    }

    pub fn hsn_code(&self) -> Option<&str> {
        self.hsn_code.as_deref()
    }

    pub fn total_value(&self) -> f64 {
        self.total_value
    }

    pub fn status(&self) -> StockStatus {
        self.status
    }

    pub fn vendor_id(&self) -> Option<VendorId> {
        self.vendor_id
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn kind(&self) -> &ItemKind {
        &self.kind
    }

    pub fn created_by(&self) -> Option<UserId> {
        self.created_by
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn is_equipment(&self) -> bool {
        matches!(self.kind, ItemKind::Equipment(_))
    }

    /// Case-insensitive display-name match (the merge key within a project).
    pub fn name_matches(&self, name: &str) -> bool {
        self.item_name.to_lowercase() == name.trim().to_lowercase()
    }

    /// Apply goods received against a purchase order.
    ///
    /// A unit price already set on the line wins over `po_rate`; the rate only
    /// fills in a missing (zero) price.
    pub fn receive(
        &mut self,
        quantity: f64,
        po_rate: f64,
        vendor_id: Option<VendorId>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let quantity = ensure_positive(quantity, "received_quantity")?;
        let po_rate = ensure_non_negative(po_rate, "rate")?;

        self.quantity += quantity;
        if self.unit_price <= 0.0 {
            self.unit_price = po_rate;
        }
        if vendor_id.is_some() {
            self.vendor_id = vendor_id;
        }
        self.restate(now);
        Ok(())
    }

    /// Add stock (transfer destination).
    pub fn deposit(&mut self, quantity: f64, now: DateTime<Utc>) -> DomainResult<()> {
        let quantity = ensure_positive(quantity, "quantity")?;
        self.quantity += quantity;
        self.restate(now);
        Ok(())
    }

    /// Remove stock; refuses to go below zero.
    pub fn withdraw(&mut self, quantity: f64, now: DateTime<Utc>) -> DomainResult<()> {
        let quantity = ensure_positive(quantity, "quantity")?;
        self.ensure_available(quantity)?;
        self.quantity = (self.quantity - quantity).max(0.0);
        self.restate(now);
        Ok(())
    }

    /// Remove stock, clamping at zero instead of failing.
    ///
    /// Used for field-reported consumption, which is accepted even when it
    /// exceeds the recorded stock. The shortfall is returned so the caller can
    /// flag the anomaly.
    pub fn consume_clamped(
        &mut self,
        quantity: f64,
        now: DateTime<Utc>,
    ) -> DomainResult<ClampedConsumption> {
        let quantity = ensure_positive(quantity, "used")?;
        let previous_quantity = self.quantity;
        let shortfall = if exceeds(quantity, previous_quantity) {
            quantity - previous_quantity
        } else {
            0.0
        };
        self.quantity = (previous_quantity - quantity).max(0.0);
        self.restate(now);
        Ok(ClampedConsumption {
            previous_quantity,
            new_quantity: self.quantity,
            shortfall,
        })
    }

    /// Administrative set / add / subtract.
    pub fn adjust(&mut self, adjustment: QuantityAdjustment, now: DateTime<Utc>) -> DomainResult<()> {
        match adjustment {
            QuantityAdjustment::Set(q) => {
                self.quantity = ensure_non_negative(q, "quantity")?;
                self.restate(now);
                Ok(())
            }
            QuantityAdjustment::Add(q) => self.deposit(q, now),
            QuantityAdjustment::Subtract(q) => self.withdraw(q, now),
        }
    }

    /// Update descriptive fields and recompute the derived ones.
    pub fn update_details(&mut self, changes: ItemChanges, now: DateTime<Utc>) -> DomainResult<()> {
        if changes.is_empty() {
            return Err(DomainError::validation("no fields to update"));
        }
        if changes.touches_equipment() && !self.is_equipment() {
            return Err(DomainError::validation(
                "equipment fields cannot be set on a material item",
            ));
        }

        // Validate everything before touching state.
        let item_name = non_blank(changes.item_name, "item_name")?;
        let minimum_quantity = changes
            .minimum_quantity
            .map(|v| ensure_non_negative(v, "minimum_quantity"))
            .transpose()?;
        let unit_price = changes
            .unit_price
            .map(|v| ensure_non_negative(v, "unit_price"))
            .transpose()?;
        let gst_rate = changes
            .gst_rate
            .map(|v| ensure_non_negative(v, "gst_rate"))
            .transpose()?;

        let category = non_blank(changes.category, "category")?;
        let unit = non_blank(changes.unit, "unit")?;

        if let Some(v) = item_name {
            self.item_name = v;
        }
        if let Some(v) = category {
            self.category = v;
        }
        if let Some(v) = unit {
            self.unit = v;
        }
        if let Some(v) = minimum_quantity {
            self.minimum_quantity = v;
        }
        if let Some(v) = unit_price {
            self.unit_price = v;
        }
        if let Some(v) = gst_rate {
            self.gst_rate = v;
        }
        if changes.hsn_code.is_some() {
            self.hsn_code = changes.hsn_code;
        }
        if changes.vendor_id.is_some() {
            self.vendor_id = changes.vendor_id;
        }
        if changes.location.is_some() {
            self.location = changes.location;
        }
        if changes.notes.is_some() {
            self.notes = changes.notes;
        }
        if let ItemKind::Equipment(details) = &mut self.kind {
            if changes.serial_number.is_some() {
                details.serial_number = changes.serial_number;
            }
            if changes.condition.is_some() {
                details.condition = changes.condition;
            }
            if let Some(s) = changes.equipment_status {
                details.equipment_status = s;
            }
        }

        self.restate(now);
        Ok(())
    }

    /// Flag an equipment line as in use. Returns `false` for materials.
    pub fn mark_in_use(&mut self, now: DateTime<Utc>) -> bool {
        match &mut self.kind {
            ItemKind::Equipment(details) => {
                details.equipment_status = EquipmentStatus::InUse;
                self.updated_at = Some(now);
                self.version += 1;
                true
            }
            ItemKind::Material => false,
        }
    }

    /// New line in another project carrying this line's classification,
    /// pricing and threshold, holding `quantity`.
    pub(crate) fn split_into(
        &self,
        id: InventoryItemId,
        project_id: ProjectId,
        quantity: f64,
        notes: Option<String>,
        created_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Self {
        let kind = match &self.kind {
            ItemKind::Material => ItemKind::Material,
            ItemKind::Equipment(d) => ItemKind::Equipment(EquipmentDetails {
                equipment_status: EquipmentStatus::Available,
                ..d.clone()
            }),
        };

        Self {
            id,
            project_id,
            item_name: self.item_name.clone(),
            category: self.category.clone(),
            unit: self.unit.clone(),
            quantity,
            minimum_quantity: self.minimum_quantity,
            unit_price: self.unit_price,
            gst_rate: self.gst_rate,
            hsn_code: self.hsn_code.clone(),
            total_value: quantity * self.unit_price,
            status: StockStatus::classify(quantity, self.minimum_quantity),
            vendor_id: self.vendor_id,
            location: self.location.clone(),
            notes,
            kind,
            created_by,
            created_at: now,
            updated_at: None,
            version: 1,
        }
    }

    pub(crate) fn ensure_available(&self, quantity: f64) -> DomainResult<()> {
        if exceeds(quantity, self.quantity) {
            return Err(DomainError::InsufficientStock {
                item_name: self.item_name.clone(),
                requested: quantity,
                available: self.quantity,
                unit: self.unit.clone(),
            });
        }
        Ok(())
    }

    /// Recompute derived fields after any quantity or price change.
    fn restate(&mut self, now: DateTime<Utc>) {
        self.total_value = self.quantity * self.unit_price;
        self.status = StockStatus::classify(self.quantity, self.minimum_quantity);
        self.updated_at = Some(now);
        self.version += 1;
    }
}

impl AggregateRoot for InventoryItem {
    type Id = InventoryItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Trimmed value, or a validation error if it is present but blank.
fn non_blank(value: Option<String>, field: &str) -> DomainResult<Option<String>> {
    match value {
        Some(v) if v.trim().is_empty() => Err(DomainError::validation(format!(
            "{field} cannot be empty"
        ))),
        Some(v) => Ok(Some(v.trim().to_string())),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_item_id() -> InventoryItemId {
        InventoryItemId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn material(quantity: f64, minimum_quantity: f64, unit_price: f64) -> InventoryItem {
        let mut input = NewInventoryItem::material(ProjectId::new(), "Cement OPC 53", "Cement", "Bags");
        input.quantity = quantity;
        input.minimum_quantity = minimum_quantity;
        input.unit_price = unit_price;
        InventoryItem::create(test_item_id(), input, None, test_time()).unwrap()
    }

    fn assert_derived_fields(item: &InventoryItem) {
        assert_eq!(
            item.status(),
            StockStatus::classify(item.quantity(), item.minimum_quantity())
        );
        assert!((item.total_value() - item.quantity() * item.unit_price()).abs() < 1e-6);
    }

    #[test]
    fn create_computes_value_and_status() {
        let item = material(5.0, 10.0, 400.0);
        assert_eq!(item.status(), StockStatus::LowStock);
        assert_eq!(item.total_value(), 2000.0);
        assert_eq!(item.version(), 1);
    }

    #[test]
    fn create_rejects_blank_name_and_negative_quantity() {
        let mut input = NewInventoryItem::material(ProjectId::new(), "  ", "Cement", "Bags");
        assert!(matches!(
            InventoryItem::create(test_item_id(), input.clone(), None, test_time()),
            Err(DomainError::Validation(_))
        ));

        input.item_name = "Sand".to_string();
        input.quantity = -1.0;
        assert!(matches!(
            InventoryItem::create(test_item_id(), input, None, test_time()),
            Err(DomainError::InvalidQuantity { .. })
        ));
    }

    #[test]
    fn missing_unit_defaults_to_nos() {
        let mut input = NewInventoryItem::material(ProjectId::new(), "Anchor bolts", "Hardware", "");
        input.unit = None;
        let item = InventoryItem::create(test_item_id(), input, None, test_time()).unwrap();
        assert_eq!(item.unit(), DEFAULT_UNIT);
    }

    #[test]
    fn status_follows_quantity_through_set_adjustments() {
        let mut item = material(5.0, 10.0, 1.0);
        assert_eq!(item.status(), StockStatus::LowStock);

        item.adjust(QuantityAdjustment::Set(0.0), test_time()).unwrap();
        assert_eq!(item.status(), StockStatus::OutOfStock);

        item.adjust(QuantityAdjustment::Set(20.0), test_time()).unwrap();
        assert_eq!(item.status(), StockStatus::InStock);
    }

    #[test]
    fn withdraw_beyond_available_is_rejected_without_change() {
        let mut item = material(50.0, 0.0, 10.0);
        let before = item.clone();

        let err = item.withdraw(60.0, test_time()).unwrap_err();
        match err {
            DomainError::InsufficientStock { available, unit, .. } => {
                assert_eq!(available, 50.0);
                assert_eq!(unit, "Bags");
            }
            other => panic!("expected InsufficientStock, got {other:?}"),
        }
        assert_eq!(item, before);
    }

    #[test]
    fn subtract_adjustment_cannot_go_negative() {
        let mut item = material(3.0, 0.0, 10.0);
        assert!(item.adjust(QuantityAdjustment::Subtract(4.0), test_time()).is_err());
        assert_eq!(item.quantity(), 3.0);
    }

    #[test]
    fn receive_keeps_manual_price_and_fills_missing_one() {
        let mut priced = material(10.0, 0.0, 350.0);
        priced.receive(5.0, 400.0, Some(VendorId::new()), test_time()).unwrap();
        assert_eq!(priced.unit_price(), 350.0);
        assert_eq!(priced.total_value(), 15.0 * 350.0);
        assert!(priced.vendor_id().is_some());

        let mut unpriced = material(0.0, 0.0, 0.0);
        unpriced.receive(5.0, 400.0, None, test_time()).unwrap();
        assert_eq!(unpriced.unit_price(), 400.0);
        assert_eq!(unpriced.total_value(), 2000.0);
    }

    #[test]
    fn consume_clamped_reports_shortfall() {
        let mut item = material(20.0, 5.0, 2.0);
        let outcome = item.consume_clamped(30.0, test_time()).unwrap();
        assert_eq!(outcome.previous_quantity, 20.0);
        assert_eq!(outcome.new_quantity, 0.0);
        assert_eq!(outcome.shortfall, 10.0);
        assert_eq!(item.status(), StockStatus::OutOfStock);
    }

    #[test]
    fn consume_clamped_ignores_rounding_noise() {
        let mut item = material(0.3, 0.0, 1.0);
        let outcome = item.consume_clamped(0.1 + 0.2, test_time()).unwrap();
        assert_eq!(outcome.shortfall, 0.0);
        assert_eq!(outcome.new_quantity, 0.0);
    }

    #[test]
    fn update_details_rejects_blank_category_and_unit() {
        let mut item = material(1.0, 0.0, 1.0);
        let blank_category = ItemChanges {
            category: Some("  ".to_string()),
            ..ItemChanges::default()
        };
        assert_eq!(
            item.update_details(blank_category, test_time()).unwrap_err(),
            DomainError::validation("category cannot be empty")
        );
        let blank_unit = ItemChanges {
            unit: Some(String::new()),
            ..ItemChanges::default()
        };
        assert!(item.update_details(blank_unit, test_time()).is_err());

        let trimmed = ItemChanges {
            category: Some(" Steel ".to_string()),
            unit: Some(" MT ".to_string()),
            ..ItemChanges::default()
        };
        item.update_details(trimmed, test_time()).unwrap();
        assert_eq!(item.category(), "Steel");
        assert_eq!(item.unit(), "MT");
    }

    #[test]
    fn update_details_requires_at_least_one_field() {
        let mut item = material(1.0, 0.0, 1.0);
        let err = item.update_details(ItemChanges::default(), test_time()).unwrap_err();
        assert_eq!(err, DomainError::validation("no fields to update"));
    }

    #[test]
    fn update_details_recomputes_derived_fields() {
        let mut item = material(8.0, 0.0, 10.0);
        let changes = ItemChanges {
            minimum_quantity: Some(10.0),
            unit_price: Some(12.5),
            ..ItemChanges::default()
        };
        item.update_details(changes, test_time()).unwrap();
        assert_eq!(item.status(), StockStatus::LowStock);
        assert_eq!(item.total_value(), 100.0);
    }

    #[test]
    fn equipment_fields_rejected_on_material() {
        let mut item = material(1.0, 0.0, 1.0);
        let changes = ItemChanges {
            equipment_status: Some(EquipmentStatus::Maintenance),
            ..ItemChanges::default()
        };
        assert!(matches!(
            item.update_details(changes, test_time()),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn mark_in_use_only_applies_to_equipment() {
        let mut mat = material(1.0, 0.0, 1.0);
        assert!(!mat.mark_in_use(test_time()));

        let mut input = NewInventoryItem::material(ProjectId::new(), "Concrete mixer", "Machine", "Nos");
        input.quantity = 1.0;
        input.kind = ItemKind::Equipment(EquipmentDetails::default());
        let mut mixer = InventoryItem::create(test_item_id(), input, None, test_time()).unwrap();
        let quantity_before = mixer.quantity();

        assert!(mixer.mark_in_use(test_time()));
        match mixer.kind() {
            ItemKind::Equipment(d) => assert_eq!(d.equipment_status, EquipmentStatus::InUse),
            ItemKind::Material => panic!("expected equipment"),
        }
        assert_eq!(mixer.quantity(), quantity_before);
    }

    #[test]
    fn name_match_is_case_insensitive() {
        let item = material(1.0, 0.0, 1.0);
        assert!(item.name_matches("cement opc 53"));
        assert!(item.name_matches("  CEMENT OPC 53 "));
        assert!(!item.name_matches("Cement OPC 43"));
    }

    #[test]
    fn serializes_storage_field_names() {
        let item = material(2.0, 1.0, 3.0);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["item_type"], "material");
        assert_eq!(json["status"], "in_stock");
        assert_eq!(json["total_value"], 6.0);
        assert!(json.get("minimum_quantity").is_some());
    }

    #[test]
    fn stored_equipment_document_restores_the_item() {
        let mut input = NewInventoryItem::material(ProjectId::new(), "Concrete mixer", "Equipment", "Nos");
        input.quantity = 1.0;
        input.kind = ItemKind::Equipment(EquipmentDetails {
            serial_number: Some("MX-204".to_string()),
            ..EquipmentDetails::default()
        });
        let mixer = InventoryItem::create(test_item_id(), input, None, test_time()).unwrap();

        let stored = serde_json::to_value(&mixer).unwrap();
        let restored: InventoryItem = serde_json::from_value(stored).unwrap();
        assert_eq!(restored, mixer);
        assert_eq!(restored.version(), 1);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Set(f64),
        Add(f64),
        Subtract(f64),
        Consume(f64),
        Receive(f64, f64),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0.0f64..500.0).prop_map(Op::Set),
            (0.01f64..500.0).prop_map(Op::Add),
            (0.01f64..500.0).prop_map(Op::Subtract),
            (0.01f64..500.0).prop_map(Op::Consume),
            (0.01f64..500.0, 0.0f64..1000.0).prop_map(|(q, r)| Op::Receive(q, r)),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: whatever sequence of mutations is attempted, quantity stays
        /// non-negative and status/total_value stay derived from it.
        #[test]
        fn mutations_preserve_ledger_invariants(
            start in 0.0f64..500.0,
            minimum in 0.0f64..100.0,
            price in 0.0f64..1000.0,
            ops in prop::collection::vec(op_strategy(), 1..30)
        ) {
            let mut item = material(start, minimum, price);

            for op in ops {
                let before = item.clone();
                let result = match op {
                    Op::Set(q) => item.adjust(QuantityAdjustment::Set(q), test_time()),
                    Op::Add(q) => item.adjust(QuantityAdjustment::Add(q), test_time()),
                    Op::Subtract(q) => item.adjust(QuantityAdjustment::Subtract(q), test_time()),
                    Op::Consume(q) => item.consume_clamped(q, test_time()).map(|_| ()),
                    Op::Receive(q, r) => item.receive(q, r, None, test_time()),
                };
                if result.is_err() {
                    prop_assert_eq!(&item, &before);
                }

                prop_assert!(item.quantity() >= 0.0);
                prop_assert_eq!(
                    item.status(),
                    StockStatus::classify(item.quantity(), item.minimum_quantity())
                );
                prop_assert!((item.total_value() - item.quantity() * item.unit_price()).abs() < 1e-6);
            }

            assert_derived_fields(&item);
        }
    }
}
