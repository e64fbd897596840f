use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use siteledger_core::quantity::ensure_non_negative;
use siteledger_core::{AggregateId, DomainError, DomainResult, ProjectId, UserId};
use siteledger_inventory::InventoryItemId;

use crate::stock::MaterialStockEntry;

/// Daily report identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DailyReportId(pub AggregateId);

impl DailyReportId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for DailyReportId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Structured per-item stock movement reported for the day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialStockInput {
    pub inventory_id: InventoryItemId,
    #[serde(default)]
    pub received: f64,
    #[serde(default)]
    pub used: f64,
}

/// Older free-form "materials used" entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyMaterialUse {
    #[serde(default)]
    pub inventory_id: Option<InventoryItemId>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub quantity_used: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquipmentUsage {
    pub inventory_id: InventoryItemId,
    #[serde(default)]
    pub total_used_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReportSubmission {
    pub project_id: ProjectId,
    pub date: NaiveDate,
    #[serde(default)]
    pub weather: Option<String>,
    #[serde(default)]
    pub work_done: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub material_stock_entries: Vec<MaterialStockInput>,
    #[serde(default)]
    pub materials_used_entries: Vec<LegacyMaterialUse>,
    #[serde(default)]
    pub equipment_entries: Vec<EquipmentUsage>,
}

impl DailyReportSubmission {
    /// Shape checks that need no stored state.
    pub fn validate(&self) -> DomainResult<()> {
        let mut seen = HashSet::new();
        for entry in &self.material_stock_entries {
            ensure_non_negative(entry.received, "received")?;
            ensure_non_negative(entry.used, "used")?;
            if !seen.insert(entry.inventory_id) {
                return Err(DomainError::validation(format!(
                    "inventory item {} appears more than once in material_stock_entries",
                    entry.inventory_id
                )));
            }
        }
        for entry in &self.materials_used_entries {
            ensure_non_negative(entry.quantity_used, "quantity_used")?;
        }
        for entry in &self.equipment_entries {
            ensure_non_negative(entry.total_used_hours, "total_used_hours")?;
        }
        Ok(())
    }
}

/// A filed report with its resolved stock chain entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub id: DailyReportId,
    pub project_id: ProjectId,
    pub date: NaiveDate,
    pub weather: Option<String>,
    pub work_done: String,
    pub notes: Option<String>,
    pub material_stock_entries: Vec<MaterialStockEntry>,
    pub materials_used_entries: Vec<LegacyMaterialUse>,
    pub equipment_entries: Vec<EquipmentUsage>,
    pub created_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

impl DailyReport {
    pub fn file(
        id: DailyReportId,
        submission: DailyReportSubmission,
        material_stock_entries: Vec<MaterialStockEntry>,
        created_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            project_id: submission.project_id,
            date: submission.date,
            weather: submission.weather,
            work_done: submission.work_done,
            notes: submission.notes,
            material_stock_entries,
            materials_used_entries: submission.materials_used_entries,
            equipment_entries: submission.equipment_entries,
            created_by,
            created_at: now,
        }
    }

    pub fn stock_entry(&self, inventory_id: InventoryItemId) -> Option<&MaterialStockEntry> {
        self.material_stock_entries
            .iter()
            .find(|e| e.inventory_id == inventory_id)
    }
}
