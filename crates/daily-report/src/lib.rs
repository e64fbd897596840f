//! Daily progress report (DPR) domain module.
//!
//! Material stock on site is tracked as a date-ordered chain per
//! (project, item): each report's opening stock is the closing stock of the
//! latest earlier report for that item, falling back to the live inventory
//! quantity for the first report. This crate holds the chain rules and the
//! deduction planning; persistence and the ledger writes live in infra.

pub mod events;
pub mod report;
pub mod stock;

pub use events::{DailyReportEvent, DailyReportFiled, StockShortfallRecorded};
pub use report::{
    DailyReport, DailyReportId, DailyReportSubmission, EquipmentUsage, LegacyMaterialUse,
    MaterialStockInput,
};
pub use stock::{
    Deduction, DeductionSource, MaterialStockEntry, OpeningStock, equipment_in_use,
    plan_deductions,
};
