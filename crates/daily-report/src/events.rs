use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use siteledger_core::ProjectId;
use siteledger_events::Event;
use siteledger_inventory::InventoryItemId;

use crate::report::DailyReportId;

/// Event: DailyReportFiled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReportFiled {
    pub report_id: DailyReportId,
    pub project_id: ProjectId,
    pub date: NaiveDate,
    pub deductions: usize,
    pub equipment_in_use: usize,
    pub occurred_at: DateTime<Utc>,
}

/// Event: StockShortfallRecorded.
///
/// Reported usage exceeded the stock available for the day; the closing stock
/// was clamped at zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockShortfallRecorded {
    pub report_id: DailyReportId,
    pub inventory_id: InventoryItemId,
    pub opening_stock: f64,
    pub received: f64,
    pub used: f64,
    pub shortfall: f64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DailyReportEvent {
    DailyReportFiled(DailyReportFiled),
    StockShortfallRecorded(StockShortfallRecorded),
}

impl Event for DailyReportEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DailyReportEvent::DailyReportFiled(_) => "daily_report.filed",
            DailyReportEvent::StockShortfallRecorded(_) => "daily_report.stock_shortfall",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DailyReportEvent::DailyReportFiled(e) => e.occurred_at,
            DailyReportEvent::StockShortfallRecorded(e) => e.occurred_at,
        }
    }
}

impl DailyReportEvent {
    pub fn report_id(&self) -> DailyReportId {
        match self {
            DailyReportEvent::DailyReportFiled(e) => e.report_id,
            DailyReportEvent::StockShortfallRecorded(e) => e.report_id,
        }
    }
}
