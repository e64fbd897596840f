//! Daily progress reports and the on-site stock chain.
//!
//! Filing a report resolves each material entry against the chain, stores the
//! report with the resolved values frozen in it, then applies usage to the
//! inventory ledger (at most one deduction per item) and flags used equipment.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};

use siteledger_core::{Actor, AggregateId, AggregateRoot, DomainError, ExpectedVersion, ProjectId};
use siteledger_daily_report::{
    DailyReport, DailyReportEvent, DailyReportFiled, DailyReportId, DailyReportSubmission,
    Deduction, MaterialStockEntry, OpeningStock, StockShortfallRecorded, equipment_in_use,
    plan_deductions,
};
use siteledger_inventory::{
    ClampedConsumption, EquipmentInUse, InventoryEvent, InventoryItemId, QuantityAdjusted,
};

use super::inventory::ITEM_AGGREGATE;
use super::{AttemptError, EngineContext, retry_on_conflict};
use crate::error::ServiceResult;

const REPORT_AGGREGATE: &str = "daily_report";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DeductionResult {
    Applied(ClampedConsumption),
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeductionOutcome {
    #[serde(flatten)]
    pub deduction: Deduction,
    #[serde(flatten)]
    pub result: DeductionResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyReportOutcome {
    pub report: DailyReport,
    pub deductions: Vec<DeductionOutcome>,
    /// Equipment lines flagged `in_use` by this report.
    pub equipment_in_use: Vec<InventoryItemId>,
}

#[derive(Clone)]
pub struct DailyStockService {
    ctx: Arc<EngineContext>,
}

impl DailyStockService {
    pub(crate) fn new(ctx: Arc<EngineContext>) -> Self {
        Self { ctx }
    }

    /// Opening stock a report for `date` would start from.
    pub fn opening_stock(
        &self,
        project_id: ProjectId,
        item_id: InventoryItemId,
        date: NaiveDate,
    ) -> ServiceResult<OpeningStock> {
        if let Some((from_date, entry)) =
            self.ctx
                .stores
                .reports
                .latest_entry_before(project_id, item_id, date)?
        {
            return Ok(OpeningStock::CarriedForward {
                from_date,
                closing: entry.closing_stock,
            });
        }

        let item = self
            .ctx
            .stores
            .inventory
            .get(item_id)?
            .ok_or_else(|| DomainError::not_found("inventory item", item_id))?;
        Ok(OpeningStock::LedgerFallback {
            quantity: item.quantity(),
        })
    }

    pub fn file_report(
        &self,
        actor: &Actor,
        submission: DailyReportSubmission,
    ) -> ServiceResult<DailyReportOutcome> {
        submission.validate()?;

        let mut entries = Vec::with_capacity(submission.material_stock_entries.len());
        for input in &submission.material_stock_entries {
            let item = self
                .ctx
                .stores
                .inventory
                .get(input.inventory_id)?
                .ok_or_else(|| DomainError::not_found("inventory item", input.inventory_id))?;
            if item.project_id() != submission.project_id {
                return Err(DomainError::validation(format!(
                    "inventory item {} does not belong to project {}",
                    input.inventory_id, submission.project_id
                ))
                .into());
            }
            let opening = self.opening_stock(submission.project_id, input.inventory_id, submission.date)?;
            entries.push(MaterialStockEntry::resolve(input, opening));
        }

        let now = Utc::now();
        let report = DailyReport::file(
            DailyReportId::new(AggregateId::new()),
            submission,
            entries,
            Some(actor.id),
            now,
        );
        self.ctx.stores.reports.insert(report.clone())?;

        for entry in report.material_stock_entries.iter().filter(|e| e.clamped) {
            self.record_shortfall(actor, &report, entry);
        }

        let deductions: Vec<DeductionOutcome> =
            plan_deductions(&report.material_stock_entries, &report.materials_used_entries)
                .into_iter()
                .map(|d| self.apply_deduction(actor, &report, d))
                .collect();

        let mut marked = Vec::new();
        for (item_id, hours) in equipment_in_use(&report.equipment_entries) {
            if self.mark_equipment(actor, &report, item_id, hours) {
                marked.push(item_id);
            }
        }

        info!(
            report_id = %report.id,
            project_id = %report.project_id,
            date = %report.date,
            deductions = deductions.len(),
            equipment_in_use = marked.len(),
            "daily report filed"
        );
        self.ctx.audit.record(
            actor,
            report.id.0,
            REPORT_AGGREGATE,
            &DailyReportEvent::DailyReportFiled(DailyReportFiled {
                report_id: report.id,
                project_id: report.project_id,
                date: report.date,
                deductions: deductions.len(),
                equipment_in_use: marked.len(),
                occurred_at: now,
            }),
        );

        Ok(DailyReportOutcome {
            report,
            deductions,
            equipment_in_use: marked,
        })
    }

    /// Reports, newest date first.
    pub fn list_reports(&self, project_id: Option<ProjectId>) -> ServiceResult<Vec<DailyReport>> {
        Ok(self.ctx.stores.reports.list(project_id)?)
    }

    pub fn get_report(&self, id: DailyReportId) -> ServiceResult<DailyReport> {
        self.ctx
            .stores
            .reports
            .get(id)?
            .ok_or_else(|| DomainError::not_found("daily report", id).into())
    }

    fn record_shortfall(&self, actor: &Actor, report: &DailyReport, entry: &MaterialStockEntry) {
        warn!(
            report_id = %report.id,
            inventory_id = %entry.inventory_id,
            opening_stock = entry.opening_stock,
            received = entry.received,
            used = entry.used,
            shortfall = entry.shortfall(),
            "daily usage exceeds available stock, closing stock clamped to zero"
        );
        self.ctx.audit.record(
            actor,
            report.id.0,
            REPORT_AGGREGATE,
            &DailyReportEvent::StockShortfallRecorded(StockShortfallRecorded {
                report_id: report.id,
                inventory_id: entry.inventory_id,
                opening_stock: entry.opening_stock,
                received: entry.received,
                used: entry.used,
                shortfall: entry.shortfall(),
                occurred_at: report.created_at,
            }),
        );
    }

    fn apply_deduction(&self, actor: &Actor, report: &DailyReport, deduction: Deduction) -> DeductionOutcome {
        let inventory = &self.ctx.stores.inventory;
        let attempt = retry_on_conflict("apply daily usage", self.ctx.config.cas_retries, || {
            let mut item = inventory.get(deduction.inventory_id)?.ok_or_else(|| {
                DomainError::not_found("inventory item", deduction.inventory_id)
            })?;
            let expected = ExpectedVersion::Exact(item.version());
            let consumption = item.consume_clamped(deduction.quantity, Utc::now())?;
            inventory.save(item, expected)?;
            Ok::<_, AttemptError>(consumption)
        });

        let result = match attempt {
            Ok(consumption) => {
                if consumption.shortfall > 0.0 {
                    warn!(
                        report_id = %report.id,
                        inventory_id = %deduction.inventory_id,
                        requested = deduction.quantity,
                        previous_quantity = consumption.previous_quantity,
                        shortfall = consumption.shortfall,
                        "ledger quantity clamped to zero by daily usage"
                    );
                }
                self.ctx.audit.record(
                    actor,
                    deduction.inventory_id.0,
                    ITEM_AGGREGATE,
                    &InventoryEvent::QuantityAdjusted(QuantityAdjusted {
                        item_id: deduction.inventory_id,
                        previous_quantity: consumption.previous_quantity,
                        new_quantity: consumption.new_quantity,
                        reason: format!("daily_report:{}", report.id),
                        occurred_at: Utc::now(),
                    }),
                );
                DeductionResult::Applied(consumption)
            }
            Err(err) => {
                warn!(
                    report_id = %report.id,
                    inventory_id = %deduction.inventory_id,
                    source = ?deduction.source,
                    error = %err,
                    "daily usage not applied to inventory"
                );
                DeductionResult::Skipped {
                    reason: err.to_string(),
                }
            }
        };

        DeductionOutcome { deduction, result }
    }

    fn mark_equipment(&self, actor: &Actor, report: &DailyReport, item_id: InventoryItemId, hours: f64) -> bool {
        let inventory = &self.ctx.stores.inventory;
        let attempt = retry_on_conflict("mark equipment in use", self.ctx.config.cas_retries, || {
            let mut item = inventory
                .get(item_id)?
                .ok_or_else(|| DomainError::not_found("inventory item", item_id))?;
            let expected = ExpectedVersion::Exact(item.version());
            if !item.mark_in_use(Utc::now()) {
                return Ok(false);
            }
            inventory.save(item, expected)?;
            Ok::<_, AttemptError>(true)
        });

        match attempt {
            Ok(true) => {
                self.ctx.audit.record(
                    actor,
                    item_id.0,
                    ITEM_AGGREGATE,
                    &InventoryEvent::EquipmentInUse(EquipmentInUse {
                        item_id,
                        hours,
                        occurred_at: Utc::now(),
                    }),
                );
                true
            }
            Ok(false) => {
                warn!(report_id = %report.id, inventory_id = %item_id, "equipment usage references a material item, ignored");
                false
            }
            Err(err) => {
                warn!(report_id = %report.id, inventory_id = %item_id, error = %err, "equipment status not updated");
                false
            }
        }
    }
}
