use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::NaiveDate;

use siteledger_core::ProjectId;
use siteledger_daily_report::{DailyReport, DailyReportId, MaterialStockEntry};
use siteledger_inventory::InventoryItemId;

use crate::error::RepositoryError;

/// Store of filed daily reports.
///
/// (project, item, date) is a natural key for material stock entries: a second
/// report carrying an entry for the same item on the same day is refused.
pub trait DailyReportRepository: Send + Sync {
    fn get(&self, id: DailyReportId) -> Result<Option<DailyReport>, RepositoryError>;

    /// Reports ordered by date, newest first.
    fn list(&self, project_id: Option<ProjectId>) -> Result<Vec<DailyReport>, RepositoryError>;

    fn insert(&self, report: DailyReport) -> Result<(), RepositoryError>;

    /// The stock entry for `item` in the latest report of `project` dated
    /// strictly before `date`.
    fn latest_entry_before(
        &self,
        project_id: ProjectId,
        item: InventoryItemId,
        date: NaiveDate,
    ) -> Result<Option<(NaiveDate, MaterialStockEntry)>, RepositoryError>;
}

impl<R> DailyReportRepository for Arc<R>
where
    R: DailyReportRepository + ?Sized,
{
    fn get(&self, id: DailyReportId) -> Result<Option<DailyReport>, RepositoryError> {
        (**self).get(id)
    }

    fn list(&self, project_id: Option<ProjectId>) -> Result<Vec<DailyReport>, RepositoryError> {
        (**self).list(project_id)
    }

    fn insert(&self, report: DailyReport) -> Result<(), RepositoryError> {
        (**self).insert(report)
    }

    fn latest_entry_before(
        &self,
        project_id: ProjectId,
        item: InventoryItemId,
        date: NaiveDate,
    ) -> Result<Option<(NaiveDate, MaterialStockEntry)>, RepositoryError> {
        (**self).latest_entry_before(project_id, item, date)
    }
}

#[derive(Debug, Default)]
pub struct InMemoryDailyReportRepository {
    reports: RwLock<HashMap<DailyReportId, DailyReport>>,
}

impl InMemoryDailyReportRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DailyReportRepository for InMemoryDailyReportRepository {
    fn get(&self, id: DailyReportId) -> Result<Option<DailyReport>, RepositoryError> {
        let map = self.reports.read().map_err(|_| RepositoryError::poisoned())?;
        Ok(map.get(&id).cloned())
    }

    fn list(&self, project_id: Option<ProjectId>) -> Result<Vec<DailyReport>, RepositoryError> {
        let map = self.reports.read().map_err(|_| RepositoryError::poisoned())?;
        let mut reports: Vec<DailyReport> = map
            .values()
            .filter(|r| project_id.is_none_or(|p| r.project_id == p))
            .cloned()
            .collect();
        reports.sort_by(|a, b| b.date.cmp(&a.date).then(b.created_at.cmp(&a.created_at)));
        Ok(reports)
    }

    fn insert(&self, report: DailyReport) -> Result<(), RepositoryError> {
        let mut map = self.reports.write().map_err(|_| RepositoryError::poisoned())?;
        if map.contains_key(&report.id) {
            return Err(RepositoryError::Duplicate(format!("daily report {}", report.id)));
        }

        let same_day = map
            .values()
            .filter(|r| r.project_id == report.project_id && r.date == report.date);
        for existing in same_day {
            if let Some(entry) = report
                .material_stock_entries
                .iter()
                .find(|e| existing.stock_entry(e.inventory_id).is_some())
            {
                return Err(RepositoryError::Duplicate(format!(
                    "a daily report for {} already records stock for item {}",
                    report.date, entry.inventory_id
                )));
            }
        }

        map.insert(report.id, report);
        Ok(())
    }

    fn latest_entry_before(
        &self,
        project_id: ProjectId,
        item: InventoryItemId,
        date: NaiveDate,
    ) -> Result<Option<(NaiveDate, MaterialStockEntry)>, RepositoryError> {
        let map = self.reports.read().map_err(|_| RepositoryError::poisoned())?;
        Ok(map
            .values()
            .filter(|r| r.project_id == project_id && r.date < date)
            .filter_map(|r| r.stock_entry(item).map(|e| (r.date, e.clone())))
            .max_by_key(|(d, _)| *d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use siteledger_core::AggregateId;
    use siteledger_daily_report::{DailyReportSubmission, MaterialStockInput, OpeningStock};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn report(project_id: ProjectId, day: u32, item: InventoryItemId, closing: f64) -> DailyReport {
        let input = MaterialStockInput {
            inventory_id: item,
            received: 0.0,
            used: 0.0,
        };
        let entry = MaterialStockEntry::resolve(&input, OpeningStock::LedgerFallback { quantity: closing });
        DailyReport::file(
            DailyReportId::new(AggregateId::new()),
            DailyReportSubmission {
                project_id,
                date: date(day),
                weather: None,
                work_done: String::new(),
                notes: None,
                material_stock_entries: vec![input],
                materials_used_entries: Vec::new(),
                equipment_entries: Vec::new(),
            },
            vec![entry],
            None,
            Utc::now(),
        )
    }

    #[test]
    fn latest_entry_before_skips_same_and_later_dates() {
        let repo = InMemoryDailyReportRepository::new();
        let project = ProjectId::new();
        let item = InventoryItemId::new(AggregateId::new());

        repo.insert(report(project, 5, item, 10.0)).unwrap();
        repo.insert(report(project, 8, item, 20.0)).unwrap();
        repo.insert(report(project, 12, item, 30.0)).unwrap();

        let (d, entry) = repo.latest_entry_before(project, item, date(12)).unwrap().unwrap();
        assert_eq!(d, date(8));
        assert_eq!(entry.closing_stock, 20.0);
        assert!(repo.latest_entry_before(project, item, date(5)).unwrap().is_none());
        assert!(
            repo.latest_entry_before(ProjectId::new(), item, date(30))
                .unwrap()
                .is_none()
        );
    }

    #[test]
    fn same_day_entry_for_same_item_is_refused() {
        let repo = InMemoryDailyReportRepository::new();
        let project = ProjectId::new();
        let item = InventoryItemId::new(AggregateId::new());

        repo.insert(report(project, 10, item, 1.0)).unwrap();
        assert!(matches!(
            repo.insert(report(project, 10, item, 2.0)),
            Err(RepositoryError::Duplicate(_))
        ));
        repo.insert(report(project, 10, InventoryItemId::new(AggregateId::new()), 2.0))
            .unwrap();
        assert_eq!(repo.list(Some(project)).unwrap().len(), 2);
    }
}
