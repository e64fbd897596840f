use chrono::NaiveDate;
use sqlx::Row;
use sqlx::types::Json;
use uuid::Uuid;

use siteledger_core::ProjectId;
use siteledger_daily_report::{DailyReport, DailyReportId, MaterialStockEntry};
use siteledger_inventory::InventoryItemId;

use super::{PgExecutor, decode_error, is_unique_violation, map_sqlx_error};
use crate::error::RepositoryError;
use crate::repository::DailyReportRepository;

/// Reports in `daily_reports`; their stock entries are indexed again in
/// `daily_stock_entries`, whose primary key is the chain's natural key.
#[derive(Debug, Clone)]
pub struct PostgresDailyReportRepository {
    db: PgExecutor,
}

impl PostgresDailyReportRepository {
    pub fn new(db: PgExecutor) -> Self {
        Self { db }
    }
}

fn decode(row: &sqlx::postgres::PgRow) -> Result<DailyReport, RepositoryError> {
    row.try_get::<Json<DailyReport>, _>("doc")
        .map(|doc| doc.0)
        .map_err(|e| decode_error("daily report", e))
}

impl DailyReportRepository for PostgresDailyReportRepository {
    fn get(&self, id: DailyReportId) -> Result<Option<DailyReport>, RepositoryError> {
        self.db.run(async {
            let row = sqlx::query("SELECT doc FROM daily_reports WHERE id = $1")
                .bind(*id.0.as_uuid())
                .fetch_optional(self.db.pool())
                .await
                .map_err(|e| map_sqlx_error("get daily report", e))?;
            row.as_ref().map(decode).transpose()
        })
    }

    fn list(&self, project_id: Option<ProjectId>) -> Result<Vec<DailyReport>, RepositoryError> {
        let project: Option<Uuid> = project_id.map(|p| *p.as_uuid());
        self.db.run(async {
            let rows = sqlx::query(
                r#"
                SELECT doc FROM daily_reports
                WHERE ($1::UUID IS NULL OR project_id = $1)
                ORDER BY report_date DESC, created_at DESC
                "#,
            )
            .bind(project)
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| map_sqlx_error("list daily reports", e))?;
            rows.iter().map(decode).collect()
        })
    }

    fn insert(&self, report: DailyReport) -> Result<(), RepositoryError> {
        self.db.run(async {
            let mut tx = self
                .db
                .pool()
                .begin()
                .await
                .map_err(|e| map_sqlx_error("begin transaction", e))?;

            sqlx::query(
                r#"
                INSERT INTO daily_reports (id, project_id, report_date, created_at, doc)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(*report.id.0.as_uuid())
            .bind(*report.project_id.as_uuid())
            .bind(report.date)
            .bind(report.created_at)
            .bind(Json(&report))
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    RepositoryError::Duplicate(format!("daily report {}", report.id))
                } else {
                    map_sqlx_error("insert daily report", e)
                }
            })?;

            for entry in &report.material_stock_entries {
                sqlx::query(
                    r#"
                    INSERT INTO daily_stock_entries
                        (project_id, inventory_id, report_date, report_id, entry)
                    VALUES ($1, $2, $3, $4, $5)
                    "#,
                )
                .bind(*report.project_id.as_uuid())
                .bind(*entry.inventory_id.0.as_uuid())
                .bind(report.date)
                .bind(*report.id.0.as_uuid())
                .bind(Json(entry))
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    if is_unique_violation(&e) {
                        RepositoryError::Duplicate(format!(
                            "a daily report for {} already records stock for item {}",
                            report.date, entry.inventory_id
                        ))
                    } else {
                        map_sqlx_error("insert daily stock entry", e)
                    }
                })?;
            }

            tx.commit()
                .await
                .map_err(|e| map_sqlx_error("commit transaction", e))
        })
    }

    fn latest_entry_before(
        &self,
        project_id: ProjectId,
        item: InventoryItemId,
        date: NaiveDate,
    ) -> Result<Option<(NaiveDate, MaterialStockEntry)>, RepositoryError> {
        self.db.run(async {
            let row = sqlx::query(
                r#"
                SELECT report_date, entry FROM daily_stock_entries
                WHERE project_id = $1 AND inventory_id = $2 AND report_date < $3
                ORDER BY report_date DESC
                LIMIT 1
                "#,
            )
            .bind(*project_id.as_uuid())
            .bind(*item.0.as_uuid())
            .bind(date)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| map_sqlx_error("latest daily stock entry", e))?;

            let Some(row) = row else {
                return Ok(None);
            };
            let report_date: NaiveDate = row
                .try_get("report_date")
                .map_err(|e| decode_error("daily stock entry", e))?;
            let entry = row
                .try_get::<Json<MaterialStockEntry>, _>("entry")
                .map_err(|e| decode_error("daily stock entry", e))?;
            Ok(Some((report_date, entry.0)))
        })
    }
}
