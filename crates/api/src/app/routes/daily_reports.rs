use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use siteledger_daily_report::{DailyReportId, DailyReportSubmission};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(file_report).get(list_reports))
        .route("/opening-stock", get(opening_stock))
        .route("/:id", get(get_report))
}

/// File a DPR and post its material usage to the inventory ledger.
pub async fn file_report(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Json(body): Json<DailyReportSubmission>,
) -> axum::response::Response {
    match services.engine().daily_reports.file_report(caller.actor(), body) {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_reports(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ProjectQuery>,
) -> axum::response::Response {
    let project_id = match query.project_id() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.engine().daily_reports.list_reports(project_id) {
        Ok(reports) => (StatusCode::OK, Json(reports)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_report(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_aggregate_id(&id) {
        Ok(v) => DailyReportId::new(v),
        Err(res) => return res,
    };

    match services.engine().daily_reports.get_report(id) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn opening_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::OpeningStockQuery>,
) -> axum::response::Response {
    let (project_id, inventory_id, date) = match query.parse() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services
        .engine()
        .daily_reports
        .opening_stock(project_id, inventory_id, date)
    {
        Ok(opening) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "project_id": project_id,
                "inventory_id": inventory_id,
                "date": date,
                "opening_stock": opening.quantity(),
                "basis": opening,
            })),
        )
            .into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
