use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};

use siteledger_purchasing::{
    GoodsReceiptId, NewPurchaseOrder, PurchaseOrderId, PurchaseOrderStatus, ReceiptSubmission,
};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .nest("/orders", orders_router())
        .nest("/receipts", receipts_router())
}

fn orders_router() -> Router {
    Router::new()
        .route("/", post(issue_order).get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/status", patch(change_order_status))
}

fn receipts_router() -> Router {
    Router::new()
        .route("/", post(submit_receipt).get(list_receipts))
        .route("/:id", get(get_receipt))
}

pub async fn issue_order(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Json(body): Json<NewPurchaseOrder>,
) -> axum::response::Response {
    match services.engine().procurement.issue_order(caller.actor(), body) {
        Ok(order) => (StatusCode::CREATED, Json(order)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_orders(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::OrderListQuery>,
) -> axum::response::Response {
    let filter = match query.into_filter() {
        Ok(f) => f,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.engine().procurement.list_orders(&filter) {
        Ok(orders) => (StatusCode::OK, Json(orders)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Order plus per-line ordered / received / pending quantities.
pub async fn get_order(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_aggregate_id(&id) {
        Ok(v) => PurchaseOrderId::new(v),
        Err(res) => return res,
    };

    match services.engine().procurement.order_detail(id) {
        Ok(detail) => (StatusCode::OK, Json(detail)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn change_order_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ChangeStatusRequest>,
) -> axum::response::Response {
    let id = match errors::parse_aggregate_id(&id) {
        Ok(v) => PurchaseOrderId::new(v),
        Err(res) => return res,
    };
    let next: PurchaseOrderStatus = match body.status.parse() {
        Ok(s) => s,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services
        .engine()
        .procurement
        .change_status(caller.actor(), id, next)
    {
        Ok(order) => (StatusCode::OK, Json(order)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Record a GRN. The response carries the accepted receipt, the updated line
/// status and the per-line ledger posting result.
pub async fn submit_receipt(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Json(body): Json<ReceiptSubmission>,
) -> axum::response::Response {
    match services.engine().procurement.submit_receipt(caller.actor(), body) {
        Ok(outcome) => (StatusCode::CREATED, Json(outcome)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_receipts(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ReceiptListQuery>,
) -> axum::response::Response {
    let po_id = match query.po_id() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.engine().procurement.list_receipts(po_id) {
        Ok(receipts) => (StatusCode::OK, Json(receipts)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_receipt(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match errors::parse_aggregate_id(&id) {
        Ok(v) => GoodsReceiptId::new(v),
        Err(res) => return res,
    };

    match services.engine().procurement.receipt_detail(id) {
        Ok(detail) => (StatusCode::OK, Json(detail)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
