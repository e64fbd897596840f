use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
};

use siteledger_inventory::{InventoryItemId, ItemChanges, TransferRequest};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::CallerContext;

pub fn router() -> Router {
    Router::new()
        .route("/items", post(create_item).get(list_items))
        .route(
            "/items/:id",
            get(get_item).put(update_item).delete(delete_item),
        )
        .route("/items/:id/quantity", patch(update_quantity))
        .route("/dashboard", get(dashboard))
        .route("/transfer", post(transfer_stock))
}

fn parse_item_id(raw: &str) -> Result<InventoryItemId, axum::response::Response> {
    errors::parse_aggregate_id(raw).map(InventoryItemId::new)
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Json(body): Json<dto::CreateItemRequest>,
) -> axum::response::Response {
    let input = match body.into_new_item() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.engine().inventory.create(caller.actor(), input) {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::InventoryListQuery>,
) -> axum::response::Response {
    let filter = match query.into_filter() {
        Ok(f) => f,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.engine().inventory.list(&filter) {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_item_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.engine().inventory.get(id) {
        Ok(item) => (StatusCode::OK, Json(item)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Json(changes): Json<ItemChanges>,
) -> axum::response::Response {
    let id = match parse_item_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.engine().inventory.update(caller.actor(), id, changes) {
        Ok(item) => (StatusCode::OK, Json(item)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn update_quantity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateQuantityRequest>,
) -> axum::response::Response {
    let id = match parse_item_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services
        .engine()
        .inventory
        .adjust(caller.actor(), id, body.adjustment())
    {
        Ok(item) => (StatusCode::OK, Json(item)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id = match parse_item_id(&id) {
        Ok(v) => v,
        Err(res) => return res,
    };

    match services.engine().inventory.delete(caller.actor(), id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn dashboard(
    Extension(services): Extension<Arc<AppServices>>,
    Query(query): Query<dto::ProjectQuery>,
) -> axum::response::Response {
    let project_id = match query.project_id() {
        Ok(v) => v,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.engine().inventory.dashboard(project_id) {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// Move stock to another project; the destination line is created when the
/// request names none.
pub async fn transfer_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(caller): Extension<CallerContext>,
    Json(body): Json<TransferRequest>,
) -> axum::response::Response {
    match services.engine().transfers.transfer(caller.actor(), &body) {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(e) => errors::service_error_to_response(e),
    }
}
