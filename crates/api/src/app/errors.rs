use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{Value, json};
use tracing::error;

use siteledger_core::{AggregateId, DomainError};
use siteledger_infra::{RepositoryError, ServiceError};

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    match err {
        ServiceError::Domain(e) => domain_error_to_response(e),
        ServiceError::Store(e) => {
            error!(error = %e, "store failure");
            let status = match e {
                RepositoryError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            let code = ServiceError::Store(e.clone()).code();
            json_error(status, code, e.to_string())
        }
    }
}

/// Map a domain error to its status, carrying the numbers a client needs to
/// render the failure next to the `error`/`message` pair.
pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let (status, context) = match &err {
        DomainError::NotFound { entity, id } => {
            (StatusCode::NOT_FOUND, json!({ "entity": entity, "id": id }))
        }
        DomainError::InvalidReference { index, line_count } => (
            StatusCode::BAD_REQUEST,
            json!({ "po_item_index": index, "line_count": line_count }),
        ),
        DomainError::InvalidQuantity { quantity, .. } => {
            (StatusCode::BAD_REQUEST, json!({ "quantity": quantity }))
        }
        DomainError::Validation(_) | DomainError::InvalidId(_) => (StatusCode::BAD_REQUEST, Value::Null),
        DomainError::OverReceipt {
            line_index,
            description,
            requested,
            ordered,
            already_received,
            remaining,
        } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({
                "po_item_index": line_index,
                "description": description,
                "requested": requested,
                "ordered": ordered,
                "already_received": already_received,
                "remaining": remaining,
            }),
        ),
        DomainError::InsufficientStock {
            item_name,
            requested,
            available,
            unit,
        } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({
                "item_name": item_name,
                "requested": requested,
                "available": available,
                "unit": unit,
            }),
        ),
        DomainError::SameProject { project_id } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            json!({ "project_id": project_id }),
        ),
        DomainError::Conflict(_) => (StatusCode::CONFLICT, Value::Null),
    };

    let mut body = json!({
        "error": err.code(),
        "message": err.to_string(),
    });
    if let (Value::Object(dst), Value::Object(src)) = (&mut body, context) {
        dst.extend(src);
    }
    (status, axum::Json(body)).into_response()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn parse_aggregate_id(raw: &str) -> Result<AggregateId, axum::response::Response> {
    raw.parse::<AggregateId>().map_err(domain_error_to_response)
}
