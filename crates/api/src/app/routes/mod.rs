use axum::{Router, routing::get};

pub mod daily_reports;
pub mod inventory;
pub mod procurement;
pub mod system;

/// Router for all endpoints that need a caller identity.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/inventory", inventory::router())
        .nest("/procurement", procurement::router())
        .nest("/daily-reports", daily_reports::router())
}
