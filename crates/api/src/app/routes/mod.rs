use axum::{routing::get, Router};

pub mod accounts;
pub mod allocations;
pub mod invoices;
pub mod system;

/// Router for all tenant-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/accounts", get(accounts::list_accounts))
        .nest("/invoices", invoices::router())
        .merge(allocations::router())
}
