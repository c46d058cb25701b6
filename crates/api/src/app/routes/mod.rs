use axum::{Router, routing::get};

pub mod customers;
pub mod daily_inventory;
pub mod inventory;
pub mod invoices;
pub mod pos;
pub mod products;
pub mod returns;
pub mod system;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/stream", get(system::stream))
        .nest("/customers", customers::router())
        .nest("/products", products::router())
        .nest("/inventory", inventory::router())
        .nest("/invoices", invoices::router())
        .nest("/pos", pos::router())
        .nest("/returns", returns::router())
        .nest("/daily-inventory", daily_inventory::router())
}
