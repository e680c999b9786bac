use axum::{routing::get, Router};

use crate::billing;

async fn root() -> &'static str {
    "Tenant Billing API"
}

pub fn api_routes() -> Router {
    Router::new()
        .route("/", get(root))
        .merge(billing::routes())
}
