//! Cashier counter: barcode/SKU lookup and checkout.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde::Serialize;

use storeledger_infra::projections::ProductReadModel;
use storeledger_infra::workflows::CheckoutRequest;

use crate::app::dto::LookupQuery;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/lookup", get(lookup))
        .route("/checkout", post(checkout))
}

#[derive(Debug, Serialize)]
pub struct LookupResult {
    #[serde(flatten)]
    pub product: ProductReadModel,
    pub on_hand: i64,
}

pub async fn lookup(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<LookupQuery>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "products.read")?;
    let hub = services.shop().hub();
    let product = hub
        .products
        .lookup(tenant.tenant_id(), query.code.trim())
        .ok_or_else(|| ApiError::NotFound(format!("product with code `{}`", query.code)))?;
    Ok(Json(LookupResult {
        on_hand: hub.stock.on_hand(tenant.tenant_id(), &product.product_id),
        product,
    }))
}

pub async fn checkout(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<CheckoutRequest>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "pos.checkout")?;
    let receipt = services.shop().checkout(
        tenant.tenant_id(),
        Some(principal.user_id()),
        body,
        Utc::now(),
    )?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
