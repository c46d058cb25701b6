use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use crate::app::dto::{self, AdjustStockRequest, Items, ReceiveStockRequest};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_stock))
        .route("/:product_id", get(get_stock))
        .route("/:product_id/receive", post(receive_stock))
        .route("/:product_id/adjust", post(adjust_stock))
}

pub async fn list_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "inventory.read")?;
    Ok(Json(Items::from(
        services.shop().hub().stock.list(tenant.tenant_id()),
    )))
}

/// Stock level of one product with its movement history.
pub async fn get_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(product_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "inventory.read")?;
    let product_id = dto::parse_product_id(&product_id)?;
    services
        .shop()
        .hub()
        .stock
        .get(tenant.tenant_id(), &product_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("stock of product {product_id}")))
}

pub async fn receive_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(product_id): Path<String>,
    Json(body): Json<ReceiveStockRequest>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "inventory.receive")?;
    let product_id = dto::parse_product_id(&product_id)?;
    let level = services.shop().receive_stock(
        tenant.tenant_id(),
        product_id,
        body.quantity,
        body.unit_cost,
        body.note,
        Utc::now(),
    )?;
    Ok(Json(level))
}

pub async fn adjust_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(product_id): Path<String>,
    Json(body): Json<AdjustStockRequest>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "inventory.adjust")?;
    let product_id = dto::parse_product_id(&product_id)?;
    let level = services.shop().adjust_stock(
        tenant.tenant_id(),
        product_id,
        body.delta,
        body.reason,
        Utc::now(),
    )?;
    Ok(Json(level))
}
