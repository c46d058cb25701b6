use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use storeledger_infra::workflows::NewProduct;
use storeledger_products::Pricing;

use crate::app::dto::{self, Items, ProductQuery};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/:id", get(get_product))
        .route("/:id/pricing", post(change_pricing))
        .route("/:id/archive", post(archive_product))
        .route("/:id/restore", post(restore_product))
}

/// Create a product; its stock item is opened at the reference cost.
pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewProduct>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "products.create")?;
    let product = services
        .shop()
        .create_product(tenant.tenant_id(), body, Utc::now())?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "products.read")?;
    let items = services.shop().hub().products.search(
        tenant.tenant_id(),
        query.category,
        query.q.as_deref(),
    );
    Ok(Json(Items::from(items)))
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "products.read")?;
    let product_id = dto::parse_product_id(&id)?;
    services
        .shop()
        .hub()
        .products
        .get(tenant.tenant_id(), &product_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("product {product_id}")))
}

pub async fn change_pricing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(pricing): Json<Pricing>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "products.price")?;
    let product_id = dto::parse_product_id(&id)?;
    let product = services
        .shop()
        .change_pricing(tenant.tenant_id(), product_id, pricing, Utc::now())?;
    Ok(Json(product))
}

pub async fn archive_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "products.archive")?;
    let product_id = dto::parse_product_id(&id)?;
    let product = services
        .shop()
        .archive_product(tenant.tenant_id(), product_id, Utc::now())?;
    Ok(Json(product))
}

pub async fn restore_product(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "products.restore")?;
    let product_id = dto::parse_product_id(&id)?;
    let product = services
        .shop()
        .restore_product(tenant.tenant_id(), product_id, Utc::now())?;
    Ok(Json(product))
}
