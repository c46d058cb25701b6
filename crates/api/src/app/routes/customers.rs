use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use storeledger_infra::workflows::{CustomerChanges, NewCustomer};

use crate::app::dto::{self, CustomerView, Items, ReasonRequest};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_customer).get(list_customers))
        .route("/debtors", get(list_debtors))
        .route("/:id", get(get_customer).patch(update_customer))
        .route("/:id/suspend", post(suspend_customer))
        .route("/:id/reactivate", post(reactivate_customer))
        .route("/:id/transactions", get(customer_transactions))
}

pub async fn register_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<NewCustomer>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "customers.register")?;
    let customer = services
        .shop()
        .register_customer(tenant.tenant_id(), body, Utc::now())?;
    Ok((StatusCode::CREATED, Json(customer)))
}

pub async fn list_customers(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "customers.read")?;
    let hub = services.shop().hub();
    let items: Vec<CustomerView> = hub
        .customers
        .list(tenant.tenant_id())
        .into_iter()
        .map(|customer| CustomerView {
            balance: hub.balances.get(tenant.tenant_id(), customer.customer_id),
            customer,
        })
        .collect();
    Ok(Json(Items::from(items)))
}

/// Customers who owe the shop (or are owed), largest debt first.
pub async fn list_debtors(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "customers.read")?;
    let hub = services.shop().hub();
    let items: Vec<CustomerView> = hub
        .balances
        .debtors(tenant.tenant_id())
        .into_iter()
        .filter_map(|balance| {
            let customer = hub.customers.get(tenant.tenant_id(), &balance.customer_id?)?;
            Some(CustomerView { customer, balance })
        })
        .collect();
    Ok(Json(Items::from(items)))
}

pub async fn get_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "customers.read")?;
    let customer_id = dto::parse_customer_id(&id)?;
    let hub = services.shop().hub();
    let customer = hub
        .customers
        .get(tenant.tenant_id(), &customer_id)
        .ok_or_else(|| ApiError::NotFound(format!("customer {customer_id}")))?;
    Ok(Json(CustomerView {
        balance: hub.balances.get(tenant.tenant_id(), customer_id),
        customer,
    }))
}

pub async fn update_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<CustomerChanges>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "customers.update")?;
    let customer_id = dto::parse_customer_id(&id)?;
    let customer = services
        .shop()
        .update_customer(tenant.tenant_id(), customer_id, body, Utc::now())?;
    Ok(Json(customer))
}

pub async fn suspend_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<ReasonRequest>>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "customers.suspend")?;
    let customer_id = dto::parse_customer_id(&id)?;
    let reason = body.and_then(|Json(b)| b.reason);
    let customer = services
        .shop()
        .suspend_customer(tenant.tenant_id(), customer_id, reason, Utc::now())?;
    Ok(Json(customer))
}

pub async fn reactivate_customer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "customers.reactivate")?;
    let customer_id = dto::parse_customer_id(&id)?;
    let customer = services
        .shop()
        .reactivate_customer(tenant.tenant_id(), customer_id, Utc::now())?;
    Ok(Json(customer))
}

/// A customer's purchases, returns and settlements, newest first.
pub async fn customer_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "customers.read")?;
    let customer_id = dto::parse_customer_id(&id)?;
    let hub = services.shop().hub();
    if hub.customers.get(tenant.tenant_id(), &customer_id).is_none() {
        return Err(ApiError::NotFound(format!("customer {customer_id}")));
    }
    Ok(Json(Items::from(
        hub.transactions.for_customer(tenant.tenant_id(), customer_id),
    )))
}
