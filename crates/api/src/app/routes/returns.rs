use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use storeledger_infra::workflows::ReturnRequest;

use crate::app::dto;
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", post(record_return))
        .route("/:invoice_id", get(get_ledger))
}

/// Return or exchange against an original invoice.
pub async fn record_return(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Json(body): Json<ReturnRequest>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "returns.record")?;
    let receipt = services.shop().record_return(
        tenant.tenant_id(),
        Some(principal.user_id()),
        body,
        Utc::now(),
    )?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Return ledger of an original invoice.
pub async fn get_ledger(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(invoice_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "returns.read")?;
    let invoice_id = dto::parse_invoice_id(&invoice_id)?;
    services
        .shop()
        .hub()
        .returns
        .get(tenant.tenant_id(), &invoice_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("return ledger of invoice {invoice_id}")))
}
