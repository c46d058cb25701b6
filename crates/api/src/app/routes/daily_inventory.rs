use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use crate::app::dto::{self, Items, ReopenDayRequest};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_days))
        .route("/:date", get(get_day))
        .route("/:date/preview", get(preview_day))
        .route("/:date/close", post(close_day))
        .route("/:date/reopen", post(reopen_day))
}

/// Closed (and reopened) days, newest first.
pub async fn list_days(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "closing.read")?;
    Ok(Json(Items::from(
        services.shop().hub().days.list(tenant.tenant_id()),
    )))
}

pub async fn get_day(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(date): Path<String>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "closing.read")?;
    let date = dto::parse_date(&date)?;
    services
        .shop()
        .hub()
        .days
        .get(tenant.tenant_id(), date)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("closing of {date}")))
}

/// The snapshot closing the day now would record.
pub async fn preview_day(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(date): Path<String>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "closing.read")?;
    let date = dto::parse_date(&date)?;
    let snapshot = services
        .shop()
        .preview_day(tenant.tenant_id(), date, Utc::now())?;
    Ok(Json(snapshot))
}

pub async fn close_day(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(date): Path<String>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "closing.close")?;
    let date = dto::parse_date(&date)?;
    let day = services.shop().close_day(
        tenant.tenant_id(),
        Some(principal.user_id()),
        date,
        Utc::now(),
    )?;
    Ok(Json(day))
}

pub async fn reopen_day(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(date): Path<String>,
    Json(body): Json<ReopenDayRequest>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "closing.reopen")?;
    let date = dto::parse_date(&date)?;
    let day = services.shop().reopen_day(
        tenant.tenant_id(),
        Some(principal.user_id()),
        date,
        body.reason,
        Utc::now(),
    )?;
    Ok(Json(day))
}
