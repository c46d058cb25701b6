use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use storeledger_infra::projections::InvoiceFilter;

use crate::app::dto::{self, InvoiceQuery, InvoiceView, Items, PaymentRequest, ReasonRequest};
use crate::app::errors::{ApiError, ApiResult};
use crate::app::services::AppServices;
use crate::authz;
use crate::context::{PrincipalContext, TenantContext};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_invoices))
        .route("/:id", get(get_invoice))
        .route("/:id/payments", post(register_payment))
        .route("/:id/void", post(void_invoice))
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Query(query): Query<InvoiceQuery>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "invoices.read")?;
    let customer_id = query
        .customer_id
        .as_deref()
        .map(dto::parse_customer_id)
        .transpose()?;
    let filter = InvoiceFilter {
        kind: query.kind,
        status: query.status,
        customer_id,
    };
    Ok(Json(Items::from(
        services.shop().hub().invoices.list(tenant.tenant_id(), filter),
    )))
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "invoices.read")?;
    let invoice_id = dto::parse_invoice_id(&id)?;
    let invoices = &services.shop().hub().invoices;
    let invoice = invoices
        .get(tenant.tenant_id(), &invoice_id)
        .ok_or_else(|| ApiError::NotFound(format!("invoice {invoice_id}")))?;
    let related_documents = invoices
        .documents_for(tenant.tenant_id(), invoice_id)
        .into_iter()
        .map(|doc| doc.invoice_id)
        .collect();
    Ok(Json(InvoiceView {
        invoice,
        related_documents,
    }))
}

pub async fn register_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<PaymentRequest>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "invoices.pay")?;
    let invoice_id = dto::parse_invoice_id(&id)?;
    let invoice = services.shop().register_payment(
        tenant.tenant_id(),
        invoice_id,
        body.amount,
        Utc::now(),
    )?;
    Ok(Json(invoice))
}

pub async fn void_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Extension(principal): Extension<PrincipalContext>,
    Path(id): Path<String>,
    body: Option<Json<ReasonRequest>>,
) -> ApiResult<impl IntoResponse> {
    authz::require(&tenant, &principal, "invoices.void")?;
    let invoice_id = dto::parse_invoice_id(&id)?;
    let reason = body.and_then(|Json(b)| b.reason);
    let invoice = services
        .shop()
        .void_invoice(tenant.tenant_id(), invoice_id, reason, Utc::now())?;
    Ok(Json(invoice))
}
