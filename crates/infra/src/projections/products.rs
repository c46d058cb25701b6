use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use storeledger_core::TenantId;
use storeledger_events::EventEnvelope;
use storeledger_products::product::AGGREGATE_TYPE;
use storeledger_products::{Pricing, ProductCategory, ProductEvent, ProductId, ProductStatus};

use super::cursor::StreamCursors;
use super::{Projection, ProjectionError, check_scope, decode};
use crate::read_model::{InMemoryTenantStore, TenantStore};

/// Queryable product read model (catalog).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductReadModel {
    pub product_id: ProductId,
    pub sku: String,
    pub barcode: Option<String>,
    pub name: String,
    pub category: ProductCategory,
    pub unit: String,
    pub pricing: Pricing,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
}

impl ProductReadModel {
    /// Whether a scanned or typed code identifies this product.
    pub fn matches_code(&self, code: &str) -> bool {
        let code = code.trim();
        !code.is_empty()
            && (self.barcode.as_deref() == Some(code) || self.sku.eq_ignore_ascii_case(code))
    }

    fn matches_text(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(needle)
            || self.sku.to_lowercase().contains(needle)
            || self
                .barcode
                .as_deref()
                .is_some_and(|b| b.to_lowercase().contains(needle))
    }
}

#[derive(Debug)]
pub struct ProductCatalogProjection<S = InMemoryTenantStore<ProductId, ProductReadModel>> {
    store: S,
    cursors: StreamCursors,
}

impl<S> ProductCatalogProjection<S>
where
    S: TenantStore<ProductId, ProductReadModel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, product_id: &ProductId) -> Option<ProductReadModel> {
        self.store.get(tenant_id, product_id)
    }

    /// Products ordered by name, optionally narrowed by category and a
    /// case-insensitive search over name, SKU and barcode.
    pub fn search(
        &self,
        tenant_id: TenantId,
        category: Option<ProductCategory>,
        text: Option<&str>,
    ) -> Vec<ProductReadModel> {
        let needle = text
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty());
        let mut rows: Vec<_> = self
            .store
            .list(tenant_id)
            .into_iter()
            .filter(|p| category.is_none_or(|c| p.category == c))
            .filter(|p| needle.as_deref().is_none_or(|n| p.matches_text(n)))
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.sku.cmp(&b.sku)));
        rows
    }

    /// Cashier lookup by barcode or SKU.
    pub fn lookup(&self, tenant_id: TenantId, code: &str) -> Option<ProductReadModel> {
        self.store
            .list(tenant_id)
            .into_iter()
            .find(|p| p.matches_code(code))
    }

    /// A product already using `sku` or `barcode`.
    pub fn find_clash(
        &self,
        tenant_id: TenantId,
        sku: &str,
        barcode: Option<&str>,
    ) -> Option<ProductReadModel> {
        self.store.list(tenant_id).into_iter().find(|p| {
            p.sku.eq_ignore_ascii_case(sku.trim())
                || barcode.is_some_and(|b| p.barcode.as_deref() == Some(b.trim()))
        })
    }
}

impl<S> Projection for ProductCatalogProjection<S>
where
    S: TenantStore<ProductId, ProductReadModel>,
{
    fn name(&self) -> &'static str {
        "products.catalog"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE || !self.cursors.admit(envelope)? {
            return Ok(());
        }

        let ev: ProductEvent = decode(envelope, AGGREGATE_TYPE)?;
        let (tenant_id, product_id) = match &ev {
            ProductEvent::ProductCreated(e) => (e.tenant_id, e.product_id),
            ProductEvent::PricingChanged(e) => (e.tenant_id, e.product_id),
            ProductEvent::ProductArchived(e) => (e.tenant_id, e.product_id),
            ProductEvent::ProductRestored(e) => (e.tenant_id, e.product_id),
        };
        check_scope(envelope, tenant_id, product_id.0)?;

        match ev {
            ProductEvent::ProductCreated(e) => {
                self.store.upsert(
                    tenant_id,
                    product_id,
                    ProductReadModel {
                        product_id,
                        sku: e.sku,
                        barcode: e.barcode,
                        name: e.name,
                        category: e.category,
                        unit: e.unit,
                        pricing: e.pricing,
                        status: ProductStatus::Active,
                        created_at: e.occurred_at,
                    },
                );
            }
            ProductEvent::PricingChanged(e) => {
                self.update(tenant_id, product_id, |p| p.pricing = e.pricing);
            }
            ProductEvent::ProductArchived(_) => {
                self.update(tenant_id, product_id, |p| p.status = ProductStatus::Archived);
            }
            ProductEvent::ProductRestored(_) => {
                self.update(tenant_id, product_id, |p| p.status = ProductStatus::Active);
            }
        }

        self.cursors.advance(envelope);
        Ok(())
    }

    fn reset_tenant(&self, tenant_id: TenantId) {
        self.store.clear_tenant(tenant_id);
        self.cursors.clear_tenant(tenant_id);
    }
}

impl<S> ProductCatalogProjection<S>
where
    S: TenantStore<ProductId, ProductReadModel>,
{
    fn update(&self, tenant_id: TenantId, product_id: ProductId, f: impl FnOnce(&mut ProductReadModel)) {
        if let Some(mut row) = self.store.get(tenant_id, &product_id) {
            f(&mut row);
            self.store.upsert(tenant_id, product_id, row);
        }
    }
}
