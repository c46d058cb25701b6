//! Master data and single-aggregate writes: customers, products, stock
//! receipts and adjustments, payments against an invoice.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use storeledger_core::{AggregateId, TenantId};
use storeledger_customers::customer::AGGREGATE_TYPE as CUSTOMER;
use storeledger_customers::{
    ContactInfo, Customer, CustomerCommand, CustomerId, ReactivateCustomer, RegisterCustomer,
    SuspendCustomer, UpdateCustomer,
};
use storeledger_inventory::stock::AGGREGATE_TYPE as STOCK;
use storeledger_inventory::{
    AdjustStock, InventoryCommand, OpenStockItem, ReceiveStock, StockItem, StockItemId,
};
use storeledger_invoicing::invoice::AGGREGATE_TYPE as INVOICE;
use storeledger_invoicing::{Invoice, InvoiceCommand, InvoiceId, RegisterPayment};
use storeledger_products::product::AGGREGATE_TYPE as PRODUCT;
use storeledger_products::{
    ArchiveProduct, ChangePricing, CreateProduct, Pricing, Product, ProductCategory,
    ProductCommand, ProductId, RestoreProduct,
};

use super::WorkflowError;
use crate::projections::{CustomerReadModel, InvoiceReadModel, ProductReadModel, StockLevel};
use crate::services::ShopServices;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    #[serde(default)]
    pub contact: Option<ContactInfo>,
    #[serde(default)]
    pub credit_limit: Option<u64>,
}

/// Partial update; absent fields keep their value. `credit_limit: null` removes the limit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerChanges {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub contact: Option<ContactInfo>,
    #[serde(default, deserialize_with = "present")]
    pub credit_limit: Option<Option<u64>>,
}

fn present<'de, D, T>(de: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub sku: String,
    #[serde(default)]
    pub barcode: Option<String>,
    pub name: String,
    pub category: ProductCategory,
    pub unit: String,
    pub pricing: Pricing,
}

fn customer_stream(_: TenantId, id: AggregateId) -> Customer {
    Customer::empty(CustomerId::new(id))
}

fn product_stream(_: TenantId, id: AggregateId) -> Product {
    Product::empty(ProductId::new(id))
}

pub(crate) fn stock_stream(_: TenantId, id: AggregateId) -> StockItem {
    StockItem::empty(StockItemId(id))
}

pub(crate) fn invoice_stream(_: TenantId, id: AggregateId) -> Invoice {
    Invoice::empty(InvoiceId::new(id))
}

impl ShopServices {
    pub fn register_customer(
        &self,
        tenant_id: TenantId,
        input: NewCustomer,
        now: DateTime<Utc>,
    ) -> Result<CustomerReadModel, WorkflowError> {
        let _guard = self.lock();
        let customer_id = CustomerId::new(AggregateId::new());
        self.execute(
            tenant_id,
            customer_id.0,
            CUSTOMER,
            CustomerCommand::RegisterCustomer(RegisterCustomer {
                tenant_id,
                customer_id,
                name: input.name,
                contact: input.contact,
                credit_limit: input.credit_limit,
                occurred_at: now,
            }),
            customer_stream,
        )?;
        self.customer(tenant_id, customer_id)
    }

    pub fn update_customer(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
        changes: CustomerChanges,
        now: DateTime<Utc>,
    ) -> Result<CustomerReadModel, WorkflowError> {
        let _guard = self.lock();
        self.customer(tenant_id, customer_id)?;
        self.execute(
            tenant_id,
            customer_id.0,
            CUSTOMER,
            CustomerCommand::UpdateCustomer(UpdateCustomer {
                tenant_id,
                customer_id,
                name: changes.name,
                contact: changes.contact,
                credit_limit: changes.credit_limit,
                occurred_at: now,
            }),
            customer_stream,
        )?;
        self.customer(tenant_id, customer_id)
    }

    pub fn suspend_customer(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<CustomerReadModel, WorkflowError> {
        let _guard = self.lock();
        self.customer(tenant_id, customer_id)?;
        self.execute(
            tenant_id,
            customer_id.0,
            CUSTOMER,
            CustomerCommand::SuspendCustomer(SuspendCustomer {
                tenant_id,
                customer_id,
                reason,
                occurred_at: now,
            }),
            customer_stream,
        )?;
        self.customer(tenant_id, customer_id)
    }

    pub fn reactivate_customer(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
        now: DateTime<Utc>,
    ) -> Result<CustomerReadModel, WorkflowError> {
        let _guard = self.lock();
        self.customer(tenant_id, customer_id)?;
        self.execute(
            tenant_id,
            customer_id.0,
            CUSTOMER,
            CustomerCommand::ReactivateCustomer(ReactivateCustomer {
                tenant_id,
                customer_id,
                occurred_at: now,
            }),
            customer_stream,
        )?;
        self.customer(tenant_id, customer_id)
    }

    /// Create a product and open its stock item at the reference cost.
    pub fn create_product(
        &self,
        tenant_id: TenantId,
        input: NewProduct,
        now: DateTime<Utc>,
    ) -> Result<ProductReadModel, WorkflowError> {
        let _guard = self.lock();
        if let Some(existing) =
            self.hub()
                .products
                .find_clash(tenant_id, &input.sku, input.barcode.as_deref())
        {
            return Err(WorkflowError::Conflict(format!(
                "sku or barcode already used by {} ({})",
                existing.name, existing.sku
            )));
        }

        let product_id = ProductId::new(AggregateId::new());
        let name = input.name.trim().to_string();
        let cost_price = input.pricing.cost_price;
        self.execute(
            tenant_id,
            product_id.0,
            PRODUCT,
            ProductCommand::CreateProduct(CreateProduct {
                tenant_id,
                product_id,
                sku: input.sku,
                barcode: input.barcode,
                name: name.clone(),
                category: input.category,
                unit: input.unit,
                pricing: input.pricing,
                occurred_at: now,
            }),
            product_stream,
        )?;
        self.execute(
            tenant_id,
            StockItemId::for_product(product_id).0,
            STOCK,
            InventoryCommand::OpenStockItem(OpenStockItem {
                tenant_id,
                product_id,
                name,
                unit_cost: cost_price,
                occurred_at: now,
            }),
            stock_stream,
        )?;

        tracing::info!(%tenant_id, %product_id, "product created");
        self.product(tenant_id, product_id)
    }

    pub fn change_pricing(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        pricing: Pricing,
        now: DateTime<Utc>,
    ) -> Result<ProductReadModel, WorkflowError> {
        let _guard = self.lock();
        self.product(tenant_id, product_id)?;
        self.execute(
            tenant_id,
            product_id.0,
            PRODUCT,
            ProductCommand::ChangePricing(ChangePricing {
                tenant_id,
                product_id,
                pricing,
                occurred_at: now,
            }),
            product_stream,
        )?;
        self.product(tenant_id, product_id)
    }

    pub fn archive_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<ProductReadModel, WorkflowError> {
        let _guard = self.lock();
        self.product(tenant_id, product_id)?;
        self.execute(
            tenant_id,
            product_id.0,
            PRODUCT,
            ProductCommand::ArchiveProduct(ArchiveProduct {
                tenant_id,
                product_id,
                occurred_at: now,
            }),
            product_stream,
        )?;
        self.product(tenant_id, product_id)
    }

    pub fn restore_product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        now: DateTime<Utc>,
    ) -> Result<ProductReadModel, WorkflowError> {
        let _guard = self.lock();
        self.product(tenant_id, product_id)?;
        self.execute(
            tenant_id,
            product_id.0,
            PRODUCT,
            ProductCommand::RestoreProduct(RestoreProduct {
                tenant_id,
                product_id,
                occurred_at: now,
            }),
            product_stream,
        )?;
        self.product(tenant_id, product_id)
    }

    /// Goods delivered to the shop. The unit cost defaults to the product's reference cost.
    pub fn receive_stock(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        quantity: u64,
        unit_cost: Option<u64>,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<StockLevel, WorkflowError> {
        let _guard = self.lock();
        let product = self.product(tenant_id, product_id)?;
        self.ensure_day_open(tenant_id, self.business_date(now))?;

        self.execute(
            tenant_id,
            StockItemId::for_product(product_id).0,
            STOCK,
            InventoryCommand::ReceiveStock(ReceiveStock {
                tenant_id,
                product_id,
                quantity,
                unit_cost: unit_cost.unwrap_or(product.pricing.cost_price),
                note,
                occurred_at: now,
            }),
            stock_stream,
        )?;
        self.stock_level(tenant_id, product_id)
    }

    /// Stock count correction.
    pub fn adjust_stock(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
        delta: i64,
        reason: String,
        now: DateTime<Utc>,
    ) -> Result<StockLevel, WorkflowError> {
        let _guard = self.lock();
        self.product(tenant_id, product_id)?;
        self.ensure_day_open(tenant_id, self.business_date(now))?;

        self.execute(
            tenant_id,
            StockItemId::for_product(product_id).0,
            STOCK,
            InventoryCommand::AdjustStock(AdjustStock {
                tenant_id,
                product_id,
                delta,
                reason,
                occurred_at: now,
            }),
            stock_stream,
        )?;
        tracing::info!(%tenant_id, %product_id, delta, "stock adjusted");
        self.stock_level(tenant_id, product_id)
    }

    /// Money received against (positive) or refunded on (negative) an open invoice.
    pub fn register_payment(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
        amount: i64,
        now: DateTime<Utc>,
    ) -> Result<InvoiceReadModel, WorkflowError> {
        let _guard = self.lock();
        self.invoice(tenant_id, invoice_id)?;
        self.ensure_day_open(tenant_id, self.business_date(now))?;

        self.execute(
            tenant_id,
            invoice_id.0,
            INVOICE,
            InvoiceCommand::RegisterPayment(RegisterPayment {
                tenant_id,
                invoice_id,
                amount,
                occurred_at: now,
            }),
            invoice_stream,
        )?;
        self.invoice(tenant_id, invoice_id)
    }

    pub(crate) fn customer(
        &self,
        tenant_id: TenantId,
        customer_id: CustomerId,
    ) -> Result<CustomerReadModel, WorkflowError> {
        self.hub()
            .customers
            .get(tenant_id, &customer_id)
            .ok_or_else(|| WorkflowError::NotFound(format!("customer {customer_id}")))
    }

    pub(crate) fn product(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<ProductReadModel, WorkflowError> {
        self.hub()
            .products
            .get(tenant_id, &product_id)
            .ok_or_else(|| WorkflowError::NotFound(format!("product {product_id}")))
    }

    pub(crate) fn stock_level(
        &self,
        tenant_id: TenantId,
        product_id: ProductId,
    ) -> Result<StockLevel, WorkflowError> {
        self.hub()
            .stock
            .get(tenant_id, &product_id)
            .ok_or_else(|| WorkflowError::NotFound(format!("stock of product {product_id}")))
    }

    pub(crate) fn invoice(
        &self,
        tenant_id: TenantId,
        invoice_id: InvoiceId,
    ) -> Result<InvoiceReadModel, WorkflowError> {
        self.hub()
            .invoices
            .get(tenant_id, &invoice_id)
            .ok_or_else(|| WorkflowError::NotFound(format!("invoice {invoice_id}")))
    }
}
