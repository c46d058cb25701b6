use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeledger_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use storeledger_events::Event;

pub const AGGREGATE_TYPE: &str = "products.product";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

impl ProductId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ProductId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductCategory {
    Pesticide,
    Fertilizer,
    Seed,
    Apparel,
    Equipment,
    Other,
}

impl ProductCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductCategory::Pesticide => "pesticide",
            ProductCategory::Fertilizer => "fertilizer",
            ProductCategory::Seed => "seed",
            ProductCategory::Apparel => "apparel",
            ProductCategory::Equipment => "equipment",
            ProductCategory::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductStatus {
    Active,
    Archived,
}

/// Price per unit and reference cost per unit, in minor currency units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pricing {
    pub sale_price: u64,
    pub cost_price: u64,
}

impl Pricing {
    fn validate(&self) -> Result<(), DomainError> {
        if self.sale_price == 0 {
            return Err(DomainError::validation("sale price must be positive"));
        }
        Ok(())
    }

    /// Expected margin per unit (negative when sold below cost).
    pub fn unit_margin(&self) -> i128 {
        i128::from(self.sale_price) - i128::from(self.cost_price)
    }
}

/// Aggregate root: a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    id: ProductId,
    tenant_id: Option<TenantId>,
    sku: String,
    barcode: Option<String>,
    name: String,
    category: ProductCategory,
    unit: String,
    pricing: Pricing,
    status: ProductStatus,
    version: u64,
    created: bool,
}

impl Product {
    pub fn empty(id: ProductId) -> Self {
        Self {
            id,
            tenant_id: None,
            sku: String::new(),
            barcode: None,
            name: String::new(),
            category: ProductCategory::Other,
            unit: String::new(),
            pricing: Pricing::default(),
            status: ProductStatus::Active,
            version: 0,
            created: false,
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn sku(&self) -> &str {
        &self.sku
    }

    pub fn barcode(&self) -> Option<&str> {
        self.barcode.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> ProductCategory {
        self.category
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn pricing(&self) -> Pricing {
        self.pricing
    }

    pub fn status(&self) -> ProductStatus {
        self.status
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn is_sellable(&self) -> bool {
        self.created && self.status == ProductStatus::Active
    }
}

impl AggregateRoot for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sku: String,
    pub barcode: Option<String>,
    pub name: String,
    pub category: ProductCategory,
    /// Unit of sale ("bottle", "kg", "piece").
    pub unit: String,
    pub pricing: Pricing,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangePricing {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub pricing: Pricing,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreProduct {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductCommand {
    CreateProduct(CreateProduct),
    ChangePricing(ChangePricing),
    ArchiveProduct(ArchiveProduct),
    RestoreProduct(RestoreProduct),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductCreated {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub sku: String,
    pub barcode: Option<String>,
    pub name: String,
    pub category: ProductCategory,
    pub unit: String,
    pub pricing: Pricing,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingChanged {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub previous: Pricing,
    pub pricing: Pricing,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductArchived {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRestored {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductEvent {
    ProductCreated(ProductCreated),
    PricingChanged(PricingChanged),
    ProductArchived(ProductArchived),
    ProductRestored(ProductRestored),
}

impl Event for ProductEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ProductEvent::ProductCreated(_) => "products.product.created",
            ProductEvent::PricingChanged(_) => "products.product.pricing_changed",
            ProductEvent::ProductArchived(_) => "products.product.archived",
            ProductEvent::ProductRestored(_) => "products.product.restored",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ProductEvent::ProductCreated(e) => e.occurred_at,
            ProductEvent::PricingChanged(e) => e.occurred_at,
            ProductEvent::ProductArchived(e) => e.occurred_at,
            ProductEvent::ProductRestored(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Product {
    type Command = ProductCommand;
    type Event = ProductEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ProductEvent::ProductCreated(e) => {
                self.id = e.product_id;
                self.tenant_id = Some(e.tenant_id);
                self.sku = e.sku.clone();
                self.barcode = e.barcode.clone();
                self.name = e.name.clone();
                self.category = e.category;
                self.unit = e.unit.clone();
                self.pricing = e.pricing;
                self.status = ProductStatus::Active;
                self.created = true;
            }
            ProductEvent::PricingChanged(e) => {
                self.pricing = e.pricing;
            }
            ProductEvent::ProductArchived(_) => {
                self.status = ProductStatus::Archived;
            }
            ProductEvent::ProductRestored(_) => {
                self.status = ProductStatus::Active;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ProductCommand::CreateProduct(cmd) => self.handle_create(cmd),
            ProductCommand::ChangePricing(cmd) => self.handle_change_pricing(cmd),
            ProductCommand::ArchiveProduct(cmd) => self.handle_archive(cmd),
            ProductCommand::RestoreProduct(cmd) => self.handle_restore(cmd),
        }
    }
}

fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

impl Product {
    fn ensure_existing(&self, tenant_id: TenantId, product_id: ProductId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != product_id {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateProduct) -> Result<Vec<ProductEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("product already exists"));
        }

        let sku = normalize_code(&cmd.sku);
        if sku.is_empty() {
            return Err(DomainError::validation("sku cannot be empty"));
        }
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }
        let barcode = cmd
            .barcode
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .map(str::to_string);
        let unit = match cmd.unit.trim() {
            "" => "piece".to_string(),
            u => u.to_string(),
        };
        cmd.pricing.validate()?;

        Ok(vec![ProductEvent::ProductCreated(ProductCreated {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            sku,
            barcode,
            name: name.to_string(),
            category: cmd.category,
            unit,
            pricing: cmd.pricing,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_pricing(&self, cmd: &ChangePricing) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.product_id)?;

        if self.status == ProductStatus::Archived {
            return Err(DomainError::invariant("archived products cannot be repriced"));
        }
        cmd.pricing.validate()?;
        if cmd.pricing == self.pricing {
            return Err(DomainError::validation("pricing unchanged"));
        }

        Ok(vec![ProductEvent::PricingChanged(PricingChanged {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            previous: self.pricing,
            pricing: cmd.pricing,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_archive(&self, cmd: &ArchiveProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.product_id)?;

        if self.status == ProductStatus::Archived {
            return Err(DomainError::conflict("product is already archived"));
        }

        Ok(vec![ProductEvent::ProductArchived(ProductArchived {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_restore(&self, cmd: &RestoreProduct) -> Result<Vec<ProductEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.product_id)?;

        if self.status == ProductStatus::Active {
            return Err(DomainError::conflict("product is already active"));
        }

        Ok(vec![ProductEvent::ProductRestored(ProductRestored {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storeledger_events::execute;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_product_id() -> ProductId {
        ProductId::new(AggregateId::new())
    }

    fn create_cmd(tenant_id: TenantId, product_id: ProductId) -> CreateProduct {
        CreateProduct {
            tenant_id,
            product_id,
            sku: " ins-500ml ".to_string(),
            barcode: Some("8901234567890".to_string()),
            name: "Imidacloprid 500ml".to_string(),
            category: ProductCategory::Pesticide,
            unit: "bottle".to_string(),
            pricing: Pricing {
                sale_price: 45_000,
                cost_price: 38_000,
            },
            occurred_at: Utc::now(),
        }
    }

    fn created(tenant_id: TenantId, product_id: ProductId) -> Product {
        let mut product = Product::empty(product_id);
        execute(
            &mut product,
            &ProductCommand::CreateProduct(create_cmd(tenant_id, product_id)),
        )
        .unwrap();
        product
    }

    #[test]
    fn create_normalizes_sku_and_is_sellable() {
        let product = created(test_tenant_id(), test_product_id());

        assert_eq!(product.sku(), "INS-500ML");
        assert_eq!(product.barcode(), Some("8901234567890"));
        assert_eq!(product.unit(), "bottle");
        assert!(product.is_sellable());
        assert_eq!(product.pricing().unit_margin(), 7_000);
    }

    #[test]
    fn create_rejects_zero_sale_price() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let mut cmd = create_cmd(tenant_id, product_id);
        cmd.pricing.sale_price = 0;

        let err = Product::empty(product_id)
            .handle(&ProductCommand::CreateProduct(cmd))
            .unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("sale price") => {}
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn create_defaults_blank_unit_and_drops_blank_barcode() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let mut cmd = create_cmd(tenant_id, product_id);
        cmd.unit = " ".to_string();
        cmd.barcode = Some("   ".to_string());

        let mut product = Product::empty(product_id);
        execute(&mut product, &ProductCommand::CreateProduct(cmd)).unwrap();
        assert_eq!(product.unit(), "piece");
        assert_eq!(product.barcode(), None);
    }

    #[test]
    fn change_pricing_records_previous_pricing() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let product = created(tenant_id, product_id);

        let events = product
            .handle(&ProductCommand::ChangePricing(ChangePricing {
                tenant_id,
                product_id,
                pricing: Pricing {
                    sale_price: 48_000,
                    cost_price: 39_000,
                },
                occurred_at: Utc::now(),
            }))
            .unwrap();

        match &events[0] {
            ProductEvent::PricingChanged(e) => {
                assert_eq!(e.previous.sale_price, 45_000);
                assert_eq!(e.pricing.sale_price, 48_000);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn unchanged_pricing_is_rejected() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let product = created(tenant_id, product_id);

        let err = product
            .handle(&ProductCommand::ChangePricing(ChangePricing {
                tenant_id,
                product_id,
                pricing: product.pricing(),
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::validation("pricing unchanged"));
    }

    #[test]
    fn archived_product_is_not_sellable_nor_repriceable() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let mut product = created(tenant_id, product_id);

        execute(
            &mut product,
            &ProductCommand::ArchiveProduct(ArchiveProduct {
                tenant_id,
                product_id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert!(!product.is_sellable());

        let err = product
            .handle(&ProductCommand::ChangePricing(ChangePricing {
                tenant_id,
                product_id,
                pricing: Pricing {
                    sale_price: 1,
                    cost_price: 1,
                },
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(_)));

        execute(
            &mut product,
            &ProductCommand::RestoreProduct(RestoreProduct {
                tenant_id,
                product_id,
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        assert!(product.is_sellable());
        assert_eq!(product.version(), 3);
    }

    #[test]
    fn handle_does_not_mutate_state() {
        let tenant_id = test_tenant_id();
        let product_id = test_product_id();
        let product = created(tenant_id, product_id);
        let before = product.clone();

        let _ = product.handle(&ProductCommand::ArchiveProduct(ArchiveProduct {
            tenant_id,
            product_id,
            occurred_at: Utc::now(),
        }));

        assert_eq!(product, before);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Any positive price is accepted and survives replay unchanged.
            #[test]
            fn positive_pricing_round_trips_through_apply(
                sale_price in 1u64..10_000_000,
                cost_price in 0u64..10_000_000
            ) {
                let tenant_id = test_tenant_id();
                let product_id = test_product_id();
                let mut cmd = create_cmd(tenant_id, product_id);
                cmd.pricing = Pricing { sale_price, cost_price };

                let mut product = Product::empty(product_id);
                let events = execute(&mut product, &ProductCommand::CreateProduct(cmd)).unwrap();

                let mut replayed = Product::empty(product_id);
                for e in &events {
                    replayed.apply(e);
                }
                prop_assert_eq!(replayed.pricing(), Pricing { sale_price, cost_price });
                prop_assert_eq!(replayed, product);
            }
        }
    }
}
