//! Product catalog (event-sourced).
//!
//! A product is identified by its SKU and optionally a barcode for the
//! cashier scanner; it carries the current sale price and reference cost.

pub mod product;

pub use product::{
    ArchiveProduct, ChangePricing, CreateProduct, Pricing, PricingChanged, Product,
    ProductArchived, ProductCategory, ProductCommand, ProductCreated, ProductEvent, ProductId,
    ProductRestored, ProductStatus, RestoreProduct,
};
