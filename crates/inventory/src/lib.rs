//! Stock on hand per product (event-sourced).
//!
//! One stock stream per product. Every movement event carries the resulting
//! quantity on hand so consumers never need to recompute it.

pub mod stock;

pub use stock::{
    AdjustStock, InventoryCommand, InventoryEvent, IssueStock, OpenStockItem, ReceiveStock,
    RestockReturn, StockAdjusted, StockIssued, StockItem, StockItemId, StockItemOpened,
    StockReceived, StockRestocked,
};
