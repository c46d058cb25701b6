//! Stock on hand per product, with the movement history closings read from.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use storeledger_closing::StockPosition;
use storeledger_core::TenantId;
use storeledger_events::EventEnvelope;
use storeledger_inventory::stock::AGGREGATE_TYPE;
use storeledger_inventory::{InventoryEvent, StockItemId};
use storeledger_invoicing::InvoiceId;
use storeledger_products::ProductId;

use super::cursor::StreamCursors;
use super::{Projection, ProjectionError, check_scope, decode};
use crate::read_model::{InMemoryTenantStore, TenantStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Opened,
    Received,
    Issued,
    Restocked,
    Adjusted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockMovement {
    pub occurred_at: DateTime<Utc>,
    pub kind: MovementKind,
    /// Signed change in units.
    pub delta: i64,
    pub on_hand: i64,
    pub average_cost: u64,
    pub invoice_id: Option<InvoiceId>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StockLevel {
    pub product_id: ProductId,
    pub name: String,
    pub on_hand: i64,
    pub average_cost: u64,
    pub movements: Vec<StockMovement>,
}

impl StockLevel {
    /// Shelf position as of `at` (movements strictly before `at`).
    pub fn position_at(&self, at: DateTime<Utc>) -> StockPosition {
        let last = self.movements.iter().rev().find(|m| m.occurred_at < at);
        StockPosition {
            product_id: self.product_id,
            product_name: self.name.clone(),
            on_hand: last.map(|m| m.on_hand).unwrap_or(0),
            average_cost: last.map(|m| m.average_cost).unwrap_or(0),
        }
    }

    pub fn stock_value(&self) -> i64 {
        self.on_hand.saturating_mul(self.average_cost as i64)
    }

    fn record(&mut self, movement: StockMovement) {
        self.on_hand = movement.on_hand;
        self.average_cost = movement.average_cost;
        // Movements usually arrive in time order; keep the history sorted when they don't.
        let idx = self
            .movements
            .partition_point(|m| m.occurred_at <= movement.occurred_at);
        self.movements.insert(idx, movement);
    }
}

#[derive(Debug)]
pub struct StockLevelsProjection<S = InMemoryTenantStore<ProductId, StockLevel>> {
    store: S,
    cursors: StreamCursors,
}

impl<S> StockLevelsProjection<S>
where
    S: TenantStore<ProductId, StockLevel>,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, tenant_id: TenantId, product_id: &ProductId) -> Option<StockLevel> {
        self.store.get(tenant_id, product_id)
    }

    pub fn on_hand(&self, tenant_id: TenantId, product_id: &ProductId) -> i64 {
        self.get(tenant_id, product_id).map(|s| s.on_hand).unwrap_or(0)
    }

    /// Levels ordered by product name.
    pub fn list(&self, tenant_id: TenantId) -> Vec<StockLevel> {
        let mut rows = self.store.list(tenant_id);
        rows.sort_by(|a, b| a.name.cmp(&b.name).then(a.product_id.cmp(&b.product_id)));
        rows
    }

    /// Every product's shelf position as of `at`, ordered by product name.
    pub fn positions_at(&self, tenant_id: TenantId, at: DateTime<Utc>) -> Vec<StockPosition> {
        self.list(tenant_id)
            .iter()
            .map(|level| level.position_at(at))
            .collect()
    }
}

impl<S> Projection for StockLevelsProjection<S>
where
    S: TenantStore<ProductId, StockLevel>,
{
    fn name(&self) -> &'static str {
        "inventory.stock_levels"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != AGGREGATE_TYPE || !self.cursors.admit(envelope)? {
            return Ok(());
        }

        let ev: InventoryEvent = decode(envelope, AGGREGATE_TYPE)?;
        let product_id = ev.product_id();
        let tenant_id = match &ev {
            InventoryEvent::StockItemOpened(e) => e.tenant_id,
            InventoryEvent::StockReceived(e) => e.tenant_id,
            InventoryEvent::StockIssued(e) => e.tenant_id,
            InventoryEvent::StockRestocked(e) => e.tenant_id,
            InventoryEvent::StockAdjusted(e) => e.tenant_id,
        };
        check_scope(envelope, tenant_id, StockItemId::for_product(product_id).0)?;

        let current = self.store.get(tenant_id, &product_id);
        let average_cost = current.as_ref().map(|s| s.average_cost).unwrap_or(0);

        let movement = match &ev {
            InventoryEvent::StockItemOpened(e) => StockMovement {
                occurred_at: e.occurred_at,
                kind: MovementKind::Opened,
                delta: 0,
                on_hand: 0,
                average_cost: e.unit_cost,
                invoice_id: None,
                note: None,
            },
            InventoryEvent::StockReceived(e) => StockMovement {
                occurred_at: e.occurred_at,
                kind: MovementKind::Received,
                delta: e.quantity as i64,
                on_hand: e.on_hand,
                average_cost: e.average_cost,
                invoice_id: None,
                note: e.note.clone(),
            },
            InventoryEvent::StockIssued(e) => StockMovement {
                occurred_at: e.occurred_at,
                kind: MovementKind::Issued,
                delta: -(e.quantity as i64),
                on_hand: e.on_hand,
                average_cost,
                invoice_id: Some(e.invoice_id),
                note: None,
            },
            InventoryEvent::StockRestocked(e) => StockMovement {
                occurred_at: e.occurred_at,
                kind: MovementKind::Restocked,
                delta: e.quantity as i64,
                on_hand: e.on_hand,
                average_cost,
                invoice_id: Some(e.invoice_id),
                note: None,
            },
            InventoryEvent::StockAdjusted(e) => StockMovement {
                occurred_at: e.occurred_at,
                kind: MovementKind::Adjusted,
                delta: e.delta,
                on_hand: e.on_hand,
                average_cost,
                invoice_id: None,
                note: Some(e.reason.clone()),
            },
        };

        let mut level = match (current, &ev) {
            (Some(level), _) => level,
            (None, InventoryEvent::StockItemOpened(e)) => StockLevel {
                product_id,
                name: e.name.clone(),
                on_hand: 0,
                average_cost: e.unit_cost,
                movements: Vec::new(),
            },
            (None, _) => StockLevel {
                product_id,
                name: product_id.to_string(),
                on_hand: 0,
                average_cost: 0,
                movements: Vec::new(),
            },
        };
        level.record(movement);
        self.store.upsert(tenant_id, product_id, level);

        self.cursors.advance(envelope);
        Ok(())
    }

    fn reset_tenant(&self, tenant_id: TenantId) {
        self.store.clear_tenant(tenant_id);
        self.cursors.clear_tenant(tenant_id);
    }
}
