use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeledger_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use storeledger_events::Event;
use storeledger_invoicing::InvoiceId;
use storeledger_products::ProductId;

pub const AGGREGATE_TYPE: &str = "inventory.stock";

/// Stock stream identifier, derived from the product it tracks.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StockItemId(pub AggregateId);

impl StockItemId {
    pub fn for_product(product_id: ProductId) -> Self {
        Self(AggregateId::derived(
            AGGREGATE_TYPE,
            product_id.0.as_uuid().as_bytes(),
        ))
    }
}

impl core::fmt::Display for StockItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: stock of one product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockItem {
    id: StockItemId,
    tenant_id: Option<TenantId>,
    product_id: Option<ProductId>,
    name: String,
    on_hand: i64,
    /// Moving-average cost per unit of what is on the shelf.
    average_cost: u64,
    version: u64,
    created: bool,
}

impl StockItem {
    pub fn empty(id: StockItemId) -> Self {
        Self {
            id,
            tenant_id: None,
            product_id: None,
            name: String::new(),
            on_hand: 0,
            average_cost: 0,
            version: 0,
            created: false,
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn product_id(&self) -> Option<ProductId> {
        self.product_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn on_hand(&self) -> i64 {
        self.on_hand
    }

    pub fn average_cost(&self) -> u64 {
        self.average_cost
    }

    pub fn is_created(&self) -> bool {
        self.created
    }
}

impl AggregateRoot for StockItem {
    type Id = StockItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenStockItem {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub name: String,
    pub unit_cost: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Goods delivered to the shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiveStock {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub quantity: u64,
    pub unit_cost: u64,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Goods handed to a customer on an invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueStock {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub quantity: u64,
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

/// Goods a customer brought back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockReturn {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub quantity: u64,
    pub invoice_id: InvoiceId,
    pub occurred_at: DateTime<Utc>,
}

/// Count correction (damage, loss, recount).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustStock {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub delta: i64,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryCommand {
    OpenStockItem(OpenStockItem),
    ReceiveStock(ReceiveStock),
    IssueStock(IssueStock),
    RestockReturn(RestockReturn),
    AdjustStock(AdjustStock),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockItemOpened {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub name: String,
    pub unit_cost: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockReceived {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub quantity: u64,
    pub unit_cost: u64,
    pub note: Option<String>,
    pub on_hand: i64,
    pub average_cost: u64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockIssued {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub quantity: u64,
    pub invoice_id: InvoiceId,
    pub on_hand: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRestocked {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub quantity: u64,
    pub invoice_id: InvoiceId,
    pub on_hand: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjusted {
    pub tenant_id: TenantId,
    pub product_id: ProductId,
    pub delta: i64,
    pub reason: String,
    pub on_hand: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryEvent {
    StockItemOpened(StockItemOpened),
    StockReceived(StockReceived),
    StockIssued(StockIssued),
    StockRestocked(StockRestocked),
    StockAdjusted(StockAdjusted),
}

impl InventoryEvent {
    pub fn product_id(&self) -> ProductId {
        match self {
            InventoryEvent::StockItemOpened(e) => e.product_id,
            InventoryEvent::StockReceived(e) => e.product_id,
            InventoryEvent::StockIssued(e) => e.product_id,
            InventoryEvent::StockRestocked(e) => e.product_id,
            InventoryEvent::StockAdjusted(e) => e.product_id,
        }
    }

    /// Quantity on hand after the event.
    pub fn on_hand(&self) -> i64 {
        match self {
            InventoryEvent::StockItemOpened(_) => 0,
            InventoryEvent::StockReceived(e) => e.on_hand,
            InventoryEvent::StockIssued(e) => e.on_hand,
            InventoryEvent::StockRestocked(e) => e.on_hand,
            InventoryEvent::StockAdjusted(e) => e.on_hand,
        }
    }
}

impl Event for InventoryEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InventoryEvent::StockItemOpened(_) => "inventory.stock.opened",
            InventoryEvent::StockReceived(_) => "inventory.stock.received",
            InventoryEvent::StockIssued(_) => "inventory.stock.issued",
            InventoryEvent::StockRestocked(_) => "inventory.stock.restocked",
            InventoryEvent::StockAdjusted(_) => "inventory.stock.adjusted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InventoryEvent::StockItemOpened(e) => e.occurred_at,
            InventoryEvent::StockReceived(e) => e.occurred_at,
            InventoryEvent::StockIssued(e) => e.occurred_at,
            InventoryEvent::StockRestocked(e) => e.occurred_at,
            InventoryEvent::StockAdjusted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for StockItem {
    type Command = InventoryCommand;
    type Event = InventoryEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InventoryEvent::StockItemOpened(e) => {
                self.tenant_id = Some(e.tenant_id);
                self.product_id = Some(e.product_id);
                self.name = e.name.clone();
                self.average_cost = e.unit_cost;
                self.on_hand = 0;
                self.created = true;
            }
            InventoryEvent::StockReceived(e) => {
                self.on_hand = e.on_hand;
                self.average_cost = e.average_cost;
            }
            InventoryEvent::StockIssued(e) => self.on_hand = e.on_hand,
            InventoryEvent::StockRestocked(e) => self.on_hand = e.on_hand,
            InventoryEvent::StockAdjusted(e) => self.on_hand = e.on_hand,
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InventoryCommand::OpenStockItem(cmd) => self.handle_open(cmd),
            InventoryCommand::ReceiveStock(cmd) => self.handle_receive(cmd),
            InventoryCommand::IssueStock(cmd) => self.handle_issue(cmd),
            InventoryCommand::RestockReturn(cmd) => self.handle_restock(cmd),
            InventoryCommand::AdjustStock(cmd) => self.handle_adjust(cmd),
        }
    }
}

fn positive_quantity(quantity: u64) -> Result<i64, DomainError> {
    if quantity == 0 {
        return Err(DomainError::validation("quantity must be positive"));
    }
    i64::try_from(quantity).map_err(|_| DomainError::overflow("quantity"))
}

/// Moving average after receiving `quantity` units at `unit_cost`.
///
/// Negative stock (never produced by this aggregate, but tolerated on replay)
/// counts as empty.
fn weighted_average(on_hand: i64, average: u64, quantity: u64, unit_cost: u64) -> u64 {
    let held = u128::try_from(on_hand.max(0)).unwrap_or(0);
    let total_qty = held + u128::from(quantity);
    if total_qty == 0 {
        return unit_cost;
    }
    let value = held * u128::from(average) + u128::from(quantity) * u128::from(unit_cost);
    u64::try_from(value / total_qty).unwrap_or(u64::MAX)
}

impl StockItem {
    fn ensure_existing(&self, tenant_id: TenantId, product_id: ProductId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.product_id != Some(product_id) {
            return Err(DomainError::invariant("product_id mismatch"));
        }
        Ok(())
    }

    fn handle_open(&self, cmd: &OpenStockItem) -> Result<Vec<InventoryEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("stock item already opened"));
        }
        if StockItemId::for_product(cmd.product_id) != self.id {
            return Err(DomainError::invariant("stock item id does not match product"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("name cannot be empty"));
        }

        Ok(vec![InventoryEvent::StockItemOpened(StockItemOpened {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            name: cmd.name.trim().to_string(),
            unit_cost: cmd.unit_cost,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_receive(&self, cmd: &ReceiveStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.product_id)?;
        let qty = positive_quantity(cmd.quantity)?;

        let on_hand = self
            .on_hand
            .checked_add(qty)
            .ok_or_else(|| DomainError::overflow("stock"))?;

        Ok(vec![InventoryEvent::StockReceived(StockReceived {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            unit_cost: cmd.unit_cost,
            note: cmd.note.clone(),
            on_hand,
            average_cost: weighted_average(
                self.on_hand,
                self.average_cost,
                cmd.quantity,
                cmd.unit_cost,
            ),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_issue(&self, cmd: &IssueStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.product_id)?;
        let qty = positive_quantity(cmd.quantity)?;

        if self.on_hand < qty {
            return Err(DomainError::invariant(format!(
                "insufficient stock for {}: on hand {}, requested {}",
                self.name, self.on_hand, qty
            )));
        }

        Ok(vec![InventoryEvent::StockIssued(StockIssued {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            invoice_id: cmd.invoice_id,
            on_hand: self.on_hand - qty,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_restock(&self, cmd: &RestockReturn) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.product_id)?;
        let qty = positive_quantity(cmd.quantity)?;

        let on_hand = self
            .on_hand
            .checked_add(qty)
            .ok_or_else(|| DomainError::overflow("stock"))?;

        Ok(vec![InventoryEvent::StockRestocked(StockRestocked {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            quantity: cmd.quantity,
            invoice_id: cmd.invoice_id,
            on_hand,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_adjust(&self, cmd: &AdjustStock) -> Result<Vec<InventoryEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.product_id)?;

        if cmd.delta == 0 {
            return Err(DomainError::validation("delta cannot be zero"));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("adjustment reason is required"));
        }

        let on_hand = self
            .on_hand
            .checked_add(cmd.delta)
            .ok_or_else(|| DomainError::overflow("stock"))?;
        if on_hand < 0 {
            return Err(DomainError::invariant("stock cannot go negative"));
        }

        Ok(vec![InventoryEvent::StockAdjusted(StockAdjusted {
            tenant_id: cmd.tenant_id,
            product_id: cmd.product_id,
            delta: cmd.delta,
            reason: cmd.reason.trim().to_string(),
            on_hand,
            occurred_at: cmd.occurred_at,
        })])
    }
}
