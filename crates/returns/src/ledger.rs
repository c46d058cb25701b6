use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeledger_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId};
use storeledger_customers::CustomerId;
use storeledger_events::Event;
use storeledger_invoicing::{InvoiceId, InvoiceKind};
use storeledger_products::ProductId;

pub const AGGREGATE_TYPE: &str = "returns.ledger";

/// Ledger identifier, derived from the original invoice.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReturnLedgerId(pub AggregateId);

impl ReturnLedgerId {
    pub fn for_invoice(invoice_id: InvoiceId) -> Self {
        Self(AggregateId::derived(
            AGGREGATE_TYPE,
            invoice_id.0.as_uuid().as_bytes(),
        ))
    }
}

impl core::fmt::Display for ReturnLedgerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnKind {
    Return,
    Exchange,
}

impl From<ReturnKind> for InvoiceKind {
    fn from(kind: ReturnKind) -> Self {
        match kind {
            ReturnKind::Return => InvoiceKind::Return,
            ReturnKind::Exchange => InvoiceKind::Exchange,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnedQuantity {
    pub product_id: ProductId,
    pub quantity: u64,
}

/// One return or exchange document recorded against the original invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnEntry {
    pub document_invoice_id: InvoiceId,
    pub kind: ReturnKind,
    pub returned: Vec<ReturnedQuantity>,
    pub replacements: Vec<ReturnedQuantity>,
    pub occurred_at: DateTime<Utc>,
}

/// Aggregate root: the return ledger of one original invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnLedger {
    id: ReturnLedgerId,
    tenant_id: Option<TenantId>,
    original_invoice_id: Option<InvoiceId>,
    customer_id: Option<CustomerId>,
    sold: BTreeMap<ProductId, u64>,
    returned: BTreeMap<ProductId, u64>,
    entries: Vec<ReturnEntry>,
    version: u64,
    created: bool,
}

impl ReturnLedger {
    pub fn empty(id: ReturnLedgerId) -> Self {
        Self {
            id,
            tenant_id: None,
            original_invoice_id: None,
            customer_id: None,
            sold: BTreeMap::new(),
            returned: BTreeMap::new(),
            entries: Vec::new(),
            version: 0,
            created: false,
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn original_invoice_id(&self) -> Option<InvoiceId> {
        self.original_invoice_id
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn sold(&self, product_id: ProductId) -> u64 {
        self.sold.get(&product_id).copied().unwrap_or(0)
    }

    pub fn returned(&self, product_id: ProductId) -> u64 {
        self.returned.get(&product_id).copied().unwrap_or(0)
    }

    /// Quantity of `product_id` that may still be brought back.
    pub fn returnable(&self, product_id: ProductId) -> u64 {
        self.sold(product_id).saturating_sub(self.returned(product_id))
    }

    pub fn entries(&self) -> &[ReturnEntry] {
        &self.entries
    }

    pub fn has_returns(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn fully_returned(&self) -> bool {
        self.created && self.sold.keys().all(|p| self.returnable(*p) == 0)
    }
}

impl AggregateRoot for ReturnLedger {
    type Id = ReturnLedgerId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenLedger {
    pub tenant_id: TenantId,
    pub original_invoice_id: InvoiceId,
    pub customer_id: Option<CustomerId>,
    /// Goods that left the shop on the original invoice.
    pub sold: Vec<ReturnedQuantity>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordReturn {
    pub tenant_id: TenantId,
    pub original_invoice_id: InvoiceId,
    pub document_invoice_id: InvoiceId,
    pub kind: ReturnKind,
    pub returned: Vec<ReturnedQuantity>,
    pub replacements: Vec<ReturnedQuantity>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnLedgerCommand {
    OpenLedger(OpenLedger),
    RecordReturn(RecordReturn),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerOpened {
    pub tenant_id: TenantId,
    pub original_invoice_id: InvoiceId,
    pub customer_id: Option<CustomerId>,
    pub sold: Vec<ReturnedQuantity>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnRecorded {
    pub tenant_id: TenantId,
    pub original_invoice_id: InvoiceId,
    pub customer_id: Option<CustomerId>,
    pub entry: ReturnEntry,
    /// `true` when nothing more can be returned against the original invoice.
    pub fully_returned: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReturnLedgerEvent {
    LedgerOpened(LedgerOpened),
    ReturnRecorded(ReturnRecorded),
}

impl Event for ReturnLedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReturnLedgerEvent::LedgerOpened(_) => "returns.ledger.opened",
            ReturnLedgerEvent::ReturnRecorded(_) => "returns.ledger.return_recorded",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ReturnLedgerEvent::LedgerOpened(e) => e.occurred_at,
            ReturnLedgerEvent::ReturnRecorded(e) => e.occurred_at,
        }
    }
}

/// Merge repeated products, rejecting zero quantities.
fn merge_quantities(rows: &[ReturnedQuantity], what: &str) -> Result<BTreeMap<ProductId, u64>, DomainError> {
    let mut merged = BTreeMap::new();
    for row in rows {
        if row.quantity == 0 {
            return Err(DomainError::validation(format!("{what} quantity must be positive")));
        }
        let slot = merged.entry(row.product_id).or_insert(0u64);
        *slot = slot
            .checked_add(row.quantity)
            .ok_or_else(|| DomainError::overflow("quantity"))?;
    }
    Ok(merged)
}

fn to_rows(map: BTreeMap<ProductId, u64>) -> Vec<ReturnedQuantity> {
    map.into_iter()
        .map(|(product_id, quantity)| ReturnedQuantity { product_id, quantity })
        .collect()
}

impl Aggregate for ReturnLedger {
    type Command = ReturnLedgerCommand;
    type Event = ReturnLedgerEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ReturnLedgerEvent::LedgerOpened(e) => {
                self.tenant_id = Some(e.tenant_id);
                self.original_invoice_id = Some(e.original_invoice_id);
                self.customer_id = e.customer_id;
                self.sold = e.sold.iter().map(|r| (r.product_id, r.quantity)).collect();
                self.created = true;
            }
            ReturnLedgerEvent::ReturnRecorded(e) => {
                for row in &e.entry.returned {
                    *self.returned.entry(row.product_id).or_insert(0) += row.quantity;
                }
                self.entries.push(e.entry.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ReturnLedgerCommand::OpenLedger(cmd) => self.handle_open(cmd),
            ReturnLedgerCommand::RecordReturn(cmd) => self.handle_record(cmd),
        }
    }
}

impl ReturnLedger {
    fn handle_open(&self, cmd: &OpenLedger) -> Result<Vec<ReturnLedgerEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("return ledger already opened"));
        }
        if ReturnLedgerId::for_invoice(cmd.original_invoice_id) != self.id {
            return Err(DomainError::invariant("ledger id does not match invoice"));
        }
        let sold = merge_quantities(&cmd.sold, "sold")?;
        if sold.is_empty() {
            return Err(DomainError::validation("original invoice sold nothing"));
        }

        Ok(vec![ReturnLedgerEvent::LedgerOpened(LedgerOpened {
            tenant_id: cmd.tenant_id,
            original_invoice_id: cmd.original_invoice_id,
            customer_id: cmd.customer_id,
            sold: to_rows(sold),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record(&self, cmd: &RecordReturn) -> Result<Vec<ReturnLedgerEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(cmd.tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.original_invoice_id != Some(cmd.original_invoice_id) {
            return Err(DomainError::invariant("original_invoice_id mismatch"));
        }
        if self
            .entries
            .iter()
            .any(|e| e.document_invoice_id == cmd.document_invoice_id)
        {
            return Err(DomainError::conflict("document already recorded"));
        }

        let returned = merge_quantities(&cmd.returned, "returned")?;
        if returned.is_empty() {
            return Err(DomainError::validation("nothing to return"));
        }
        let replacements = merge_quantities(&cmd.replacements, "replacement")?;
        match cmd.kind {
            ReturnKind::Exchange if replacements.is_empty() => {
                return Err(DomainError::validation("an exchange needs replacement goods"));
            }
            ReturnKind::Return if !replacements.is_empty() => {
                return Err(DomainError::validation("a return cannot hand out goods"));
            }
            _ => {}
        }

        for (product_id, qty) in &returned {
            if self.sold(*product_id) == 0 {
                return Err(DomainError::invariant(format!(
                    "product {product_id} was not sold on the original invoice"
                )));
            }
            if *qty > self.returnable(*product_id) {
                return Err(DomainError::invariant(format!(
                    "return exceeds sold quantity for product {product_id}: returnable {}, requested {qty}",
                    self.returnable(*product_id)
                )));
            }
        }

        let fully_returned = self
            .sold
            .keys()
            .all(|p| self.returnable(*p) == returned.get(p).copied().unwrap_or(0));

        Ok(vec![ReturnLedgerEvent::ReturnRecorded(ReturnRecorded {
            tenant_id: cmd.tenant_id,
            original_invoice_id: cmd.original_invoice_id,
            customer_id: self.customer_id,
            entry: ReturnEntry {
                document_invoice_id: cmd.document_invoice_id,
                kind: cmd.kind,
                returned: to_rows(returned),
                replacements: to_rows(replacements),
                occurred_at: cmd.occurred_at,
            },
            fully_returned,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storeledger_events::execute;

    struct Fixture {
        tenant_id: TenantId,
        original: InvoiceId,
        seeds: ProductId,
        spray: ProductId,
        ledger: ReturnLedger,
    }

    fn fixture() -> Fixture {
        let tenant_id = TenantId::new();
        let original = InvoiceId::new(AggregateId::new());
        let seeds = ProductId::new(AggregateId::new());
        let spray = ProductId::new(AggregateId::new());
        let mut ledger = ReturnLedger::empty(ReturnLedgerId::for_invoice(original));
        execute(
            &mut ledger,
            &ReturnLedgerCommand::OpenLedger(OpenLedger {
                tenant_id,
                original_invoice_id: original,
                customer_id: None,
                // Same product on two lines is merged.
                sold: vec![
                    ReturnedQuantity { product_id: seeds, quantity: 3 },
                    ReturnedQuantity { product_id: seeds, quantity: 2 },
                    ReturnedQuantity { product_id: spray, quantity: 1 },
                ],
                occurred_at: Utc::now(),
            }),
        )
        .unwrap();
        Fixture { tenant_id, original, seeds, spray, ledger }
    }

    fn record(f: &Fixture, kind: ReturnKind, returned: Vec<ReturnedQuantity>, replacements: Vec<ReturnedQuantity>) -> ReturnLedgerCommand {
        ReturnLedgerCommand::RecordReturn(RecordReturn {
            tenant_id: f.tenant_id,
            original_invoice_id: f.original,
            document_invoice_id: InvoiceId::new(AggregateId::new()),
            kind,
            returned,
            replacements,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn open_merges_sold_quantities() {
        let f = fixture();
        assert_eq!(f.ledger.sold(f.seeds), 5);
        assert_eq!(f.ledger.returnable(f.spray), 1);
        assert!(!f.ledger.fully_returned());
    }

    #[test]
    fn partial_returns_accumulate_until_sold_quantity() {
        let mut f = fixture();
        let cmd = record(&f, ReturnKind::Return, vec![ReturnedQuantity { product_id: f.seeds, quantity: 4 }], vec![]);
        execute(&mut f.ledger, &cmd).unwrap();
        assert_eq!(f.ledger.returnable(f.seeds), 1);

        let too_many = record(&f, ReturnKind::Return, vec![ReturnedQuantity { product_id: f.seeds, quantity: 2 }], vec![]);
        let err = f.ledger.handle(&too_many).unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) if msg.contains("return exceeds sold quantity") => {}
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn last_return_marks_ledger_fully_returned() {
        let mut f = fixture();
        let cmd = record(
            &f,
            ReturnKind::Return,
            vec![
                ReturnedQuantity { product_id: f.seeds, quantity: 5 },
                ReturnedQuantity { product_id: f.spray, quantity: 1 },
            ],
            vec![],
        );
        let events = execute(&mut f.ledger, &cmd).unwrap();
        match &events[0] {
            ReturnLedgerEvent::ReturnRecorded(e) => assert!(e.fully_returned),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(f.ledger.fully_returned());
    }

    #[test]
    fn unknown_product_cannot_be_returned() {
        let f = fixture();
        let stranger = ProductId::new(AggregateId::new());
        let cmd = record(&f, ReturnKind::Return, vec![ReturnedQuantity { product_id: stranger, quantity: 1 }], vec![]);
        assert!(matches!(
            f.ledger.handle(&cmd),
            Err(DomainError::InvariantViolation(msg)) if msg.contains("not sold")
        ));
    }

    #[test]
    fn exchange_requires_replacements_and_return_forbids_them() {
        let f = fixture();
        let back = vec![ReturnedQuantity { product_id: f.spray, quantity: 1 }];

        let exchange = record(&f, ReturnKind::Exchange, back.clone(), vec![]);
        assert!(matches!(f.ledger.handle(&exchange), Err(DomainError::Validation(_))));

        let ret = record(&f, ReturnKind::Return, back, vec![ReturnedQuantity { product_id: f.seeds, quantity: 1 }]);
        assert!(matches!(f.ledger.handle(&ret), Err(DomainError::Validation(_))));
    }

    #[test]
    fn same_document_cannot_be_recorded_twice() {
        let mut f = fixture();
        let cmd = record(&f, ReturnKind::Return, vec![ReturnedQuantity { product_id: f.seeds, quantity: 1 }], vec![]);
        execute(&mut f.ledger, &cmd).unwrap();
        assert!(matches!(f.ledger.handle(&cmd), Err(DomainError::Conflict(_))));
        assert_eq!(f.ledger.entries().len(), 1);
    }

    #[test]
    fn record_on_unopened_ledger_is_not_found() {
        let original = InvoiceId::new(AggregateId::new());
        let ledger = ReturnLedger::empty(ReturnLedgerId::for_invoice(original));
        let err = ledger
            .handle(&ReturnLedgerCommand::RecordReturn(RecordReturn {
                tenant_id: TenantId::new(),
                original_invoice_id: original,
                document_invoice_id: InvoiceId::new(AggregateId::new()),
                kind: ReturnKind::Return,
                returned: vec![],
                replacements: vec![],
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::NotFound);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// However returns are split, the accepted total never exceeds what was sold.
            #[test]
            fn returns_never_exceed_sold(attempts in proptest::collection::vec(1u64..4, 0..15)) {
                let mut f = fixture();
                for qty in attempts {
                    let cmd = record(&f, ReturnKind::Return, vec![ReturnedQuantity { product_id: f.seeds, quantity: qty }], vec![]);
                    let _ = execute(&mut f.ledger, &cmd);
                    prop_assert!(f.ledger.returned(f.seeds) <= f.ledger.sold(f.seeds));
                }
            }
        }
    }
}
