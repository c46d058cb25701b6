use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storeledger_core::{Aggregate, AggregateId, AggregateRoot, DomainError, TenantId, UserId};
use storeledger_customers::CustomerId;
use storeledger_events::Event;

use crate::pricing::{InvoiceLine, InvoiceTotals, LineDirection, LineInput, price_lines};

pub const AGGREGATE_TYPE: &str = "invoicing.invoice";

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub AggregateId);

impl InvoiceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    Sale,
    Return,
    Exchange,
}

impl InvoiceKind {
    /// Direction the invoice-level discount applies to.
    pub fn primary_direction(&self) -> LineDirection {
        match self {
            InvoiceKind::Sale | InvoiceKind::Exchange => LineDirection::Out,
            InvoiceKind::Return => LineDirection::In,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceKind::Sale => "sale",
            InvoiceKind::Return => "return",
            InvoiceKind::Exchange => "exchange",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Money is still owed in one direction or the other.
    Open,
    Settled,
    Void,
}

/// Aggregate root: Invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    id: InvoiceId,
    tenant_id: Option<TenantId>,
    kind: InvoiceKind,
    customer_id: Option<CustomerId>,
    original_invoice_id: Option<InvoiceId>,
    lines: Vec<InvoiceLine>,
    totals: InvoiceTotals,
    settled: i64,
    status: InvoiceStatus,
    issued_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl Invoice {
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            tenant_id: None,
            kind: InvoiceKind::Sale,
            customer_id: None,
            original_invoice_id: None,
            lines: Vec::new(),
            totals: InvoiceTotals::default(),
            settled: 0,
            status: InvoiceStatus::Open,
            issued_at: None,
            version: 0,
            created: false,
        }
    }

    pub fn tenant_id(&self) -> Option<TenantId> {
        self.tenant_id
    }

    pub fn kind(&self) -> InvoiceKind {
        self.kind
    }

    pub fn customer_id(&self) -> Option<CustomerId> {
        self.customer_id
    }

    pub fn original_invoice_id(&self) -> Option<InvoiceId> {
        self.original_invoice_id
    }

    pub fn lines(&self) -> &[InvoiceLine] {
        &self.lines
    }

    pub fn totals(&self) -> &InvoiceTotals {
        &self.totals
    }

    pub fn net_total(&self) -> i64 {
        self.totals.net_total
    }

    pub fn settled(&self) -> i64 {
        self.settled
    }

    /// Positive: the customer owes the shop. Negative: the shop owes the customer.
    pub fn balance_due(&self) -> i64 {
        self.totals.net_total - self.settled
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn can_accept_payment(&self) -> bool {
        self.created && self.status == InvoiceStatus::Open && self.balance_due() != 0
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub kind: InvoiceKind,
    /// `None` for a walk-in customer.
    pub customer_id: Option<CustomerId>,
    /// Invoice a return or exchange refers to.
    pub original_invoice_id: Option<InvoiceId>,
    pub lines: Vec<LineInput>,
    pub invoice_discount: u64,
    /// Money that changed hands at the counter, signed like the net total.
    pub settled_amount: i64,
    pub issued_by: Option<UserId>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Settle part of an open balance. Negative amounts are refunds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterPayment {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub amount: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidInvoice {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    IssueInvoice(IssueInvoice),
    RegisterPayment(RegisterPayment),
    VoidInvoice(VoidInvoice),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceIssued {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub kind: InvoiceKind,
    pub customer_id: Option<CustomerId>,
    pub original_invoice_id: Option<InvoiceId>,
    pub lines: Vec<InvoiceLine>,
    pub invoice_discount: u64,
    pub totals: InvoiceTotals,
    pub settled_amount: i64,
    pub issued_by: Option<UserId>,
    pub note: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRegistered {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub customer_id: Option<CustomerId>,
    pub amount: i64,
    pub new_settled: i64,
    pub balance_due: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceVoided {
    pub tenant_id: TenantId,
    pub invoice_id: InvoiceId,
    pub customer_id: Option<CustomerId>,
    pub reason: Option<String>,
    /// Settled money handed back (or taken back) because of the void.
    pub reversed_settlement: i64,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceIssued(InvoiceIssued),
    PaymentRegistered(PaymentRegistered),
    InvoiceVoided(InvoiceVoided),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceIssued(_) => "invoicing.invoice.issued",
            InvoiceEvent::PaymentRegistered(_) => "invoicing.invoice.payment_registered",
            InvoiceEvent::InvoiceVoided(_) => "invoicing.invoice.voided",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceIssued(e) => e.occurred_at,
            InvoiceEvent::PaymentRegistered(e) => e.occurred_at,
            InvoiceEvent::InvoiceVoided(e) => e.occurred_at,
        }
    }
}

fn status_for(balance_due: i64) -> InvoiceStatus {
    if balance_due == 0 {
        InvoiceStatus::Settled
    } else {
        InvoiceStatus::Open
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceIssued(e) => {
                self.id = e.invoice_id;
                self.tenant_id = Some(e.tenant_id);
                self.kind = e.kind;
                self.customer_id = e.customer_id;
                self.original_invoice_id = e.original_invoice_id;
                self.lines = e.lines.clone();
                self.totals = e.totals;
                self.settled = e.settled_amount;
                self.status = status_for(e.totals.net_total - e.settled_amount);
                self.issued_at = Some(e.occurred_at);
                self.created = true;
            }
            InvoiceEvent::PaymentRegistered(e) => {
                self.settled = e.new_settled;
                self.status = status_for(e.balance_due);
            }
            InvoiceEvent::InvoiceVoided(_) => {
                self.status = InvoiceStatus::Void;
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::IssueInvoice(cmd) => self.handle_issue(cmd),
            InvoiceCommand::RegisterPayment(cmd) => self.handle_register_payment(cmd),
            InvoiceCommand::VoidInvoice(cmd) => self.handle_void(cmd),
        }
    }
}

impl Invoice {
    fn ensure_existing(&self, tenant_id: TenantId, invoice_id: InvoiceId) -> Result<(), DomainError> {
        if !self.created {
            return Err(DomainError::not_found());
        }
        if self.tenant_id != Some(tenant_id) {
            return Err(DomainError::invariant("tenant mismatch"));
        }
        if self.id != invoice_id {
            return Err(DomainError::invariant("invoice_id mismatch"));
        }
        Ok(())
    }

    fn check_shape(cmd: &IssueInvoice) -> Result<(), DomainError> {
        if cmd.lines.is_empty() {
            return Err(DomainError::validation("cannot issue invoice without lines"));
        }

        let has_out = cmd.lines.iter().any(|l| l.direction == LineDirection::Out);
        let has_in = cmd.lines.iter().any(|l| l.direction == LineDirection::In);

        match cmd.kind {
            InvoiceKind::Sale => {
                if has_in {
                    return Err(DomainError::validation("a sale cannot take goods back"));
                }
                if cmd.original_invoice_id.is_some() {
                    return Err(DomainError::validation(
                        "a sale cannot reference an original invoice",
                    ));
                }
            }
            InvoiceKind::Return => {
                if has_out {
                    return Err(DomainError::validation("a return cannot hand out goods"));
                }
            }
            InvoiceKind::Exchange => {
                if !(has_in && has_out) {
                    return Err(DomainError::validation(
                        "an exchange needs both returned and replacement goods",
                    ));
                }
            }
        }

        if cmd.kind != InvoiceKind::Sale {
            match cmd.original_invoice_id {
                None => {
                    return Err(DomainError::validation(format!(
                        "a {} must reference the original invoice",
                        cmd.kind.as_str()
                    )));
                }
                Some(original) if original == cmd.invoice_id => {
                    return Err(DomainError::validation(
                        "an invoice cannot reference itself",
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn handle_issue(&self, cmd: &IssueInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("invoice already exists"));
        }
        Self::check_shape(cmd)?;

        let (lines, totals) =
            price_lines(&cmd.lines, cmd.invoice_discount, cmd.kind.primary_direction())?;

        let net = totals.net_total;
        let settled = cmd.settled_amount;
        let same_sign = settled == 0 || (settled > 0) == (net > 0);
        if !same_sign || settled.unsigned_abs() > net.unsigned_abs() {
            return Err(DomainError::invariant(format!(
                "settled amount {settled} does not fit a net total of {net}"
            )));
        }
        if cmd.customer_id.is_none() && settled != net {
            return Err(DomainError::invariant(
                "walk-in invoices must be settled in full",
            ));
        }

        Ok(vec![InvoiceEvent::InvoiceIssued(InvoiceIssued {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            kind: cmd.kind,
            customer_id: cmd.customer_id,
            original_invoice_id: cmd.original_invoice_id,
            lines,
            invoice_discount: cmd.invoice_discount,
            totals,
            settled_amount: settled,
            issued_by: cmd.issued_by,
            note: cmd.note.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_register_payment(
        &self,
        cmd: &RegisterPayment,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.invoice_id)?;

        if self.status == InvoiceStatus::Void {
            return Err(DomainError::invariant("cannot settle a void invoice"));
        }
        if cmd.amount == 0 {
            return Err(DomainError::validation("payment amount cannot be zero"));
        }

        let balance = self.balance_due();
        if balance == 0 {
            return Err(DomainError::invariant("invoice is already settled"));
        }
        if (cmd.amount > 0) != (balance > 0) {
            return Err(DomainError::invariant(if balance > 0 {
                "the customer owes this invoice; refunds are not accepted"
            } else {
                "the shop owes this invoice; use a negative amount to refund"
            }));
        }
        if cmd.amount.unsigned_abs() > balance.unsigned_abs() {
            return Err(DomainError::invariant("payment exceeds the balance due"));
        }

        let new_settled = self.settled + cmd.amount;
        Ok(vec![InvoiceEvent::PaymentRegistered(PaymentRegistered {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            customer_id: self.customer_id,
            amount: cmd.amount,
            new_settled,
            balance_due: self.totals.net_total - new_settled,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_void(&self, cmd: &VoidInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_existing(cmd.tenant_id, cmd.invoice_id)?;

        if self.status == InvoiceStatus::Void {
            return Err(DomainError::conflict("invoice is already void"));
        }

        Ok(vec![InvoiceEvent::InvoiceVoided(InvoiceVoided {
            tenant_id: cmd.tenant_id,
            invoice_id: cmd.invoice_id,
            customer_id: self.customer_id,
            reason: cmd.reason.clone(),
            reversed_settlement: self.settled,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storeledger_events::execute;
    use storeledger_products::ProductId;

    fn test_tenant_id() -> TenantId {
        TenantId::new()
    }

    fn test_invoice_id() -> InvoiceId {
        InvoiceId::new(AggregateId::new())
    }

    fn test_customer_id() -> CustomerId {
        CustomerId::new(AggregateId::new())
    }

    fn input(direction: LineDirection, quantity: u64, unit_price: u64) -> LineInput {
        LineInput {
            product_id: ProductId::new(AggregateId::new()),
            product_name: "Cotton shirt".to_string(),
            direction,
            quantity,
            unit_price,
            unit_cost: unit_price / 2,
            discount: 0,
        }
    }

    fn issue_cmd(tenant_id: TenantId, invoice_id: InvoiceId) -> IssueInvoice {
        IssueInvoice {
            tenant_id,
            invoice_id,
            kind: InvoiceKind::Sale,
            customer_id: Some(test_customer_id()),
            original_invoice_id: None,
            lines: vec![input(LineDirection::Out, 2, 1_000)],
            invoice_discount: 0,
            settled_amount: 500,
            issued_by: None,
            note: None,
            occurred_at: Utc::now(),
        }
    }

    fn issued(cmd: IssueInvoice) -> Invoice {
        let mut invoice = Invoice::empty(cmd.invoice_id);
        execute(&mut invoice, &InvoiceCommand::IssueInvoice(cmd)).unwrap();
        invoice
    }

    fn pay(tenant_id: TenantId, invoice_id: InvoiceId, amount: i64) -> InvoiceCommand {
        InvoiceCommand::RegisterPayment(RegisterPayment {
            tenant_id,
            invoice_id,
            amount,
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn partially_settled_sale_stays_open_with_debt() {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let invoice = issued(issue_cmd(tenant_id, invoice_id));

        assert_eq!(invoice.net_total(), 2_000);
        assert_eq!(invoice.settled(), 500);
        assert_eq!(invoice.balance_due(), 1_500);
        assert_eq!(invoice.status(), InvoiceStatus::Open);
        assert!(invoice.can_accept_payment());
    }

    #[test]
    fn paying_off_the_balance_settles_the_invoice() {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let mut invoice = issued(issue_cmd(tenant_id, invoice_id));

        execute(&mut invoice, &pay(tenant_id, invoice_id, 1_000)).unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Open);
        execute(&mut invoice, &pay(tenant_id, invoice_id, 500)).unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Settled);
        assert_eq!(invoice.balance_due(), 0);

        let err = invoice.handle(&pay(tenant_id, invoice_id, 1)).unwrap_err();
        match err {
            DomainError::InvariantViolation(msg) if msg.contains("already settled") => {}
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn cannot_overpay_or_refund_a_debt() {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let invoice = issued(issue_cmd(tenant_id, invoice_id));

        assert!(matches!(
            invoice.handle(&pay(tenant_id, invoice_id, 1_501)),
            Err(DomainError::InvariantViolation(_))
        ));
        assert!(matches!(
            invoice.handle(&pay(tenant_id, invoice_id, -100)),
            Err(DomainError::InvariantViolation(_))
        ));
        assert!(matches!(
            invoice.handle(&pay(tenant_id, invoice_id, 0)),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn walk_in_sale_must_be_settled_in_full() {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let mut cmd = issue_cmd(tenant_id, invoice_id);
        cmd.customer_id = None;

        let err = Invoice::empty(invoice_id)
            .handle(&InvoiceCommand::IssueInvoice(cmd.clone()))
            .unwrap_err();
        assert!(matches!(err, DomainError::InvariantViolation(msg) if msg.contains("walk-in")));

        cmd.settled_amount = 2_000;
        let invoice = issued(cmd);
        assert_eq!(invoice.status(), InvoiceStatus::Settled);
    }

    #[test]
    fn settlement_sign_must_follow_net_total() {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let mut cmd = issue_cmd(tenant_id, invoice_id);
        cmd.settled_amount = -1;
        assert!(Invoice::empty(invoice_id)
            .handle(&InvoiceCommand::IssueInvoice(cmd.clone()))
            .is_err());

        cmd.settled_amount = 2_001;
        assert!(Invoice::empty(invoice_id)
            .handle(&InvoiceCommand::IssueInvoice(cmd))
            .is_err());
    }

    #[test]
    fn return_owes_the_customer_and_accepts_refunds() {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let cmd = IssueInvoice {
            kind: InvoiceKind::Return,
            original_invoice_id: Some(test_invoice_id()),
            lines: vec![input(LineDirection::In, 1, 1_000)],
            settled_amount: 0,
            ..issue_cmd(tenant_id, invoice_id)
        };
        let mut invoice = issued(cmd);

        assert_eq!(invoice.net_total(), -1_000);
        assert_eq!(invoice.balance_due(), -1_000);
        assert!(invoice.handle(&pay(tenant_id, invoice_id, 100)).is_err());

        execute(&mut invoice, &pay(tenant_id, invoice_id, -1_000)).unwrap();
        assert_eq!(invoice.status(), InvoiceStatus::Settled);
        // Cost flows back too: -(1000 - 500)
        assert_eq!(invoice.totals().profit, -500);
    }

    #[test]
    fn kinds_enforce_line_directions() {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let base = issue_cmd(tenant_id, invoice_id);

        let sale_with_in = IssueInvoice {
            lines: vec![input(LineDirection::In, 1, 100)],
            settled_amount: 0,
            ..base.clone()
        };
        let return_without_original = IssueInvoice {
            kind: InvoiceKind::Return,
            lines: vec![input(LineDirection::In, 1, 100)],
            settled_amount: 0,
            ..base.clone()
        };
        let one_sided_exchange = IssueInvoice {
            kind: InvoiceKind::Exchange,
            original_invoice_id: Some(test_invoice_id()),
            settled_amount: 0,
            ..base.clone()
        };

        for cmd in [sale_with_in, return_without_original, one_sided_exchange] {
            let err = Invoice::empty(invoice_id)
                .handle(&InvoiceCommand::IssueInvoice(cmd))
                .unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)), "{err:?}");
        }
    }

    #[test]
    fn exchange_with_upgrade_leaves_customer_owing_difference() {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let cmd = IssueInvoice {
            kind: InvoiceKind::Exchange,
            original_invoice_id: Some(test_invoice_id()),
            lines: vec![
                input(LineDirection::In, 1, 1_000),
                input(LineDirection::Out, 1, 1_400),
            ],
            settled_amount: 400,
            ..issue_cmd(tenant_id, invoice_id)
        };
        let invoice = issued(cmd);

        assert_eq!(invoice.net_total(), 400);
        assert_eq!(invoice.status(), InvoiceStatus::Settled);
    }

    #[test]
    fn void_reports_reversed_settlement_and_blocks_payments() {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let mut invoice = issued(issue_cmd(tenant_id, invoice_id));

        let void = InvoiceCommand::VoidInvoice(VoidInvoice {
            tenant_id,
            invoice_id,
            reason: Some("wrong customer".to_string()),
            occurred_at: Utc::now(),
        });
        let events = execute(&mut invoice, &void).unwrap();
        match &events[0] {
            InvoiceEvent::InvoiceVoided(e) => assert_eq!(e.reversed_settlement, 500),
            other => panic!("unexpected event {other:?}"),
        }

        assert_eq!(invoice.status(), InvoiceStatus::Void);
        assert!(matches!(invoice.handle(&void), Err(DomainError::Conflict(_))));
        assert!(invoice.handle(&pay(tenant_id, invoice_id, 100)).is_err());
    }

    #[test]
    fn issuing_twice_conflicts() {
        let tenant_id = test_tenant_id();
        let invoice_id = test_invoice_id();
        let invoice = issued(issue_cmd(tenant_id, invoice_id));
        let err = invoice
            .handle(&InvoiceCommand::IssueInvoice(issue_cmd(tenant_id, invoice_id)))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn payment_from_another_tenant_is_rejected() {
        let invoice_id = test_invoice_id();
        let invoice = issued(issue_cmd(test_tenant_id(), invoice_id));
        let err = invoice.handle(&pay(test_tenant_id(), invoice_id, 10)).unwrap_err();
        assert_eq!(err, DomainError::invariant("tenant mismatch"));
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Accepted payments never push the balance past zero.
            #[test]
            fn balance_never_changes_sign(payments in proptest::collection::vec(1i64..3_000, 0..20)) {
                let tenant_id = test_tenant_id();
                let invoice_id = test_invoice_id();
                let mut invoice = issued(IssueInvoice {
                    settled_amount: 0,
                    ..issue_cmd(tenant_id, invoice_id)
                });

                for amount in payments {
                    let _ = execute(&mut invoice, &pay(tenant_id, invoice_id, amount));
                    prop_assert!(invoice.balance_due() >= 0);
                    prop_assert_eq!(
                        invoice.status() == InvoiceStatus::Settled,
                        invoice.balance_due() == 0
                    );
                }
            }
        }
    }
}
