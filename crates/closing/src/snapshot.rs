//! Day snapshot computation.
//!
//! Everything here is a fold over rows the caller already selected; no
//! lookups, no clock. The same inputs always give the same snapshot, which is
//! what lets a reopened day be closed again with a recomputed figure.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use storeledger_core::money::signed;
use storeledger_core::{DomainError, DomainResult};
use storeledger_customers::CustomerId;
use storeledger_invoicing::{InvoiceId, InvoiceKind};
use storeledger_products::ProductId;

use crate::transaction::{CustomerTransaction, TransactionKind};

/// Label used for transactions without a customer.
pub const WALK_IN: &str = "walk-in";

/// Shelf position of one product at the end of the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockPosition {
    pub product_id: ProductId,
    pub product_name: String,
    pub on_hand: i64,
    pub average_cost: u64,
}

/// Invoice voided on the day; reported but excluded from the totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidedInvoice {
    pub invoice_id: InvoiceId,
    pub net_total: i64,
}

/// Everything a closing needs, already filtered to one business date.
#[derive(Debug, Clone, Copy)]
pub struct DayInput<'a> {
    pub business_date: NaiveDate,
    pub transactions: &'a [CustomerTransaction],
    pub stock: &'a [StockPosition],
    pub voided: &'a [VoidedInvoice],
    pub customer_names: &'a BTreeMap<CustomerId, String>,
    /// Running totals of the latest earlier closed day, if any.
    pub previous: Option<&'a RunningTotals>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyTotals {
    /// Net amount of goods sold (after discounts).
    pub sales: u64,
    /// Net amount of goods taken back.
    pub returns: u64,
    pub net_sales: i64,
    /// Cost of goods sold minus cost of goods returned.
    pub cost: i64,
    pub profit: i64,
    /// Discounts granted minus discounts reversed by returns.
    pub discounts: i64,
    pub payments: u64,
    pub refunds: u64,
    /// Credit extended minus money collected; negative when debt shrank.
    pub debt_change: i64,
    pub items_sold: u64,
    pub items_returned: u64,
    pub invoice_count: u32,
    pub return_count: u32,
    pub exchange_count: u32,
    pub void_count: u32,
    pub void_amount: i64,
    pub closing_stock_value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDaySummary {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity_sold: u64,
    pub quantity_returned: u64,
    pub net_quantity: i64,
    pub sales: u64,
    pub returns: u64,
    pub cost: i64,
    pub profit: i64,
    pub discount: i64,
    pub closing_stock: i64,
    pub stock_value: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDaySummary {
    pub customer_id: Option<CustomerId>,
    pub customer_name: String,
    pub purchases: u64,
    pub returns: u64,
    pub payments: u64,
    pub refunds: u64,
    pub debt_change: i64,
}

/// Totals accumulated over every closed day up to and including `through`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningTotals {
    pub through: NaiveDate,
    pub days_closed: u32,
    pub sales: u64,
    pub returns: u64,
    pub net_sales: i64,
    pub cost: i64,
    pub profit: i64,
    pub discounts: i64,
    pub payments: u64,
    pub refunds: u64,
    pub outstanding_debt: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub business_date: NaiveDate,
    pub totals: DailyTotals,
    pub products: Vec<ProductDaySummary>,
    pub customers: Vec<CustomerDaySummary>,
    pub voided: Vec<VoidedInvoice>,
    pub running: RunningTotals,
}

fn overflow() -> DomainError {
    DomainError::overflow("daily totals")
}

fn add_u(acc: &mut u64, v: u64) -> DomainResult<()> {
    *acc = acc.checked_add(v).ok_or_else(overflow)?;
    Ok(())
}

fn add_i(acc: &mut i64, v: i64) -> DomainResult<()> {
    *acc = acc.checked_add(v).ok_or_else(overflow)?;
    Ok(())
}

fn count(set: &BTreeSet<InvoiceId>) -> DomainResult<u32> {
    u32::try_from(set.len()).map_err(|_| overflow())
}

/// Compute the snapshot of one business day.
pub fn summarize_day(input: DayInput<'_>) -> DomainResult<DailySnapshot> {
    if let Some(prev) = input.previous {
        if prev.through >= input.business_date {
            return Err(DomainError::validation(format!(
                "running totals through {} cannot roll into {}",
                prev.through, input.business_date
            )));
        }
    }

    let mut totals = DailyTotals::default();
    let mut products: BTreeMap<ProductId, ProductDaySummary> = BTreeMap::new();
    let mut customers: BTreeMap<Option<CustomerId>, CustomerDaySummary> = BTreeMap::new();
    let mut sale_invoices = BTreeSet::new();
    let mut return_invoices = BTreeSet::new();
    let mut exchange_invoices = BTreeSet::new();
    let mut cost_out: i64 = 0;
    let mut cost_in: i64 = 0;
    let mut discount_out: i64 = 0;
    let mut discount_in: i64 = 0;

    for tx in input.transactions {
        if tx.business_date != input.business_date {
            return Err(DomainError::validation(format!(
                "transaction of {} in the closing of {}",
                tx.business_date, input.business_date
            )));
        }

        let customer = customers.entry(tx.customer_id).or_insert_with(|| CustomerDaySummary {
            customer_id: tx.customer_id,
            customer_name: tx
                .customer_id
                .and_then(|id| input.customer_names.get(&id).cloned())
                .unwrap_or_else(|| match tx.customer_id {
                    Some(id) => id.to_string(),
                    None => WALK_IN.to_string(),
                }),
            purchases: 0,
            returns: 0,
            payments: 0,
            refunds: 0,
            debt_change: 0,
        });

        match tx.kind {
            TransactionKind::Payment => {
                add_u(&mut totals.payments, tx.amount)?;
                add_u(&mut customer.payments, tx.amount)?;
                continue;
            }
            TransactionKind::Refund => {
                add_u(&mut totals.refunds, tx.amount)?;
                add_u(&mut customer.refunds, tx.amount)?;
                continue;
            }
            TransactionKind::Purchase | TransactionKind::Return => {}
        }

        // Only goods rows carry the issue date; settlements may come days later.
        match tx.invoice_kind {
            InvoiceKind::Sale => sale_invoices.insert(tx.invoice_id),
            InvoiceKind::Return => return_invoices.insert(tx.invoice_id),
            InvoiceKind::Exchange => exchange_invoices.insert(tx.invoice_id),
        };

        let product_id = tx
            .product_id
            .ok_or_else(|| DomainError::validation("goods transaction without product"))?;
        let product = products.entry(product_id).or_insert_with(|| ProductDaySummary {
            product_id,
            product_name: tx.product_name.clone().unwrap_or_default(),
            quantity_sold: 0,
            quantity_returned: 0,
            net_quantity: 0,
            sales: 0,
            returns: 0,
            cost: 0,
            profit: 0,
            discount: 0,
            closing_stock: 0,
            stock_value: 0,
        });
        let amount = signed(tx.amount)?;
        let cost = signed(tx.cost)?;
        let discount = signed(tx.discount)?;
        let quantity = signed(tx.quantity)?;

        if tx.kind == TransactionKind::Purchase {
            add_u(&mut totals.sales, tx.amount)?;
            add_u(&mut totals.items_sold, tx.quantity)?;
            add_i(&mut cost_out, cost)?;
            add_i(&mut discount_out, discount)?;
            add_u(&mut customer.purchases, tx.amount)?;
            add_u(&mut product.quantity_sold, tx.quantity)?;
            add_u(&mut product.sales, tx.amount)?;
            add_i(&mut product.net_quantity, quantity)?;
            add_i(&mut product.cost, cost)?;
            add_i(&mut product.profit, amount - cost)?;
            add_i(&mut product.discount, discount)?;
        } else {
            add_u(&mut totals.returns, tx.amount)?;
            add_u(&mut totals.items_returned, tx.quantity)?;
            add_i(&mut cost_in, cost)?;
            add_i(&mut discount_in, discount)?;
            add_u(&mut customer.returns, tx.amount)?;
            add_u(&mut product.quantity_returned, tx.quantity)?;
            add_u(&mut product.returns, tx.amount)?;
            add_i(&mut product.net_quantity, -quantity)?;
            add_i(&mut product.cost, -cost)?;
            add_i(&mut product.profit, cost - amount)?;
            add_i(&mut product.discount, -discount)?;
        }
    }

    for position in input.stock {
        let value = i64::try_from(i128::from(position.on_hand.max(0)) * i128::from(position.average_cost))
            .map_err(|_| overflow())?;
        let product = products
            .entry(position.product_id)
            .or_insert_with(|| ProductDaySummary {
                product_id: position.product_id,
                product_name: position.product_name.clone(),
                quantity_sold: 0,
                quantity_returned: 0,
                net_quantity: 0,
                sales: 0,
                returns: 0,
                cost: 0,
                profit: 0,
                discount: 0,
                closing_stock: 0,
                stock_value: 0,
            });
        product.closing_stock = position.on_hand;
        product.stock_value = value;
        add_i(&mut totals.closing_stock_value, value)?;
    }

    totals.net_sales = signed(totals.sales)? - signed(totals.returns)?;
    totals.cost = cost_out - cost_in;
    totals.profit = totals.net_sales - totals.cost;
    totals.discounts = discount_out - discount_in;
    totals.debt_change =
        totals.net_sales - (signed(totals.payments)? - signed(totals.refunds)?);
    totals.invoice_count = count(&sale_invoices)?;
    totals.return_count = count(&return_invoices)?;
    totals.exchange_count = count(&exchange_invoices)?;
    totals.void_count = u32::try_from(input.voided.len()).map_err(|_| overflow())?;
    for v in input.voided {
        add_i(&mut totals.void_amount, v.net_total)?;
    }

    for c in customers.values_mut() {
        c.debt_change = (signed(c.purchases)? - signed(c.returns)?)
            - (signed(c.payments)? - signed(c.refunds)?);
    }

    let mut products: Vec<ProductDaySummary> = products.into_values().collect();
    products.sort_by(|a, b| {
        a.product_name
            .cmp(&b.product_name)
            .then(a.product_id.cmp(&b.product_id))
    });
    let mut customers: Vec<CustomerDaySummary> = customers.into_values().collect();
    customers.sort_by(|a, b| {
        a.customer_name
            .cmp(&b.customer_name)
            .then(a.customer_id.cmp(&b.customer_id))
    });

    let running = roll_forward(input.previous, input.business_date, &totals)?;

    Ok(DailySnapshot {
        business_date: input.business_date,
        totals,
        products,
        customers,
        voided: input.voided.to_vec(),
        running,
    })
}

fn roll_forward(
    previous: Option<&RunningTotals>,
    business_date: NaiveDate,
    day: &DailyTotals,
) -> DomainResult<RunningTotals> {
    let mut running = match previous {
        Some(prev) => *prev,
        None => RunningTotals {
            through: business_date,
            days_closed: 0,
            sales: 0,
            returns: 0,
            net_sales: 0,
            cost: 0,
            profit: 0,
            discounts: 0,
            payments: 0,
            refunds: 0,
            outstanding_debt: 0,
        },
    };

    running.through = business_date;
    running.days_closed = running.days_closed.checked_add(1).ok_or_else(overflow)?;
    add_u(&mut running.sales, day.sales)?;
    add_u(&mut running.returns, day.returns)?;
    add_i(&mut running.net_sales, day.net_sales)?;
    add_i(&mut running.cost, day.cost)?;
    add_i(&mut running.profit, day.profit)?;
    add_i(&mut running.discounts, day.discounts)?;
    add_u(&mut running.payments, day.payments)?;
    add_u(&mut running.refunds, day.refunds)?;
    add_i(&mut running.outstanding_debt, day.debt_change)?;
    Ok(running)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use storeledger_core::AggregateId;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 1).unwrap()
    }

    struct Row {
        invoice_id: InvoiceId,
        invoice_kind: InvoiceKind,
        customer_id: Option<CustomerId>,
    }

    impl Row {
        fn goods(&self, kind: TransactionKind, product: ProductId, name: &str, qty: u64, amount: u64, cost: u64, discount: u64) -> CustomerTransaction {
            CustomerTransaction {
                business_date: date(),
                occurred_at: Utc::now(),
                invoice_id: self.invoice_id,
                invoice_kind: self.invoice_kind,
                customer_id: self.customer_id,
                kind,
                product_id: Some(product),
                product_name: Some(name.to_string()),
                quantity: qty,
                amount,
                cost,
                discount,
            }
        }

        fn money(&self, kind: TransactionKind, amount: u64) -> CustomerTransaction {
            CustomerTransaction {
                business_date: date(),
                occurred_at: Utc::now(),
                invoice_id: self.invoice_id,
                invoice_kind: self.invoice_kind,
                customer_id: self.customer_id,
                kind,
                product_id: None,
                product_name: None,
                quantity: 0,
                amount,
                cost: 0,
                discount: 0,
            }
        }
    }

    fn row(kind: InvoiceKind, customer_id: Option<CustomerId>) -> Row {
        Row {
            invoice_id: InvoiceId::new(AggregateId::new()),
            invoice_kind: kind,
            customer_id,
        }
    }

    #[test]
    fn a_day_of_sales_returns_and_credit() {
        let farmer = CustomerId::new(AggregateId::new());
        let spray = ProductId::new(AggregateId::new());
        let gloves = ProductId::new(AggregateId::new());

        // Credit sale to the farmer: 2 sprays at 500 less 100 discount, pays 300.
        let credit = row(InvoiceKind::Sale, Some(farmer));
        // Walk-in cash sale: 1 pair of gloves.
        let cash = row(InvoiceKind::Sale, None);
        // Farmer returns one spray (net 450, cost 400), no refund yet.
        let ret = row(InvoiceKind::Return, Some(farmer));

        let transactions = vec![
            credit.goods(TransactionKind::Purchase, spray, "Spray", 2, 900, 800, 100),
            credit.money(TransactionKind::Payment, 300),
            cash.goods(TransactionKind::Purchase, gloves, "Gloves", 1, 200, 120, 0),
            cash.money(TransactionKind::Payment, 200),
            ret.goods(TransactionKind::Return, spray, "Spray", 1, 450, 400, 50),
        ];
        let stock = vec![
            StockPosition { product_id: spray, product_name: "Spray".into(), on_hand: 9, average_cost: 400 },
            StockPosition { product_id: gloves, product_name: "Gloves".into(), on_hand: 4, average_cost: 120 },
        ];
        let mut names = BTreeMap::new();
        names.insert(farmer, "Rahim".to_string());

        let snap = summarize_day(DayInput {
            business_date: date(),
            transactions: &transactions,
            stock: &stock,
            voided: &[],
            customer_names: &names,
            previous: None,
        })
        .unwrap();

        let t = snap.totals;
        assert_eq!(t.sales, 1_100);
        assert_eq!(t.returns, 450);
        assert_eq!(t.net_sales, 650);
        assert_eq!(t.cost, 520);
        assert_eq!(t.profit, 130);
        assert_eq!(t.discounts, 50);
        assert_eq!(t.payments, 500);
        assert_eq!(t.debt_change, 150);
        assert_eq!(t.invoice_count, 2);
        assert_eq!(t.return_count, 1);
        assert_eq!(t.items_sold, 3);
        assert_eq!(t.items_returned, 1);
        assert_eq!(t.closing_stock_value, 9 * 400 + 4 * 120);

        // Sorted by name: Gloves, Spray.
        assert_eq!(snap.products[0].product_name, "Gloves");
        let spray_row = &snap.products[1];
        assert_eq!(spray_row.net_quantity, 1);
        assert_eq!(spray_row.profit, (900 - 800) - (450 - 400));
        assert_eq!(spray_row.closing_stock, 9);

        // Sorted by name: Rahim, walk-in.
        assert_eq!(snap.customers[0].customer_name, "Rahim");
        assert_eq!(snap.customers[0].debt_change, (900 - 450) - 300);
        assert_eq!(snap.customers[1].customer_name, WALK_IN);
        assert_eq!(snap.customers[1].debt_change, 0);

        assert_eq!(snap.running.days_closed, 1);
        assert_eq!(snap.running.outstanding_debt, 150);
    }

    #[test]
    fn running_totals_roll_forward_from_previous_day() {
        let previous = RunningTotals {
            through: date().pred_opt().unwrap(),
            days_closed: 4,
            sales: 10_000,
            returns: 500,
            net_sales: 9_500,
            cost: 7_000,
            profit: 2_500,
            discounts: 300,
            payments: 8_000,
            refunds: 100,
            outstanding_debt: 1_600,
        };
        let customer = CustomerId::new(AggregateId::new());
        let r = row(InvoiceKind::Sale, Some(customer));
        let product = ProductId::new(AggregateId::new());
        let transactions = vec![r.goods(TransactionKind::Purchase, product, "Urea 50kg", 1, 1_000, 800, 0)];

        let snap = summarize_day(DayInput {
            business_date: date(),
            transactions: &transactions,
            stock: &[],
            voided: &[],
            customer_names: &BTreeMap::new(),
            previous: Some(&previous),
        })
        .unwrap();

        assert_eq!(snap.running.through, date());
        assert_eq!(snap.running.days_closed, 5);
        assert_eq!(snap.running.sales, 11_000);
        assert_eq!(snap.running.profit, 2_700);
        assert_eq!(snap.running.outstanding_debt, 2_600);
        // Unknown customers fall back to their id.
        assert_eq!(snap.customers[0].customer_name, customer.to_string());
    }

    #[test]
    fn previous_totals_must_be_older() {
        let previous = RunningTotals {
            through: date(),
            days_closed: 1,
            sales: 0,
            returns: 0,
            net_sales: 0,
            cost: 0,
            profit: 0,
            discounts: 0,
            payments: 0,
            refunds: 0,
            outstanding_debt: 0,
        };
        let err = summarize_day(DayInput {
            business_date: date(),
            transactions: &[],
            stock: &[],
            voided: &[],
            customer_names: &BTreeMap::new(),
            previous: Some(&previous),
        })
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn foreign_dates_are_rejected() {
        let r = row(InvoiceKind::Sale, None);
        let mut tx = r.money(TransactionKind::Payment, 10);
        tx.business_date = date().succ_opt().unwrap();

        let err = summarize_day(DayInput {
            business_date: date(),
            transactions: &[tx],
            stock: &[],
            voided: &[],
            customer_names: &BTreeMap::new(),
            previous: None,
        })
        .unwrap_err();
        assert!(matches!(err, DomainError::Validation(msg) if msg.contains("transaction of")));
    }

    #[test]
    fn settling_an_older_invoice_does_not_count_it_again() {
        let farmer = CustomerId::new(AggregateId::new());
        let earlier_sale = row(InvoiceKind::Sale, Some(farmer));
        let earlier_return = row(InvoiceKind::Return, Some(farmer));
        let transactions = vec![
            earlier_sale.money(TransactionKind::Payment, 500),
            earlier_return.money(TransactionKind::Refund, 120),
        ];

        let snap = summarize_day(DayInput {
            business_date: date(),
            transactions: &transactions,
            stock: &[],
            voided: &[],
            customer_names: &BTreeMap::new(),
            previous: None,
        })
        .unwrap();

        let t = snap.totals;
        assert_eq!(t.invoice_count, 0);
        assert_eq!(t.return_count, 0);
        assert_eq!(t.sales, 0);
        assert_eq!(t.payments, 500);
        assert_eq!(t.refunds, 120);
        assert_eq!(t.debt_change, -380);
    }

    #[test]
    fn voided_invoices_are_counted_apart() {
        let voided = vec![VoidedInvoice {
            invoice_id: InvoiceId::new(AggregateId::new()),
            net_total: 1_250,
        }];
        let snap = summarize_day(DayInput {
            business_date: date(),
            transactions: &[],
            stock: &[],
            voided: &voided,
            customer_names: &BTreeMap::new(),
            previous: None,
        })
        .unwrap();

        assert_eq!(snap.totals.void_count, 1);
        assert_eq!(snap.totals.void_amount, 1_250);
        assert_eq!(snap.totals.net_sales, 0);
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 1000,
                ..ProptestConfig::default()
            })]

            /// Per-customer debt changes add up to the day's debt change, and
            /// per-product profit adds up to the day's profit.
            #[test]
            fn summaries_reconcile_with_totals(
                rows in proptest::collection::vec(
                    (0usize..3, 0usize..3, 0u8..4, 1u64..20, 1u64..5_000, 0u64..5_000),
                    0..40
                )
            ) {
                let customers = [Some(CustomerId::new(AggregateId::new())), Some(CustomerId::new(AggregateId::new())), None];
                let products = [ProductId::new(AggregateId::new()), ProductId::new(AggregateId::new()), ProductId::new(AggregateId::new())];

                let transactions: Vec<CustomerTransaction> = rows
                    .into_iter()
                    .map(|(c, p, k, qty, amount, cost)| {
                        let r = row(InvoiceKind::Sale, customers[c]);
                        match k {
                            0 => r.goods(TransactionKind::Purchase, products[p], "P", qty, amount, cost, 0),
                            1 => r.goods(TransactionKind::Return, products[p], "P", qty, amount, cost, 0),
                            2 => r.money(TransactionKind::Payment, amount),
                            _ => r.money(TransactionKind::Refund, amount),
                        }
                    })
                    .collect();

                let snap = summarize_day(DayInput {
                    business_date: date(),
                    transactions: &transactions,
                    stock: &[],
                    voided: &[],
                    customer_names: &BTreeMap::new(),
                    previous: None,
                }).unwrap();

                let debt: i64 = snap.customers.iter().map(|c| c.debt_change).sum();
                prop_assert_eq!(debt, snap.totals.debt_change);
                let profit: i64 = snap.products.iter().map(|p| p.profit).sum();
                prop_assert_eq!(profit, snap.totals.profit);
            }
        }
    }
}
