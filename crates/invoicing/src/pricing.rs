//! Line pricing and invoice totals.
//!
//! Pure arithmetic over minor currency units: line discounts first, then the
//! invoice-level discount spread over the primary-direction lines in
//! proportion to what is left of each.

use serde::{Deserialize, Serialize};

use storeledger_core::money::{allocate, checked_sum, line_amount, signed};
use storeledger_core::{DomainError, DomainResult};
use storeledger_products::ProductId;

/// Which way goods move on a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineDirection {
    /// Goods leave the shop (sold or handed out as a replacement).
    Out,
    /// Goods come back to the shop.
    In,
}

/// Line as requested by the caller, before discounts are settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    pub product_id: ProductId,
    pub product_name: String,
    pub direction: LineDirection,
    pub quantity: u64,
    pub unit_price: u64,
    pub unit_cost: u64,
    /// Discount for the whole line, not per unit.
    pub discount: u64,
}

/// Priced line as recorded on the invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub line_no: u32,
    pub product_id: ProductId,
    pub product_name: String,
    pub direction: LineDirection,
    pub quantity: u64,
    pub unit_price: u64,
    pub unit_cost: u64,
    pub line_discount: u64,
    /// Share of the invoice-level discount carried by this line.
    pub invoice_discount: u64,
    /// `quantity * unit_price - line_discount - invoice_discount`.
    pub net_amount: u64,
    /// `quantity * unit_cost`.
    pub cost_amount: u64,
}

impl InvoiceLine {
    pub fn gross_amount(&self) -> u64 {
        self.net_amount + self.line_discount + self.invoice_discount
    }

    pub fn total_discount(&self) -> u64 {
        self.line_discount + self.invoice_discount
    }
}

/// Totals of an invoice, split by direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceTotals {
    pub gross_out: u64,
    pub gross_in: u64,
    pub discount_out: u64,
    pub discount_in: u64,
    pub net_out: u64,
    pub net_in: u64,
    pub cost_out: u64,
    pub cost_in: u64,
    /// `net_out - net_in`; positive when the customer owes the shop.
    pub net_total: i64,
    /// `(net_out - cost_out) - (net_in - cost_in)`.
    pub profit: i64,
}

/// Price `inputs`, spreading `invoice_discount` over the lines moving in
/// `primary` direction.
pub fn price_lines(
    inputs: &[LineInput],
    invoice_discount: u64,
    primary: LineDirection,
) -> DomainResult<(Vec<InvoiceLine>, InvoiceTotals)> {
    let mut after_line_discount = Vec::with_capacity(inputs.len());
    for (idx, input) in inputs.iter().enumerate() {
        if input.quantity == 0 {
            return Err(DomainError::validation(format!(
                "line {}: quantity must be positive",
                idx + 1
            )));
        }
        if input.product_name.trim().is_empty() {
            return Err(DomainError::validation(format!(
                "line {}: product name cannot be empty",
                idx + 1
            )));
        }
        let gross = line_amount(input.quantity, input.unit_price)?;
        if input.discount > gross {
            return Err(DomainError::validation(format!(
                "line {}: discount exceeds line amount",
                idx + 1
            )));
        }
        after_line_discount.push(gross - input.discount);
    }

    let weights: Vec<u64> = inputs
        .iter()
        .zip(&after_line_discount)
        .map(|(input, net)| if input.direction == primary { *net } else { 0 })
        .collect();
    let discountable = checked_sum(weights.iter().copied())?;
    if invoice_discount > discountable {
        return Err(DomainError::validation(
            "invoice discount exceeds the discountable amount",
        ));
    }
    let shares = allocate(invoice_discount, &weights)?;

    let mut lines = Vec::with_capacity(inputs.len());
    let mut totals = InvoiceTotals::default();
    for (idx, ((input, net_before), share)) in inputs
        .iter()
        .zip(after_line_discount)
        .zip(shares)
        .enumerate()
    {
        let line = InvoiceLine {
            line_no: u32::try_from(idx + 1).map_err(|_| DomainError::validation("too many lines"))?,
            product_id: input.product_id,
            product_name: input.product_name.trim().to_string(),
            direction: input.direction,
            quantity: input.quantity,
            unit_price: input.unit_price,
            unit_cost: input.unit_cost,
            line_discount: input.discount,
            invoice_discount: share,
            net_amount: net_before - share,
            cost_amount: line_amount(input.quantity, input.unit_cost)?,
        };
        totals.add(&line)?;
        lines.push(line);
    }
    totals.finish()?;

    Ok((lines, totals))
}

impl InvoiceTotals {
    fn add(&mut self, line: &InvoiceLine) -> DomainResult<()> {
        let overflow = || DomainError::overflow("invoice total");
        let (gross, discount, net, cost) = match line.direction {
            LineDirection::Out => (
                &mut self.gross_out,
                &mut self.discount_out,
                &mut self.net_out,
                &mut self.cost_out,
            ),
            LineDirection::In => (
                &mut self.gross_in,
                &mut self.discount_in,
                &mut self.net_in,
                &mut self.cost_in,
            ),
        };
        *gross = gross.checked_add(line.gross_amount()).ok_or_else(overflow)?;
        *discount = discount.checked_add(line.total_discount()).ok_or_else(overflow)?;
        *net = net.checked_add(line.net_amount).ok_or_else(overflow)?;
        *cost = cost.checked_add(line.cost_amount).ok_or_else(overflow)?;
        Ok(())
    }

    fn finish(&mut self) -> DomainResult<()> {
        let net_out = signed(self.net_out)?;
        let net_in = signed(self.net_in)?;
        let cost_out = signed(self.cost_out)?;
        let cost_in = signed(self.cost_in)?;
        let overflow = || DomainError::overflow("invoice totals");
        let margin_out = net_out.checked_sub(cost_out).ok_or_else(overflow)?;
        let margin_in = net_in.checked_sub(cost_in).ok_or_else(overflow)?;
        self.net_total = net_out.checked_sub(net_in).ok_or_else(overflow)?;
        self.profit = margin_out.checked_sub(margin_in).ok_or_else(overflow)?;
        Ok(())
    }
}
