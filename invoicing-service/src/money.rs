//! Monetary arithmetic for invoices.
//!
//! Every stored amount has two decimal places. Rounding is half-up
//! (midpoint away from zero); no per-currency minor-unit table is modeled.

use rust_decimal::{Decimal, RoundingStrategy};

/// Decimal places kept on every monetary amount.
pub const MONEY_SCALE: u32 = 2;

/// Round an amount to two decimal places, half-up. The result always
/// carries exactly two places (`20` becomes `20.00`).
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded =
        value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

/// Largest amount an invoice column holds (`NUMERIC(14, 2)`).
pub const MAX_AMOUNT: Decimal = Decimal::from_parts(0x107A_3FFF, 0x5AF3, 0, false, 2);

/// Largest tax rate percentage a stored rate holds (`NUMERIC(7, 4)`).
pub const MAX_TAX_RATE_PERCENT: Decimal = Decimal::from_parts(9_999_999, 0, 0, false, 4);

/// Round an amount and reject it when it no longer fits a stored column.
pub fn checked_money(value: Decimal) -> Option<Decimal> {
    let rounded = round_money(value);
    (rounded.abs() <= MAX_AMOUNT).then_some(rounded)
}

/// `round(quantity * unit_price, 2)`, or `None` when out of range.
pub fn line_total(quantity: Decimal, unit_price: Decimal) -> Option<Decimal> {
    quantity.checked_mul(unit_price).and_then(checked_money)
}

/// `round(subtotal * tax_rate_percent / 100, 2)`, or `None` when out of range.
pub fn tax_total(subtotal: Decimal, tax_rate_percent: Decimal) -> Option<Decimal> {
    subtotal
        .checked_mul(tax_rate_percent)?
        .checked_div(Decimal::ONE_HUNDRED)
        .and_then(checked_money)
}

/// `round(subtotal + tax_total, 2)`, or `None` when out of range.
pub fn total(subtotal: Decimal, tax_total: Decimal) -> Option<Decimal> {
    subtotal.checked_add(tax_total).and_then(checked_money)
}

/// Subtotal, tax and grand total computed together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub subtotal: Decimal,
    pub tax_total: Decimal,
    pub total: Decimal,
}

impl Totals {
    /// Sum already-rounded line totals and apply the tax rate.
    ///
    /// Returns `None` if any step leaves the storable range.
    pub fn from_lines<I>(line_totals: I, tax_rate_percent: Decimal) -> Option<Self>
    where
        I: IntoIterator<Item = Decimal>,
    {
        let sum = line_totals
            .into_iter()
            .try_fold(Decimal::ZERO, |acc, line| acc.checked_add(line))?;
        let subtotal = checked_money(sum)?;
        let tax_total = tax_total(subtotal, tax_rate_percent)?;
        Some(Self {
            subtotal,
            tax_total,
            total: total(subtotal, tax_total)?,
        })
    }
}
