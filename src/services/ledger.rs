//! Money arithmetic shared by quotations, productions, sales and purchases.
//!
//! Everything here is pure: callers persist the results.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::entities::purchase::DiscountType;

/// Maximum absolute difference tolerated between two money amounts that
/// should agree, e.g. a submitted price and the catalog price.
pub const PRICE_TOLERANCE: Decimal = dec!(0.01);

/// A discount as entered on a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Discount {
    Fixed(Decimal),
    /// Percent of the subtotal, `10` meaning 10%.
    Percentage(Decimal),
}

impl Default for Discount {
    fn default() -> Self {
        Discount::Fixed(Decimal::ZERO)
    }
}

impl Discount {
    /// Resolved discount amount for `subtotal`.
    pub fn amount(&self, subtotal: Decimal) -> Decimal {
        match self {
            Discount::Fixed(value) => *value,
            Discount::Percentage(percent) => round_money(subtotal * *percent / dec!(100)),
        }
    }

    pub fn value(&self) -> Decimal {
        match self {
            Discount::Fixed(v) | Discount::Percentage(v) => *v,
        }
    }

    pub fn kind(&self) -> DiscountType {
        match self {
            Discount::Fixed(_) => DiscountType::Fixed,
            Discount::Percentage(_) => DiscountType::Percentage,
        }
    }

    pub fn is_negative(&self) -> bool {
        self.value() < Decimal::ZERO
    }
}

/// Rounds to cents, half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

pub fn line_total(quantity: Decimal, unit_price: Decimal) -> Decimal {
    round_money(quantity * unit_price)
}

/// Sum of `quantity * unit_price` over all lines, rounded once at the end.
///
/// Stored line totals are rounded individually and need not add up to this.
pub fn subtotal<I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (Decimal, Decimal)>,
{
    let raw: Decimal = lines
        .into_iter()
        .map(|(quantity, unit_price)| quantity * unit_price)
        .sum();
    round_money(raw)
}

/// `subtotal + other_charges + tax - discount_amount`
pub fn document_total(
    subtotal: Decimal,
    other_charges: Decimal,
    discount_amount: Decimal,
    tax: Decimal,
) -> Decimal {
    round_money(subtotal + other_charges + tax - discount_amount)
}

/// Production cost left after the customer's advance.
pub fn final_cost(total_cost: Decimal, advance_amount: Decimal) -> Decimal {
    round_money(total_cost - advance_amount)
}

/// Unpaid part of a sale. Negative when the customer overpaid.
pub fn sale_due(grand_total: Decimal, paid_amount: Decimal, advance_adjusted: Decimal) -> Decimal {
    round_money(grand_total - paid_amount - advance_adjusted)
}

/// Outstanding amount of a purchase.
pub fn purchase_due(total: Decimal, paid: Decimal) -> Decimal {
    round_money(total - paid)
}

pub fn within_tolerance(a: Decimal, b: Decimal, tolerance: Decimal) -> bool {
    (a - b).abs() <= tolerance
}

/// Total a production or sale line should carry.
pub fn expected_item_total(price_per_piece: Decimal, quantity: Decimal) -> Decimal {
    line_total(quantity, price_per_piece)
}

/// Balance movements needed to move a sale's contribution from
/// `(old_customer, old_due)` to `(new_customer, new_due)`.
///
/// Same customer yields a single net delta (omitted when zero); a customer
/// change yields a reversal on the old customer and a charge on the new one.
pub fn reassignment_deltas(
    old_customer: i64,
    old_due: Decimal,
    new_customer: i64,
    new_due: Decimal,
) -> Vec<(i64, Decimal)> {
    if old_customer == new_customer {
        let net = new_due - old_due;
        if net.is_zero() {
            Vec::new()
        } else {
            vec![(old_customer, net)]
        }
    } else {
        vec![(old_customer, -old_due), (new_customer, new_due)]
    }
}
