//! Order domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use shopfront_core::{OrderId, OrderStatus, Price, ProductId, ShippingAddress, UserId};

use super::User;

/// A line as requested by the customer, before reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// A reserved order line. Name and price are frozen at creation time so later
/// catalog edits do not rewrite history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub price_at_order: Price,
}

impl OrderItem {
    /// `None` if the line total overflows.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.price_at_order.times(self.quantity)
    }
}

/// A placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    /// Sum of `price_at_order * quantity` over all items.
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Largest storable order total, 999 999 999 999.99 (`NUMERIC(14, 2)`).
    pub const MAX_TOTAL: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2);

    /// Total of a set of frozen lines.
    ///
    /// `None` when the sum overflows or exceeds [`Order::MAX_TOTAL`]. Stores
    /// call this before reserving any stock.
    #[must_use]
    pub fn total_of(items: &[OrderItem]) -> Option<Decimal> {
        items
            .iter()
            .try_fold(Decimal::ZERO, |acc, item| acc.checked_add(item.line_total()?))
            .filter(|total| *total <= Self::MAX_TOTAL)
    }
}

/// Validated, merged input for the reserve-and-create unit of work.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    /// At least one line, quantities >= 1, one line per product.
    pub lines: Vec<OrderLine>,
    pub shipping_address: ShippingAddress,
}

/// Back-office filter for the order listing.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    /// Case-insensitive substring of the owner's email address.
    pub customer_email: Option<String>,
}

impl OrderFilter {
    /// Whether `order`, owned by `owner`, passes this filter.
    #[must_use]
    pub fn matches(&self, order: &Order, owner: Option<&User>) -> bool {
        let status_ok = self.status.is_none_or(|status| order.status == status);
        let email_ok = self.customer_email.as_deref().is_none_or(|needle| {
            owner.is_some_and(|user| user.email.normalized().contains(&needle.to_lowercase()))
        });
        status_ok && email_ok
    }
}
