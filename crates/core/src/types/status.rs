//! Order status and the transitions between statuses.
//!
//! ```text
//! create --> Pending --> Processing --> Shipped --> Delivered
//!               |            |
//!               +--> Cancelled <--+
//! ```
//!
//! Cancellation is only possible before shipment, for every caller. Admins may
//! otherwise move an order between `Processing`, `Shipped` and `Delivered` in
//! any direction.
//!
//! Admin status changes are deliberately narrower than "any status to any
//! status". Nothing leaves `Cancelled`, because its stock has already been
//! returned to the catalog and reviving it would have to reserve that stock
//! again. Nothing moves back to `Pending`, which only marks a fresh order.

use serde::{Deserialize, Serialize};

/// Reasons a status change is refused regardless of who asks.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    /// Shipped and delivered orders can no longer be cancelled.
    #[error("order is already {0} and can no longer be cancelled")]
    CancelAfterShipment(OrderStatus),
    /// Cancelled orders are final.
    #[error("order is cancelled and cannot change status")]
    AlreadyCancelled,
    /// `Pending` is only ever set at creation.
    #[error("orders cannot be moved back to pending")]
    PendingIsInitial,
}

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shop.order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Freshly created; stock is reserved.
    #[default]
    Pending,
    /// Accepted by the back office and being prepared.
    Processing,
    /// Handed to the carrier.
    Shipped,
    /// Received by the customer.
    Delivered,
    /// Cancelled before shipment; stock has been restored.
    Cancelled,
}

impl OrderStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Processing,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
    ];

    /// Whether an order in this status may still be cancelled.
    #[must_use]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }

    /// Whether the order has left the warehouse.
    #[must_use]
    pub const fn is_shipped(self) -> bool {
        matches!(self, Self::Shipped | Self::Delivered)
    }

    /// Check a move from `self` to `target` against the caller-independent rules.
    ///
    /// # Errors
    ///
    /// Returns the [`TransitionError`] that forbids the move.
    pub const fn check_transition(self, target: Self) -> Result<(), TransitionError> {
        match (self, target) {
            (Self::Cancelled, _) => Err(TransitionError::AlreadyCancelled),
            (_, Self::Pending) => Err(TransitionError::PendingIsInitial),
            (from, Self::Cancelled) if !from.is_cancellable() => {
                Err(TransitionError::CancelAfterShipment(from))
            }
            _ => Ok(()),
        }
    }

    /// Whether moving to `target` returns reserved stock to the catalog.
    #[must_use]
    pub const fn releases_stock(self, target: Self) -> bool {
        self.is_cancellable() && matches!(target, Self::Cancelled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}
