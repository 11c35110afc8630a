//! Order lifecycle types
//!
//! Orders carry an immutable identity and a mutable remaining quantity.
//! Status changes go through an explicit transition table so illegal
//! edges surface as errors instead of silent state corruption.

use crate::errors::{AdmissionError, TransitionError};
use crate::ids::{OrderId, OwnerId, Symbol};
use crate::numeric::{Price, Quantity};
use serde::{Deserialize, Serialize};

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy order (bid)
    BUY,
    /// Sell order (ask)
    SELL,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::BUY => Side::SELL,
            Side::SELL => Side::BUY,
        }
    }
}

/// Order pricing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Cross up to a limit price, rest any remainder
    LIMIT,
    /// Cross at any opposing price; never rests
    MARKET,
}

impl OrderType {
    pub fn is_market(&self) -> bool {
        matches!(self, OrderType::MARKET)
    }
}

/// Time-in-force policy for orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good-Till-Cancel: rests until filled or explicitly canceled
    GTC,
    /// Immediate-Or-Cancel: match immediately, cancel remainder
    IOC,
    /// Fill-Or-Kill: full match or reject entirely, never partial
    FOK,
}

/// Order status
///
/// State IDs are stable for wire protocol compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason")]
pub enum OrderStatus {
    /// State 0: admitted and sequenced, not yet resolved
    #[serde(rename = "ACCEPTED")]
    Accepted,

    /// State 1: resting in the book, no fills yet
    #[serde(rename = "RESTING")]
    Resting,

    /// State 2: some quantity filled, remainder still live
    #[serde(rename = "PARTIALLY_FILLED")]
    PartiallyFilled,

    /// State 3: completely filled (terminal)
    #[serde(rename = "FILLED")]
    Filled,

    /// State 4: canceled by user or policy (terminal)
    #[serde(rename = "CANCELLED")]
    Cancelled(CancelReason),

    /// State 5: refused before touching the book (terminal)
    #[serde(rename = "REJECTED")]
    Rejected(RejectReason),
}

/// A requested status change, applied through [`OrderStatus::transition`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusTransition {
    /// Remainder entered the book
    Rest,
    /// A fill consumed part of the remaining quantity
    PartialFill,
    /// A fill consumed the entire remaining quantity
    Fill,
    /// Remainder withdrawn (user request or time-in-force policy)
    Cancel(CancelReason),
    /// Refused without any book mutation
    Reject(RejectReason),
}

impl StatusTransition {
    /// Name of the status this transition targets
    pub fn target_name(&self) -> &'static str {
        match self {
            StatusTransition::Rest => "RESTING",
            StatusTransition::PartialFill => "PARTIALLY_FILLED",
            StatusTransition::Fill => "FILLED",
            StatusTransition::Cancel(_) => "CANCELLED",
            StatusTransition::Reject(_) => "REJECTED",
        }
    }
}

impl OrderStatus {
    /// Check if status is terminal (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled(_) | OrderStatus::Rejected(_)
        )
    }

    /// Get the state ID for wire protocol
    pub fn state_id(&self) -> u8 {
        match self {
            OrderStatus::Accepted => 0,
            OrderStatus::Resting => 1,
            OrderStatus::PartiallyFilled => 2,
            OrderStatus::Filled => 3,
            OrderStatus::Cancelled(_) => 4,
            OrderStatus::Rejected(_) => 5,
        }
    }

    /// Stable display name of the state
    pub fn name(&self) -> &'static str {
        match self {
            OrderStatus::Accepted => "ACCEPTED",
            OrderStatus::Resting => "RESTING",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled(_) => "CANCELLED",
            OrderStatus::Rejected(_) => "REJECTED",
        }
    }

    /// Apply a transition, returning the new status
    ///
    /// Terminal states accept nothing further: a cancel against one is
    /// reported as `AlreadyTerminal` (informational, the race loser),
    /// anything else as `InvalidTransition`.
    pub fn transition(&self, transition: StatusTransition) -> Result<OrderStatus, TransitionError> {
        if self.is_terminal() {
            return match transition {
                StatusTransition::Cancel(_) => Err(TransitionError::AlreadyTerminal {
                    status: self.name().to_string(),
                }),
                _ => Err(TransitionError::InvalidTransition {
                    from: self.name().to_string(),
                    to: transition.target_name().to_string(),
                }),
            };
        }

        match (self, &transition) {
            // Admission resolves into the book or directly into fills.
            (OrderStatus::Accepted, StatusTransition::Rest) => Ok(OrderStatus::Resting),
            (OrderStatus::Accepted, StatusTransition::Reject(reason)) => {
                Ok(OrderStatus::Rejected(reason.clone()))
            }

            // Fills apply from any live state; PartiallyFilled re-enters.
            (
                OrderStatus::Accepted | OrderStatus::Resting | OrderStatus::PartiallyFilled,
                StatusTransition::PartialFill,
            ) => Ok(OrderStatus::PartiallyFilled),
            (
                OrderStatus::Accepted | OrderStatus::Resting | OrderStatus::PartiallyFilled,
                StatusTransition::Fill,
            ) => Ok(OrderStatus::Filled),

            // Cancels apply from any live state.
            (
                OrderStatus::Accepted | OrderStatus::Resting | OrderStatus::PartiallyFilled,
                StatusTransition::Cancel(reason),
            ) => Ok(OrderStatus::Cancelled(reason.clone())),

            _ => Err(TransitionError::InvalidTransition {
                from: self.name().to_string(),
                to: transition.target_name().to_string(),
            }),
        }
    }
}

/// Cancel reasons
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelReason {
    UserRequested,
    IocUnfilled,
    MarketUnfilled,
}

/// Reject reasons
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    DuplicateOrderId,
    UnknownSymbol,
    InvalidPrice,
    InvalidQuantity,
    FillOrKill,
}

impl RejectReason {
    /// Map an admission failure to its reject reason
    pub fn from_admission(err: &AdmissionError) -> Self {
        match err {
            AdmissionError::DuplicateOrderId { .. } => RejectReason::DuplicateOrderId,
            AdmissionError::UnknownSymbol { .. } => RejectReason::UnknownSymbol,
            AdmissionError::InvalidPrice { .. } => RejectReason::InvalidPrice,
            AdmissionError::InvalidQuantity { .. } => RejectReason::InvalidQuantity,
        }
    }
}

/// An order as submitted by the upstream gateway
///
/// Already risk- and compliance-cleared; the engine re-checks only the
/// preconditions it alone can see (duplicate id, price/quantity sanity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub order_id: OrderId,
    pub owner_id: OwnerId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    /// Limit price; absent for market orders
    pub price: Option<Price>,
    pub quantity: Quantity,
    pub timestamp: i64, // Unix nanos
}

impl OrderRequest {
    /// Admission checks the engine itself enforces
    ///
    /// Price positivity and quantity non-negativity already hold by
    /// construction; what remains is zero quantity and a limit order
    /// arriving without a price.
    pub fn validate(&self) -> Result<(), AdmissionError> {
        if self.quantity.is_zero() {
            return Err(AdmissionError::InvalidQuantity {
                detail: format!("order {} has zero quantity", self.order_id),
            });
        }
        if self.price.is_none() && !self.order_type.is_market() {
            return Err(AdmissionError::InvalidPrice {
                detail: format!("limit order {} without a price", self.order_id),
            });
        }
        Ok(())
    }
}

/// Complete engine-owned order record
///
/// `sequence` is assigned at admission and is the sole time-priority
/// tie-breaker; a partially filled order keeps it for the remainder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub owner_id: OwnerId,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub price: Option<Price>,
    pub quantity: Quantity,
    pub filled_quantity: Quantity,
    pub remaining_quantity: Quantity,
    pub sequence: u64,
    pub status: OrderStatus,
    pub created_at: i64, // Unix nanos
    pub updated_at: i64, // Unix nanos
}

impl Order {
    /// Build the engine record for an admitted request
    pub fn from_request(request: OrderRequest, sequence: u64) -> Self {
        Self {
            order_id: request.order_id,
            owner_id: request.owner_id,
            symbol: request.symbol,
            side: request.side,
            order_type: request.order_type,
            time_in_force: request.time_in_force,
            price: request.price,
            quantity: request.quantity,
            filled_quantity: Quantity::zero(),
            remaining_quantity: request.quantity,
            sequence,
            status: OrderStatus::Accepted,
            created_at: request.timestamp,
            updated_at: request.timestamp,
        }
    }

    /// Check quantity invariant: filled + remaining = total
    pub fn check_invariant(&self) -> bool {
        self.filled_quantity.as_decimal() + self.remaining_quantity.as_decimal()
            == self.quantity.as_decimal()
    }

    /// Check if order is completely filled
    pub fn is_filled(&self) -> bool {
        self.filled_quantity == self.quantity
    }

    /// Check if order has any fills
    pub fn has_fills(&self) -> bool {
        !self.filled_quantity.is_zero()
    }

    /// Check if the order can still trade or be canceled
    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Mark the remainder as resting in the book
    pub fn rest(&mut self, timestamp: i64) -> Result<(), TransitionError> {
        self.status = self.status.transition(StatusTransition::Rest)?;
        self.updated_at = timestamp;
        Ok(())
    }

    /// Record a fill and adjust status
    ///
    /// # Panics
    /// Panics if the fill exceeds the remaining quantity; callers always
    /// trade `min(incoming.remaining, maker.remaining)`.
    pub fn apply_fill(
        &mut self,
        fill_quantity: Quantity,
        timestamp: i64,
    ) -> Result<(), TransitionError> {
        let new_filled = self.filled_quantity + fill_quantity;

        assert!(
            new_filled.as_decimal() <= self.quantity.as_decimal(),
            "Fill would exceed order quantity"
        );

        self.filled_quantity = new_filled;
        self.remaining_quantity = self.quantity.saturating_sub(new_filled);

        let transition = if self.is_filled() {
            StatusTransition::Fill
        } else {
            StatusTransition::PartialFill
        };
        self.status = self.status.transition(transition)?;
        self.updated_at = timestamp;

        assert!(self.check_invariant(), "Invariant violated after fill");
        Ok(())
    }

    /// Cancel the live remainder
    pub fn cancel(&mut self, reason: CancelReason, timestamp: i64) -> Result<(), TransitionError> {
        self.status = self.status.transition(StatusTransition::Cancel(reason))?;
        self.updated_at = timestamp;
        Ok(())
    }

    /// Reject at admission, before any book mutation
    pub fn reject(&mut self, reason: RejectReason, timestamp: i64) -> Result<(), TransitionError> {
        self.status = self.status.transition(StatusTransition::Reject(reason))?;
        self.updated_at = timestamp;
        Ok(())
    }
}
