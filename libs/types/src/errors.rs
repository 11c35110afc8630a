//! Error types for the matching engine
//!
//! Comprehensive error taxonomy using thiserror. Admission errors are
//! returned synchronously to the submitter; races surface as
//! informational statuses; faults are operational.

use thiserror::Error;

/// Top-level engine error
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("Admission error: {0}")]
    Admission(#[from] AdmissionError),

    #[error("Book error: {0}")]
    Book(#[from] BookError),

    #[error("Transition error: {0}")]
    Transition(#[from] TransitionError),

    #[error("System error: {message}")]
    System { message: String },
}

/// Rejections raised before an order touches the book
///
/// Reported synchronously to the submitter, never logged as faults.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdmissionError {
    #[error("Duplicate order id: {order_id}")]
    DuplicateOrderId { order_id: String },

    #[error("Unknown symbol: {symbol}")]
    UnknownSymbol { symbol: String },

    #[error("Invalid price: {detail}")]
    InvalidPrice { detail: String },

    #[error("Invalid quantity: {detail}")]
    InvalidQuantity { detail: String },
}

/// Structural failures inside a symbol's book
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BookError {
    #[error("Duplicate order id: {order_id}")]
    DuplicateOrderId { order_id: String },

    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: String },

    #[error("Order {order_id} has no price to rest at")]
    NoRestingPrice { order_id: String },
}

/// Illegal order-status edges
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransitionError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Order already in terminal state: {status}")]
    AlreadyTerminal { status: String },
}
