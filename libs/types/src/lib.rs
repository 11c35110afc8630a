//! Types library for the matching engine
//!
//! This library provides the core type definitions shared by the engine
//! and its persistence layer, ensuring type safety, deterministic
//! behavior, and backward compatibility.
//!
//! # Modules
//! - `ids`: Unique identifiers (OrderId, FillId, OwnerId, Symbol)
//! - `numeric`: Fixed-point decimal types (Price, Quantity)
//! - `order`: Order lifecycle types and the status transition table
//! - `fill`: Fill records produced by matching
//! - `errors`: Error taxonomy

// Public modules
pub mod errors;
pub mod fill;
pub mod ids;
pub mod numeric;
pub mod order;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::errors::*;
    pub use crate::fill::*;
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::order::*;
}
