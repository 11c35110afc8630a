//! Matching Engine Service
//!
//! Order matching with strict price-time priority: better price first,
//! earlier admission sequence first within a price, fills at the
//! maker's price. One actor task owns each symbol's book; accepted
//! operations are journaled before they apply, and restart replays the
//! journal on top of the latest snapshot to rebuild the identical book.
//!
//! **Key Invariants:**
//! - Price-time priority strictly enforced; partial fills keep their
//!   original queue position.
//! - Deterministic matching and replay (same inputs, same outputs,
//!   same ids).
//! - No self-trades: same-owner makers are skipped in place.
//! - Conservation of quantity: filled + remaining = submitted, always.

pub mod actor;
pub mod book;
pub mod config;
pub mod depth;
pub mod engine;
pub mod events;
pub mod matching;
pub mod sequence;

pub use actor::{EngineApplier, EngineCommand, EngineRouter};
pub use config::EngineConfig;
pub use depth::{DepthSnapshot, TopOfBook};
pub use engine::{CancelReport, EngineOp, SubmitReport, SymbolEngine};
pub use events::{EngineEvent, EventPayload};
