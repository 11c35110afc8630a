//! Persistence & Deterministic Replay
//!
//! Provides append-only journal writing, sequential reading with corruption
//! detection, versioned book snapshots, crash recovery, and replay
//! determinism checks for the matching engine.
//!
//! Durability model: every accepted operation is journaled with a CRC32C
//! checksum before the submitter is acknowledged. Snapshots bound replay
//! time; recovery loads the latest snapshot and replays the journal tail.

pub mod determinism;
pub mod journal;
pub mod reader;
pub mod recovery;
pub mod snapshot;
