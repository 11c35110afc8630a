//! Crash recovery: boot from snapshot + journal replay.
//!
//! Recovery process:
//! 1. Find the latest snapshot. Absence is a cold start; a snapshot that
//!    exists but cannot be read or fails its integrity check is fatal.
//! 2. Restore the applier (the engine) from the snapshot state.
//! 3. Open the journal, seek past the snapshot sequence.
//! 4. Replay the tail. Entries at or below the restored sequence are
//!    skipped, so replay is idempotent. A malformed or checksum-failing
//!    entry is skipped with an alert rather than aborting replay.
//! 5. Optionally validate the final state hash against an expected value.

use crate::journal::JournalEntry;
use crate::reader::{JournalReader, ReaderError};
use crate::snapshot::{BookState, Snapshot, SnapshotError, SnapshotLoader, SnapshotWriter};
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};
use types::ids::Symbol;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),

    #[error("State hash divergence: expected {expected}, got {actual} at sequence {sequence}")]
    HashDivergence {
        expected: String,
        actual: String,
        sequence: u64,
    },

    #[error("Recovery failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

// ── Recovery Metrics ────────────────────────────────────────────────

/// Metrics collected during the recovery process.
#[derive(Debug, Clone)]
pub struct RecoveryMetrics {
    /// Time to load the snapshot (if any).
    pub snapshot_load_time_ms: u64,
    /// Sequence number of the loaded snapshot (0 if none).
    pub snapshot_sequence: u64,
    /// Number of journal entries applied.
    pub replay_count: u64,
    /// Entries skipped because they were already covered by the snapshot.
    pub skipped_count: u64,
    /// Entries skipped because the applier could not decode them.
    pub malformed_count: u64,
    /// Entries skipped because their checksum failed.
    pub corrupted_count: u64,
    /// Time spent replaying journal entries.
    pub replay_time_ms: u64,
    /// Total recovery time (snapshot load + replay + validation).
    pub total_recovery_time_ms: u64,
    /// Final state hash after recovery.
    pub final_state_hash: String,
    /// Last consumed sequence number after recovery.
    pub final_sequence: u64,
    /// Whether recovery completed successfully.
    pub success: bool,
}

impl RecoveryMetrics {
    fn new() -> Self {
        Self {
            snapshot_load_time_ms: 0,
            snapshot_sequence: 0,
            replay_count: 0,
            skipped_count: 0,
            malformed_count: 0,
            corrupted_count: 0,
            replay_time_ms: 0,
            total_recovery_time_ms: 0,
            final_state_hash: String::new(),
            final_sequence: 0,
            success: false,
        }
    }
}

// ── Recovery Log Entry ──────────────────────────────────────────────

/// Structured recovery log entry for diagnostics.
#[derive(Debug, Clone)]
pub struct RecoveryLogEntry {
    pub stage: RecoveryStage,
    pub message: String,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryStage {
    Start,
    SnapshotSearch,
    SnapshotLoad,
    JournalOpen,
    JournalSeek,
    Replay,
    Validation,
    Complete,
    Error,
}

// ── Operation Applier ───────────────────────────────────────────────

/// Result of applying one journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The operation mutated state.
    Applied,
    /// The operation was already reflected in the restored state.
    Skipped,
}

/// Trait for replaying journaled operations into engine state.
///
/// The matching engine implements this to rebuild its book: `restore`
/// loads a snapshot, `apply` replays one journal entry, and
/// `current_state` exports the state for hashing and re-snapshotting.
pub trait OperationApplier {
    /// Restore state from a snapshot taken at `sequence`.
    fn restore(&mut self, state: &BookState, sequence: u64) -> Result<(), String>;

    /// Apply a journal entry. Decoding failures are reported as errors
    /// and the entry is skipped by the recovery engine.
    fn apply(&mut self, entry: &JournalEntry) -> Result<ApplyOutcome, String>;

    /// Export the current state for hashing and snapshotting.
    fn current_state(&self) -> BookState;
}

/// Applier that records replayed operations without interpreting them.
///
/// Used for journal-level determinism checks and recovery tests; the
/// real applier lives in the matching engine.
pub struct RecordingApplier {
    base: BookState,
    /// (sequence, op_type) of every applied entry, in order.
    pub applied: Vec<(u64, String)>,
    last_sequence: u64,
}

impl RecordingApplier {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            base: BookState::empty(symbol),
            applied: Vec::new(),
            last_sequence: 0,
        }
    }

    /// Deterministic digest over the restored base and applied entries.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.base.compute_hash().as_bytes());
        for (seq, op_type) in &self.applied {
            hasher.update(seq.to_le_bytes());
            hasher.update(op_type.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }
}

impl OperationApplier for RecordingApplier {
    fn restore(&mut self, state: &BookState, sequence: u64) -> Result<(), String> {
        self.base = state.clone();
        self.last_sequence = sequence;
        Ok(())
    }

    fn apply(&mut self, entry: &JournalEntry) -> Result<ApplyOutcome, String> {
        if entry.sequence <= self.last_sequence {
            return Ok(ApplyOutcome::Skipped);
        }
        self.last_sequence = entry.sequence;
        self.applied.push((entry.sequence, entry.op_type.clone()));
        Ok(ApplyOutcome::Applied)
    }

    fn current_state(&self) -> BookState {
        self.base.clone()
    }
}

// ── Recovery Engine ─────────────────────────────────────────────────

/// Orchestrates snapshot loading + journal replay for one symbol.
pub struct RecoveryEngine {
    snapshot_dir: PathBuf,
    journal_dir: PathBuf,
    log: Vec<RecoveryLogEntry>,
}

impl RecoveryEngine {
    pub fn new(snapshot_dir: impl Into<PathBuf>, journal_dir: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_dir: snapshot_dir.into(),
            journal_dir: journal_dir.into(),
            log: Vec::new(),
        }
    }

    /// Execute full recovery: snapshot load + journal replay + validation.
    pub fn recover(
        &mut self,
        applier: &mut dyn OperationApplier,
        expected_hash: Option<&str>,
    ) -> Result<RecoveryMetrics, RecoveryError> {
        let total_start = Instant::now();
        let mut metrics = RecoveryMetrics::new();

        self.log_stage(RecoveryStage::Start, "Recovery started", 0);

        // Step 1: Load snapshot. Absence is a cold start, anything else
        // that fails here is fatal.
        let snapshot_seq = self.load_snapshot(applier, &mut metrics)?;

        // Step 2: Open journal and seek past the snapshot
        self.log_stage(RecoveryStage::JournalOpen, "Opening journal", 0);
        let mut reader = JournalReader::open(&self.journal_dir)?;

        if snapshot_seq > 0 {
            self.log_stage(
                RecoveryStage::JournalSeek,
                &format!("Seeking to sequence {}", snapshot_seq + 1),
                0,
            );
            reader.seek_to_sequence(snapshot_seq + 1)?;
        }

        // Step 3: Replay journal entries
        let replay_start = Instant::now();
        self.log_stage(RecoveryStage::Replay, "Starting journal replay", 0);

        let mut last_seq = snapshot_seq;
        loop {
            match reader.next_entry() {
                Ok(Some(entry)) => match applier.apply(&entry) {
                    Ok(ApplyOutcome::Applied) => {
                        last_seq = entry.sequence;
                        metrics.replay_count += 1;
                    }
                    Ok(ApplyOutcome::Skipped) => {
                        metrics.skipped_count += 1;
                    }
                    Err(e) => {
                        warn!(
                            sequence = entry.sequence,
                            op_type = %entry.op_type,
                            error = %e,
                            "Skipping malformed journal entry"
                        );
                        self.log_stage(
                            RecoveryStage::Replay,
                            &format!("Skipped malformed entry seq={}: {}", entry.sequence, e),
                            0,
                        );
                        metrics.malformed_count += 1;
                    }
                },
                Ok(None) => break,
                Err(ReaderError::ChecksumMismatch { offset, sequence }) => {
                    // Frame boundary is intact, so the reader resumes at
                    // the next entry on its own.
                    warn!(
                        offset,
                        sequence, "Skipping journal entry with checksum mismatch"
                    );
                    self.log_stage(
                        RecoveryStage::Replay,
                        &format!("Skipped corrupt entry seq={} at offset {}", sequence, offset),
                        0,
                    );
                    metrics.corrupted_count += 1;
                }
                Err(e) => {
                    self.log_stage(
                        RecoveryStage::Error,
                        &format!("Replay aborted: {}", e),
                        replay_start.elapsed().as_millis() as u64,
                    );
                    return Err(RecoveryError::Reader(e));
                }
            }
        }

        metrics.replay_time_ms = replay_start.elapsed().as_millis() as u64;
        metrics.final_sequence = last_seq;

        self.log_stage(
            RecoveryStage::Replay,
            &format!(
                "Replayed {} entries ({} skipped, {} malformed, {} corrupt) in {}ms",
                metrics.replay_count,
                metrics.skipped_count,
                metrics.malformed_count,
                metrics.corrupted_count,
                metrics.replay_time_ms
            ),
            metrics.replay_time_ms,
        );

        // Step 4: Validate state hash
        let final_hash = applier.current_state().compute_hash();
        metrics.final_state_hash = final_hash.clone();

        if let Some(expected) = expected_hash {
            self.log_stage(RecoveryStage::Validation, "Validating state hash", 0);
            if final_hash != expected {
                self.log_stage(
                    RecoveryStage::Error,
                    &format!(
                        "Hash divergence: expected={}, actual={}",
                        expected, final_hash
                    ),
                    0,
                );
                return Err(RecoveryError::HashDivergence {
                    expected: expected.to_string(),
                    actual: final_hash,
                    sequence: last_seq,
                });
            }
        }

        metrics.total_recovery_time_ms = total_start.elapsed().as_millis() as u64;
        metrics.success = true;

        info!(
            replayed = metrics.replay_count,
            skipped = metrics.skipped_count,
            malformed = metrics.malformed_count,
            corrupted = metrics.corrupted_count,
            final_sequence = last_seq,
            elapsed_ms = metrics.total_recovery_time_ms,
            "Recovery complete"
        );
        self.log_stage(
            RecoveryStage::Complete,
            &format!(
                "Recovery complete: {} ops in {}ms, final seq={}",
                metrics.replay_count, metrics.total_recovery_time_ms, last_seq
            ),
            metrics.total_recovery_time_ms,
        );

        Ok(metrics)
    }

    /// Execute recovery without hash validation (the usual boot path).
    pub fn recover_without_validation(
        &mut self,
        applier: &mut dyn OperationApplier,
    ) -> Result<RecoveryMetrics, RecoveryError> {
        self.recover(applier, None)
    }

    /// Take a snapshot of the given state.
    pub fn take_snapshot(
        &self,
        state: &BookState,
        sequence: u64,
        timestamp: i64,
        compress: bool,
    ) -> Result<PathBuf, RecoveryError> {
        let writer = SnapshotWriter::new(&self.snapshot_dir, compress);
        let snapshot = Snapshot::new(sequence, timestamp, state.clone(), compress);
        let path = writer.write(&snapshot)?;
        Ok(path)
    }

    /// Get recovery log entries.
    pub fn log(&self) -> &[RecoveryLogEntry] {
        &self.log
    }

    // ── Internal ────────────────────────────────────────────────────

    fn load_snapshot(
        &mut self,
        applier: &mut dyn OperationApplier,
        metrics: &mut RecoveryMetrics,
    ) -> Result<u64, RecoveryError> {
        self.log_stage(RecoveryStage::SnapshotSearch, "Searching for snapshots", 0);
        let loader = SnapshotLoader::new(&self.snapshot_dir);

        match loader.load_latest() {
            Ok(snapshot) => {
                let start = Instant::now();
                applier
                    .restore(&snapshot.state, snapshot.sequence)
                    .map_err(|e| RecoveryError::Failed(format!("Restore error: {}", e)))?;
                metrics.snapshot_load_time_ms = start.elapsed().as_millis() as u64;
                metrics.snapshot_sequence = snapshot.sequence;

                info!(
                    sequence = snapshot.sequence,
                    orders = snapshot.state.order_count(),
                    "Snapshot restored"
                );
                self.log_stage(
                    RecoveryStage::SnapshotLoad,
                    &format!(
                        "Snapshot loaded: seq={}, hash={}",
                        snapshot.sequence,
                        &snapshot.checksum[..16]
                    ),
                    metrics.snapshot_load_time_ms,
                );

                Ok(snapshot.sequence)
            }
            Err(SnapshotError::NoSnapshots) => {
                info!("No snapshots found, cold start from empty book");
                self.log_stage(
                    RecoveryStage::SnapshotSearch,
                    "No snapshots found, starting from empty state",
                    0,
                );
                Ok(0)
            }
            // A snapshot that exists but cannot be loaded is fatal:
            // replaying the full journal past it could silently diverge.
            Err(e) => Err(RecoveryError::Snapshot(e)),
        }
    }

    fn log_stage(&mut self, stage: RecoveryStage, message: &str, elapsed_ms: u64) {
        self.log.push(RecoveryLogEntry {
            stage,
            message: message.to_string(),
            elapsed_ms,
        });
    }
}

// ── Tests ───────────────────────────────────────────────────────────
