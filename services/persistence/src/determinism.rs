//! Determinism verification for crash recovery.
//!
//! Engine state is a pure function of the journaled operations, so
//! replaying the same journal twice must produce identical state. The
//! verifier runs recovery twice with fresh appliers and compares digests,
//! and simulates the failure modes that matter for an append-only log:
//! a partial write at the tail, an abrupt shutdown before fsync, and a
//! full disk.

use crate::journal::{
    FlushPolicy, FsyncPolicy, JournalConfig, JournalEntry, JournalError, JournalWriter,
};
use crate::reader::JournalReader;
use crate::recovery::{RecordingApplier, RecoveryEngine, RecoveryError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;
use types::ids::Symbol;

// ── Divergence Report ───────────────────────────────────────────────

/// Result of comparing two independent replays of the same journal.
#[derive(Debug, Clone)]
pub struct DivergenceReport {
    /// Digest from the first replay.
    pub first_hash: String,
    /// Digest from the second replay.
    pub second_hash: String,
    /// Final sequence from the first replay.
    pub first_sequence: u64,
    /// Final sequence from the second replay.
    pub second_sequence: u64,
    /// Whether the replays diverged.
    pub diverged: bool,
}

impl DivergenceReport {
    pub fn is_deterministic(&self) -> bool {
        !self.diverged
    }
}

// ── Determinism Verifier ────────────────────────────────────────────

/// Verifies that recovery from a snapshot + journal pair is deterministic
/// and survives tail damage.
pub struct DeterminismVerifier {
    snapshot_dir: PathBuf,
    journal_dir: PathBuf,
}

impl DeterminismVerifier {
    pub fn new(snapshot_dir: impl Into<PathBuf>, journal_dir: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_dir: snapshot_dir.into(),
            journal_dir: journal_dir.into(),
        }
    }

    /// Replay the journal twice with fresh appliers and compare digests.
    pub fn verify_double_replay(&self, symbol: &Symbol) -> Result<DivergenceReport, RecoveryError> {
        let mut first = RecordingApplier::new(symbol.clone());
        let first_metrics = RecoveryEngine::new(&self.snapshot_dir, &self.journal_dir)
            .recover_without_validation(&mut first)?;

        let mut second = RecordingApplier::new(symbol.clone());
        let second_metrics = RecoveryEngine::new(&self.snapshot_dir, &self.journal_dir)
            .recover_without_validation(&mut second)?;

        let first_hash = first.fingerprint();
        let second_hash = second.fingerprint();
        let diverged = first_hash != second_hash
            || first_metrics.final_sequence != second_metrics.final_sequence;

        if !diverged {
            info!(
                sequence = first_metrics.final_sequence,
                "Double replay deterministic"
            );
        }

        Ok(DivergenceReport {
            first_hash,
            second_hash,
            first_sequence: first_metrics.final_sequence,
            second_sequence: second_metrics.final_sequence,
            diverged,
        })
    }

    /// Compare two op streams entry by entry.
    ///
    /// Returns the index of the first differing entry, or `None` when the
    /// streams match.
    pub fn compare_op_streams(a: &[JournalEntry], b: &[JournalEntry]) -> Option<usize> {
        let max_len = a.len().max(b.len());
        for i in 0..max_len {
            match (a.get(i), b.get(i)) {
                (Some(x), Some(y)) if x == y => continue,
                _ => return Some(i),
            }
        }
        None
    }

    /// Truncate the newest journal file to `keep_fraction` of its size,
    /// simulating a crash mid-append. Returns the number of bytes removed.
    pub fn simulate_partial_write(
        journal_dir: &Path,
        keep_fraction: f64,
    ) -> Result<u64, RecoveryError> {
        let path = Self::newest_journal_file(journal_dir)
            .ok_or_else(|| RecoveryError::Failed("No journal files to damage".into()))?;

        let data = fs::read(&path)?;
        let keep = ((data.len() as f64) * keep_fraction.clamp(0.0, 1.0)) as usize;
        fs::write(&path, &data[..keep])?;
        Ok((data.len() - keep) as u64)
    }

    /// Write `count` entries without a final sync, simulating an abrupt
    /// shutdown. Returns how many entries survive on re-read.
    pub fn simulate_abrupt_shutdown(journal_dir: &Path, count: u64) -> Result<u64, RecoveryError> {
        {
            let config = JournalConfig {
                flush_policy: FlushPolicy::EveryN(usize::MAX),
                fsync_policy: FsyncPolicy::OnRotation,
                ..JournalConfig::new(journal_dir)
            };
            let mut writer =
                JournalWriter::open(config).map_err(|e| RecoveryError::Failed(e.to_string()))?;
            for seq in 1..=count {
                writer
                    .write_op(
                        seq,
                        seq as i64 * 1_000,
                        "SubmitOrder".into(),
                        vec![seq as u8; 8],
                    )
                    .map_err(|e| RecoveryError::Failed(e.to_string()))?;
            }
            // Dropped without sync(). The BufWriter flushes its buffer on
            // drop, so a prefix (possibly all) of the entries lands on disk.
        }

        let mut reader = JournalReader::open(journal_dir)?;
        let (entries, _) = reader.recover_entries();
        Ok(entries.len() as u64)
    }

    /// Write entries against a tiny total-size budget, simulating a full
    /// disk. Returns how many entries were accepted before the limit.
    pub fn simulate_disk_full(journal_dir: &Path, budget_bytes: u64) -> Result<u64, RecoveryError> {
        let config = JournalConfig {
            max_total_size: budget_bytes,
            ..JournalConfig::new(journal_dir)
        };
        let mut writer =
            JournalWriter::open(config).map_err(|e| RecoveryError::Failed(e.to_string()))?;

        let mut accepted = 0u64;
        for seq in 1..=100_000u64 {
            match writer.write_op(seq, seq as i64, "SubmitOrder".into(), vec![0u8; 32]) {
                Ok(_) => accepted += 1,
                Err(JournalError::SizeLimitExceeded { .. }) => break,
                Err(e) => return Err(RecoveryError::Failed(e.to_string())),
            }
        }
        writer
            .sync()
            .map_err(|e| RecoveryError::Failed(e.to_string()))?;
        Ok(accepted)
    }

    fn newest_journal_file(dir: &Path) -> Option<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)
            .ok()?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .map(|n| {
                        let n = n.to_string_lossy();
                        n.starts_with("journal-") && n.ends_with(".bin")
                    })
                    .unwrap_or(false)
            })
            .collect();
        files.sort();
        files.pop()
    }
}

// ── Tests ───────────────────────────────────────────────────────────


// ── Property-Based Tests ────────────────────────────────────────────
