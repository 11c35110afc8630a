//! Book snapshots with integrity and compression.
//!
//! A snapshot captures one symbol's resting orders and the last consumed
//! sequence number. Orders are kept sorted by admission sequence so the
//! serialized form, and therefore the SHA-256 integrity hash, is
//! deterministic regardless of how the book iterated its state.
//!
//! Snapshots are versioned, written atomically (tmp file, fsync, rename),
//! and optionally zstd-compressed.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use types::ids::Symbol;
use types::order::Order;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Integrity check failed: expected {expected}, got {actual}")]
    IntegrityFailure { expected: String, actual: String },

    #[error("Unsupported snapshot version: {0}")]
    UnsupportedVersion(u32),

    #[error("Compression error: {0}")]
    Compression(String),

    #[error("No snapshots found")]
    NoSnapshots,
}

// ── Book State ──────────────────────────────────────────────────────

/// One symbol's full resting state for snapshot serialization.
///
/// Orders are sorted by admission sequence, which both fixes the
/// serialized byte layout and preserves time priority on restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookState {
    /// Symbol this book belongs to.
    pub symbol: Symbol,
    /// All resting (open) orders, sorted by sequence.
    pub orders: Vec<Order>,
}

impl BookState {
    /// Create an empty book state.
    pub fn empty(symbol: Symbol) -> Self {
        Self {
            symbol,
            orders: Vec::new(),
        }
    }

    /// Build a book state from an unordered set of resting orders.
    pub fn from_orders(symbol: Symbol, mut orders: Vec<Order>) -> Self {
        orders.sort_by_key(|o| o.sequence);
        Self { symbol, orders }
    }

    /// Number of resting orders.
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    /// Compute a deterministic SHA-256 hash of the state.
    pub fn compute_hash(&self) -> String {
        let bytes = bincode::serialize(self).expect("BookState serialization should never fail");
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        format!("{:x}", hasher.finalize())
    }
}

// ── Snapshot ────────────────────────────────────────────────────────

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A complete snapshot of a symbol's book at a given sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Snapshot format version for forward compatibility.
    pub version: u32,
    /// Last consumed sequence number at the time of the snapshot.
    pub sequence: u64,
    /// Unix nanosecond timestamp when the snapshot was taken.
    pub timestamp: i64,
    /// Full book state.
    pub state: BookState,
    /// SHA-256 hash of the serialized state.
    pub checksum: String,
    /// Whether the data on disk is zstd-compressed.
    pub compressed: bool,
}

impl Snapshot {
    /// Create a new snapshot with computed integrity hash.
    pub fn new(sequence: u64, timestamp: i64, state: BookState, compressed: bool) -> Self {
        let checksum = state.compute_hash();
        Self {
            version: SNAPSHOT_VERSION,
            sequence,
            timestamp,
            state,
            checksum,
            compressed,
        }
    }

    /// Verify the snapshot's integrity hash.
    pub fn verify_integrity(&self) -> bool {
        let computed = self.state.compute_hash();
        self.checksum == computed
    }
}

// ── Snapshot Writer ─────────────────────────────────────────────────

/// Writes snapshots to disk with optional zstd compression.
pub struct SnapshotWriter {
    dir: PathBuf,
    compress: bool,
}

impl SnapshotWriter {
    /// Create a new writer. `compress` enables zstd compression.
    pub fn new(dir: impl Into<PathBuf>, compress: bool) -> Self {
        Self {
            dir: dir.into(),
            compress,
        }
    }

    /// Write a snapshot atomically: serialize, compress, write tmp, fsync, rename.
    pub fn write(&self, snapshot: &Snapshot) -> Result<PathBuf, SnapshotError> {
        fs::create_dir_all(&self.dir)?;

        let data = bincode::serialize(snapshot)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;

        let (final_data, ext) = if self.compress {
            let compressed = zstd::encode_all(data.as_slice(), 3)
                .map_err(|e| SnapshotError::Compression(e.to_string()))?;
            (compressed, "snap.zst")
        } else {
            (data, "snap")
        };

        let filename = format!("snapshot-{:012}.{}", snapshot.sequence, ext);
        let path = self.dir.join(&filename);
        let tmp_path = self.dir.join(format!("{}.tmp", filename));

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&final_data)?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        Ok(path)
    }
}

// ── Snapshot Loader ─────────────────────────────────────────────────

/// Loads snapshots from disk, verifying integrity.
pub struct SnapshotLoader {
    dir: PathBuf,
}

impl SnapshotLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Load a specific snapshot file.
    pub fn load(&self, path: &Path) -> Result<Snapshot, SnapshotError> {
        let mut file = File::open(path)?;
        let mut data = Vec::new();
        file.read_to_end(&mut data)?;

        let is_compressed = path.extension().map(|e| e == "zst").unwrap_or(false);

        let decompressed = if is_compressed {
            zstd::decode_all(data.as_slice())
                .map_err(|e| SnapshotError::Compression(e.to_string()))?
        } else {
            data
        };

        let snapshot: Snapshot = bincode::deserialize(&decompressed)
            .map_err(|e| SnapshotError::Serialization(e.to_string()))?;

        if snapshot.version > SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(snapshot.version));
        }

        if !snapshot.verify_integrity() {
            let actual = snapshot.state.compute_hash();
            return Err(SnapshotError::IntegrityFailure {
                expected: snapshot.checksum.clone(),
                actual,
            });
        }

        Ok(snapshot)
    }

    /// Load the latest snapshot (highest sequence number).
    pub fn load_latest(&self) -> Result<Snapshot, SnapshotError> {
        let path = self.find_latest()?;
        self.load(&path)
    }

    /// Find the path to the latest snapshot.
    pub fn find_latest(&self) -> Result<PathBuf, SnapshotError> {
        let mut snapshots = self.list_snapshots()?;
        snapshots.sort_by(|a, b| b.0.cmp(&a.0)); // Descending by sequence
        snapshots
            .into_iter()
            .next()
            .map(|(_, path)| path)
            .ok_or(SnapshotError::NoSnapshots)
    }

    /// List all snapshots as (sequence, path) pairs.
    pub fn list_snapshots(&self) -> Result<Vec<(u64, PathBuf)>, SnapshotError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut results = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with("snapshot-")
                && (name.ends_with(".snap") || name.ends_with(".snap.zst"))
            {
                if let Some(seq) = Self::parse_sequence(&name) {
                    results.push((seq, entry.path()));
                }
            }
        }
        results.sort_by_key(|(seq, _)| *seq);
        Ok(results)
    }

    fn parse_sequence(filename: &str) -> Option<u64> {
        let stripped = filename
            .trim_start_matches("snapshot-")
            .trim_end_matches(".snap.zst")
            .trim_end_matches(".snap");
        stripped.parse::<u64>().ok()
    }
}

// ── Snapshot Interval Policy ────────────────────────────────────────

/// Policy that determines when to create a new snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotIntervalPolicy {
    /// Create snapshot every N consumed sequence numbers.
    pub sequence_interval: u64,
    /// Last sequence at which a snapshot was taken.
    pub last_snapshot_seq: u64,
}

impl SnapshotIntervalPolicy {
    /// Create with the default interval (100,000).
    pub fn default_policy() -> Self {
        Self {
            sequence_interval: 100_000,
            last_snapshot_seq: 0,
        }
    }

    /// Create with a custom interval.
    pub fn with_interval(interval: u64) -> Self {
        Self {
            sequence_interval: interval,
            last_snapshot_seq: 0,
        }
    }

    /// Check if a snapshot should be taken at the given sequence.
    pub fn should_snapshot(&self, current_seq: u64) -> bool {
        current_seq >= self.last_snapshot_seq + self.sequence_interval
    }

    /// Record that a snapshot was taken at the given sequence.
    pub fn record_snapshot(&mut self, seq: u64) {
        self.last_snapshot_seq = seq;
    }
}

// ── Snapshot Cleanup Policy ─────────────────────────────────────────

/// Policy for cleaning up old snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotCleanupPolicy {
    /// Maximum number of snapshots to retain.
    pub max_snapshots: usize,
}

impl SnapshotCleanupPolicy {
    pub fn new(max_snapshots: usize) -> Self {
        Self { max_snapshots }
    }

    /// Remove old snapshots, keeping only the most recent `max_snapshots`.
    pub fn cleanup(&self, dir: &Path) -> Result<Vec<PathBuf>, SnapshotError> {
        let loader = SnapshotLoader::new(dir);
        let mut snapshots = loader.list_snapshots()?;
        snapshots.sort_by_key(|(seq, _)| *seq);

        let mut removed = Vec::new();
        if snapshots.len() > self.max_snapshots {
            let to_remove = snapshots.len() - self.max_snapshots;
            for (_, path) in snapshots.iter().take(to_remove) {
                fs::remove_file(path)?;
                removed.push(path.clone());
            }
        }
        Ok(removed)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use types::ids::{OrderId, OwnerId};
    use types::numeric::{Price, Quantity};
    use types::order::{OrderRequest, OrderType, Side, TimeInForce};

    fn resting_order(seq: u64, side: Side, price: u64, qty: &str) -> Order {
        let request = OrderRequest {
            order_id: OrderId::new(),
            owner_id: OwnerId::new(),
            symbol: Symbol::new("BTC/USDT"),
            side,
            order_type: OrderType::LIMIT,
            time_in_force: TimeInForce::GTC,
            price: Some(Price::from_u64(price)),
            quantity: Quantity::from_str(qty).unwrap(),
            timestamp: 1_708_123_456_789_000_000,
        };
        let mut order = Order::from_request(request, seq);
        order.rest(1_708_123_456_789_000_000).unwrap();
        order
    }

    fn sample_state() -> BookState {
        BookState::from_orders(
            Symbol::new("BTC/USDT"),
            vec![
                resting_order(1, Side::BUY, 50_000, "1.0"),
                resting_order(2, Side::SELL, 50_100, "0.5"),
                resting_order(5, Side::BUY, 49_900, "2.0"),
            ],
        )
    }

    #[test]
    fn test_snapshot_write_and_load_uncompressed() {
        let tmp = TempDir::new().unwrap();
        let state = sample_state();
        let snapshot = Snapshot::new(7, 1_708_123_456_789_000_000, state.clone(), false);

        let writer = SnapshotWriter::new(tmp.path(), false);
        let path = writer.write(&snapshot).unwrap();

        let loader = SnapshotLoader::new(tmp.path());
        let loaded = loader.load(&path).unwrap();

        assert_eq!(loaded.version, SNAPSHOT_VERSION);
        assert_eq!(loaded.sequence, 7);
        assert_eq!(loaded.state, state);
        assert!(loaded.verify_integrity());
    }

    #[test]
    fn test_snapshot_write_and_load_compressed() {
        let tmp = TempDir::new().unwrap();
        let state = sample_state();
        let snapshot = Snapshot::new(7, 1_708_123_456_789_000_000, state.clone(), true);

        let writer = SnapshotWriter::new(tmp.path(), true);
        let path = writer.write(&snapshot).unwrap();

        assert!(path.to_string_lossy().ends_with(".snap.zst"));

        let loader = SnapshotLoader::new(tmp.path());
        let loaded = loader.load(&path).unwrap();

        assert_eq!(loaded.state, state);
        assert!(loaded.verify_integrity());
    }

    #[test]
    fn test_state_hash_deterministic() {
        let state = sample_state();
        let hash1 = state.compute_hash();
        let hash2 = state.compute_hash();
        assert_eq!(hash1, hash2, "Hash must be deterministic");
        assert_eq!(hash1.len(), 64, "SHA-256 hex digest is 64 chars");
    }

    #[test]
    fn test_state_hash_independent_of_insertion_order() {
        // from_orders sorts by sequence, so the serialized layout is fixed
        let a = resting_order(1, Side::BUY, 50_000, "1.0");
        let b = resting_order(2, Side::SELL, 50_100, "0.5");

        let s1 = BookState::from_orders(Symbol::new("BTC/USDT"), vec![a.clone(), b.clone()]);
        let s2 = BookState::from_orders(Symbol::new("BTC/USDT"), vec![b, a]);

        assert_eq!(s1.compute_hash(), s2.compute_hash());
    }

    #[test]
    fn test_snapshot_integrity_detects_tamper() {
        let state = sample_state();
        let mut snapshot = Snapshot::new(100, 1000, state, false);
        snapshot
            .state
            .orders
            .push(resting_order(9, Side::BUY, 1, "1.0"));
        assert!(!snapshot.verify_integrity());
    }

    #[test]
    fn test_snapshot_versioning() {
        let snapshot = Snapshot::new(100, 1000, sample_state(), false);
        assert_eq!(snapshot.version, SNAPSHOT_VERSION);
    }

    #[test]
    fn test_unreadable_snapshot_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("snapshot-000000000009.snap");
        fs::write(&path, b"not a snapshot").unwrap();

        let loader = SnapshotLoader::new(tmp.path());
        assert!(matches!(
            loader.load(&path),
            Err(SnapshotError::Serialization(_))
        ));
    }

    #[test]
    fn test_snapshot_interval_policy() {
        let mut policy = SnapshotIntervalPolicy::with_interval(100);
        assert!(!policy.should_snapshot(50));
        assert!(policy.should_snapshot(100));
        assert!(policy.should_snapshot(200));

        policy.record_snapshot(100);
        assert!(!policy.should_snapshot(150));
        assert!(policy.should_snapshot(200));
    }

    #[test]
    fn test_snapshot_interval_default() {
        let policy = SnapshotIntervalPolicy::default_policy();
        assert_eq!(policy.sequence_interval, 100_000);
    }

    #[test]
    fn test_snapshot_cleanup_policy() {
        let tmp = TempDir::new().unwrap();
        let writer = SnapshotWriter::new(tmp.path(), false);

        for i in 1..=5u64 {
            let state = BookState::empty(Symbol::new("BTC/USDT"));
            let snap = Snapshot::new(i * 1000, i as i64 * 1_000_000, state, false);
            writer.write(&snap).unwrap();
        }

        let cleanup = SnapshotCleanupPolicy::new(2);
        let removed = cleanup.cleanup(tmp.path()).unwrap();
        assert_eq!(removed.len(), 3, "Should remove 3 of 5 snapshots");

        let loader = SnapshotLoader::new(tmp.path());
        let remaining = loader.list_snapshots().unwrap();
        assert_eq!(remaining.len(), 2);
        assert_eq!(remaining[0].0, 4000);
        assert_eq!(remaining[1].0, 5000);
    }

    #[test]
    fn test_load_latest_snapshot() {
        let tmp = TempDir::new().unwrap();
        let writer = SnapshotWriter::new(tmp.path(), false);

        for i in [100u64, 500, 300] {
            let state = BookState::empty(Symbol::new("BTC/USDT"));
            let snap = Snapshot::new(i, i as i64, state, false);
            writer.write(&snap).unwrap();
        }

        let loader = SnapshotLoader::new(tmp.path());
        let latest = loader.load_latest().unwrap();
        assert_eq!(latest.sequence, 500);
    }

    #[test]
    fn test_no_snapshots_returns_error() {
        let tmp = TempDir::new().unwrap();
        let loader = SnapshotLoader::new(tmp.path());
        assert!(matches!(
            loader.load_latest(),
            Err(SnapshotError::NoSnapshots)
        ));
    }

    #[test]
    fn test_restored_orders_preserve_sequence_order() {
        let tmp = TempDir::new().unwrap();
        let state = BookState::from_orders(
            Symbol::new("ETH/USDT"),
            vec![
                resting_order(9, Side::BUY, 3000, "1.0"),
                resting_order(2, Side::BUY, 3001, "1.0"),
                resting_order(5, Side::BUY, 3002, "1.0"),
            ],
        );
        let snapshot = Snapshot::new(10, 1000, state, false);

        let writer = SnapshotWriter::new(tmp.path(), false);
        let path = writer.write(&snapshot).unwrap();
        let loaded = SnapshotLoader::new(tmp.path()).load(&path).unwrap();

        let sequences: Vec<u64> = loaded.state.orders.iter().map(|o| o.sequence).collect();
        assert_eq!(sequences, vec![2, 5, 9]);
    }
}
