//! Engine runtime configuration

use std::path::PathBuf;

use persistence::journal::{FlushPolicy, FsyncPolicy};
use types::ids::Symbol;

/// Configuration for the engine router and its symbol workers
///
/// `data_dir` of None runs fully in memory: no journal, no snapshots,
/// cold state on every start. Tests and embedded uses want that; a
/// deployment sets a directory and gets durability.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root directory for journals and snapshots; one subdirectory per
    /// symbol is created beneath it.
    pub data_dir: Option<PathBuf>,
    /// Capacity of each symbol worker's command queue.
    pub command_capacity: usize,
    /// Capacity of the shared outbound event queue. Publishing blocks
    /// when it is full; events are never dropped.
    pub outbound_capacity: usize,
    /// Take a snapshot every this many consumed sequences.
    pub snapshot_interval: u64,
    /// Snapshots retained per symbol; older ones are deleted.
    pub snapshots_to_keep: usize,
    pub flush_policy: FlushPolicy,
    pub fsync_policy: FsyncPolicy,
    pub compress_snapshots: bool,
    /// Allow-list of symbols. None accepts any symbol and spawns its
    /// worker on first use.
    pub symbols: Option<Vec<Symbol>>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            command_capacity: 1024,
            outbound_capacity: 4096,
            snapshot_interval: 100_000,
            snapshots_to_keep: 3,
            flush_policy: FlushPolicy::EveryWrite,
            fsync_policy: FsyncPolicy::EveryWrite,
            compress_snapshots: false,
            symbols: None,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into());
        self
    }

    pub fn with_command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = capacity;
        self
    }

    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity;
        self
    }

    pub fn with_snapshot_interval(mut self, interval: u64) -> Self {
        self.snapshot_interval = interval;
        self
    }

    pub fn with_snapshots_to_keep(mut self, count: usize) -> Self {
        self.snapshots_to_keep = count;
        self
    }

    pub fn with_flush_policy(mut self, policy: FlushPolicy) -> Self {
        self.flush_policy = policy;
        self
    }

    pub fn with_fsync_policy(mut self, policy: FsyncPolicy) -> Self {
        self.fsync_policy = policy;
        self
    }

    pub fn with_compressed_snapshots(mut self, compress: bool) -> Self {
        self.compress_snapshots = compress;
        self
    }

    pub fn with_symbols(mut self, symbols: Vec<Symbol>) -> Self {
        self.symbols = Some(symbols);
        self
    }

    /// Whether `symbol` may be traded under this configuration
    pub fn accepts(&self, symbol: &Symbol) -> bool {
        match &self.symbols {
            Some(allowed) => allowed.contains(symbol),
            None => true,
        }
    }
}
