//! Actor runtime: one worker task per symbol
//!
//! Each symbol's book is owned by exactly one task, so book access is
//! single-threaded by construction and needs no locks. Commands arrive
//! on a per-symbol queue; events leave on one shared stream in sequence
//! order per symbol.
//!
//! The durability ordering inside a worker is fixed: validate, journal
//! the operation under the sequence it will consume, apply it to the
//! engine, reply, then publish events. A journal failure is reported to
//! the caller and touches nothing; a crash after the append replays the
//! operation on restart. Publishing blocks when the event queue is
//! full; the stream is backpressured, never lossy.
//!
//! Journal appends, fsyncs, and snapshot writes run on the blocking
//! pool; the worker awaits each before moving on, so the ordering
//! above holds while the runtime thread stays free for other tasks.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use persistence::journal::{JournalConfig, JournalEntry, JournalWriter};
use persistence::recovery::{ApplyOutcome, OperationApplier, RecoveryEngine};
use persistence::snapshot::{BookState, SnapshotCleanupPolicy, SnapshotIntervalPolicy};
use types::errors::{AdmissionError, EngineError};
use types::ids::{OrderId, Symbol};
use types::order::{Order, OrderRequest};

use crate::config::EngineConfig;
use crate::depth::{DepthSnapshot, TopOfBook};
use crate::engine::{CancelReport, EngineOp, SubmitReport, SymbolEngine};
use crate::events::EngineEvent;

/// Commands a symbol worker accepts
#[derive(Debug)]
pub enum EngineCommand {
    Submit {
        request: OrderRequest,
        reply: oneshot::Sender<Result<SubmitReport, EngineError>>,
    },
    Cancel {
        order_id: OrderId,
        reply: oneshot::Sender<Result<CancelReport, EngineError>>,
    },
    OrderStatus {
        order_id: OrderId,
        reply: oneshot::Sender<Option<Order>>,
    },
    Depth {
        levels: usize,
        reply: oneshot::Sender<DepthSnapshot>,
    },
    TopOfBook {
        reply: oneshot::Sender<TopOfBook>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Bridges journal replay into a [`SymbolEngine`]
///
/// Entries at or below the engine's current sequence are duplicates of
/// state the snapshot already covers and are skipped, which is what
/// makes replay idempotent.
pub struct EngineApplier<'a> {
    pub engine: &'a mut SymbolEngine,
}

impl OperationApplier for EngineApplier<'_> {
    fn restore(&mut self, state: &BookState, sequence: u64) -> Result<(), String> {
        self.engine
            .restore_from(state, sequence)
            .map_err(|e| e.to_string())
    }

    fn apply(&mut self, entry: &JournalEntry) -> Result<ApplyOutcome, String> {
        if entry.sequence <= self.engine.last_sequence() {
            return Ok(ApplyOutcome::Skipped);
        }
        let op: EngineOp = bincode::deserialize(&entry.payload)
            .map_err(|e| format!("undecodable payload at sequence {}: {e}", entry.sequence))?;
        if op.op_type() != entry.op_type {
            return Err(format!(
                "op label {} does not match payload {} at sequence {}",
                entry.op_type,
                op.op_type(),
                entry.sequence
            ));
        }
        self.engine
            .replay(entry.sequence, &op)
            .map_err(|e| e.to_string())?;
        Ok(ApplyOutcome::Applied)
    }

    fn current_state(&self) -> BookState {
        self.engine.export_state()
    }
}

/// Filesystem-safe directory name for a symbol
fn symbol_dir_name(symbol: &Symbol) -> String {
    symbol.as_str().replace(['/', '\\'], "_")
}

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// One symbol's worker: engine, journal, and snapshot machinery
struct SymbolWorker {
    engine: SymbolEngine,
    commands: mpsc::Receiver<EngineCommand>,
    outbound: mpsc::Sender<EngineEvent>,
    journal: Option<JournalWriter>,
    /// Set when a blocking task carrying the writer did not return it.
    /// A durable worker then refuses operations instead of applying
    /// them unjournaled.
    journal_lost: bool,
    recovery: Option<RecoveryEngine>,
    snapshot_dir: Option<PathBuf>,
    snapshot_policy: SnapshotIntervalPolicy,
    cleanup_policy: SnapshotCleanupPolicy,
    compress_snapshots: bool,
    finalized: bool,
}

impl SymbolWorker {
    /// Recover the symbol's state and open its journal for appends
    ///
    /// A missing snapshot or journal is a cold start. A snapshot that
    /// exists but cannot be loaded is fatal; serving from a silently
    /// wrong book is worse than refusing the symbol.
    fn bootstrap(
        symbol: Symbol,
        config: &EngineConfig,
        outbound: mpsc::Sender<EngineEvent>,
        commands: mpsc::Receiver<EngineCommand>,
    ) -> Result<Self, EngineError> {
        let mut engine = SymbolEngine::new(symbol.clone());
        let mut journal = None;
        let mut recovery = None;
        let mut snapshot_dir = None;
        let mut snapshot_policy = SnapshotIntervalPolicy::with_interval(config.snapshot_interval);

        if let Some(root) = &config.data_dir {
            let base = root.join(symbol_dir_name(&symbol));
            let journal_path = base.join("journal");
            let snapshot_path = base.join("snapshots");

            let mut recovery_engine = RecoveryEngine::new(&snapshot_path, &journal_path);
            let metrics = {
                let mut applier = EngineApplier {
                    engine: &mut engine,
                };
                recovery_engine
                    .recover_without_validation(&mut applier)
                    .map_err(|e| EngineError::System {
                        message: format!("recovery for {symbol} failed: {e}"),
                    })?
            };
            info!(
                symbol = %symbol,
                snapshot_sequence = metrics.snapshot_sequence,
                replayed = metrics.replay_count,
                skipped = metrics.skipped_count,
                malformed = metrics.malformed_count,
                corrupted = metrics.corrupted_count,
                final_sequence = metrics.final_sequence,
                "Symbol recovered"
            );
            snapshot_policy.record_snapshot(metrics.snapshot_sequence);

            let mut journal_config = JournalConfig::new(&journal_path);
            journal_config.flush_policy = config.flush_policy;
            journal_config.fsync_policy = config.fsync_policy;
            let mut writer = JournalWriter::open(journal_config).map_err(|e| {
                EngineError::System {
                    message: format!("journal open for {symbol} failed: {e}"),
                }
            })?;
            writer.set_last_sequence(engine.last_sequence());

            journal = Some(writer);
            recovery = Some(recovery_engine);
            snapshot_dir = Some(snapshot_path);
        }

        Ok(Self {
            engine,
            commands,
            outbound,
            journal,
            journal_lost: false,
            recovery,
            snapshot_dir,
            snapshot_policy,
            cleanup_policy: SnapshotCleanupPolicy::new(config.snapshots_to_keep),
            compress_snapshots: config.compress_snapshots,
            finalized: false,
        })
    }

    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            match command {
                EngineCommand::Submit { request, reply } => {
                    let result = self.handle_submit(request).await;
                    let events = match &result {
                        Ok(report) => report.events.clone(),
                        Err(_) => Vec::new(),
                    };
                    let _ = reply.send(result);
                    self.publish(events).await;
                    self.maybe_snapshot().await;
                }
                EngineCommand::Cancel { order_id, reply } => {
                    let result = self.handle_cancel(order_id).await;
                    let events = match &result {
                        Ok(report) => report.events.clone(),
                        Err(_) => Vec::new(),
                    };
                    let _ = reply.send(result);
                    self.publish(events).await;
                    self.maybe_snapshot().await;
                }
                EngineCommand::OrderStatus { order_id, reply } => {
                    let _ = reply.send(self.engine.get_order(&order_id).cloned());
                }
                EngineCommand::Depth { levels, reply } => {
                    let _ = reply.send(self.engine.depth(levels));
                }
                EngineCommand::TopOfBook { reply } => {
                    let _ = reply.send(self.engine.top_of_book());
                }
                EngineCommand::Shutdown { reply } => {
                    self.finalize().await;
                    let _ = reply.send(());
                    return;
                }
            }
        }
        // All senders dropped: same exit path as an explicit shutdown.
        self.finalize().await;
    }

    /// Journal-then-apply for a submission
    ///
    /// Validation runs first so a rejected request is never journaled
    /// and consumes no sequence. The journal entry is written under the
    /// sequence the admission is about to consume.
    async fn handle_submit(&mut self, request: OrderRequest) -> Result<SubmitReport, EngineError> {
        self.engine.validate_submit(&request)?;
        self.journal_op(
            &EngineOp::Submit {
                request: request.clone(),
            },
            request.timestamp,
        )
        .await?;
        self.engine.submit(request)
    }

    async fn handle_cancel(&mut self, order_id: OrderId) -> Result<CancelReport, EngineError> {
        self.engine.validate_cancel(&order_id)?;
        let timestamp = now_nanos();
        self.journal_op(
            &EngineOp::Cancel {
                order_id,
                timestamp,
            },
            timestamp,
        )
        .await?;
        self.engine.cancel(&order_id, timestamp)
    }

    /// Append one operation to the journal on the blocking pool
    ///
    /// The writer moves into the blocking task and back; the append
    /// and any fsync the policy demands never occupy the runtime
    /// thread. The worker awaits the result, so apply still strictly
    /// follows the append.
    async fn journal_op(&mut self, op: &EngineOp, timestamp: i64) -> Result<(), EngineError> {
        let Some(mut journal) = self.journal.take() else {
            if self.journal_lost {
                return Err(EngineError::System {
                    message: "journal writer lost".to_string(),
                });
            }
            return Ok(());
        };
        let sequence = self.engine.next_sequence_hint();
        let payload = match bincode::serialize(op) {
            Ok(payload) => payload,
            Err(e) => {
                self.journal = Some(journal);
                return Err(EngineError::System {
                    message: format!("journal encode failed: {e}"),
                });
            }
        };
        let op_type = op.op_type().to_string();
        let joined = tokio::task::spawn_blocking(move || {
            let result = journal.write_op(sequence, timestamp, op_type, payload);
            (journal, result)
        })
        .await;
        match joined {
            Ok((journal, result)) => {
                self.journal = Some(journal);
                result.map(|_| ()).map_err(|e| EngineError::System {
                    message: format!("journal append failed: {e}"),
                })
            }
            Err(e) => {
                self.journal_lost = true;
                error!(symbol = %self.engine.symbol(), error = %e, "Journal task failed; writer lost");
                Err(EngineError::System {
                    message: format!("journal task failed: {e}"),
                })
            }
        }
    }

    /// Sync the journal to disk on the blocking pool
    async fn sync_journal(&mut self) -> Result<(), EngineError> {
        let Some(mut journal) = self.journal.take() else {
            return Ok(());
        };
        let joined = tokio::task::spawn_blocking(move || {
            let result = journal.sync();
            (journal, result)
        })
        .await;
        match joined {
            Ok((journal, result)) => {
                self.journal = Some(journal);
                result.map_err(|e| EngineError::System {
                    message: format!("journal sync failed: {e}"),
                })
            }
            Err(e) => {
                self.journal_lost = true;
                Err(EngineError::System {
                    message: format!("journal task failed: {e}"),
                })
            }
        }
    }

    /// Push events onto the shared stream, blocking while it is full
    async fn publish(&mut self, events: Vec<EngineEvent>) {
        for event in events {
            if self.outbound.send(event).await.is_err() {
                warn!(symbol = %self.engine.symbol(), "Event stream closed; discarding remaining events");
                return;
            }
        }
    }

    /// Snapshot when the interval policy says so
    async fn maybe_snapshot(&mut self) {
        let current = self.engine.last_sequence();
        if self.recovery.is_none() || !self.snapshot_policy.should_snapshot(current) {
            return;
        }
        self.write_snapshot(current).await;
    }

    /// Sync, prune, export, and write one snapshot
    ///
    /// The journal is synced first; a snapshot must never claim
    /// coverage of appends that are not yet durable. Terminal records
    /// drop before the export, so the snapshot carries the live book
    /// and restart replays only open state plus the journal tail.
    async fn write_snapshot(&mut self, sequence: u64) {
        if self.recovery.is_none() {
            return;
        }
        if let Err(e) = self.sync_journal().await {
            error!(symbol = %self.engine.symbol(), error = %e, "Journal sync before snapshot failed");
            return;
        }
        let Some(recovery) = self.recovery.take() else {
            return;
        };

        let pruned = self.engine.prune_terminal();
        if pruned > 0 {
            debug!(symbol = %self.engine.symbol(), pruned, "Terminal order records dropped");
        }
        let state = self.engine.export_state();
        let timestamp = now_nanos();
        let compress = self.compress_snapshots;
        let cleanup_policy = self.cleanup_policy.clone();
        let snapshot_dir = self.snapshot_dir.clone();
        let symbol = self.engine.symbol().clone();

        let joined = tokio::task::spawn_blocking(move || {
            let written = recovery.take_snapshot(&state, sequence, timestamp, compress);
            let cleaned = match (&written, &snapshot_dir) {
                (Ok(_), Some(dir)) => Some(cleanup_policy.cleanup(dir)),
                _ => None,
            };
            (recovery, written, cleaned)
        })
        .await;

        match joined {
            Ok((recovery, written, cleaned)) => {
                self.recovery = Some(recovery);
                match written {
                    Ok(path) => {
                        info!(
                            symbol = %symbol,
                            sequence,
                            path = %path.display(),
                            "Snapshot written"
                        );
                        self.snapshot_policy.record_snapshot(sequence);
                    }
                    Err(e) => {
                        error!(symbol = %symbol, error = %e, "Snapshot failed");
                    }
                }
                match cleaned {
                    Some(Ok(removed)) if !removed.is_empty() => {
                        debug!(symbol = %symbol, removed = removed.len(), "Old snapshots removed");
                    }
                    Some(Err(e)) => {
                        warn!(symbol = %symbol, error = %e, "Snapshot cleanup failed");
                    }
                    _ => {}
                }
            }
            // Snapshotting stops for this symbol; appends keep working.
            Err(e) => {
                error!(symbol = %symbol, error = %e, "Snapshot task failed");
            }
        }
    }

    /// Graceful teardown: durable journal, then a final snapshot
    async fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;
        if let Err(e) = self.sync_journal().await {
            error!(symbol = %self.engine.symbol(), error = %e, "Final journal sync failed");
        }
        if self.recovery.is_some() {
            self.write_snapshot(self.engine.last_sequence()).await;
        }
        info!(
            symbol = %self.engine.symbol(),
            final_sequence = self.engine.last_sequence(),
            "Symbol worker stopped"
        );
    }
}

/// Routes commands to symbol workers, spawning them on first use
///
/// Construction hands back the shared event stream; all workers
/// publish into it. Dropping the router closes every command queue,
/// which drains and finalizes the workers.
pub struct EngineRouter {
    config: EngineConfig,
    workers: HashMap<Symbol, mpsc::Sender<EngineCommand>>,
    outbound: mpsc::Sender<EngineEvent>,
}

impl EngineRouter {
    pub fn new(config: EngineConfig) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (outbound, events) = mpsc::channel(config.outbound_capacity);
        (
            Self {
                config,
                workers: HashMap::new(),
                outbound,
            },
            events,
        )
    }

    /// Submit an order to its symbol's worker
    pub async fn submit(&mut self, request: OrderRequest) -> Result<SubmitReport, EngineError> {
        let worker = self.worker_for(&request.symbol)?;
        let (reply, response) = oneshot::channel();
        worker
            .send(EngineCommand::Submit { request, reply })
            .await
            .map_err(|_| worker_gone())?;
        response.await.map_err(|_| worker_gone())?
    }

    /// Cancel an order on a symbol's book
    pub async fn cancel(
        &mut self,
        symbol: &Symbol,
        order_id: OrderId,
    ) -> Result<CancelReport, EngineError> {
        let worker = self.worker_for(symbol)?;
        let (reply, response) = oneshot::channel();
        worker
            .send(EngineCommand::Cancel { order_id, reply })
            .await
            .map_err(|_| worker_gone())?;
        response.await.map_err(|_| worker_gone())?
    }

    /// Current record of an order, while the symbol still tracks it
    ///
    /// Terminal records are pruned at snapshot boundaries; after that
    /// the order's history is available only from the event stream.
    pub async fn order_status(
        &mut self,
        symbol: &Symbol,
        order_id: OrderId,
    ) -> Result<Option<Order>, EngineError> {
        let worker = self.worker_for(symbol)?;
        let (reply, response) = oneshot::channel();
        worker
            .send(EngineCommand::OrderStatus { order_id, reply })
            .await
            .map_err(|_| worker_gone())?;
        response.await.map_err(|_| worker_gone())
    }

    /// Aggregated depth for a symbol
    pub async fn depth(
        &mut self,
        symbol: &Symbol,
        levels: usize,
    ) -> Result<DepthSnapshot, EngineError> {
        let worker = self.worker_for(symbol)?;
        let (reply, response) = oneshot::channel();
        worker
            .send(EngineCommand::Depth { levels, reply })
            .await
            .map_err(|_| worker_gone())?;
        response.await.map_err(|_| worker_gone())
    }

    /// Best bid and ask for a symbol
    pub async fn top_of_book(&mut self, symbol: &Symbol) -> Result<TopOfBook, EngineError> {
        let worker = self.worker_for(symbol)?;
        let (reply, response) = oneshot::channel();
        worker
            .send(EngineCommand::TopOfBook { reply })
            .await
            .map_err(|_| worker_gone())?;
        response.await.map_err(|_| worker_gone())
    }

    /// Stop every worker gracefully, waiting for final snapshots
    pub async fn shutdown(&mut self) {
        for (symbol, worker) in self.workers.drain() {
            let (reply, response) = oneshot::channel();
            if worker.send(EngineCommand::Shutdown { reply }).await.is_ok() {
                let _ = response.await;
            }
            debug!(symbol = %symbol, "Worker shut down");
        }
    }

    /// Symbols with a live worker
    pub fn active_symbols(&self) -> Vec<Symbol> {
        self.workers.keys().cloned().collect()
    }

    fn worker_for(&mut self, symbol: &Symbol) -> Result<mpsc::Sender<EngineCommand>, EngineError> {
        if let Some(worker) = self.workers.get(symbol) {
            return Ok(worker.clone());
        }
        if !self.config.accepts(symbol) {
            return Err(AdmissionError::UnknownSymbol {
                symbol: symbol.to_string(),
            }
            .into());
        }
        let (sender, receiver) = mpsc::channel(self.config.command_capacity);
        let worker = SymbolWorker::bootstrap(
            symbol.clone(),
            &self.config,
            self.outbound.clone(),
            receiver,
        )?;
        tokio::spawn(worker.run());
        self.workers.insert(symbol.clone(), sender.clone());
        info!(symbol = %symbol, "Symbol worker spawned");
        Ok(sender)
    }
}

fn worker_gone() -> EngineError {
    EngineError::System {
        message: "symbol worker stopped".to_string(),
    }
}
