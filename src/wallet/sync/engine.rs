//! Sync engine.
//!
//! One worker task owns the scheduling of scan passes and resyncs. Scan passes are driven by a
//! polling interval (plus programmatic triggers) with skip-if-busy semantics: a trigger that
//! arrives while a pass is in flight is dropped. Resync requests queue up and run one at a
//! time in submission order, concurrently with scanning.
//!
//! The ledger and cursor sit behind a single `RwLock`. Writers take it only for the in-memory
//! apply of one block, never across a node round-trip, so a scan pass and a resync interleave
//! at block granularity and never mutate the ledger at the same time.

use super::progress_tracker::ScanProgress;
use crate::config::SyncConfig;
use crate::wallet::balance::{BalanceFeed, BalanceStream};
use crate::wallet::chain_reader::ChainReader;
use crate::wallet::keys::KeyImage;
use crate::wallet::ledger::{KeyImageLedger, KeyImageRecord, TransactionEffect};
use crate::wallet::types::{Block, DecodedTransaction, SyncError};

use futures::future::{BoxFuture, FutureExt, OptionFuture};
use itertools::Itertools;
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const COMMAND_QUEUE_DEPTH: usize = 32;

/// Lifecycle state of the engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
	Stopped,
	Running,
	/// The engine stopped itself after a scan pass failed.
	Failed(SyncError),
}

/// Result of a requested scan pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
	/// A pass was already in flight; the request was dropped.
	Skipped,
	/// The chain tip has not moved past the cursor.
	UpToDate { height: u64 },
	/// Blocks `from..=to` were applied.
	Applied { from: u64, to: u64 },
	/// No block could be applied; the next pass starts again at `at`.
	Stalled { at: u64 },
}

/// What a resync looked at and reprocessed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResyncReport {
	pub requested_from: u64,
	pub chain_height: u64,
	/// Heights reprocessed, ascending.
	pub reprocessed: Vec<u64>,
	/// Heights in scope whose block was unavailable.
	pub missing: Vec<u64>,
}

type Reply<T> = oneshot::Sender<Result<T, SyncError>>;

enum Command {
	Scan { reply: Reply<ScanOutcome> },
	Resync { start_height: u64, reply: Reply<ResyncReport> },
}

/// Ledger plus scan cursor, mutated only under the write lock
struct SyncState {
	ledger: KeyImageLedger,
	/// Last height the scan covered, or the configured start height.
	cursor: u64,
	/// Whether the block at `cursor` itself was applied.
	cursor_applied: bool,
}

impl SyncState {
	fn next_height(&self) -> u64 {
		if self.cursor_applied {
			self.cursor + 1
		} else {
			self.cursor
		}
	}
}

struct EngineShared {
	reader: ChainReader,
	state: RwLock<SyncState>,
	balance: BalanceFeed,
	running: AtomicBool,
	status: watch::Sender<EngineStatus>,
	polling_interval: Duration,
}

struct WorkerHandle {
	commands: mpsc::Sender<Command>,
	shutdown: watch::Sender<bool>,
	task: JoinHandle<Result<(), SyncError>>,
}

/// An operation the worker is currently driving, with the caller waiting on it (if any)
struct InFlight<T> {
	future: BoxFuture<'static, Result<T, SyncError>>,
	reply: Option<Reply<T>>,
}

impl<T> InFlight<T> {
	fn new(future: BoxFuture<'static, Result<T, SyncError>>, reply: Option<Reply<T>>) -> Self {
		Self { future, reply }
	}

	fn finish(self, result: Result<T, SyncError>) {
		if let Some(reply) = self.reply {
			let _ = reply.send(result);
		}
	}
}

pub(crate) struct SyncEngine {
	shared: Arc<EngineShared>,
	worker: Option<WorkerHandle>,
}

impl SyncEngine {
	pub(crate) fn new(reader: ChainReader, config: &SyncConfig) -> Self {
		let ledger = KeyImageLedger::new();
		let balance = ledger.balance_feed();
		let (status, _) = watch::channel(EngineStatus::Stopped);

		Self {
			shared: Arc::new(EngineShared {
				reader,
				state: RwLock::new(SyncState {
					ledger,
					cursor: config.start_height,
					cursor_applied: false,
				}),
				balance,
				running: AtomicBool::new(false),
				status,
				polling_interval: config.polling_interval,
			}),
			worker: None,
		}
	}

	/// Spawn the worker on the current Tokio runtime.
	pub(crate) fn start(&mut self) -> Result<(), SyncError> {
		if self.shared.running.load(Ordering::SeqCst) {
			return Err(SyncError::AlreadyRunning);
		}
		let runtime = tokio::runtime::Handle::try_current().map_err(|_| SyncError::NoRuntime)?;

		let (command_tx, command_rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
		let (shutdown_tx, shutdown_rx) = watch::channel(false);

		self.shared.running.store(true, Ordering::SeqCst);
		self.shared.status.send_replace(EngineStatus::Running);
		let task = runtime.spawn(run_worker(
			Arc::clone(&self.shared),
			command_rx,
			shutdown_rx,
		));

		info!(
			"Sync engine started at height {} (polling every {:?})",
			self.next_height(),
			self.shared.polling_interval
		);

		self.worker = Some(WorkerHandle {
			commands: command_tx,
			shutdown: shutdown_tx,
			task,
		});
		Ok(())
	}

	/// Stop the worker and wait for it to exit. A no-op when already stopped.
	pub(crate) async fn stop(&mut self) {
		let Some(worker) = self.worker.take() else {
			return;
		};

		self.shared.running.store(false, Ordering::SeqCst);
		let _ = worker.shutdown.send(true);
		match worker.task.await {
			Ok(Ok(())) => {}
			Ok(Err(e)) => debug!("Sync worker had already stopped: {}", e),
			Err(e) => error!("Sync worker panicked: {}", e),
		}
		info!("Sync engine stopped at height {}", self.next_height());
	}

	pub(crate) fn is_running(&self) -> bool {
		self.shared.running.load(Ordering::SeqCst)
	}

	/// Request a scan pass now. Returns `Skipped` if one is already in flight.
	pub(crate) async fn trigger_scan(&self) -> Result<ScanOutcome, SyncError> {
		self.request(|reply| Command::Scan { reply }).await
	}

	/// Queue a resync from `start_height` and wait for it to complete.
	pub(crate) async fn resync(&self, start_height: u64) -> Result<ResyncReport, SyncError> {
		self.request(|reply| Command::Resync {
			start_height,
			reply,
		})
		.await
	}

	async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T, SyncError> {
		let commands = match &self.worker {
			Some(worker) if self.is_running() => worker.commands.clone(),
			_ => return Err(SyncError::NotRunning),
		};

		let (reply_tx, reply_rx) = oneshot::channel();
		commands
			.send(command(reply_tx))
			.await
			.map_err(|_| SyncError::NotRunning)?;
		reply_rx.await.map_err(|_| SyncError::NotRunning)?
	}

	pub(crate) fn status(&self) -> watch::Receiver<EngineStatus> {
		self.shared.status.subscribe()
	}

	/// Height the next scan pass starts from.
	pub(crate) fn next_height(&self) -> u64 {
		self.shared.state.read().next_height()
	}

	pub(crate) fn balance(&self) -> String {
		self.shared.balance.latest()
	}

	pub(crate) fn subscribe_balance(&self) -> BalanceStream {
		self.shared.balance.subscribe()
	}

	pub(crate) fn key_images(&self) -> HashMap<KeyImage, KeyImageRecord> {
		self.shared.state.read().ledger.snapshot()
	}
}

async fn run_worker(
	shared: Arc<EngineShared>,
	mut commands: mpsc::Receiver<Command>,
	mut shutdown: watch::Receiver<bool>,
) -> Result<(), SyncError> {
	let mut ticker = time::interval(shared.polling_interval);
	ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

	let mut scan: Option<InFlight<ScanOutcome>> = None;
	let mut resync: Option<InFlight<ResyncReport>> = None;
	let mut resync_queue: VecDeque<(u64, Reply<ResyncReport>)> = VecDeque::new();

	let result = loop {
		if resync.is_none() {
			if let Some((start_height, reply)) = resync_queue.pop_front() {
				let pass = resync_pass(Arc::clone(&shared), start_height).boxed();
				resync = Some(InFlight::new(pass, Some(reply)));
			}
		}

		tokio::select! {
			biased;
			_ = shutdown.changed() => {
				break Ok(());
			}
			Some(outcome) = OptionFuture::from(scan.as_mut().map(|s| &mut s.future)) => {
				let Some(finished) = scan.take() else { continue };
				match outcome {
					Ok(outcome) => finished.finish(Ok(outcome)),
					Err(e) => {
						error!("Scan pass failed, stopping sync engine: {}", e);
						finished.finish(Err(e.clone()));
						break Err(e);
					}
				}
			}
			Some(report) = OptionFuture::from(resync.as_mut().map(|r| &mut r.future)) => {
				if let Err(e) = &report {
					warn!("Resync failed: {}", e);
				}
				if let Some(finished) = resync.take() {
					finished.finish(report);
				}
			}
			command = commands.recv() => match command {
				Some(Command::Scan { reply }) => {
					if scan.is_some() {
						debug!("Scan pass already in flight, skipping requested scan");
						let _ = reply.send(Ok(ScanOutcome::Skipped));
					} else {
						scan = Some(InFlight::new(scan_pass(Arc::clone(&shared)).boxed(), Some(reply)));
					}
				}
				Some(Command::Resync { start_height, reply }) => {
					debug!("Resync from height {} queued", start_height);
					resync_queue.push_back((start_height, reply));
				}
				None => break Ok(()),
			},
			_ = ticker.tick() => {
				if scan.is_some() {
					debug!("Scan pass already in flight, dropping tick");
				} else {
					scan = Some(InFlight::new(scan_pass(Arc::clone(&shared)).boxed(), None));
				}
			}
		}
	};

	shared.running.store(false, Ordering::SeqCst);
	shared.status.send_replace(match &result {
		Ok(()) => EngineStatus::Stopped,
		Err(e) => EngineStatus::Failed(e.clone()),
	});
	debug!(
		"Sync worker exiting ({} queued resyncs dropped)",
		resync_queue.len()
	);
	result
}

type ApplyFn = fn(&mut KeyImageLedger, &DecodedTransaction, u64) -> TransactionEffect;

/// Apply every transaction of `block` in node order with `apply`.
fn apply_block(ledger: &mut KeyImageLedger, block: &Block, apply: ApplyFn) -> TransactionEffect {
	block
		.transactions
		.iter()
		.fold(TransactionEffect::default(), |mut total, transaction| {
			let effect = apply(ledger, transaction, block.height);
			total.credited += effect.credited;
			total.retracted += effect.retracted;
			total
		})
}

/// Ingest every block between the cursor and the chain tip.
async fn scan_pass(shared: Arc<EngineShared>) -> Result<ScanOutcome, SyncError> {
	let chain_height = shared.reader.height().await?;

	let (cursor, from) = {
		let state = shared.state.read();
		(state.cursor, state.next_height())
	};
	if chain_height <= cursor {
		return Ok(ScanOutcome::UpToDate { height: cursor });
	}

	let mut progress = ScanProgress::new(from, chain_height);
	let mut applied_to = None;
	for height in from..=chain_height {
		if !shared.running.load(Ordering::SeqCst) {
			info!("Sync engine stopping, scan aborted before height {}", height);
			break;
		}

		let Some(block) = shared.reader.block(height, chain_height).await else {
			warn!("Block {} unavailable, will retry on the next pass", height);
			progress.record_missing(height);
			break;
		};
		if !shared.running.load(Ordering::SeqCst) {
			break;
		}

		let effect = {
			let mut state = shared.state.write();
			let effect = apply_block(&mut state.ledger, &block, KeyImageLedger::apply);
			state.cursor = height;
			state.cursor_applied = true;
			effect
		};
		progress.record_block(height, block.transactions.len(), &effect);
		progress.log_progress(false);
		applied_to = Some(height);
	}

	progress.log_summary();
	Ok(match applied_to {
		Some(to) => ScanOutcome::Applied { from, to },
		None => ScanOutcome::Stalled { at: from },
	})
}

/// Reprocess the blocks of unspent records observed between `start_height` and the tip.
///
/// Only heights already present in the ledger are revisited; outputs that were never seen
/// are not discovered. Outputs are re-credited only while their key image is still unspent at
/// the moment the block is applied, so a spend recorded since (by a later block or a
/// concurrent scan pass) is never undone. The cursor is left untouched.
async fn resync_pass(shared: Arc<EngineShared>, start_height: u64) -> Result<ResyncReport, SyncError> {
	let chain_height = shared.reader.height().await?;

	let snapshot = shared.state.read().ledger.snapshot();
	let heights: Vec<u64> = snapshot
		.values()
		.map(|record| record.height)
		.filter(|height| (start_height..=chain_height).contains(height))
		.sorted_unstable()
		.dedup()
		.collect();
	info!(
		"Resync from height {}: reprocessing {} heights up to {}",
		start_height,
		heights.len(),
		chain_height
	);

	let mut report = ResyncReport {
		requested_from: start_height,
		chain_height,
		reprocessed: Vec::with_capacity(heights.len()),
		missing: Vec::new(),
	};
	for height in heights {
		match shared.reader.block(height, chain_height).await {
			Some(block) => {
				let mut state = shared.state.write();
				apply_block(&mut state.ledger, &block, KeyImageLedger::reconcile);
				report.reprocessed.push(height);
			}
			None => {
				warn!("Block {} unavailable during resync", height);
				report.missing.push(height);
			}
		}
	}

	Ok(report)
}
