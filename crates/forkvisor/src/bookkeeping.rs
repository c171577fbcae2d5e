use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::reaper::ExitSource;
use crate::table::{PendingSignalQueue, ProcessTable};
use crate::types::{ChildStatus, PendingSignal, ProcessEntry};

/// The supervisor's record of its children.
///
/// Holds the [`ProcessTable`] and the [`PendingSignalQueue`] behind one lock,
/// so a pid is never in both. Every change goes through the methods below:
/// [`record_launch`](Self::record_launch) from the launcher,
/// [`handle_exit`](Self::handle_exit) and [`drain`](Self::drain) from the reaper.
#[derive(Default)]
pub struct Bookkeeping {
	ledger: Mutex<Ledger>,
	drained: Condvar,
}

#[derive(Debug, Default)]
pub(crate) struct Ledger {
	table: ProcessTable,
	pending: PendingSignalQueue,
}

/// What happened to an observed exit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitOutcome {
	/// The pid was a known worker; it is gone from the table.
	Reconciled { entry: ProcessEntry, exit_code: i32 },
	/// The pid is not recorded yet; the exit is parked until it is.
	Queued,
}

impl Bookkeeping {
	pub fn new() -> Self {
		Self::default()
	}

	fn lock(&self) -> MutexGuard<'_, Ledger> {
		self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Exclusive hold on the ledger, taken by the launcher around `fork(2)`.
	pub(crate) fn gate(&self) -> MutexGuard<'_, Ledger> {
		self.lock()
	}

	/// Record a freshly forked worker, then settle an exit that beat it here.
	///
	/// The insert happens before the pending lookup, in the same critical
	/// section. Returns the outcome when a parked exit was settled.
	pub fn record_launch(&self, pid: i32, job_name: &str) -> Option<ExitOutcome> {
		let mut ledger = self.lock();
		ledger.table.insert(ProcessEntry {
			process_id: pid,
			job_name: job_name.to_string(),
		});
		let signal = ledger.pending.take(pid)?;
		tracing::debug!("process {} exited before it was recorded", pid);
		let outcome = reconcile(&mut ledger, signal.process_id, signal.raw_status);
		self.notify_if_drained(&ledger);
		Some(outcome)
	}

	/// Reconcile one exit with a known pid and status.
	pub fn handle_exit(&self, pid: i32, status: ChildStatus) -> ExitOutcome {
		let mut ledger = self.lock();
		let outcome = reconcile(&mut ledger, pid, status);
		self.notify_if_drained(&ledger);
		outcome
	}

	/// Reconcile every exit `source` has to offer. Returns how many were seen.
	pub fn drain(&self, source: &mut dyn ExitSource) -> usize {
		let mut seen = 0;
		while let Some((pid, status)) = source.next_exit() {
			self.handle_exit(pid, status);
			seen += 1;
		}
		seen
	}

	/// Block until the table is empty, re-checking at least every `poll`.
	pub fn wait_until_empty(&self, poll: Duration) {
		let mut ledger = self.lock();
		while !ledger.table.is_empty() {
			ledger = match self.drained.wait_timeout(ledger, poll) {
				Ok((guard, _)) => guard,
				Err(poisoned) => poisoned.into_inner().0,
			};
		}
	}

	fn notify_if_drained(&self, ledger: &Ledger) {
		if ledger.table.is_empty() {
			self.drained.notify_all();
		}
	}

	pub fn len(&self) -> usize {
		self.lock().table.len()
	}

	pub fn is_empty(&self) -> bool {
		self.lock().table.is_empty()
	}

	pub fn pending_len(&self) -> usize {
		self.lock().pending.len()
	}

	pub fn is_tracked(&self, pid: i32) -> bool {
		self.lock().table.contains(pid)
	}

	pub fn is_pending(&self, pid: i32) -> bool {
		self.lock().pending.contains(pid)
	}

	pub fn entries(&self) -> Vec<ProcessEntry> {
		self.lock().table.entries()
	}

	pub fn pending(&self) -> Vec<PendingSignal> {
		self.lock().pending.signals()
	}
}

fn reconcile(ledger: &mut Ledger, pid: i32, status: ChildStatus) -> ExitOutcome {
	match ledger.table.remove(pid) {
		Some(entry) => {
			let exit_code = status.exit_code();
			if exit_code != 0 {
				tracing::error!(
					"process {} ({}) exited with status {}",
					pid,
					entry.job_name,
					exit_code
				);
			} else {
				tracing::debug!("process {} ({}) exited cleanly", pid, entry.job_name);
			}
			ExitOutcome::Reconciled { entry, exit_code }
		}
		None => {
			ledger.pending.push(PendingSignal {
				process_id: pid,
				raw_status: status,
			});
			ExitOutcome::Queued
		}
	}
}
