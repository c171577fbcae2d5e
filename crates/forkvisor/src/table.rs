use std::collections::HashMap;

use crate::types::{ChildStatus, PendingSignal, ProcessEntry};

/// Live workers by pid.
#[derive(Debug, Default)]
pub struct ProcessTable {
	entries: HashMap<i32, String>,
}

impl ProcessTable {
	pub fn insert(&mut self, entry: ProcessEntry) {
		self.entries.insert(entry.process_id, entry.job_name);
	}

	pub fn remove(&mut self, pid: i32) -> Option<ProcessEntry> {
		self.entries.remove(&pid).map(|job_name| ProcessEntry {
			process_id: pid,
			job_name,
		})
	}

	pub fn contains(&self, pid: i32) -> bool {
		self.entries.contains_key(&pid)
	}

	pub fn job_name(&self, pid: i32) -> Option<&str> {
		self.entries.get(&pid).map(String::as_str)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Entries ordered by pid.
	pub fn entries(&self) -> Vec<ProcessEntry> {
		let mut entries: Vec<ProcessEntry> = self
			.entries
			.iter()
			.map(|(pid, job)| ProcessEntry {
				process_id: *pid,
				job_name: job.clone(),
			})
			.collect();
		entries.sort_by_key(|e| e.process_id);
		entries
	}
}

/// Exits that arrived before their pid was recorded in the [`ProcessTable`].
#[derive(Debug, Default)]
pub struct PendingSignalQueue {
	signals: HashMap<i32, ChildStatus>,
}

impl PendingSignalQueue {
	/// Park an exit. A later exit for the same pid replaces the earlier one.
	pub fn push(&mut self, signal: PendingSignal) {
		self.signals.insert(signal.process_id, signal.raw_status);
	}

	pub fn take(&mut self, pid: i32) -> Option<PendingSignal> {
		self.signals.remove(&pid).map(|raw_status| PendingSignal {
			process_id: pid,
			raw_status,
		})
	}

	pub fn contains(&self, pid: i32) -> bool {
		self.signals.contains_key(&pid)
	}

	pub fn len(&self) -> usize {
		self.signals.len()
	}

	pub fn is_empty(&self) -> bool {
		self.signals.is_empty()
	}

	pub fn signals(&self) -> Vec<PendingSignal> {
		let mut signals: Vec<PendingSignal> = self
			.signals
			.iter()
			.map(|(pid, status)| PendingSignal {
				process_id: *pid,
				raw_status: *status,
			})
			.collect();
		signals.sort_by_key(|s| s.process_id);
		signals
	}
}
