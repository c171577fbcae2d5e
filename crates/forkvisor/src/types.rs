/// How a child process ended, as reported by `waitpid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStatus {
	Exited(i32),
	Signaled(i32),
}

impl ChildStatus {
	/// Numeric exit code. Signal deaths map to `128 + signo`.
	pub fn exit_code(self) -> i32 {
		match self {
			ChildStatus::Exited(code) => code,
			ChildStatus::Signaled(signo) => 128 + signo,
		}
	}

	pub fn success(self) -> bool {
		self.exit_code() == 0
	}
}

/// A launched worker that has not been reaped yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEntry {
	pub process_id: i32,
	pub job_name: String,
}

/// An exit seen for a pid the supervisor had not recorded yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingSignal {
	pub process_id: i32,
	pub raw_status: ChildStatus,
}

/// Lifecycle of [`Supervisor::run`](crate::Supervisor::run).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
	Init,
	Launching,
	Supervising,
	Drained,
	Aborted,
}

impl Phase {
	pub fn is_terminal(self) -> bool {
		matches!(self, Phase::Drained | Phase::Aborted)
	}
}
