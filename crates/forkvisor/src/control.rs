use std::sync::Arc;

use nix::errno::Errno;
use nix::unistd::{fork, ForkResult};

use crate::bookkeeping::Bookkeeping;
use crate::reaper;
use crate::signals::ChildSignal;

/// Which side of a fork the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fork {
	Parent { child: i32 },
	Child,
}

/// OS operations the supervisor depends on.
pub trait ProcessControl: Send + Sync {
	/// Start feeding child exits into `book`.
	fn watch_exits(&self, book: Arc<Bookkeeping>) -> std::io::Result<()>;
	fn fork(&self) -> Result<Fork, Errno>;
}

/// Real processes: `fork(2)`, SIGCHLD and `waitpid(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemControl;

impl ProcessControl for SystemControl {
	fn watch_exits(&self, book: Arc<Bookkeeping>) -> std::io::Result<()> {
		let signal = ChildSignal::install()?;
		reaper::spawn_reaper(book, signal)?;
		Ok(())
	}

	fn fork(&self) -> Result<Fork, Errno> {
		// SAFETY: the child only runs the worker loop and leaves through
		// process::exit; it never touches state owned by other threads.
		match unsafe { fork() }? {
			ForkResult::Parent { child } => Ok(Fork::Parent {
				child: child.as_raw(),
			}),
			ForkResult::Child => Ok(Fork::Child),
		}
	}
}
