use std::collections::VecDeque;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::bookkeeping::Bookkeeping;
use crate::signals::ChildSignal;
use crate::types::ChildStatus;

/// Yields children that have already exited, without blocking.
pub trait ExitSource {
	fn next_exit(&mut self) -> Option<(i32, ChildStatus)>;
}

/// `waitpid(-1, WNOHANG)` on the current process's children.
#[derive(Debug, Default, Clone, Copy)]
pub struct WaitpidExits;

impl ExitSource for WaitpidExits {
	fn next_exit(&mut self) -> Option<(i32, ChildStatus)> {
		loop {
			match waitpid(Pid::from_raw(-1), Some(WaitPidFlag::WNOHANG)) {
				Ok(WaitStatus::Exited(pid, code)) => {
					return Some((pid.as_raw(), ChildStatus::Exited(code)))
				}
				Ok(WaitStatus::Signaled(pid, sig, _)) => {
					return Some((pid.as_raw(), ChildStatus::Signaled(sig as i32)))
				}
				Ok(WaitStatus::StillAlive) => return None,
				// stopped/continued children have not exited
				Ok(_) => continue,
				Err(Errno::EINTR) => continue,
				Err(Errno::ECHILD) => return None,
				Err(e) => {
					tracing::warn!("waitpid failed: {}", e);
					return None;
				}
			}
		}
	}
}

/// Scripted exits, consumed front to back.
impl ExitSource for VecDeque<(i32, ChildStatus)> {
	fn next_exit(&mut self) -> Option<(i32, ChildStatus)> {
		self.pop_front()
	}
}

/// Spawn the thread that drains exited children on every SIGCHLD.
pub fn spawn_reaper(book: Arc<Bookkeeping>, mut signal: ChildSignal) -> std::io::Result<JoinHandle<()>> {
	thread::Builder::new()
		.name("forkvisor-reaper".into())
		.spawn(move || {
			let mut exits = WaitpidExits;
			book.drain(&mut exits);
			while signal.wait() {
				book.drain(&mut exits);
			}
			tracing::warn!("child exit notifications stopped");
		})
}
