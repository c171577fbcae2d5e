//! SIGCHLD shim.
//!
//! The handler does nothing but write one byte to a non-blocking pipe. The
//! reaper thread blocks on the read end and does the real work outside
//! signal context.

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::{AsRawFd, BorrowedFd, OwnedFd};
use std::sync::atomic::{AtomicI32, Ordering};

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, FdFlag, OFlag};
use nix::sys::signal::{sigaction, signal, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::pipe;

static NOTIFY_FD: AtomicI32 = AtomicI32::new(-1);

extern "C" fn on_sigchld(_: nix::libc::c_int) {
	let fd = NOTIFY_FD.load(Ordering::Relaxed);
	if fd < 0 {
		return;
	}
	let saved = Errno::last_raw();
	// EAGAIN means the pipe is full and a wake-up is already pending.
	let _ = nix::unistd::write(unsafe { BorrowedFd::borrow_raw(fd) }, &[1u8]);
	Errno::set_raw(saved);
}

/// Receiving end of child-exit notifications.
pub struct ChildSignal {
	reader: File,
	_writer: OwnedFd,
}

impl ChildSignal {
	/// Create the pipe and install the SIGCHLD handler.
	pub fn install() -> io::Result<Self> {
		let (read_end, write_end) = pipe()?;
		for fd in [&read_end, &write_end] {
			fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
		}
		fcntl(write_end.as_raw_fd(), FcntlArg::F_SETFL(OFlag::O_NONBLOCK))?;
		NOTIFY_FD.store(write_end.as_raw_fd(), Ordering::SeqCst);

		let action = SigAction::new(
			SigHandler::Handler(on_sigchld),
			SaFlags::SA_RESTART | SaFlags::SA_NOCLDSTOP,
			SigSet::empty(),
		);
		unsafe { sigaction(Signal::SIGCHLD, &action) }?;

		Ok(Self {
			reader: File::from(read_end),
			_writer: write_end,
		})
	}

	/// Block until at least one SIGCHLD arrived since the previous call.
	/// Several signals may be folded into one wake-up.
	pub fn wait(&mut self) -> bool {
		let mut buf = [0u8; 64];
		loop {
			match self.reader.read(&mut buf) {
				Ok(0) => return false,
				Ok(_) => return true,
				Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(e) => {
					tracing::error!("child signal pipe failed: {}", e);
					return false;
				}
			}
		}
	}
}

/// Run in a freshly forked worker: detach from the parent's notification pipe
/// and put SIGCHLD back to its default disposition.
pub fn reset_in_child() {
	NOTIFY_FD.store(-1, Ordering::SeqCst);
	// SAFETY: SigDfl installs no Rust code as a handler.
	if let Err(e) = unsafe { signal(Signal::SIGCHLD, SigHandler::SigDfl) } {
		tracing::warn!("could not reset SIGCHLD in worker: {}", e);
	}
}
