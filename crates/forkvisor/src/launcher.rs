use crate::control::{Fork, ProcessControl};
use crate::error::SupervisorError;
use crate::registry::Handler;
use crate::supervisor::Supervisor;
use crate::worker;

impl<C: ProcessControl> Supervisor<C> {
	/// Fork a worker process for `job_name`.
	///
	/// In the parent, returns the child's pid once it is recorded. If the
	/// child has already been reaped by then, its exit is settled before
	/// returning. In the child this never returns: the process runs the
	/// dispatch loop until it exits.
	pub fn launch_worker(
		&self,
		job_name: &str,
		handler: Option<Handler>,
	) -> Result<i32, SupervisorError> {
		let forked = {
			// The reaper holds this lock while it logs and mutates the table,
			// so the child is never copied from the middle of either.
			let _gate = self.book.gate();
			self.control.fork()
		};

		match forked {
			Err(errno) => {
				tracing::error!(
					"could not fork worker process for the {} job: {}",
					job_name,
					errno
				);
				Err(SupervisorError::Fork {
					job: job_name.to_string(),
					source: errno,
				})
			}
			Ok(Fork::Child) => {
				worker::run_worker(job_name, handler, self.registry.as_ref(), &self.config.endpoint)
			}
			Ok(Fork::Parent { child }) => {
				tracing::debug!("launched process {} for {}", child, job_name);
				self.book.record_launch(child, job_name);
				Ok(child)
			}
		}
	}
}
