//! The child side of a launch.

use std::convert::Infallible;

use gearbox::{Endpoint, ReturnCode, Worker};

use crate::error::WorkerError;
use crate::registry::{Handler, JobRegistry};
use crate::signals;

/// Exit status of a worker that could not reach, or lost, its queue.
pub const EXIT_QUEUE_FAILURE: i32 = 1;
/// Exit status of a worker whose job has no registered handler.
pub const EXIT_NO_HANDLER: i32 = 2;

/// Body of a forked worker process. Never returns.
pub(crate) fn run_worker(
	job_name: &str,
	handler: Option<Handler>,
	registry: &dyn JobRegistry,
	endpoint: &Endpoint,
) -> ! {
	signals::reset_in_child();
	tracing::debug!(
		"forked process {} for {}",
		std::process::id(),
		job_name.to_uppercase()
	);

	let err = match serve(job_name, handler, registry, endpoint) {
		Ok(never) => match never {},
		Err(e) => e,
	};
	tracing::error!("{} worker stopped: {}", job_name, err);
	std::process::exit(err.exit_code())
}

/// Connect to the queue, register `job_name` and dispatch jobs for as long
/// as the connection holds. A failing job is logged and the loop goes on.
///
/// Uses `handler` when given, otherwise asks `registry` for one.
pub fn serve(
	job_name: &str,
	handler: Option<Handler>,
	registry: &dyn JobRegistry,
	endpoint: &Endpoint,
) -> Result<Infallible, WorkerError> {
	let mut worker = Worker::new();
	worker.add_server(endpoint)?;

	let handler = match handler {
		Some(h) => h,
		None => registry.resolve_handler(job_name)?,
	};
	worker.add_function(job_name, handler)?;

	while worker.work() {
		if let ReturnCode::Error(detail) = worker.return_code() {
			tracing::error!("{} worker returned an error: {}", job_name, detail);
		}
	}

	Err(WorkerError::ConnectionLost(match worker.return_code() {
		ReturnCode::Error(detail) => detail.clone(),
		ReturnCode::Success => "connection closed".to_string(),
	}))
}
