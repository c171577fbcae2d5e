use gearbox::ClientError;
use nix::errno::Errno;

use crate::worker::{EXIT_NO_HANDLER, EXIT_QUEUE_FAILURE};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
	#[error("no handler registered for job {0}")]
	NotFound(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
	#[error("no job types registered")]
	EmptyRegistry,
	#[error("could not fork worker process for the {job} job: {source}")]
	Fork {
		job: String,
		#[source]
		source: Errno,
	},
	#[error("could not watch for child exits: {0}")]
	Watch(#[from] std::io::Error),
}

/// Why a worker process stopped dispatching.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
	#[error(transparent)]
	Handler(#[from] RegistryError),
	#[error(transparent)]
	Queue(#[from] ClientError),
	#[error("lost connection to the queue: {0}")]
	ConnectionLost(String),
}

impl WorkerError {
	/// Status the worker process exits with.
	pub fn exit_code(&self) -> i32 {
		match self {
			WorkerError::Handler(_) => EXIT_NO_HANDLER,
			WorkerError::Queue(_) | WorkerError::ConnectionLost(_) => EXIT_QUEUE_FAILURE,
		}
	}
}
