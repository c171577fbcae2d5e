use std::collections::HashMap;
use std::sync::Arc;

use crate::client::{ClientError, Connection};
use crate::endpoint::Endpoint;
use crate::protocol::{Job, Request, Response};

/// Function registered with the queue. `Ok` carries the job result,
/// `Err` the failure detail reported back to the server.
pub type Handler = Arc<dyn Fn(&Job) -> Result<String, String> + Send + Sync>;

/// Outcome of the last [`Worker::work`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum ReturnCode {
	Success,
	Error(String),
}

impl ReturnCode {
	pub fn is_success(&self) -> bool {
		matches!(self, ReturnCode::Success)
	}
}

/// Blocking worker: registers functions and processes one job per [`work`](Worker::work) call.
pub struct Worker {
	conn: Option<Connection>,
	functions: HashMap<String, Handler>,
	last: ReturnCode,
}

impl Default for Worker {
	fn default() -> Self {
		Self::new()
	}
}

impl Worker {
	pub fn new() -> Self {
		Self {
			conn: None,
			functions: HashMap::new(),
			last: ReturnCode::Success,
		}
	}

	/// Connect to the queue server. Functions added earlier are re-announced.
	pub fn add_server(&mut self, endpoint: &Endpoint) -> Result<(), ClientError> {
		let mut conn = Connection::open(endpoint)?;
		for name in self.functions.keys() {
			announce(&mut conn, name)?;
		}
		self.conn = Some(conn);
		Ok(())
	}

	pub fn add_function(&mut self, name: &str, handler: Handler) -> Result<(), ClientError> {
		if let Some(conn) = self.conn.as_mut() {
			announce(conn, name)?;
		}
		self.functions.insert(name.to_string(), handler);
		Ok(())
	}

	pub fn functions(&self) -> impl Iterator<Item = &str> {
		self.functions.keys().map(String::as_str)
	}

	/// Wait for the next job, run it and report the outcome.
	///
	/// Returns `true` once a job has been handled, successfully or not; check
	/// [`return_code`](Worker::return_code) for the outcome. Returns `false`
	/// when there is nothing to work with: no server, no functions, or the
	/// connection dropped.
	pub fn work(&mut self) -> bool {
		if self.functions.is_empty() {
			self.last = ReturnCode::Error("no functions registered".to_string());
			return false;
		}
		let Some(conn) = self.conn.as_mut() else {
			self.last = ReturnCode::Error(ClientError::NotConnected.to_string());
			return false;
		};

		let job = match conn.send(&Request::GrabJob) {
			Ok(Response::JobAssign { job }) => job,
			Ok(other) => {
				self.last = ReturnCode::Error(format!("unexpected response: {:?}", other));
				return true;
			}
			Err(e @ (ClientError::Server(_) | ClientError::Deserialize(_))) => {
				self.last = ReturnCode::Error(e.to_string());
				return true;
			}
			Err(e) => {
				self.last = ReturnCode::Error(e.to_string());
				self.conn = None;
				return false;
			}
		};

		let outcome = match self.functions.get(&job.function) {
			Some(handler) => handler(&job),
			None => Err(format!("no handler for function {}", job.function)),
		};

		let (report, failure) = match outcome {
			Ok(result) => (
				Request::WorkComplete {
					handle: job.handle.clone(),
					result,
				},
				None,
			),
			Err(error) => (
				Request::WorkFail {
					handle: job.handle.clone(),
					error: error.clone(),
				},
				Some(error),
			),
		};

		match conn.send(&report) {
			Ok(_) => {
				self.last = match failure {
					Some(error) => ReturnCode::Error(error),
					None => ReturnCode::Success,
				};
				true
			}
			Err(ClientError::Server(message)) => {
				self.last = ReturnCode::Error(message);
				true
			}
			Err(e) => {
				self.last = ReturnCode::Error(e.to_string());
				self.conn = None;
				false
			}
		}
	}

	pub fn return_code(&self) -> &ReturnCode {
		&self.last
	}
}

fn announce(conn: &mut Connection, name: &str) -> Result<(), ClientError> {
	conn.send(&Request::CanDo {
		function: name.to_string(),
	})
	.map(|_| ())
}
