use serde::{Deserialize, Serialize};

/// A unit of work handed to a worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
	pub handle: String,
	pub function: String,
	pub payload: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
	Queued,
	Running,
	Complete { result: String },
	Failed { error: String },
}

impl JobState {
	pub fn is_finished(&self) -> bool {
		matches!(self, JobState::Complete { .. } | JobState::Failed { .. })
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum Request {
	CanDo { function: String },
	GrabJob,
	WorkComplete { handle: String, result: String },
	WorkFail { handle: String, error: String },
	Submit { function: String, payload: String },
	Status { handle: String },
	Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
	Ok,
	JobAssign { job: Job },
	JobCreated { handle: String },
	JobStatus { handle: String, state: JobState },
	Error { message: String },
	Pong,
}
