use std::sync::Arc;

use gearbox::Job;
use serde::Deserialize;

use crate::registry::Handler;

/// Job name of the built-in worker that receives completion notices.
pub const MAINTENANCE_JOB: &str = "on_complete_task";

/// Payload of an `on_complete_task` job, sent by producers once a channel
/// task has finished.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CompletionNotice {
	pub channel: String,
	pub task: String,
	#[serde(default)]
	pub error: Option<String>,
}

pub fn handler() -> Handler {
	Arc::new(handle_notice)
}

fn handle_notice(job: &Job) -> Result<String, String> {
	let notice: CompletionNotice = serde_json::from_str(&job.payload)
		.map_err(|e| format!("invalid completion notice {}: {}", job.handle, e))?;

	match &notice.error {
		Some(error) => {
			tracing::warn!("{} task {} failed: {}", notice.channel, notice.task, error)
		}
		None => tracing::info!("{} task {} complete", notice.channel, notice.task),
	}
	Ok(notice.task)
}
