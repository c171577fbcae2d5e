//! Channels from the config file, each served by a shell command.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Arc;

use forkvisor::{Handler, JobRegistry, RegistryError};
use gearbox::Job;

use crate::config::ChannelConfig;

#[derive(Debug, Clone, Default)]
pub struct ChannelRegistry {
	channels: BTreeMap<String, ChannelConfig>,
}

impl ChannelRegistry {
	/// Keep the enabled channels only.
	pub fn new(channels: &BTreeMap<String, ChannelConfig>) -> Self {
		let channels = channels
			.iter()
			.filter(|(name, channel)| {
				if !channel.enabled {
					tracing::debug!("channel {} is disabled", name);
				}
				channel.enabled
			})
			.map(|(name, channel)| (name.clone(), channel.clone()))
			.collect();
		Self { channels }
	}
}

impl JobRegistry for ChannelRegistry {
	fn job_names(&self) -> BTreeSet<String> {
		self.channels.keys().cloned().collect()
	}

	fn resolve_handler(&self, job_name: &str) -> Result<Handler, RegistryError> {
		let channel = self
			.channels
			.get(job_name)
			.cloned()
			.ok_or_else(|| RegistryError::NotFound(job_name.to_string()))?;
		let name = job_name.to_string();
		Ok(Arc::new(move |job: &Job| run_command(&name, &channel, job)))
	}
}

/// Run the channel command with the payload on stdin.
/// Stdout is the result; a non-zero exit fails the job with its stderr.
fn run_command(channel_name: &str, channel: &ChannelConfig, job: &Job) -> Result<String, String> {
	let mut cmd = Command::new("sh");
	cmd.args(["-c", &channel.command])
		.stdin(Stdio::piped())
		.stdout(Stdio::piped())
		.stderr(Stdio::piped())
		.env("RIVERD_CHANNEL", channel_name)
		.env("RIVERD_JOB_HANDLE", &job.handle);

	for (key, val) in &channel.env {
		cmd.env(key, val);
	}

	let mut child = cmd.spawn().map_err(|e| format!("spawn failed: {}", e))?;

	// Fed from a thread so a command that writes before reading can't deadlock us.
	let feeder = child.stdin.take().map(|mut stdin| {
		let payload = job.payload.clone().into_bytes();
		std::thread::spawn(move || {
			// the command may exit without reading; a broken pipe is fine
			let _ = stdin.write_all(&payload);
		})
	});

	let output = child
		.wait_with_output()
		.map_err(|e| format!("wait failed: {}", e))?;
	if let Some(feeder) = feeder {
		let _ = feeder.join();
	}

	if output.status.success() {
		Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
	} else {
		let stderr = String::from_utf8_lossy(&output.stderr);
		let status = match output.status.code() {
			Some(code) => format!("exit {}", code),
			None => "killed by signal".to_string(),
		};
		Err(format!("{}: {}", status, stderr.trim()))
	}
}
