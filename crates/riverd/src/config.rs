use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use forkvisor::SupervisorConfig;
use gearbox::Endpoint;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
	#[error("failed to read {path}: {source}")]
	Read {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},
	#[error("failed to parse {path}: {source}")]
	Parse {
		path: PathBuf,
		#[source]
		source: toml::de::Error,
	},
	#[error("invalid RIVERD_QUEUE: {0}")]
	QueueOverride(#[from] gearbox::EndpointError),
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GlobalConfig {
	#[serde(default)]
	pub queue: QueueConfig,
	#[serde(default)]
	pub supervisor: SupervisorSection,
	#[serde(default)]
	pub channels: BTreeMap<String, ChannelConfig>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct QueueConfig {
	#[serde(default)]
	pub endpoint: Endpoint,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SupervisorSection {
	#[serde(default = "default_poll_interval")]
	pub poll_interval_secs: u64,
}

impl Default for SupervisorSection {
	fn default() -> Self {
		Self {
			poll_interval_secs: default_poll_interval(),
		}
	}
}

fn default_poll_interval() -> u64 {
	forkvisor::supervisor::DEFAULT_POLL_INTERVAL.as_secs()
}

/// One job type, served by a shell command.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelConfig {
	pub command: String,
	#[serde(default)]
	pub env: BTreeMap<String, String>,
	#[serde(default = "default_true")]
	pub enabled: bool,
}

fn default_true() -> bool {
	true
}

impl GlobalConfig {
	pub fn supervisor_config(&self) -> SupervisorConfig {
		SupervisorConfig {
			endpoint: self.queue.endpoint.clone(),
			// zero would turn the wait into a spin
			poll_interval: Duration::from_secs(self.supervisor.poll_interval_secs.max(1)),
		}
	}
}

pub fn config_path() -> PathBuf {
	resolve_config_path(|key| std::env::var(key).ok())
}

fn resolve_config_path(var: impl Fn(&str) -> Option<String>) -> PathBuf {
	if let Some(path) = var("RIVERD_CONFIG").filter(|p| !p.is_empty()) {
		return PathBuf::from(path);
	}
	let dir = if let Some(dir) = var("XDG_CONFIG_HOME").filter(|d| !d.is_empty()) {
		PathBuf::from(dir).join("riverd")
	} else if let Some(home) = var("HOME") {
		PathBuf::from(home).join(".config").join("riverd")
	} else {
		PathBuf::from("/tmp/riverd/config")
	};
	dir.join("config.toml")
}

/// Read the config file at `path`. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<GlobalConfig, ConfigError> {
	let content = match std::fs::read_to_string(path) {
		Ok(content) => content,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
			tracing::debug!("no config at {}, using defaults", path.display());
			return Ok(GlobalConfig::default());
		}
		Err(source) => {
			return Err(ConfigError::Read {
				path: path.to_path_buf(),
				source,
			})
		}
	};
	parse_config(&content).map_err(|source| ConfigError::Parse {
		path: path.to_path_buf(),
		source,
	})
}

pub fn parse_config(content: &str) -> Result<GlobalConfig, toml::de::Error> {
	toml::from_str(content)
}

/// Apply `RIVERD_QUEUE`, if set, over the configured endpoint.
pub fn apply_env(config: &mut GlobalConfig) -> Result<(), ConfigError> {
	if let Ok(endpoint) = std::env::var("RIVERD_QUEUE") {
		config.queue.endpoint = endpoint.parse()?;
	}
	Ok(())
}
