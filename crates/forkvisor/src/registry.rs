use std::collections::{BTreeMap, BTreeSet};

pub use gearbox::Handler;

use crate::error::RegistryError;

/// Source of job types to supervise and the handlers that run them.
///
/// `resolve_handler` is called inside the forked worker, after the child has
/// split from the supervisor.
pub trait JobRegistry: Send + Sync {
	fn job_names(&self) -> BTreeSet<String>;
	fn resolve_handler(&self, job_name: &str) -> Result<Handler, RegistryError>;
}

/// Registry backed by a fixed map of handlers.
#[derive(Default, Clone)]
pub struct StaticRegistry {
	handlers: BTreeMap<String, Handler>,
}

impl StaticRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_job(mut self, name: impl Into<String>, handler: Handler) -> Self {
		self.register(name, handler);
		self
	}

	pub fn register(&mut self, name: impl Into<String>, handler: Handler) {
		self.handlers.insert(name.into(), handler);
	}
}

impl JobRegistry for StaticRegistry {
	fn job_names(&self) -> BTreeSet<String> {
		self.handlers.keys().cloned().collect()
	}

	fn resolve_handler(&self, job_name: &str) -> Result<Handler, RegistryError> {
		self.handlers
			.get(job_name)
			.cloned()
			.ok_or_else(|| RegistryError::NotFound(job_name.to_string()))
	}
}
