use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use gearbox::Endpoint;

use crate::bookkeeping::Bookkeeping;
use crate::control::{ProcessControl, SystemControl};
use crate::error::SupervisorError;
use crate::maintenance::{self, MAINTENANCE_JOB};
use crate::registry::JobRegistry;
use crate::types::Phase;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
	/// Queue server every worker connects to.
	pub endpoint: Endpoint,
	/// Upper bound between checks of the process table while supervising.
	pub poll_interval: Duration,
}

impl Default for SupervisorConfig {
	fn default() -> Self {
		Self {
			endpoint: Endpoint::default(),
			poll_interval: DEFAULT_POLL_INTERVAL,
		}
	}
}

pub struct Supervisor<C: ProcessControl = SystemControl> {
	pub(crate) registry: Arc<dyn JobRegistry>,
	pub(crate) control: C,
	pub(crate) book: Arc<Bookkeeping>,
	pub(crate) config: SupervisorConfig,
	phase: Mutex<Phase>,
}

impl Supervisor<SystemControl> {
	pub fn new(config: SupervisorConfig, registry: Arc<dyn JobRegistry>) -> Self {
		Self::with_control(config, registry, SystemControl)
	}
}

impl<C: ProcessControl> Supervisor<C> {
	pub fn with_control(config: SupervisorConfig, registry: Arc<dyn JobRegistry>, control: C) -> Self {
		Self {
			registry,
			control,
			book: Arc::new(Bookkeeping::new()),
			config,
			phase: Mutex::new(Phase::Init),
		}
	}

	pub fn bookkeeping(&self) -> &Arc<Bookkeeping> {
		&self.book
	}

	pub fn config(&self) -> &SupervisorConfig {
		&self.config
	}

	pub fn phase(&self) -> Phase {
		*self.phase.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn set_phase(&self, phase: Phase) {
		*self.phase.lock().unwrap_or_else(PoisonError::into_inner) = phase;
	}

	/// Launch every worker and block until all of them have exited.
	///
	/// Fails without forking when the registry is empty, and stops launching
	/// at the first fork failure. Workers are never restarted.
	pub fn run(&self) -> Result<(), SupervisorError> {
		self.set_phase(Phase::Init);
		let names = self.registry.job_names();
		if names.is_empty() {
			tracing::error!("no job types registered");
			self.set_phase(Phase::Aborted);
			return Err(SupervisorError::EmptyRegistry);
		}

		if let Err(e) = self.control.watch_exits(Arc::clone(&self.book)) {
			tracing::error!("could not watch for child exits: {}", e);
			self.set_phase(Phase::Aborted);
			return Err(SupervisorError::Watch(e));
		}

		self.set_phase(Phase::Launching);
		let launched = match self.launch_workers(&names) {
			Ok(n) => n,
			Err(e) => {
				self.set_phase(Phase::Aborted);
				return Err(e);
			}
		};

		tracing::info!("supervising {} workers", launched);
		self.set_phase(Phase::Supervising);
		self.book.wait_until_empty(self.config.poll_interval);

		self.set_phase(Phase::Drained);
		tracing::info!("all workers exited");
		Ok(())
	}

	/// Launch the maintenance worker, then one worker per name.
	/// Returns how many were launched.
	pub fn launch_workers(&self, names: &BTreeSet<String>) -> Result<usize, SupervisorError> {
		self.launch_worker(MAINTENANCE_JOB, Some(maintenance::handler()))?;
		let mut launched = 1;

		for name in names {
			if name == MAINTENANCE_JOB {
				tracing::warn!("job type {} is reserved, skipping registry entry", name);
				continue;
			}
			self.launch_worker(name, None)?;
			launched += 1;
		}
		Ok(launched)
	}
}
