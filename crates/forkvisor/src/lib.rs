//! # forkvisor
//!
//! Forking worker supervisor.
//!
//! The [`Supervisor`] forks one OS process per job type reported by a
//! [`JobRegistry`], plus one maintenance worker. Each child registers its job
//! with a gearbox queue server and dispatches jobs until the process dies.
//! The parent keeps a table of live children, reaps them as SIGCHLD arrives
//! and returns from [`Supervisor::run`] once every child is accounted for.
//!
//! Exits can be observed before the parent has recorded the pid of the child
//! that produced them. Those are parked in a pending queue and settled as soon
//! as the launch is recorded; see [`Bookkeeping`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use forkvisor::{StaticRegistry, Supervisor, SupervisorConfig};
//!
//! let registry = StaticRegistry::new()
//!     .with_job("rss", Arc::new(|job: &gearbox::Job| Ok(job.payload.clone())));
//!
//! let supervisor = Supervisor::new(SupervisorConfig::default(), Arc::new(registry));
//! if supervisor.run().is_err() {
//!     std::process::exit(1);
//! }
//! ```

#[cfg(not(unix))]
compile_error!("forkvisor needs fork(2), waitpid(2) and SIGCHLD; only Unix targets are supported");

pub mod types;
pub mod error;
pub mod table;
pub mod bookkeeping;
pub mod registry;
pub mod signals;
pub mod reaper;
pub mod control;
pub mod maintenance;
pub mod worker;
pub mod launcher;
pub mod supervisor;

pub use types::*;
pub use error::{RegistryError, SupervisorError, WorkerError};
pub use table::{PendingSignalQueue, ProcessTable};
pub use bookkeeping::{Bookkeeping, ExitOutcome};
pub use registry::{Handler, JobRegistry, StaticRegistry};
pub use reaper::{ExitSource, WaitpidExits};
pub use control::{Fork, ProcessControl, SystemControl};
pub use maintenance::MAINTENANCE_JOB;
pub use supervisor::{Supervisor, SupervisorConfig};
