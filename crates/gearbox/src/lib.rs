//! # gearbox
//!
//! Job-queue toolkit for worker processes.
//!
//! A [`Worker`] connects to a queue server, registers named functions and
//! blocks in [`Worker::work`] until a job arrives. A [`Client`] submits jobs
//! and polls their state. [`QueueServer`] is a small in-memory broker that
//! speaks the same line-delimited JSON protocol, for local runs and tests.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use gearbox::{Endpoint, ReturnCode, Worker};
//!
//! let mut worker = Worker::new();
//! worker.add_server(&Endpoint::default()).unwrap();
//! worker
//!     .add_function("reverse", Arc::new(|job: &gearbox::Job| {
//!         Ok(job.payload.chars().rev().collect())
//!     }))
//!     .unwrap();
//!
//! while worker.work() {
//!     if let ReturnCode::Error(detail) = worker.return_code() {
//!         eprintln!("job failed: {}", detail);
//!     }
//! }
//! ```

pub mod endpoint;
pub mod protocol;
pub mod client;
pub mod worker;
pub mod server;

pub use endpoint::{Endpoint, EndpointError};
pub use protocol::{Job, JobState, Request, Response};
pub use client::{Client, ClientError};
pub use worker::{Handler, ReturnCode, Worker};
pub use server::QueueServer;
