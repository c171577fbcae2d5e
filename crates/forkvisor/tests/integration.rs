use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use forkvisor::worker::{self, EXIT_NO_HANDLER, EXIT_QUEUE_FAILURE};
use forkvisor::*;
use gearbox::{Client, Endpoint, Job, JobState, QueueServer};
use nix::errno::Errno;

// --- Helpers ---

/// Hands out sequential pids and never runs a real child.
struct FakeControl {
	next_pid: AtomicI32,
	forks: AtomicUsize,
	fail_at: Option<usize>,
}

impl FakeControl {
	fn new(first_pid: i32) -> Self {
		Self {
			next_pid: AtomicI32::new(first_pid),
			forks: AtomicUsize::new(0),
			fail_at: None,
		}
	}

	fn failing_at(first_pid: i32, fork_index: usize) -> Self {
		Self {
			fail_at: Some(fork_index),
			..Self::new(first_pid)
		}
	}
}

impl ProcessControl for FakeControl {
	fn watch_exits(&self, _book: Arc<Bookkeeping>) -> io::Result<()> {
		Ok(())
	}

	fn fork(&self) -> Result<Fork, Errno> {
		let n = self.forks.fetch_add(1, Ordering::SeqCst);
		if self.fail_at == Some(n) {
			return Err(Errno::EAGAIN);
		}
		Ok(Fork::Parent {
			child: self.next_pid.fetch_add(1, Ordering::SeqCst),
		})
	}
}

#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl io::Write for Capture {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.0.lock().unwrap().extend_from_slice(buf);
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

impl Capture {
	fn error_lines(&self) -> Vec<String> {
		let bytes = self.0.lock().unwrap().clone();
		String::from_utf8_lossy(&bytes)
			.lines()
			.filter(|l| l.contains(" ERROR "))
			.map(str::to_string)
			.collect()
	}

	fn subscriber(&self) -> impl tracing::Subscriber + Send + Sync {
		let capture = self.clone();
		tracing_subscriber::fmt()
			.with_ansi(false)
			.with_max_level(tracing::Level::DEBUG)
			.with_writer(move || capture.clone())
			.finish()
	}
}

fn noop() -> Handler {
	Arc::new(|_: &Job| Ok(String::new()))
}

fn registry(names: &[&str]) -> Arc<StaticRegistry> {
	let mut registry = StaticRegistry::new();
	for name in names {
		registry.register(*name, noop());
	}
	Arc::new(registry)
}

fn config(poll_interval: Duration) -> SupervisorConfig {
	SupervisorConfig {
		endpoint: Endpoint::new("127.0.0.1", 1),
		poll_interval,
	}
}

fn fake_supervisor(names: &[&str], control: FakeControl) -> Supervisor<FakeControl> {
	Supervisor::with_control(config(Duration::from_secs(60)), registry(names), control)
}

fn pid_of(book: &Bookkeeping, job: &str) -> i32 {
	book.entries()
		.into_iter()
		.find(|e| e.job_name == job)
		.map(|e| e.process_id)
		.unwrap_or_else(|| panic!("no entry for {}", job))
}

fn exit(pid: i32, status: ChildStatus) -> VecDeque<(i32, ChildStatus)> {
	VecDeque::from([(pid, status)])
}

// --- Launching ---

#[test]
fn launches_maintenance_plus_one_worker_per_job() {
	let sup = fake_supervisor(&["twitter", "rss", "facebook"], FakeControl::new(100));
	let names = registry(&["twitter", "rss", "facebook"]).job_names();

	assert_eq!(sup.launch_workers(&names).unwrap(), 4);

	let book = sup.bookkeeping();
	assert_eq!(book.len(), 4);
	let jobs: Vec<String> = book.entries().into_iter().map(|e| e.job_name).collect();
	assert_eq!(jobs, vec![MAINTENANCE_JOB, "facebook", "rss", "twitter"]);
	assert_eq!(book.pending_len(), 0);
}

#[test]
fn reserved_job_name_is_not_launched_twice() {
	let sup = fake_supervisor(&[], FakeControl::new(100));
	let names = registry(&[MAINTENANCE_JOB, "rss"]).job_names();

	assert_eq!(sup.launch_workers(&names).unwrap(), 2);
	assert_eq!(sup.bookkeeping().len(), 2);
}

#[test]
fn empty_registry_aborts_without_forking() {
	let capture = Capture::default();
	let control = FakeControl::new(100);
	let sup = Supervisor::with_control(config(Duration::from_millis(10)), registry(&[]), control);

	let result = tracing::subscriber::with_default(capture.subscriber(), || sup.run());

	assert!(matches!(result, Err(SupervisorError::EmptyRegistry)));
	assert_eq!(sup.phase(), Phase::Aborted);
	assert!(sup.bookkeeping().is_empty());
	let errors = capture.error_lines();
	assert_eq!(errors.len(), 1);
	assert!(errors[0].contains("no job types registered"));
}

#[test]
fn fork_failure_aborts_launching() {
	let capture = Capture::default();
	// fork #0 is the maintenance worker, #1 "rss", #2 "twitter"
	let sup = fake_supervisor(&["twitter", "rss"], FakeControl::failing_at(100, 2));

	let result = tracing::subscriber::with_default(capture.subscriber(), || sup.run());

	match result {
		Err(SupervisorError::Fork { job, source }) => {
			assert_eq!(job, "twitter");
			assert_eq!(source, Errno::EAGAIN);
		}
		other => panic!("expected fork failure, got {:?}", other),
	}
	assert_eq!(sup.phase(), Phase::Aborted);
	assert_eq!(sup.bookkeeping().len(), 2);
	let errors = capture.error_lines();
	assert_eq!(errors.len(), 1);
	assert!(errors[0].contains("twitter"), "{}", errors[0]);
}

// --- Reconciling exits ---

#[test]
fn clean_exit_is_silent() {
	let capture = Capture::default();
	let sup = fake_supervisor(&["rss"], FakeControl::new(300));

	tracing::subscriber::with_default(capture.subscriber(), || {
		let pid = sup.launch_worker("rss", None).unwrap();
		let book = sup.bookkeeping();
		assert_eq!(book.drain(&mut exit(pid, ChildStatus::Exited(0))), 1);
		assert!(!book.is_tracked(pid));
	});

	assert!(capture.error_lines().is_empty());
}

#[test]
fn dirty_exit_logs_pid_and_code_once() {
	let capture = Capture::default();
	let sup = fake_supervisor(&["twitter"], FakeControl::new(400));

	tracing::subscriber::with_default(capture.subscriber(), || {
		let pid = sup.launch_worker("twitter", None).unwrap();
		sup.bookkeeping().drain(&mut exit(pid, ChildStatus::Exited(7)));
		assert!(sup.bookkeeping().is_empty());
	});

	let errors = capture.error_lines();
	assert_eq!(errors.len(), 1);
	assert!(errors[0].contains("process 400"), "{}", errors[0]);
	assert!(errors[0].contains("status 7"), "{}", errors[0]);
}

#[test]
fn signal_death_counts_as_failure() {
	let capture = Capture::default();
	let sup = fake_supervisor(&["rss"], FakeControl::new(450));

	tracing::subscriber::with_default(capture.subscriber(), || {
		let pid = sup.launch_worker("rss", None).unwrap();
		sup.bookkeeping().drain(&mut exit(pid, ChildStatus::Signaled(9)));
	});

	let errors = capture.error_lines();
	assert_eq!(errors.len(), 1);
	assert!(errors[0].contains("status 137"), "{}", errors[0]);
}

#[test]
fn exit_before_launch_is_settled_when_recorded() {
	let capture = Capture::default();
	let sup = fake_supervisor(&["rss"], FakeControl::new(500));
	let book = Arc::clone(sup.bookkeeping());

	tracing::subscriber::with_default(capture.subscriber(), || {
		// The next child is reaped before the parent gets to record it.
		assert_eq!(book.handle_exit(500, ChildStatus::Exited(3)), ExitOutcome::Queued);
		assert!(book.is_pending(500));
		assert!(!book.is_tracked(500));
		assert!(capture.error_lines().is_empty());

		assert_eq!(sup.launch_worker("rss", None).unwrap(), 500);

		assert!(!book.is_pending(500));
		assert!(!book.is_tracked(500));
		assert!(book.is_empty());
	});

	let errors = capture.error_lines();
	assert_eq!(errors.len(), 1);
	assert!(errors[0].contains("process 500 (rss) exited with status 3"), "{}", errors[0]);
}

// --- Full run ---

#[test]
fn twitter_and_rss_scenario() {
	let capture = Capture::default();
	let sup = Arc::new(fake_supervisor(&["twitter", "rss"], FakeControl::new(1000)));

	let reaper = {
		let sup = Arc::clone(&sup);
		let capture = capture.clone();
		std::thread::spawn(move || {
			tracing::subscriber::with_default(capture.subscriber(), || {
				let book = sup.bookkeeping();
				let deadline = Instant::now() + Duration::from_secs(10);
				while book.len() < 3 && Instant::now() < deadline {
					std::thread::sleep(Duration::from_millis(5));
				}

				let (maintenance, rss, twitter) = (
					pid_of(book, MAINTENANCE_JOB),
					pid_of(book, "rss"),
					pid_of(book, "twitter"),
				);
				let mut observed = Vec::new();
				for (pid, code) in [(rss, 0), (twitter, 1), (maintenance, 0)] {
					book.drain(&mut exit(pid, ChildStatus::Exited(code)));
					observed.push((book.len(), capture.error_lines().len()));
				}
				(twitter, observed)
			})
		})
	};

	let result = tracing::subscriber::with_default(capture.subscriber(), || sup.run());
	let (twitter, observed) = reaper.join().unwrap();

	assert!(result.is_ok());
	assert_eq!(sup.phase(), Phase::Drained);
	assert_eq!(observed, vec![(2, 0), (1, 1), (0, 1)]);

	let errors = capture.error_lines();
	assert_eq!(errors.len(), 1);
	assert!(errors[0].contains(&format!("process {} (twitter)", twitter)), "{}", errors[0]);
	assert!(errors[0].contains("status 1"), "{}", errors[0]);
}

// --- Worker dispatch loop ---

fn start_queue() -> (tokio::runtime::Runtime, Endpoint) {
	let rt = tokio::runtime::Runtime::new().unwrap();
	let server = rt.block_on(QueueServer::bind("127.0.0.1:0")).unwrap();
	let endpoint = Endpoint::from(server.local_addr().unwrap());
	rt.spawn(server.run());
	(rt, endpoint)
}

#[test]
fn worker_without_handler_exits_with_no_handler_status() {
	let (_rt, endpoint) = start_queue();
	let err = worker::serve("myspace", None, registry(&["rss"]).as_ref(), &endpoint).unwrap_err();
	assert!(matches!(err, WorkerError::Handler(RegistryError::NotFound(ref name)) if name == "myspace"));
	assert_eq!(err.exit_code(), EXIT_NO_HANDLER);
}

#[test]
fn worker_without_queue_exits_with_queue_status() {
	let endpoint = Endpoint::new("127.0.0.1", 1);
	let err = worker::serve("rss", None, registry(&["rss"]).as_ref(), &endpoint).unwrap_err();
	assert!(matches!(err, WorkerError::Queue(_)));
	assert_eq!(err.exit_code(), EXIT_QUEUE_FAILURE);
}

#[test]
fn worker_keeps_dispatching_after_a_failed_job() {
	let (rt, endpoint) = start_queue();
	let capture = Capture::default();

	let mut producer = Client::connect(&endpoint).unwrap();
	let bad = producer.submit("rss", "").unwrap();
	let good = producer.submit("rss", "feed").unwrap();

	let worker_thread = {
		let endpoint = endpoint.clone();
		let capture = capture.clone();
		std::thread::spawn(move || {
			tracing::subscriber::with_default(capture.subscriber(), || {
				let registry = StaticRegistry::new().with_job(
					"rss",
					Arc::new(|job: &Job| {
						if job.payload.is_empty() {
							Err("empty payload".to_string())
						} else {
							Ok(job.payload.to_uppercase())
						}
					}),
				);
				worker::serve("rss", None, &registry, &endpoint).unwrap_err()
			})
		})
	};

	let deadline = Instant::now() + Duration::from_secs(10);
	loop {
		let states = (producer.status(&bad).unwrap(), producer.status(&good).unwrap());
		if states.0.is_finished() && states.1.is_finished() {
			assert_eq!(states.0, JobState::Failed { error: "empty payload".into() });
			assert_eq!(states.1, JobState::Complete { result: "FEED".into() });
			break;
		}
		assert!(Instant::now() < deadline, "jobs never finished: {:?}", states);
		std::thread::sleep(Duration::from_millis(20));
	}

	rt.shutdown_timeout(Duration::from_millis(100));
	let err = worker_thread.join().unwrap();
	assert!(matches!(err, WorkerError::ConnectionLost(_)));
	assert_eq!(err.exit_code(), EXIT_QUEUE_FAILURE);

	let errors = capture.error_lines();
	assert_eq!(errors.len(), 1);
	assert!(errors[0].contains("rss worker returned an error: empty payload"), "{}", errors[0]);
}

#[test]
fn maintenance_worker_uses_builtin_handler() {
	let (rt, endpoint) = start_queue();

	let mut producer = Client::connect(&endpoint).unwrap();
	let notice = producer
		.submit(MAINTENANCE_JOB, r#"{"channel":"rss","task":"H:77"}"#)
		.unwrap();

	let worker_thread = {
		let endpoint = endpoint.clone();
		std::thread::spawn(move || {
			worker::serve(
				MAINTENANCE_JOB,
				Some(maintenance::handler()),
				registry(&[]).as_ref(),
				&endpoint,
			)
			.unwrap_err()
		})
	};

	let deadline = Instant::now() + Duration::from_secs(10);
	let state = loop {
		let state = producer.status(&notice).unwrap();
		if state.is_finished() || Instant::now() > deadline {
			break state;
		}
		std::thread::sleep(Duration::from_millis(20));
	};
	assert_eq!(state, JobState::Complete { result: "H:77".into() });

	rt.shutdown_timeout(Duration::from_millis(100));
	assert!(matches!(worker_thread.join().unwrap(), WorkerError::ConnectionLost(_)));
}
