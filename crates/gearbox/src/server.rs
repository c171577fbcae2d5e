use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tokio::sync::{Mutex, Notify};

use crate::protocol::{Job, JobState, Request, Response};

/// In-memory job queue speaking the gearbox line protocol.
///
/// One FIFO per function name. A job handed to a worker whose connection
/// goes away before it reports back is put back at the front of its queue.
pub struct QueueServer {
	listener: TcpListener,
	broker: Arc<Broker>,
}

#[derive(Default)]
struct Broker {
	state: Mutex<BrokerState>,
	available: Notify,
}

#[derive(Default)]
struct BrokerState {
	queues: HashMap<String, VecDeque<Job>>,
	jobs: HashMap<String, JobState>,
	next_handle: u64,
}

impl QueueServer {
	pub async fn bind(addr: impl ToSocketAddrs) -> std::io::Result<Self> {
		let listener = TcpListener::bind(addr).await?;
		Ok(Self {
			listener,
			broker: Arc::new(Broker::default()),
		})
	}

	pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
		self.listener.local_addr()
	}

	pub async fn run(self) {
		match self.listener.local_addr() {
			Ok(addr) => tracing::info!("queue listening on {}", addr),
			Err(e) => tracing::warn!("queue listening on unknown address: {}", e),
		}

		loop {
			let (stream, peer) = match self.listener.accept().await {
				Ok(s) => s,
				Err(e) => {
					tracing::error!("accept error: {}", e);
					continue;
				}
			};

			let broker = Arc::clone(&self.broker);
			tokio::spawn(async move {
				handle_connection(stream, broker).await;
				tracing::debug!("connection from {} closed", peer);
			});
		}
	}
}

impl Broker {
	async fn submit(&self, function: String, payload: String) -> String {
		let handle = {
			let mut state = self.state.lock().await;
			state.next_handle += 1;
			let handle = format!("H:{}", state.next_handle);
			state.jobs.insert(handle.clone(), JobState::Queued);
			state.queues.entry(function.clone()).or_default().push_back(Job {
				handle: handle.clone(),
				function,
				payload,
			});
			handle
		};
		self.available.notify_waiters();
		handle
	}

	async fn take(&self, functions: &[String]) -> Option<Job> {
		let mut state = self.state.lock().await;
		let job = functions
			.iter()
			.find_map(|f| state.queues.get_mut(f).and_then(VecDeque::pop_front))?;
		state.jobs.insert(job.handle.clone(), JobState::Running);
		Some(job)
	}

	/// Block until a job for one of `functions` is queued.
	async fn grab(&self, functions: &[String]) -> Job {
		loop {
			let notified = self.available.notified();
			if let Some(job) = self.take(functions).await {
				return job;
			}
			notified.await;
		}
	}

	async fn requeue(&self, job: Job) {
		{
			let mut state = self.state.lock().await;
			state.jobs.insert(job.handle.clone(), JobState::Queued);
			state.queues.entry(job.function.clone()).or_default().push_front(job);
		}
		self.available.notify_waiters();
	}

	async fn finish(&self, handle: &str, state: JobState) {
		self.state.lock().await.jobs.insert(handle.to_string(), state);
	}

	async fn status(&self, handle: &str) -> Option<JobState> {
		self.state.lock().await.jobs.get(handle).cloned()
	}
}

async fn handle_connection(stream: TcpStream, broker: Arc<Broker>) {
	let (reader, mut writer) = stream.into_split();
	let mut lines = BufReader::new(reader).lines();
	let mut functions: Vec<String> = Vec::new();
	let mut assigned: Option<Job> = None;

	while let Ok(Some(line)) = lines.next_line().await {
		let request: Request = match serde_json::from_str(&line) {
			Ok(r) => r,
			Err(e) => {
				let resp = Response::Error {
					message: format!("invalid request: {}", e),
				};
				if write_response(&mut writer, &resp).await.is_err() {
					break;
				}
				continue;
			}
		};

		let response = match request {
			Request::Ping => Response::Pong,
			Request::CanDo { function } => {
				if !functions.contains(&function) {
					functions.push(function);
				}
				Response::Ok
			}
			Request::Submit { function, payload } => Response::JobCreated {
				handle: broker.submit(function, payload).await,
			},
			Request::Status { handle } => match broker.status(&handle).await {
				Some(state) => Response::JobStatus { handle, state },
				None => Response::Error {
					message: format!("unknown job handle {}", handle),
				},
			},
			Request::GrabJob => {
				if functions.is_empty() {
					Response::Error {
						message: "no functions registered".to_string(),
					}
				} else {
					let job = broker.grab(&functions).await;
					assigned = Some(job.clone());
					Response::JobAssign { job }
				}
			}
			Request::WorkComplete { handle, result } => {
				report(&broker, &mut assigned, handle, JobState::Complete { result }).await
			}
			Request::WorkFail { handle, error } => {
				report(&broker, &mut assigned, handle, JobState::Failed { error }).await
			}
		};

		if write_response(&mut writer, &response).await.is_err() {
			break;
		}
	}

	if let Some(job) = assigned.take() {
		tracing::warn!("worker dropped {} ({}), requeueing", job.handle, job.function);
		broker.requeue(job).await;
	}
}

async fn report(
	broker: &Broker,
	assigned: &mut Option<Job>,
	handle: String,
	state: JobState,
) -> Response {
	match assigned.take() {
		Some(job) if job.handle == handle => {
			broker.finish(&handle, state).await;
			Response::Ok
		}
		other => {
			*assigned = other;
			Response::Error {
				message: format!("job {} is not assigned to this worker", handle),
			}
		}
	}
}

async fn write_response(writer: &mut OwnedWriteHalf, response: &Response) -> std::io::Result<()> {
	let mut data = serde_json::to_vec(response)
		.map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
	data.push(b'\n');
	writer.write_all(&data).await
}
