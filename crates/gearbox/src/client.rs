use std::io::{self, BufRead, BufReader, Write};
use std::net::TcpStream;

use crate::endpoint::Endpoint;
use crate::protocol::{JobState, Request, Response};

/// Errors from queue client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
	/// No server has been added yet.
	#[error("not connected to a queue server")]
	NotConnected,
	/// The server could not be reached.
	#[error("could not connect to {endpoint}: {source}")]
	Connect {
		endpoint: Endpoint,
		#[source]
		source: io::Error,
	},
	/// The server closed the connection.
	#[error("connection closed by server")]
	Disconnected,
	#[error("io error: {0}")]
	Io(#[from] io::Error),
	#[error("serialize error: {0}")]
	Serialize(String),
	#[error("deserialize error: {0}")]
	Deserialize(String),
	/// The server answered with an error response.
	#[error("server error: {0}")]
	Server(String),
	#[error("unexpected response: {0}")]
	UnexpectedResponse(String),
}

/// One request/response line pair at a time over a TCP stream.
pub(crate) struct Connection {
	reader: BufReader<TcpStream>,
	writer: TcpStream,
}

impl Connection {
	pub(crate) fn open(endpoint: &Endpoint) -> Result<Self, ClientError> {
		let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port)).map_err(|e| {
			ClientError::Connect {
				endpoint: endpoint.clone(),
				source: e,
			}
		})?;
		stream.set_nodelay(true)?;
		let writer = stream.try_clone()?;
		Ok(Self {
			reader: BufReader::new(stream),
			writer,
		})
	}

	pub(crate) fn send(&mut self, request: &Request) -> Result<Response, ClientError> {
		let mut data =
			serde_json::to_vec(request).map_err(|e| ClientError::Serialize(e.to_string()))?;
		data.push(b'\n');
		self.writer.write_all(&data)?;

		let mut line = String::new();
		if self.reader.read_line(&mut line)? == 0 {
			return Err(ClientError::Disconnected);
		}

		match serde_json::from_str(&line).map_err(|e| ClientError::Deserialize(e.to_string()))? {
			Response::Error { message } => Err(ClientError::Server(message)),
			resp => Ok(resp),
		}
	}
}

/// Synchronous producer-side client: submit jobs and poll their state.
pub struct Client {
	conn: Connection,
}

impl Client {
	pub fn connect(endpoint: &Endpoint) -> Result<Self, ClientError> {
		Ok(Self {
			conn: Connection::open(endpoint)?,
		})
	}

	/// Queue a job for `function`, returning its handle.
	pub fn submit(&mut self, function: &str, payload: &str) -> Result<String, ClientError> {
		let request = Request::Submit {
			function: function.to_string(),
			payload: payload.to_string(),
		};
		match self.conn.send(&request)? {
			Response::JobCreated { handle } => Ok(handle),
			other => Err(ClientError::UnexpectedResponse(format!("{:?}", other))),
		}
	}

	pub fn status(&mut self, handle: &str) -> Result<JobState, ClientError> {
		let request = Request::Status {
			handle: handle.to_string(),
		};
		match self.conn.send(&request)? {
			Response::JobStatus { state, .. } => Ok(state),
			other => Err(ClientError::UnexpectedResponse(format!("{:?}", other))),
		}
	}

	pub fn ping(&mut self) -> Result<(), ClientError> {
		match self.conn.send(&Request::Ping)? {
			Response::Pong => Ok(()),
			other => Err(ClientError::UnexpectedResponse(format!("{:?}", other))),
		}
	}
}

/// Check whether a queue server is accepting connections at `endpoint`.
pub fn is_reachable(endpoint: &Endpoint) -> bool {
	Client::connect(endpoint).and_then(|mut c| c.ping()).is_ok()
}
