use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 4730;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum EndpointError {
	#[error("empty endpoint")]
	Empty,
	#[error("invalid port in endpoint {0:?}")]
	InvalidPort(String),
}

/// Address of a job-queue server, written as `host` or `host:port`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
	pub host: String,
	pub port: u16,
}

impl Endpoint {
	pub fn new(host: impl Into<String>, port: u16) -> Self {
		Self {
			host: host.into(),
			port,
		}
	}
}

impl Default for Endpoint {
	fn default() -> Self {
		Self::new(DEFAULT_HOST, DEFAULT_PORT)
	}
}

impl fmt::Display for Endpoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}:{}", self.host, self.port)
	}
}

impl FromStr for Endpoint {
	type Err = EndpointError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		if s.is_empty() {
			return Err(EndpointError::Empty);
		}
		match s.rsplit_once(':') {
			Some((host, port)) => {
				let port = port
					.parse::<u16>()
					.map_err(|_| EndpointError::InvalidPort(s.to_string()))?;
				let host = if host.is_empty() { DEFAULT_HOST } else { host };
				Ok(Self::new(host, port))
			}
			None => Ok(Self::new(s, DEFAULT_PORT)),
		}
	}
}

impl TryFrom<String> for Endpoint {
	type Error = EndpointError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl From<Endpoint> for String {
	fn from(endpoint: Endpoint) -> Self {
		endpoint.to_string()
	}
}

impl From<std::net::SocketAddr> for Endpoint {
	fn from(addr: std::net::SocketAddr) -> Self {
		Self::new(addr.ip().to_string(), addr.port())
	}
}
