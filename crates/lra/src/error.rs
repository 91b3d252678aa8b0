//! Error types

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Invalid construction input, reported by the connection builder
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Host is empty
    #[error("Host must not be empty")]
    EmptyHost,
    /// Host contains characters that cannot appear in an authority
    #[error("Invalid host: {0}")]
    InvalidHost(String),
    /// Port is outside the usable TCP range
    #[error("Invalid port: {0}")]
    InvalidPort(u16),
    /// Timeout is zero
    #[error("Timeout must be greater than zero")]
    InvalidTimeout,
    /// Composed base URL does not parse
    #[error("Invalid base URL {url}: {source}")]
    InvalidUrl {
        /// Offending URL (without credentials)
        url: String,
        /// Parser diagnostic
        #[source]
        source: url::ParseError,
    },
    /// Proxy address is malformed or does not match the proxy kind
    #[error("Invalid proxy: {0}")]
    InvalidProxy(String),
    /// Header name or value is not valid HTTP
    #[error("Invalid header: {0}")]
    InvalidHeader(String),
    /// Transport client could not be constructed
    #[error("Client build error: {0}")]
    Client(String),
}

/// Failure to complete the round trip at the network level
#[derive(Debug, Error)]
pub enum TransportError {
    /// Deadline exceeded before a complete response arrived
    #[error("Request timeout: {0}")]
    Timeout(#[source] BoxError),
    /// DNS, connect, TLS handshake or proxy failure
    #[error("Connection error: {0}")]
    Connect(#[source] BoxError),
    /// Any other failure while sending the request or reading the response
    #[error("Request error: {0}")]
    Request(#[source] BoxError),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TransportError::Timeout(Box::new(err))
        } else if err.is_connect() {
            TransportError::Connect(Box::new(err))
        } else {
            TransportError::Request(Box::new(err))
        }
    }
}

impl TransportError {
    /// True when the request ran past its deadline
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout(_))
    }
}

/// Errors returned by request operations
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Network level failure
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Server answered with status 400 or above
    #[error("{status_line}")]
    Status {
        /// Numeric status code
        status: u16,
        /// Status line text, e.g. `404 Not Found`
        status_line: String,
        /// Buffered response body, never returned as a success value
        body: Vec<u8>,
    },
    /// Response body is not valid JSON for the requested type
    #[error(transparent)]
    Decode(#[from] serde_json::Error),
}

impl Error {
    /// Status code of a [`Error::Status`]
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Body attached to a [`Error::Status`]
    pub fn status_body(&self) -> Option<&[u8]> {
        match self {
            Error::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}
