//! REST connection abstraction
//!
//! A [`Connection`] is built once from connection parameters (scheme, host,
//! port, base path, credentials, proxy, TLS trust, default headers and
//! timeout) and then used to issue requests against its base URL. Every
//! HTTP verb is available in two forms: a raw form returning the buffered
//! response body and a JSON form decoding that body into a caller type.
//!
//! The network round trip is delegated to a [`Transport`]. The default one,
//! [`ReqwestTransport`], is built from the connection's proxy and TLS
//! settings; another implementation can be injected through
//! [`ConnectionBuilder::transport`].
//!
//! # Example
//!
//! ```no_run
//! use lra::{Connection, JsonObject};
//!
//! async fn example() -> lra::Response<()> {
//!     let connection = Connection::builder()
//!         .ssl(true)
//!         .host("api.example.com")
//!         .base_path("/v1")
//!         .header("x-api-key", "secret")
//!         .build()?;
//!
//!     let status: JsonObject = connection.get_json("/status?verbose=true").await?;
//!     println!("{:?}", status.get("version"));
//!
//!     let created = connection
//!         .post("/items", Some(br#"{"name":"widget"}"#.as_slice()))
//!         .await?;
//!     println!("{}", String::from_utf8_lossy(&created));
//!     Ok(())
//! }
//! ```

mod connection;
mod error;
mod executor;
mod proxy;
mod response;
mod settings;
mod transport;

pub use connection::{Connection, ConnectionBuilder, HeaderList, Protocol, DEFAULT_TIMEOUT};
pub use error::{ConfigError, Error, TransportError};
pub use proxy::{ProxyConfig, ProxyKind};
pub use response::{canonical_header_key, header_representation, status_line, JsonObject, Response};
pub use settings::ConnectionSettings;
pub use transport::{
    ReqwestTransport, Transport, TransportOptions, TransportRequest, TransportResponse,
};

/// HTTP types used at the transport seam
pub use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
pub use reqwest::{Method, StatusCode};
