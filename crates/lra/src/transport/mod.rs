//! Transport seam
//!
//! The connection hands a fully prepared request to a [`Transport`] and gets
//! back the status, headers and buffered body. Proxy, TLS trust and the
//! client-wide timeout are bound when the transport is constructed from
//! [`TransportOptions`].

mod connect;
mod reqwest_transport;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};

use crate::error::TransportError;
use crate::proxy::ProxyConfig;

pub use reqwest_transport::ReqwestTransport;

/// Client-level settings a transport is built with
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Proxy to route through, `None` for a direct connection
    pub proxy: Option<ProxyConfig>,
    /// Verify certificate chain and hostname on https
    pub validate_ssl: bool,
    /// Deadline applied to every request
    pub timeout: Duration,
}

/// A single request, ready to send
#[derive(Debug, Clone)]
pub struct TransportRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute target URL
    pub url: String,
    /// Headers to send
    pub headers: HeaderMap,
    /// Request body
    pub body: Option<Vec<u8>>,
    /// Deadline for this request
    pub timeout: Duration,
}

/// A complete, buffered response
#[derive(Debug, Clone)]
pub struct TransportResponse {
    /// Status code
    pub status: StatusCode,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body, empty for HEAD
    pub body: Vec<u8>,
}

/// Performs one HTTP round trip
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Send `request` and buffer the whole response
    async fn execute(&self, request: TransportRequest)
        -> Result<TransportResponse, TransportError>;
}
