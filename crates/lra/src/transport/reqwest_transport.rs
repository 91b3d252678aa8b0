//! reqwest-based transport

use async_trait::async_trait;
use reqwest::Method;

use super::connect::ConnectClient;
use super::{Transport, TransportOptions, TransportRequest, TransportResponse};
use crate::error::{ConfigError, TransportError};

/// [`Transport`] backed by a `reqwest::Client`.
///
/// CONNECT requests bypass reqwest, which would send them in authority-form,
/// and go through a hyper connection with the same proxy and TLS settings.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    inner: reqwest::Client,
    connect: ConnectClient,
}

impl ReqwestTransport {
    /// Build a client honouring the proxy, TLS trust and timeout settings
    pub fn new(options: &TransportOptions) -> Result<Self, ConfigError> {
        let mut builder = reqwest::Client::builder()
            .danger_accept_invalid_certs(!options.validate_ssl)
            .timeout(options.timeout);

        builder = match &options.proxy {
            Some(proxy) => {
                let proxy = reqwest::Proxy::all(proxy.url().as_str())
                    .map_err(|e| ConfigError::InvalidProxy(e.to_string()))?;
                builder.proxy(proxy)
            }
            None => builder.no_proxy(),
        };

        let client = builder
            .build()
            .map_err(|e| ConfigError::Client(e.to_string()))?;
        Ok(Self {
            inner: client,
            connect: ConnectClient::new(options)?,
        })
    }

    /// Wrap an existing `reqwest::Client`.
    ///
    /// `options` only configure CONNECT requests; everything else uses the
    /// client as built.
    pub fn from_reqwest(
        client: reqwest::Client,
        options: &TransportOptions,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            inner: client,
            connect: ConnectClient::new(options)?,
        })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        request: TransportRequest,
    ) -> Result<TransportResponse, TransportError> {
        if request.method == Method::CONNECT {
            return self.connect.execute(request).await;
        }

        let mut builder = self
            .inner
            .request(request.method, &request.url)
            .headers(request.headers)
            .timeout(request.timeout);

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
