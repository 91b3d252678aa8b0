//! Request execution and outcome classification

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::instrument;

use crate::connection::{to_header_map, Connection, HeaderList};
use crate::error::Error;
use crate::response::{head_body, status_line, Response};
use crate::transport::TransportRequest;

impl Connection {
    /// Issue `method` against `base_url + endpoint` and return the body.
    ///
    /// Status 400 and above is an [`Error::Status`]. For HEAD the returned
    /// bytes are the response headers as JSON.
    pub async fn call(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&[u8]>,
    ) -> Response<Vec<u8>> {
        self.execute(method, endpoint, None, body).await
    }

    /// Like [`Connection::call`], with `headers` merged over the default
    /// headers for this request only
    pub async fn call_with_headers(
        &self,
        method: Method,
        endpoint: &str,
        headers: &HeaderList,
        body: Option<&[u8]>,
    ) -> Response<Vec<u8>> {
        let extra = to_header_map(headers)?;
        self.execute(method, endpoint, Some(extra), body).await
    }

    /// Issue `method` and decode the response body as JSON.
    ///
    /// Nothing is decoded when the status is 400 or above.
    pub async fn call_json<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&[u8]>,
    ) -> Response<T> {
        let bytes = self.call(method, endpoint, body).await?;
        decode(&bytes)
    }

    /// Like [`Connection::call_json`], with per-request headers
    pub async fn call_json_with_headers<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        headers: &HeaderList,
        body: Option<&[u8]>,
    ) -> Response<T> {
        let bytes = self
            .call_with_headers(method, endpoint, headers, body)
            .await?;
        decode(&bytes)
    }

    // === Verbs without a body ===

    /// GET request returning the raw body
    pub async fn get(&self, endpoint: &str) -> Response<Vec<u8>> {
        self.call(Method::GET, endpoint, None).await
    }

    /// GET request, body decoded as JSON
    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Response<T> {
        self.call_json(Method::GET, endpoint, None).await
    }

    /// HEAD request returning the response headers as JSON bytes
    pub async fn head(&self, endpoint: &str) -> Response<Vec<u8>> {
        self.call(Method::HEAD, endpoint, None).await
    }

    /// HEAD request, response headers decoded into `T`
    pub async fn head_json<T: DeserializeOwned>(&self, endpoint: &str) -> Response<T> {
        self.call_json(Method::HEAD, endpoint, None).await
    }

    /// OPTIONS request returning the raw body
    pub async fn options(&self, endpoint: &str) -> Response<Vec<u8>> {
        self.call(Method::OPTIONS, endpoint, None).await
    }

    /// OPTIONS request, body decoded as JSON
    pub async fn options_json<T: DeserializeOwned>(&self, endpoint: &str) -> Response<T> {
        self.call_json(Method::OPTIONS, endpoint, None).await
    }

    /// TRACE request returning the raw body
    pub async fn trace(&self, endpoint: &str) -> Response<Vec<u8>> {
        self.call(Method::TRACE, endpoint, None).await
    }

    /// TRACE request, body decoded as JSON
    pub async fn trace_json<T: DeserializeOwned>(&self, endpoint: &str) -> Response<T> {
        self.call_json(Method::TRACE, endpoint, None).await
    }

    // === Verbs with an optional body ===

    /// POST request returning the raw body
    pub async fn post(&self, endpoint: &str, body: Option<&[u8]>) -> Response<Vec<u8>> {
        self.call(Method::POST, endpoint, body).await
    }

    /// POST request, body decoded as JSON
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Option<&[u8]>,
    ) -> Response<T> {
        self.call_json(Method::POST, endpoint, body).await
    }

    /// PUT request returning the raw body
    pub async fn put(&self, endpoint: &str, body: Option<&[u8]>) -> Response<Vec<u8>> {
        self.call(Method::PUT, endpoint, body).await
    }

    /// PUT request, body decoded as JSON
    pub async fn put_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Option<&[u8]>,
    ) -> Response<T> {
        self.call_json(Method::PUT, endpoint, body).await
    }

    /// PATCH request returning the raw body
    pub async fn patch(&self, endpoint: &str, body: Option<&[u8]>) -> Response<Vec<u8>> {
        self.call(Method::PATCH, endpoint, body).await
    }

    /// PATCH request, body decoded as JSON
    pub async fn patch_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Option<&[u8]>,
    ) -> Response<T> {
        self.call_json(Method::PATCH, endpoint, body).await
    }

    /// DELETE request returning the raw body
    pub async fn delete(&self, endpoint: &str, body: Option<&[u8]>) -> Response<Vec<u8>> {
        self.call(Method::DELETE, endpoint, body).await
    }

    /// DELETE request, body decoded as JSON
    pub async fn delete_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Option<&[u8]>,
    ) -> Response<T> {
        self.call_json(Method::DELETE, endpoint, body).await
    }

    /// CONNECT request returning the raw body
    pub async fn connect(&self, endpoint: &str, body: Option<&[u8]>) -> Response<Vec<u8>> {
        self.call(Method::CONNECT, endpoint, body).await
    }

    /// CONNECT request, body decoded as JSON
    pub async fn connect_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: Option<&[u8]>,
    ) -> Response<T> {
        self.call_json(Method::CONNECT, endpoint, body).await
    }

    #[instrument(skip(self, extra_headers, body), fields(base_url = %self.request_url("")))]
    async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        extra_headers: Option<HeaderMap>,
        body: Option<&[u8]>,
    ) -> Response<Vec<u8>> {
        let is_head = method == Method::HEAD;

        let mut headers = self.header_map().clone();
        if body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        if let Some(extra) = extra_headers {
            for (name, value) in &extra {
                headers.insert(name.clone(), value.clone());
            }
        }

        let request = TransportRequest {
            method,
            url: self.request_url(endpoint),
            headers,
            body: body.map(<[u8]>::to_vec),
            timeout: self.timeout(),
        };

        let response = self.transport().execute(request).await?;
        let status = response.status;
        tracing::debug!(
            status = status.as_u16(),
            bytes = response.body.len(),
            "Received response"
        );

        if status.as_u16() >= 400 {
            return Err(Error::Status {
                status: status.as_u16(),
                status_line: status_line(status),
                body: response.body,
            });
        }

        if is_head {
            return head_body(&response.headers);
        }
        Ok(response.body)
    }
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Response<T> {
    serde_json::from_slice(bytes).map_err(|err| {
        tracing::debug!("Response body is not valid JSON: {}", err);
        Error::Decode(err)
    })
}
