//! Connection configuration and base URL composition

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use url::Url;

use crate::error::ConfigError;
use crate::proxy::{ProxyConfig, ProxyKind};
use crate::transport::{ReqwestTransport, Transport, TransportOptions};

/// Default headers sent with every request, name to value
pub type HeaderList = BTreeMap<String, String>;

/// Default request deadline
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// URL scheme of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    /// Plain HTTP
    Http,
    /// HTTP over TLS
    Https,
}

impl Protocol {
    /// `Https` when `ssl` is set
    pub fn from_ssl(ssl: bool) -> Self {
        if ssl {
            Protocol::Https
        } else {
            Protocol::Http
        }
    }

    /// Scheme string
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    /// Well-known port of the scheme
    pub fn default_port(&self) -> u16 {
        match self {
            Protocol::Http => 80,
            Protocol::Https => 443,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable connection to a REST endpoint.
///
/// Holds the composed base URL and the defaults applied to every request.
/// Cloning is cheap; clones share the transport and nothing mutable.
#[derive(Clone)]
pub struct Connection {
    protocol: Protocol,
    server: String,
    port: u16,
    base_endpoint: String,
    base_url: String,
    request_root: String,
    user: String,
    password: String,
    validate_ssl: bool,
    proxy: String,
    proxy_is_socks: bool,
    send_headers: HeaderList,
    header_map: HeaderMap,
    timeout: Duration,
    transport: Arc<dyn Transport>,
}

impl Connection {
    /// Build a connection from positional parameters.
    ///
    /// `user`/`password` are only used when both are non-empty; an empty
    /// `proxy` means a direct connection and `proxy_is_socks` is then
    /// ignored. Nothing touches the network here.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ssl: bool,
        host: &str,
        port: u16,
        base_path: &str,
        user: &str,
        password: &str,
        validate_ssl: bool,
        proxy: &str,
        proxy_is_socks: bool,
        headers: HeaderList,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        Self::builder()
            .ssl(ssl)
            .host(host)
            .port(port)
            .base_path(base_path)
            .credentials(user, password)
            .validate_ssl(validate_ssl)
            .proxy(proxy)
            .proxy_is_socks(proxy_is_socks)
            .headers(headers)
            .timeout(timeout)
            .build()
    }

    /// Create a new connection builder
    pub fn builder() -> ConnectionBuilder {
        ConnectionBuilder::default()
    }

    /// URL scheme
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Target host
    pub fn server(&self) -> &str {
        &self.server
    }

    /// Target port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Path prefix prepended to every endpoint
    pub fn base_endpoint(&self) -> &str {
        &self.base_endpoint
    }

    /// `protocol://[user:password@]server:port/baseEndpoint`
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Basic-auth user, empty when unset
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Basic-auth password, empty when unset
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Whether TLS certificates and hostnames are verified
    pub fn validate_ssl(&self) -> bool {
        self.validate_ssl
    }

    /// Proxy address, empty for a direct connection
    pub fn proxy(&self) -> &str {
        &self.proxy
    }

    /// SOCKS5 instead of HTTP proxying; meaningless without a proxy
    pub fn proxy_is_socks(&self) -> bool {
        self.proxy_is_socks
    }

    /// Headers merged into every request
    pub fn send_headers(&self) -> &HeaderList {
        &self.send_headers
    }

    /// Per-request deadline
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub(crate) fn request_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.request_root, endpoint)
    }

    pub(crate) fn header_map(&self) -> &HeaderMap {
        &self.header_map
    }

    pub(crate) fn credentials(&self) -> Option<(&str, &str)> {
        has_credentials(&self.user, &self.password)
            .then_some((self.user.as_str(), self.password.as_str()))
    }

    pub(crate) fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    fn redacted_base_url(&self) -> String {
        if self.credentials().is_some() {
            self.base_url
                .replacen(&format!(":{}@", self.password), ":<redacted>@", 1)
        } else {
            self.base_url.clone()
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password.is_empty() {
            ""
        } else {
            "<redacted>"
        };
        f.debug_struct("Connection")
            .field("protocol", &self.protocol)
            .field("server", &self.server)
            .field("port", &self.port)
            .field("base_endpoint", &self.base_endpoint)
            .field("base_url", &self.redacted_base_url())
            .field("user", &self.user)
            .field("password", &password)
            .field("validate_ssl", &self.validate_ssl)
            .field("proxy", &self.proxy)
            .field("proxy_is_socks", &self.proxy_is_socks)
            .field("send_headers", &self.send_headers)
            .field("timeout", &self.timeout)
            .field("transport", &self.transport)
            .finish()
    }
}

/// Builder for [`Connection`]
pub struct ConnectionBuilder {
    ssl: bool,
    host: String,
    port: Option<u16>,
    base_path: String,
    user: String,
    password: String,
    validate_ssl: bool,
    proxy: String,
    proxy_is_socks: bool,
    headers: HeaderList,
    timeout: Duration,
    transport: Option<Arc<dyn Transport>>,
}

impl fmt::Debug for ConnectionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password.is_empty() {
            ""
        } else {
            "<redacted>"
        };
        f.debug_struct("ConnectionBuilder")
            .field("ssl", &self.ssl)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_path", &self.base_path)
            .field("user", &self.user)
            .field("password", &password)
            .field("validate_ssl", &self.validate_ssl)
            .field("proxy", &self.proxy)
            .field("proxy_is_socks", &self.proxy_is_socks)
            .field("headers", &self.headers)
            .field("timeout", &self.timeout)
            .field("transport", &self.transport)
            .finish()
    }
}

impl Default for ConnectionBuilder {
    fn default() -> Self {
        Self {
            ssl: false,
            host: String::new(),
            port: None,
            base_path: String::new(),
            user: String::new(),
            password: String::new(),
            validate_ssl: true,
            proxy: String::new(),
            proxy_is_socks: false,
            headers: HeaderList::new(),
            timeout: DEFAULT_TIMEOUT,
            transport: None,
        }
    }
}

impl ConnectionBuilder {
    /// Create a new ConnectionBuilder
    pub fn new() -> Self {
        Self::default()
    }

    /// Use https instead of http
    pub fn ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    /// Set the target host
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the target port, defaults to the scheme's well-known port
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the path prefix of every endpoint
    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into();
        self
    }

    /// Set basic-auth credentials, used only when both are non-empty
    pub fn credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    /// Verify TLS certificates and hostnames (default `true`)
    pub fn validate_ssl(mut self, validate_ssl: bool) -> Self {
        self.validate_ssl = validate_ssl;
        self
    }

    /// Route through a proxy, empty for a direct connection
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = proxy.into();
        self
    }

    /// Treat the proxy as SOCKS5 instead of HTTP
    pub fn proxy_is_socks(mut self, proxy_is_socks: bool) -> Self {
        self.proxy_is_socks = proxy_is_socks;
        self
    }

    /// Add one default header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Replace the default headers
    pub fn headers(mut self, headers: HeaderList) -> Self {
        self.headers = headers;
        self
    }

    /// Set the per-request deadline
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Use a custom transport instead of the reqwest one
    pub fn transport<T: Transport + 'static>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Use a shared custom transport
    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Validate the configuration and build the connection
    pub fn build(self) -> Result<Connection, ConfigError> {
        let protocol = Protocol::from_ssl(self.ssl);

        let server = self.host.trim().to_string();
        validate_host(&server)?;

        let port = self.port.unwrap_or_else(|| protocol.default_port());
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }

        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout);
        }

        let base_endpoint = normalize_base_path(&self.base_path);
        let authority_host = if server.contains(':') && !server.starts_with('[') {
            format!("[{server}]")
        } else {
            server.clone()
        };

        let request_root = format!("{protocol}://{authority_host}:{port}{base_endpoint}");
        let parsed = Url::parse(&request_root).map_err(|source| ConfigError::InvalidUrl {
            url: request_root.clone(),
            source,
        })?;
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(ConfigError::InvalidHost(server));
        }

        let base_url = if has_credentials(&self.user, &self.password) {
            format!(
                "{protocol}://{}:{}@{authority_host}:{port}{base_endpoint}",
                self.user, self.password
            )
        } else {
            request_root.clone()
        };

        let mut header_map = to_header_map(&self.headers)?;
        if has_credentials(&self.user, &self.password) {
            let previous = header_map.insert(
                AUTHORIZATION,
                basic_authorization(&self.user, &self.password)?,
            );
            if previous.is_some() {
                tracing::debug!("Credentials replace the default Authorization header");
            }
        }

        let proxy = if self.proxy.trim().is_empty() {
            None
        } else {
            Some(ProxyConfig::new(
                &self.proxy,
                ProxyKind::from_socks_flag(self.proxy_is_socks),
            )?)
        };

        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let options = TransportOptions {
                    proxy,
                    validate_ssl: self.validate_ssl,
                    timeout: self.timeout,
                };
                Arc::new(ReqwestTransport::new(&options)?) as Arc<dyn Transport>
            }
        };

        tracing::trace!(%protocol, server = %server, port, base_endpoint = %base_endpoint, "Built connection");

        Ok(Connection {
            protocol,
            server,
            port,
            base_endpoint,
            base_url,
            request_root,
            user: self.user,
            password: self.password,
            validate_ssl: self.validate_ssl,
            proxy: self.proxy,
            proxy_is_socks: self.proxy_is_socks,
            send_headers: self.headers,
            header_map,
            timeout: self.timeout,
            transport,
        })
    }
}

fn has_credentials(user: &str, password: &str) -> bool {
    !user.is_empty() && !password.is_empty()
}

fn basic_authorization(user: &str, password: &str) -> Result<HeaderValue, ConfigError> {
    let token = BASE64_STANDARD.encode(format!("{user}:{password}"));
    let mut value = HeaderValue::from_str(&format!("Basic {token}"))
        .map_err(|e| ConfigError::InvalidHeader(format!("Authorization: {e}")))?;
    value.set_sensitive(true);
    Ok(value)
}

fn validate_host(host: &str) -> Result<(), ConfigError> {
    if host.is_empty() {
        return Err(ConfigError::EmptyHost);
    }
    if host
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '@'))
    {
        return Err(ConfigError::InvalidHost(host.to_string()));
    }
    Ok(())
}

fn normalize_base_path(base_path: &str) -> String {
    let base_path = base_path.trim();
    if base_path.is_empty() || base_path.starts_with('/') {
        base_path.to_string()
    } else {
        format!("/{base_path}")
    }
}

/// Convert a header list into a validated [`HeaderMap`]
pub(crate) fn to_header_map(headers: &HeaderList) -> Result<HeaderMap, ConfigError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| ConfigError::InvalidHeader(format!("{name}: {e}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|e| ConfigError::InvalidHeader(format!("{name}: {e}")))?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}
