//! Proxy selection

use url::Url;

use crate::error::ConfigError;

/// How requests are tunnelled through a proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyKind {
    /// HTTP forward proxy / CONNECT tunnel
    Http,
    /// SOCKS5 proxy
    Socks5,
}

impl ProxyKind {
    /// Kind selected by the `proxy_is_socks` flag
    pub fn from_socks_flag(is_socks: bool) -> Self {
        if is_socks {
            ProxyKind::Socks5
        } else {
            ProxyKind::Http
        }
    }

    fn default_scheme(self) -> &'static str {
        match self {
            ProxyKind::Http => "http",
            ProxyKind::Socks5 => "socks5",
        }
    }

    fn accepts_scheme(self, scheme: &str) -> bool {
        match self {
            ProxyKind::Http => matches!(scheme, "http" | "https"),
            ProxyKind::Socks5 => matches!(scheme, "socks5" | "socks5h"),
        }
    }
}

/// Validated proxy address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyConfig {
    url: Url,
    kind: ProxyKind,
}

impl ProxyConfig {
    /// Parse a proxy address.
    ///
    /// `host:port` gets the kind's default scheme; an explicit scheme must
    /// agree with `kind`.
    pub fn new(address: &str, kind: ProxyKind) -> Result<Self, ConfigError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(ConfigError::InvalidProxy("empty address".to_string()));
        }

        let candidate = if address.contains("://") {
            address.to_string()
        } else {
            format!("{}://{}", kind.default_scheme(), address)
        };

        let url = Url::parse(&candidate)
            .map_err(|e| ConfigError::InvalidProxy(format!("{address}: {e}")))?;

        if !kind.accepts_scheme(url.scheme()) {
            return Err(ConfigError::InvalidProxy(format!(
                "scheme {} does not match {:?} proxy",
                url.scheme(),
                kind
            )));
        }
        if url.host_str().is_none_or(str::is_empty) {
            return Err(ConfigError::InvalidProxy(format!("{address}: missing host")));
        }

        Ok(Self { url, kind })
    }

    /// Proxy URL handed to the transport
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Proxy kind
    pub fn kind(&self) -> ProxyKind {
        self.kind
    }
}
