//! Serializable connection settings

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection::{Connection, HeaderList, DEFAULT_TIMEOUT};
use crate::error::ConfigError;

/// Connection parameters as they appear in a config file
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ConnectionSettings {
    /// Use https
    pub ssl: bool,
    /// Target host
    pub host: String,
    /// Target port, the scheme's well-known port when unset
    pub port: Option<u16>,
    /// Path prefix of every endpoint
    pub base_path: String,
    /// Basic-auth user
    pub user: String,
    /// Basic-auth password
    pub password: String,
    /// Verify TLS certificates and hostnames
    pub validate_ssl: bool,
    /// Proxy address, empty for none
    pub proxy: String,
    /// SOCKS5 instead of HTTP proxy
    pub proxy_is_socks: bool,
    /// Headers sent with every request
    pub headers: HeaderList,
    /// Per-request deadline in seconds
    pub timeout_secs: u64,
}

impl Default for ConnectionSettings {
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
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("ssl", &self.ssl)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("base_path", &self.base_path)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("validate_ssl", &self.validate_ssl)
            .field("proxy", &self.proxy)
            .field("proxy_is_socks", &self.proxy_is_socks)
            .field("headers", &self.headers)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl Connection {
    /// Build a connection from deserialized settings
    pub fn from_settings(settings: &ConnectionSettings) -> Result<Self, ConfigError> {
        let mut builder = Connection::builder()
            .ssl(settings.ssl)
            .host(settings.host.as_str())
            .base_path(settings.base_path.as_str())
            .credentials(settings.user.as_str(), settings.password.as_str())
            .validate_ssl(settings.validate_ssl)
            .proxy(settings.proxy.as_str())
            .proxy_is_socks(settings.proxy_is_socks)
            .headers(settings.headers.clone())
            .timeout(Duration::from_secs(settings.timeout_secs));

        if let Some(port) = settings.port {
            builder = builder.port(port);
        }

        builder.build()
    }
}
