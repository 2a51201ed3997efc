use crate::error::{ProxyKeyError, Result};
use crate::models::ApiKeyHeader;
use crate::proxy::agent::AgentOptions;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Vendor API configuration
    pub api: ApiConfig,
    /// Proxy pool configuration
    pub proxy: ProxyPoolConfig,
    /// Transport configuration
    pub transport: TransportConfig,
    /// Binary run configuration
    pub run: RunConfig,
    /// Logging configuration
    pub log: LogConfig,
}

#[derive(Clone)]
pub struct ApiConfig {
    /// Base URL every request path is joined onto
    pub base_url: Url,
    /// Default API key, used when no proxy is configured
    pub api_key: String,
    /// Header carrying the API key (default: authorization)
    pub auth_header: String,
    /// Prefix written before the key (default: "Bearer ")
    pub auth_prefix: Option<String>,
}

impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"<redacted>")
            .field("auth_header", &self.auth_header)
            .field("auth_prefix", &self.auth_prefix)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ProxyPoolConfig {
    /// Path of the JSON proxy list
    pub config_path: PathBuf,
    /// Whether file-backed configuration is available in this environment
    pub file_config_available: bool,
}

#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Connection timeout in seconds
    pub connect_timeout: u64,
    /// Request timeout in seconds
    pub request_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Number of requests the binary issues (default: 1)
    pub request_count: usize,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let base_url = get_env_or("PROXYKEY_API_BASE_URL", "https://api.example.com");
        let base_url = Url::parse(&base_url).map_err(|e| {
            ProxyKeyError::InvalidConfig(format!("PROXYKEY_API_BASE_URL must be a valid URL: {}", e))
        })?;

        let api_key = env::var("PROXYKEY_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ProxyKeyError::MissingEnvVar("PROXYKEY_API_KEY".into()))?;

        let auth_prefix = match get_env_or("PROXYKEY_AUTH_PREFIX", "Bearer ").as_str() {
            "" | "none" => None,
            prefix => Some(prefix.to_string()),
        };

        Ok(Config {
            api: ApiConfig {
                base_url,
                api_key,
                auth_header: get_env_or("PROXYKEY_AUTH_HEADER", "authorization"),
                auth_prefix,
            },
            proxy: ProxyPoolConfig {
                config_path: PathBuf::from(get_env_or("PROXYKEY_PROXY_CONFIG", "proxies.json")),
                file_config_available: parse_flag(
                    "PROXYKEY_FILE_CONFIG",
                    &get_env_or("PROXYKEY_FILE_CONFIG", "true"),
                )?,
            },
            transport: TransportConfig {
                connect_timeout: get_env_or("PROXYKEY_CONNECT_TIMEOUT", "10")
                    .parse()
                    .map_err(|_| {
                        ProxyKeyError::InvalidConfig(
                            "PROXYKEY_CONNECT_TIMEOUT must be a number of seconds".into(),
                        )
                    })?,
                request_timeout: get_env_or("PROXYKEY_REQUEST_TIMEOUT", "30")
                    .parse()
                    .map_err(|_| {
                        ProxyKeyError::InvalidConfig(
                            "PROXYKEY_REQUEST_TIMEOUT must be a number of seconds".into(),
                        )
                    })?,
            },
            run: RunConfig {
                request_count: get_env_or("PROXYKEY_REQUEST_COUNT", "1")
                    .trim()
                    .parse()
                    .map_err(|_| {
                        ProxyKeyError::InvalidConfig(
                            "PROXYKEY_REQUEST_COUNT must be a non-negative number".into(),
                        )
                    })?,
            },
            log: LogConfig {
                level: get_env_or("LOG_LEVEL", "info"),
                format: get_env_or("LOG_FORMAT", "pretty"),
            },
        })
    }

    /// Header policy for writing API keys
    pub fn key_header(&self) -> Result<ApiKeyHeader> {
        ApiKeyHeader::new(&self.api.auth_header, self.api.auth_prefix.as_deref())
    }

    /// Timeouts shared by the direct client and every proxy agent
    pub fn agent_options(&self) -> AgentOptions {
        AgentOptions {
            connect_timeout: Duration::from_secs(self.transport.connect_timeout),
            request_timeout: Duration::from_secs(self.transport.request_timeout),
        }
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ProxyKeyError::InvalidConfig(format!(
            "{} must be true or false",
            key
        ))),
    }
}

/// Get environment variable with a default value
fn get_env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}
