use std::fmt;

use http::HeaderValue;
use serde_json::Value;
use thiserror::Error;

/// Scheme of the proxy tunnel itself. End-to-end TLS is negotiated through it.
const PROXY_SCHEME: &str = "http";

/// Reason a configured proxy record was excluded from the pool
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EntryRejection {
    #[error("record is not an object")]
    NotAnObject,

    #[error("missing or empty host")]
    MissingHost,

    #[error("missing port")]
    MissingPort,

    #[error("invalid port: {0}")]
    InvalidPort(String),

    #[error("missing or empty apiKey")]
    MissingApiKey,

    #[error("apiKey is not a valid header value")]
    InvalidApiKey,

    #[error("invalid auth: {0}")]
    InvalidAuth(&'static str),
}

/// Credentials presented to the proxy itself
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyAuth {
    username: String,
    password: Option<String>,
}

impl ProxyAuth {
    /// Rejects an empty username; an empty password means username-only auth.
    pub fn new(
        username: impl Into<String>,
        password: Option<String>,
    ) -> std::result::Result<Self, EntryRejection> {
        let username = username.into();
        if username.is_empty() {
            return Err(EntryRejection::InvalidAuth("missing username"));
        }

        Ok(Self {
            username,
            password: password.filter(|p| !p.is_empty()),
        })
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// `user:pass@` or `user@`, each component percent-encoded on its own
    fn userinfo(&self) -> String {
        match &self.password {
            Some(password) => format!(
                "{}:{}@",
                urlencoding::encode(&self.username),
                urlencoding::encode(password)
            ),
            None => format!("{}@", urlencoding::encode(&self.username)),
        }
    }

    fn from_value(value: &Value) -> std::result::Result<Option<Self>, EntryRejection> {
        let obj = match value {
            Value::Null => return Ok(None),
            Value::Object(obj) => obj,
            _ => return Err(EntryRejection::InvalidAuth("not an object")),
        };

        let username = match obj.get("username") {
            Some(Value::String(u)) => u.clone(),
            _ => return Err(EntryRejection::InvalidAuth("missing username")),
        };

        let password = match obj.get("password") {
            None | Some(Value::Null) => None,
            Some(Value::String(p)) => Some(p.clone()),
            Some(_) => return Err(EntryRejection::InvalidAuth("password is not a string")),
        };

        Self::new(username, password).map(Some)
    }
}

impl fmt::Debug for ProxyAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyAuth")
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// One configured upstream proxy and the API key used through it
#[derive(Clone, PartialEq, Eq)]
pub struct ProxyEntry {
    host: String,
    port: u16,
    api_key: String,
    auth: Option<ProxyAuth>,
}

impl ProxyEntry {
    /// Create a validated entry
    pub fn new(
        host: impl Into<String>,
        port: u16,
        api_key: impl Into<String>,
        auth: Option<ProxyAuth>,
    ) -> std::result::Result<Self, EntryRejection> {
        let host = host.into();
        let api_key = api_key.into();

        if host.trim().is_empty() {
            return Err(EntryRejection::MissingHost);
        }
        if port == 0 {
            return Err(EntryRejection::InvalidPort("0".to_string()));
        }
        if api_key.is_empty() {
            return Err(EntryRejection::MissingApiKey);
        }
        if HeaderValue::from_str(&api_key).is_err() {
            return Err(EntryRejection::InvalidApiKey);
        }

        Ok(Self {
            host,
            port,
            api_key,
            auth,
        })
    }

    /// Validate one untyped configuration record
    ///
    /// Expected shape: `{ "host": str, "port": int, "apiKey": str,
    /// "auth"?: { "username": str, "password"?: str } }`
    pub fn from_record(record: &Value) -> std::result::Result<Self, EntryRejection> {
        let obj = record.as_object().ok_or(EntryRejection::NotAnObject)?;

        let host = match obj.get("host") {
            Some(Value::String(h)) => h.clone(),
            _ => return Err(EntryRejection::MissingHost),
        };

        let port = match obj.get("port") {
            None | Some(Value::Null) => return Err(EntryRejection::MissingPort),
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|p| u16::try_from(p).ok())
                .ok_or_else(|| EntryRejection::InvalidPort(n.to_string()))?,
            Some(other) => return Err(EntryRejection::InvalidPort(other.to_string())),
        };

        let api_key = match obj.get("apiKey") {
            Some(Value::String(k)) => k.clone(),
            _ => return Err(EntryRejection::MissingApiKey),
        };

        let auth = match obj.get("auth") {
            Some(value) => ProxyAuth::from_value(value)?,
            None => None,
        };

        Self::new(host, port, api_key, auth)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn auth(&self) -> Option<&ProxyAuth> {
        self.auth.as_ref()
    }

    /// `host:port`, with IPv6 literals bracketed
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !(self.host.starts_with('[') && self.host.ends_with(']')) {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }

    /// Proxy connection URL: `http://[credentials@]host:port`
    pub fn proxy_url(&self) -> String {
        let userinfo = self
            .auth
            .as_ref()
            .map(ProxyAuth::userinfo)
            .unwrap_or_default();
        format!("{}://{}{}", PROXY_SCHEME, userinfo, self.authority())
    }
}

impl fmt::Debug for ProxyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyEntry")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("api_key", &"<redacted>")
            .field("auth", &self.auth)
            .finish()
    }
}

impl fmt::Display for ProxyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", PROXY_SCHEME, self.authority())
    }
}
