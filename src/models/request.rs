use std::time::Duration;

use bytes::Bytes;
use http::header::{HeaderName, AUTHORIZATION};
use http::{HeaderMap, HeaderValue, Method};
use url::Url;

use crate::error::{ProxyKeyError, Result};
use crate::proxy::agent::ProxyAgent;

/// An outgoing API call, before it reaches the transport
///
/// Augmentation only touches the API key header and `transport.proxy`.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub transport: TransportOptions,
}

impl OutboundRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            transport: TransportOptions::default(),
        }
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }
}

/// Per-request transport settings
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// Tunnel agent; `None` dispatches directly
    pub proxy: Option<ProxyAgent>,
    pub timeout: Option<Duration>,
}

/// Where and how the API key is written on a request
#[derive(Debug, Clone)]
pub struct ApiKeyHeader {
    name: HeaderName,
    prefix: String,
}

impl Default for ApiKeyHeader {
    fn default() -> Self {
        Self {
            name: AUTHORIZATION,
            prefix: "Bearer ".to_string(),
        }
    }
}

impl ApiKeyHeader {
    /// `prefix` is prepended verbatim to the key, e.g. `"Bearer "`
    pub fn new(name: &str, prefix: Option<&str>) -> Result<Self> {
        let name = HeaderName::from_bytes(name.trim().as_bytes()).map_err(|_| {
            ProxyKeyError::InvalidConfig(format!("Invalid API key header name: {}", name))
        })?;

        let prefix = prefix.unwrap_or_default().to_string();
        if !prefix.is_empty() && HeaderValue::from_str(&prefix).is_err() {
            return Err(ProxyKeyError::InvalidConfig(
                "API key prefix contains invalid header characters".into(),
            ));
        }

        Ok(Self { name, prefix })
    }

    pub fn name(&self) -> &HeaderName {
        &self.name
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Build the header value for `api_key`, flagged sensitive
    pub fn value_for(&self, api_key: &str) -> Result<HeaderValue> {
        let mut value = HeaderValue::from_str(&format!("{}{}", self.prefix, api_key))
            .map_err(|_| {
                ProxyKeyError::InvalidApiKey(format!(
                    "value for header '{}' contains invalid characters",
                    self.name
                ))
            })?;
        value.set_sensitive(true);
        Ok(value)
    }

    /// Replace any existing values of the key header with `api_key`
    pub fn apply(&self, headers: &mut HeaderMap, api_key: &str) -> Result<()> {
        let value = self.value_for(api_key)?;
        headers.insert(self.name.clone(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CONTENT_TYPE;

    fn sample_request() -> OutboundRequest {
        OutboundRequest::new(
            Method::POST,
            Url::parse("https://api.example.com/v1/messages").unwrap(),
        )
        .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .with_body("{}")
    }

    #[test]
    fn test_default_header_is_bearer_authorization() {
        let header = ApiKeyHeader::default();
        let mut headers = HeaderMap::new();
        header.apply(&mut headers, "key1").unwrap();

        let value = headers.get(AUTHORIZATION).unwrap();
        assert_eq!(value, "Bearer key1");
        assert!(value.is_sensitive());
    }

    #[test]
    fn test_apply_replaces_existing_values() {
        let header = ApiKeyHeader::new("x-api-key", None).unwrap();
        let mut request = sample_request();
        request
            .headers
            .append("x-api-key", HeaderValue::from_static("old-1"));
        request
            .headers
            .append("x-api-key", HeaderValue::from_static("old-2"));

        header.apply(&mut request.headers, "key2").unwrap();

        let values: Vec<_> = request.headers.get_all("x-api-key").iter().collect();
        assert_eq!(values, vec![&HeaderValue::from_static("key2")]);
        assert_eq!(request.headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn test_invalid_header_name_and_key() {
        assert!(matches!(
            ApiKeyHeader::new("bad header", None),
            Err(ProxyKeyError::InvalidConfig(_))
        ));

        let header = ApiKeyHeader::default();
        let err = header.value_for("line\nbreak").unwrap_err();
        assert!(matches!(err, ProxyKeyError::InvalidApiKey(_)));
        assert!(!err.to_string().contains("line"));
    }

    #[test]
    fn test_request_builders() {
        let request = sample_request();
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.body.as_deref(), Some(&b"{}"[..]));
        assert!(request.transport.proxy.is_none());
        assert!(request.transport.timeout.is_none());
    }
}
