use thiserror::Error;

/// Unified error type for proxykey
#[derive(Error, Debug)]
pub enum ProxyKeyError {
    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid API key: {0}")]
    InvalidApiKey(String),

    // Transport errors
    #[error("Proxy agent construction failed for {proxy}: {reason}")]
    ProxyAgent { proxy: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // Request errors
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for proxykey operations
pub type Result<T> = std::result::Result<T, ProxyKeyError>;

impl ProxyKeyError {
    /// Errors raised while sending a single request. They concern that
    /// request only and never invalidate the client.
    pub fn is_transport_error(&self) -> bool {
        matches!(self, ProxyKeyError::ProxyAgent { .. } | ProxyKeyError::Http(_))
    }

    /// Errors raised while building the client from its configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ProxyKeyError::InvalidConfig(_)
                | ProxyKeyError::MissingEnvVar(_)
                | ProxyKeyError::InvalidUrl(_)
                | ProxyKeyError::InvalidApiKey(_)
        )
    }
}

// Convert from URL parse errors
impl From<url::ParseError> for ProxyKeyError {
    fn from(err: url::ParseError) -> Self {
        ProxyKeyError::InvalidUrl(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let agent = ProxyKeyError::ProxyAgent {
            proxy: "proxy1.example.com:8080".to_string(),
            reason: "bad scheme".to_string(),
        };
        assert!(agent.is_transport_error());
        assert!(!agent.is_config_error());

        assert!(ProxyKeyError::InvalidConfig("bad".to_string()).is_config_error());
        assert!(ProxyKeyError::MissingEnvVar("PROXYKEY_API_KEY".to_string()).is_config_error());
        assert!(!ProxyKeyError::InvalidRequest("bad".to_string()).is_transport_error());
        assert!(!ProxyKeyError::InvalidRequest("bad".to_string()).is_config_error());
    }

    #[test]
    fn test_error_from_url_parse() {
        let err: ProxyKeyError = url::Url::parse("not a url").unwrap_err().into();
        assert!(matches!(err, ProxyKeyError::InvalidUrl(_)));
        assert!(err.is_config_error());
    }

    #[test]
    fn test_agent_error_message_names_proxy() {
        let err = ProxyKeyError::ProxyAgent {
            proxy: "proxy2.example.com:8081".to_string(),
            reason: "builder error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Proxy agent construction failed for proxy2.example.com:8081: builder error"
        );
    }
}
