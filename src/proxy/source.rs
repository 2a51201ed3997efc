//! Proxy pool configuration loading
//!
//! Every outcome other than `Loaded` leads to an empty pool. The variants
//! only exist so that each cause is logged on its own.

use std::io::ErrorKind;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

/// Result of looking for the proxy configuration document
#[derive(Debug, Clone, PartialEq)]
pub enum ProxyConfigSource {
    /// File-backed configuration is not available in this environment
    Disabled,
    /// No configuration file at the expected path
    Absent,
    /// The file exists but could not be read
    Unreadable(String),
    /// The file was read but is not valid JSON
    Malformed(String),
    Loaded(Value),
}

impl ProxyConfigSource {
    /// Load the configuration document at `path`
    ///
    /// `file_config_available` is decided by the caller from the runtime
    /// environment; when false the file system is not touched.
    #[instrument(skip(path), fields(path = %path.display()))]
    pub fn load(path: &Path, file_config_available: bool) -> Self {
        if !file_config_available {
            debug!("File-backed proxy configuration disabled");
            return Self::Disabled;
        }

        let source = match std::fs::read_to_string(path) {
            Ok(raw) => Self::parse(&raw),
            Err(e) if e.kind() == ErrorKind::NotFound => Self::Absent,
            Err(e) => Self::Unreadable(e.to_string()),
        };

        match &source {
            Self::Absent => info!("No proxy configuration file found"),
            Self::Unreadable(reason) => {
                warn!(%reason, "Proxy configuration file unreadable, proxies disabled")
            }
            Self::Malformed(reason) => {
                warn!(%reason, "Proxy configuration file is not valid JSON, proxies disabled")
            }
            Self::Loaded(_) => debug!("Proxy configuration file loaded"),
            Self::Disabled => {}
        }

        source
    }

    /// Parse an in-memory configuration document
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str(raw) {
            Ok(value) => Self::Loaded(value),
            Err(e) => Self::Malformed(e.to_string()),
        }
    }

    /// The parsed document, if one was loaded
    pub fn document(&self) -> Option<&Value> {
        match self {
            Self::Loaded(value) => Some(value),
            _ => None,
        }
    }
}
