//! Proxy tunnel agents
//!
//! An agent is the transport handle attached to a request so that it is
//! dispatched through one upstream proxy.

use std::fmt;
use std::time::Duration;

use dashmap::DashMap;
use reqwest::{Client, Proxy};
use tracing::{debug, warn};
use url::Url;

use crate::error::{ProxyKeyError, Result};

/// Builds attachable agents from fully formed proxy URLs
pub trait ProxyAgentFactory: Send + Sync {
    /// Errors are transport errors for the request being augmented.
    fn build(&self, proxy_url: &str) -> Result<ProxyAgent>;
}

/// Transport handle routing requests through one proxy
#[derive(Clone)]
pub struct ProxyAgent {
    proxy_url: String,
    client: Client,
}

impl ProxyAgent {
    pub fn new(proxy_url: impl Into<String>, client: Client) -> Self {
        Self {
            proxy_url: proxy_url.into(),
            client,
        }
    }

    /// Full proxy URL, credentials included
    pub fn proxy_url(&self) -> &str {
        &self.proxy_url
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl fmt::Debug for ProxyAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyAgent")
            .field("proxy", &redact_proxy_url(&self.proxy_url))
            .finish()
    }
}

/// Timeouts applied to every agent's client
#[derive(Debug, Clone, Copy)]
pub struct AgentOptions {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for AgentOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Builds `reqwest` clients routed through the proxy, one per proxy URL
///
/// Clients are cached so that rotating back to a proxy reuses its
/// connection pool.
pub struct ReqwestAgentFactory {
    options: AgentOptions,
    cache: DashMap<String, ProxyAgent>,
}

impl ReqwestAgentFactory {
    pub fn new(options: AgentOptions) -> Self {
        Self {
            options,
            cache: DashMap::new(),
        }
    }

    /// Number of distinct proxy clients built so far
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    fn connect(&self, proxy_url: &str) -> Result<ProxyAgent> {
        let agent_err = |reason: String| ProxyKeyError::ProxyAgent {
            proxy: redact_proxy_url(proxy_url),
            reason,
        };

        let proxy = Proxy::all(proxy_url).map_err(|e| agent_err(e.to_string()))?;
        let client = Client::builder()
            .proxy(proxy)
            .connect_timeout(self.options.connect_timeout)
            .timeout(self.options.request_timeout)
            .build()
            .map_err(|e| agent_err(e.to_string()))?;

        Ok(ProxyAgent::new(proxy_url, client))
    }
}

impl Default for ReqwestAgentFactory {
    fn default() -> Self {
        Self::new(AgentOptions::default())
    }
}

impl ProxyAgentFactory for ReqwestAgentFactory {
    fn build(&self, proxy_url: &str) -> Result<ProxyAgent> {
        if let Some(agent) = self.cache.get(proxy_url) {
            return Ok(agent.clone());
        }

        let agent = self.connect(proxy_url).map_err(|e| {
            warn!("Failed to build proxy agent: {}", e);
            e
        })?;
        debug!("Built proxy agent for {}", redact_proxy_url(proxy_url));

        Ok(self
            .cache
            .entry(proxy_url.to_string())
            .or_insert(agent)
            .clone())
    }
}

/// Proxy URL with the password masked, safe for logs and error messages
pub fn redact_proxy_url(proxy_url: &str) -> String {
    match Url::parse(proxy_url) {
        Ok(mut url) => {
            if url.password().is_some() {
                let _ = url.set_password(Some("***"));
            }
            url.as_str().trim_end_matches('/').to_string()
        }
        Err(_) => "<invalid proxy url>".to_string(),
    }
}
