//! Per-request proxy routing and API key substitution

use std::sync::Arc;

use tracing::{debug, instrument};

use super::agent::ProxyAgentFactory;
use super::pool::ProxyPool;
use crate::error::Result;
use crate::models::{ApiKeyHeader, OutboundRequest};

/// Rewrites outgoing requests with the next proxy of the pool
///
/// With an empty pool only the default API key is written. Otherwise the
/// request gets the entry's proxy agent and its API key.
pub struct RequestAugmenter {
    pool: ProxyPool,
    factory: Arc<dyn ProxyAgentFactory>,
    key_header: ApiKeyHeader,
}

impl RequestAugmenter {
    pub fn new(pool: ProxyPool, factory: Arc<dyn ProxyAgentFactory>) -> Self {
        Self {
            pool,
            factory,
            key_header: ApiKeyHeader::default(),
        }
    }

    pub fn with_key_header(mut self, key_header: ApiKeyHeader) -> Self {
        self.key_header = key_header;
        self
    }

    pub fn pool(&self) -> &ProxyPool {
        &self.pool
    }

    pub fn key_header(&self) -> &ApiKeyHeader {
        &self.key_header
    }

    /// Route `request` through the next proxy and set its API key
    ///
    /// The cursor advances before the agent is built, so a failing proxy does
    /// not stall the rotation. Agent failures are returned as transport
    /// errors; the request is never sent unproxied in their place.
    #[instrument(skip_all, fields(method = %request.method, url = %request.url))]
    pub fn augment(
        &self,
        mut request: OutboundRequest,
        default_api_key: &str,
    ) -> Result<OutboundRequest> {
        let Some(entry) = self.pool.next() else {
            self.key_header
                .apply(&mut request.headers, default_api_key)?;
            return Ok(request);
        };

        debug!(proxy = %entry.authority(), "Routing request through proxy");

        let agent = self.factory.build(&entry.proxy_url())?;
        request.transport.proxy = Some(agent);
        self.key_header.apply(&mut request.headers, entry.api_key())?;

        Ok(request)
    }
}
