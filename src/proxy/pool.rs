//! Round-robin pool of validated proxy entries

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use super::source::ProxyConfigSource;
use crate::models::ProxyEntry;

/// Ordered proxy entries plus the rotation cursor
///
/// Owned by one client instance and rebuilt only when the client is. An empty
/// pool means "no proxy": requests go out directly with the default key.
#[derive(Debug, Default)]
pub struct ProxyPool {
    entries: Vec<Arc<ProxyEntry>>,
    cursor: AtomicUsize,
}

impl ProxyPool {
    pub fn new(entries: Vec<ProxyEntry>) -> Self {
        Self {
            entries: entries.into_iter().map(Arc::new).collect(),
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a pool from raw configuration
    ///
    /// Accepts a list of records, or an object holding one under `proxies`.
    /// Invalid records are skipped; anything else yields an empty pool.
    pub fn from_config(raw: Option<&Value>) -> Self {
        let Some(raw) = raw else {
            info!("No proxy configuration, requests use the default API key");
            return Self::empty();
        };

        match proxy_records(raw) {
            Some(records) => Self::from_records(records),
            None => {
                warn!("Proxy configuration is not a list of proxies, ignoring it");
                Self::empty()
            }
        }
    }

    /// Build a pool from whatever the config loader produced
    pub fn from_source(source: &ProxyConfigSource) -> Self {
        Self::from_config(source.document())
    }

    fn from_records(records: &[Value]) -> Self {
        let entries: Vec<ProxyEntry> = records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| match ProxyEntry::from_record(record) {
                Ok(entry) => Some(entry),
                Err(reason) => {
                    warn!(index, %reason, "Skipping invalid proxy entry");
                    None
                }
            })
            .collect();

        info!(
            "Loaded {} of {} configured proxies",
            entries.len(),
            records.len()
        );
        Self::new(entries)
    }

    /// Entry for the next outbound call, or `None` when the pool is empty
    ///
    /// The cursor advances atomically, so concurrent callers each take a
    /// distinct slot of the rotation.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&self) -> Option<Arc<ProxyEntry>> {
        let len = self.entries.len();
        if len == 0 {
            return None;
        }

        let idx = match self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c + 1) % len))
        {
            Ok(prev) | Err(prev) => prev,
        };

        self.entries.get(idx).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Arc<ProxyEntry>] {
        &self.entries
    }

    /// Index the next call to [`ProxyPool::next`] will hand out
    pub fn cursor(&self) -> usize {
        self.cursor.load(Ordering::Acquire)
    }
}

fn proxy_records(raw: &Value) -> Option<&[Value]> {
    match raw {
        Value::Array(records) => Some(records),
        Value::Object(obj) => obj.get("proxies")?.as_array().map(Vec::as_slice),
        _ => None,
    }
}
