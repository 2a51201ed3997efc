//! Proxykey - per-request proxy rotation for API clients
//!
//! Outbound API calls are routed through a pool of proxies in round-robin
//! order, each proxy carrying its own API key.
//!
//! ## Features
//!
//! - Round-robin rotation over a JSON-configured proxy pool
//! - Per-proxy API key substitution
//! - Percent-encoded proxy credentials
//! - Graceful fallback to direct dispatch when no proxy is configured

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod proxy;

pub use client::ApiClient;
pub use config::Config;
pub use error::{ProxyKeyError, Result};
pub use proxy::{ProxyPool, RequestAugmenter};
