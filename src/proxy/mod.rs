//! Proxy rotation and request augmentation
//!
//! This module provides:
//! - The proxy pool and its round-robin cursor
//! - Loading of the proxy configuration document
//! - Proxy tunnel agents built from proxy URLs
//! - Per-request routing and API key substitution

pub mod agent;
pub mod augment;
pub mod pool;
pub mod source;

pub use agent::{AgentOptions, ProxyAgent, ProxyAgentFactory, ReqwestAgentFactory};
pub use augment::RequestAugmenter;
pub use pool::ProxyPool;
pub use source::ProxyConfigSource;
