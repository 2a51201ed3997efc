//! Vendor API client with per-request proxy rotation
//!
//! Every call is augmented (proxy agent + API key) right before dispatch.

use std::sync::Arc;

use http::header::CONTENT_TYPE;
use http::{HeaderValue, Method};
use reqwest::{Client, Response};
use serde::Serialize;
use tracing::{debug, info, instrument};
use url::Url;

use crate::config::Config;
use crate::error::{ProxyKeyError, Result};
use crate::models::OutboundRequest;
use crate::proxy::agent::{AgentOptions, ProxyAgent, ReqwestAgentFactory};
use crate::proxy::{ProxyConfigSource, ProxyPool, RequestAugmenter};

/// API client owning its proxy pool and default credential
pub struct ApiClient {
    base_url: Url,
    default_api_key: String,
    augmenter: RequestAugmenter,
    direct: Client,
}

impl ApiClient {
    pub fn new(
        base_url: Url,
        default_api_key: impl Into<String>,
        augmenter: RequestAugmenter,
        direct: Client,
    ) -> Result<Self> {
        let default_api_key = default_api_key.into();
        if default_api_key.is_empty() {
            return Err(ProxyKeyError::InvalidApiKey("default API key is empty".into()));
        }
        augmenter.key_header().value_for(&default_api_key)?;

        Ok(Self {
            base_url,
            default_api_key,
            augmenter,
            direct,
        })
    }

    /// Build the client, loading the proxy pool from the configured file
    ///
    /// A missing or broken proxy file never fails construction; the client
    /// then sends every request directly with the default key.
    pub fn from_config(config: &Config) -> Result<Self> {
        let source = ProxyConfigSource::load(
            &config.proxy.config_path,
            config.proxy.file_config_available,
        );
        Self::with_pool(config, ProxyPool::from_source(&source))
    }

    /// Build the client around an already constructed pool
    pub fn with_pool(config: &Config, pool: ProxyPool) -> Result<Self> {
        let options = config.agent_options();
        let factory = Arc::new(ReqwestAgentFactory::new(options));
        let augmenter = RequestAugmenter::new(pool, factory).with_key_header(config.key_header()?);

        let client = Self::new(
            config.api.base_url.clone(),
            config.api.api_key.clone(),
            augmenter,
            direct_client(options)?,
        )?;

        info!(
            proxies = client.pool().len(),
            base_url = %client.base_url,
            "API client ready"
        );
        Ok(client)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn pool(&self) -> &ProxyPool {
        self.augmenter.pool()
    }

    /// Absolute URL for an API path
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined)
            .map_err(|e| ProxyKeyError::InvalidRequest(format!("invalid path '{}': {}", path, e)))
    }

    /// Start a request against an API path
    pub fn request(&self, method: Method, path: &str) -> Result<OutboundRequest> {
        Ok(OutboundRequest::new(method, self.endpoint(path)?))
    }

    pub async fn get(&self, path: &str) -> Result<Response> {
        let request = self.request(Method::GET, path)?;
        self.send(request).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response> {
        let body = serde_json::to_vec(body)?;
        let request = self
            .request(Method::POST, path)?
            .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .with_body(body);
        self.send(request).await
    }

    /// Augment and dispatch one request
    ///
    /// The raw response is handed back; status handling is up to the caller.
    #[instrument(skip_all, fields(method = %request.method, url = %request.url))]
    pub async fn send(&self, request: OutboundRequest) -> Result<Response> {
        let OutboundRequest {
            method,
            url,
            headers,
            body,
            transport,
        } = self.augmenter.augment(request, &self.default_api_key)?;

        let client = transport
            .proxy
            .as_ref()
            .map(ProxyAgent::client)
            .unwrap_or(&self.direct);

        let mut builder = client.request(method, url).headers(headers);
        if let Some(body) = body {
            builder = builder.body(body);
        }
        if let Some(timeout) = transport.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        debug!(status = %response.status(), "Response received");
        Ok(response)
    }
}

/// Client for unproxied dispatch. Environment proxy variables are ignored so
/// that routing is decided by the pool alone.
fn direct_client(options: AgentOptions) -> Result<Client> {
    Ok(Client::builder()
        .no_proxy()
        .connect_timeout(options.connect_timeout)
        .timeout(options.request_timeout)
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::path::PathBuf;

    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::mpsc;
    use tokio_test::{assert_err, assert_ok};

    use crate::config::{ApiConfig, LogConfig, ProxyPoolConfig, RunConfig, TransportConfig};
    use crate::proxy::ProxyAgentFactory;

    fn test_config(base_url: &str) -> Config {
        Config {
            api: ApiConfig {
                base_url: Url::parse(base_url).unwrap(),
                api_key: "default-key".to_string(),
                auth_header: "authorization".to_string(),
                auth_prefix: Some("Bearer ".to_string()),
            },
            proxy: ProxyPoolConfig {
                config_path: PathBuf::from("does-not-exist/proxies.json"),
                file_config_available: true,
            },
            transport: TransportConfig {
                connect_timeout: 5,
                request_timeout: 5,
            },
            run: RunConfig { request_count: 1 },
            log: LogConfig {
                level: "debug".to_string(),
                format: "pretty".to_string(),
            },
        }
    }

    /// Minimal HTTP endpoint recording each request head, one per connection
    async fn spawn_recorder() -> (SocketAddr, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    let head = read_head(&mut stream).await;
                    let _ = tx.send(head);
                    let _ = stream
                        .write_all(
                            b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
                        )
                        .await;
                    let _ = stream.shutdown().await;
                });
            }
        });

        (addr, rx)
    }

    async fn read_head(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if buf.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    fn header<'a>(head: &'a str, name: &str) -> Option<&'a str> {
        head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim())
        })
    }

    fn local_proxy(addr: SocketAddr, api_key: &str) -> serde_json::Value {
        json!({ "host": "127.0.0.1", "port": addr.port(), "apiKey": api_key })
    }

    #[test]
    fn test_endpoint_joining() {
        let client =
            ApiClient::with_pool(&test_config("https://api.example.com/v1/"), ProxyPool::empty())
                .unwrap();

        assert_eq!(
            client.endpoint("/messages").unwrap().as_str(),
            "https://api.example.com/v1/messages"
        );
        assert_eq!(
            client.endpoint("models?limit=2").unwrap().as_str(),
            "https://api.example.com/v1/models?limit=2"
        );
    }

    #[test]
    fn test_rejects_unusable_default_key() {
        let mut config = test_config("https://api.example.com");
        config.api.api_key = "bad\nkey".to_string();
        let err = ApiClient::with_pool(&config, ProxyPool::empty()).err().unwrap();
        assert!(matches!(err, ProxyKeyError::InvalidApiKey(_)));

        config.api.api_key = String::new();
        assert!(ApiClient::with_pool(&config, ProxyPool::empty()).is_err());
    }

    #[test]
    fn test_from_config_without_proxy_file_has_empty_pool() {
        let client = ApiClient::from_config(&test_config("https://api.example.com")).unwrap();
        assert!(client.pool().is_empty());
    }

    #[tokio::test]
    async fn test_direct_dispatch_uses_default_key() {
        let (api_addr, mut api_rx) = spawn_recorder().await;
        let client = ApiClient::with_pool(
            &test_config(&format!("http://{}/v1", api_addr)),
            ProxyPool::empty(),
        )
        .unwrap();

        let response = assert_ok!(client.get("models").await);
        assert_eq!(response.status(), 200);

        let head = api_rx.recv().await.unwrap();
        assert!(head.starts_with("GET /v1/models HTTP/1.1"));
        assert_eq!(header(&head, "authorization"), Some("Bearer default-key"));
        assert!(header(&head, "proxy-authorization").is_none());
    }

    #[tokio::test]
    async fn test_dispatch_through_authenticated_proxy() {
        let (proxy_addr, mut proxy_rx) = spawn_recorder().await;
        let pool = ProxyPool::from_config(Some(&json!([{
            "host": "127.0.0.1",
            "port": proxy_addr.port(),
            "apiKey": "key2",
            "auth": { "username": "user", "password": "pass" }
        }])));
        let client =
            ApiClient::with_pool(&test_config("http://api.proxykey.test/v1"), pool).unwrap();

        let response = assert_ok!(client.post_json("messages", &json!({ "model": "m" })).await);
        assert_eq!(response.status(), 200);

        let head = proxy_rx.recv().await.unwrap();
        assert!(head.starts_with("POST http://api.proxykey.test/v1/messages HTTP/1.1"));
        assert_eq!(header(&head, "authorization"), Some("Bearer key2"));
        assert_eq!(header(&head, "content-type"), Some("application/json"));

        let proxy_auth = header(&head, "proxy-authorization").unwrap();
        let encoded = proxy_auth.strip_prefix("Basic ").unwrap();
        assert_eq!(BASE64.decode(encoded).unwrap(), b"user:pass");
    }

    #[tokio::test]
    async fn test_requests_rotate_across_proxies() {
        let (addr_a, mut rx_a) = spawn_recorder().await;
        let (addr_b, mut rx_b) = spawn_recorder().await;
        let pool = ProxyPool::from_config(Some(&json!([
            local_proxy(addr_a, "key-a"),
            local_proxy(addr_b, "key-b"),
        ])));
        let client =
            ApiClient::with_pool(&test_config("http://api.proxykey.test"), pool).unwrap();

        for _ in 0..3 {
            assert_ok!(client.get("/ping").await);
        }

        let first = rx_a.recv().await.unwrap();
        let second = rx_b.recv().await.unwrap();
        let third = rx_a.recv().await.unwrap();
        assert_eq!(header(&first, "authorization"), Some("Bearer key-a"));
        assert_eq!(header(&second, "authorization"), Some("Bearer key-b"));
        assert_eq!(header(&third, "authorization"), Some("Bearer key-a"));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_agent_failure_is_not_sent_direct() {
        struct RefusingFactory;

        impl ProxyAgentFactory for RefusingFactory {
            fn build(&self, proxy_url: &str) -> Result<ProxyAgent> {
                Err(ProxyKeyError::ProxyAgent {
                    proxy: proxy_url.to_string(),
                    reason: "refused".to_string(),
                })
            }
        }

        let (api_addr, mut api_rx) = spawn_recorder().await;
        let pool = ProxyPool::from_config(Some(&json!([
            { "host": "proxy1.example.com", "port": 8080, "apiKey": "key1" }
        ])));
        let augmenter = RequestAugmenter::new(pool, Arc::new(RefusingFactory));
        let client = ApiClient::new(
            Url::parse(&format!("http://{}", api_addr)).unwrap(),
            "default-key",
            augmenter,
            direct_client(AgentOptions::default()).unwrap(),
        )
        .unwrap();

        let err = assert_err!(client.get("models").await);
        assert!(err.is_transport_error());
        assert!(api_rx.try_recv().is_err());
    }
}
