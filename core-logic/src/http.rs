//! # HTTP plumbing
//!
//! Plain request/response values, the payload decoder and the reqwest-backed
//! [`Transport`] that routes every call through the account's proxy.
//!
//! reqwest negotiates and strips gzip, deflate and brotli on its own. zstd is
//! left on the wire and reversed by [`decode_json_body`] when the response
//! says `content-encoding: zstd`.

use crate::error::{DecodeError, NetworkError};
use crate::traits::Transport;
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;
use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use url::Url;

/// Content-encoding value that marks a zstd-compressed body.
pub const ZSTD_ENCODING: &str = "zstd";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::Post, url)
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json_body(mut self, body: &Value) -> Self {
        self.body = Some(body.to_string().into_bytes());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Case-insensitive header lookup.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn header<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        self.header_values(name).next()
    }

    pub fn header_values<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.header("content-encoding")
    }

    /// `name=value` pairs of every `Set-Cookie` header, joined with `"; "`.
    /// `None` when the response set no cookie.
    pub fn session_cookie(&self) -> Option<String> {
        let pairs: Vec<&str> = self
            .header_values("set-cookie")
            .filter_map(|raw| raw.split(';').next())
            .map(str::trim)
            .filter(|pair| !pair.is_empty())
            .collect();

        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    pub fn json(&self) -> Result<Value, DecodeError> {
        decode_json_body(&self.body, self.content_encoding())
    }
}

/// Decodes a response body into JSON, reversing zstd first when
/// `content_encoding` says so.
pub fn decode_json_body(body: &[u8], content_encoding: Option<&str>) -> Result<Value, DecodeError> {
    let is_zstd = content_encoding
        .map(|enc| enc.trim().eq_ignore_ascii_case(ZSTD_ENCODING))
        .unwrap_or(false);

    if is_zstd {
        let raw = decompress_zstd(body)?;
        parse_json(&raw)
    } else {
        parse_json(body)
    }
}

fn decompress_zstd(body: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let to_error = |e: std::io::Error| DecodeError::Decompress {
        encoding: ZSTD_ENCODING.to_string(),
        reason: e.to_string(),
    };

    let mut decoder = zstd::stream::Decoder::new(body).map_err(to_error)?;
    let mut decoded = Vec::new();
    decoder.read_to_end(&mut decoded).map_err(to_error)?;
    Ok(decoded)
}

fn parse_json(bytes: &[u8]) -> Result<Value, DecodeError> {
    serde_json::from_slice(bytes).map_err(|e| DecodeError::Json {
        reason: e.to_string(),
    })
}

/// Keeps a proxy that already parses as a URL with a host, otherwise treats
/// it as `host:port` of an HTTP proxy.
fn normalize_proxy(proxy: &str) -> String {
    match Url::parse(proxy) {
        Ok(url) if url.has_host() => proxy.to_string(),
        _ => format!("http://{}", proxy),
    }
}

/// reqwest transport with one cached client per proxy endpoint.
#[derive(Default)]
pub struct ReqwestTransport {
    clients: RwLock<HashMap<String, reqwest::Client>>,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn client_for(&self, proxy: &str) -> Result<reqwest::Client, NetworkError> {
        {
            let clients = self.clients.read().await;
            if let Some(client) = clients.get(proxy) {
                return Ok(client.clone());
            }
        }

        let client = self.build_client(proxy).map_err(|e| NetworkError::Proxy {
            proxy: proxy.to_string(),
            reason: format!("{:#}", e),
        })?;

        let mut clients = self.clients.write().await;
        clients.insert(proxy.to_string(), client.clone());
        debug!("Built HTTP client for proxy {}", proxy);
        Ok(client)
    }

    fn build_client(&self, proxy: &str) -> anyhow::Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(4);

        if !proxy.is_empty() {
            let url = normalize_proxy(proxy);
            let proxy = reqwest::Proxy::all(&url)
                .with_context(|| format!("Failed to create proxy for URL: {}", url))?;
            builder = builder.proxy(proxy);
        }

        builder.build().context("Failed to build reqwest client")
    }
}

fn map_reqwest_error(err: reqwest::Error, endpoint: &str, timeout: Duration) -> NetworkError {
    if err.is_timeout() {
        NetworkError::Timeout {
            timeout_ms: timeout.as_millis() as u64,
            endpoint: endpoint.to_string(),
        }
    } else if err.is_connect() {
        NetworkError::Connect {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        }
    } else {
        NetworkError::Request {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        proxy: &str,
        request: HttpRequest,
    ) -> Result<HttpResponse, NetworkError> {
        let client = self.client_for(proxy).await?;
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
        };

        let mut builder = client
            .request(method, &request.url)
            .timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(e, &request.url, request.timeout))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::HttpStatus {
                status_code: status.as_u16(),
                endpoint: request.url,
            });
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| map_reqwest_error(e, &request.url, request.timeout))?;

        Ok(HttpResponse {
            status: status.as_u16(),
            headers,
            body,
        })
    }
}
