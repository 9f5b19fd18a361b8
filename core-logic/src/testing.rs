//! Scripted doubles for [`Transport`] and [`Entropy`].
//!
//! Enabled for this crate's own tests and, through the `testing` feature, for
//! downstream integration tests.

use crate::entropy::Entropy;
use crate::error::NetworkError;
use crate::http::{HttpRequest, HttpResponse};
use crate::traits::Transport;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Deterministic entropy: `unit()` always returns `unit`, `below(n)` returns
/// `floor(n * fraction)` clamped into range.
#[derive(Debug, Clone, Copy)]
pub struct ScriptedEntropy {
    pub unit: f64,
    pub fraction: f64,
}

impl ScriptedEntropy {
    /// No probabilistic branch fires, every range yields its minimum.
    pub fn quiet() -> Self {
        Self {
            unit: 0.999,
            fraction: 0.0,
        }
    }

    /// Every probabilistic branch fires, every range yields its minimum.
    pub fn eager() -> Self {
        Self {
            unit: 0.0,
            fraction: 0.0,
        }
    }

    pub fn with_fraction(mut self, fraction: f64) -> Self {
        self.fraction = fraction;
        self
    }
}

impl Entropy for ScriptedEntropy {
    fn below(&mut self, upper: u64) -> u64 {
        if upper == 0 {
            return 0;
        }
        ((upper as f64 * self.fraction) as u64).min(upper - 1)
    }

    fn unit(&mut self) -> f64 {
        self.unit
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub proxy: String,
    pub request: HttpRequest,
}

impl RecordedCall {
    pub fn path(&self) -> &str {
        url_path(&self.request.url)
    }
}

fn url_path(url: &str) -> &str {
    let without_scheme = url.split_once("://").map(|(_, rest)| rest).unwrap_or(url);
    without_scheme
        .find('/')
        .map(|idx| &without_scheme[idx..])
        .unwrap_or("/")
}

/// In-memory transport answering per URL path from queued responses.
///
/// A path with an empty queue answers with its fallback, or a connection
/// error when none is set.
#[derive(Default)]
pub struct ScriptedTransport {
    queued: Mutex<HashMap<String, VecDeque<Result<HttpResponse, NetworkError>>>>,
    fallback: Mutex<HashMap<String, Result<HttpResponse, NetworkError>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, path: &str, response: Result<HttpResponse, NetworkError>) -> &Self {
        self.queued
            .lock()
            .expect("scripted transport poisoned")
            .entry(path.to_string())
            .or_default()
            .push_back(response);
        self
    }

    pub fn always(&self, path: &str, response: Result<HttpResponse, NetworkError>) -> &Self {
        self.fallback
            .lock()
            .expect("scripted transport poisoned")
            .insert(path.to_string(), response);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("scripted transport poisoned").clone()
    }

    pub fn calls_to(&self, path: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.path() == path)
            .collect()
    }

    pub fn paths(&self) -> Vec<String> {
        self.calls().iter().map(|call| call.path().to_string()).collect()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn execute(
        &self,
        proxy: &str,
        request: HttpRequest,
    ) -> Result<HttpResponse, NetworkError> {
        let path = url_path(&request.url).to_string();
        self.calls
            .lock()
            .expect("scripted transport poisoned")
            .push(RecordedCall {
                proxy: proxy.to_string(),
                request: request.clone(),
            });

        let queued = self
            .queued
            .lock()
            .expect("scripted transport poisoned")
            .get_mut(&path)
            .and_then(VecDeque::pop_front);
        if let Some(response) = queued {
            return response;
        }

        self.fallback
            .lock()
            .expect("scripted transport poisoned")
            .get(&path)
            .cloned()
            .unwrap_or_else(|| {
                Err(NetworkError::Connect {
                    endpoint: request.url.clone(),
                    reason: "no scripted response".to_string(),
                })
            })
    }
}

/// 200 response with a plain JSON body.
pub fn json_response(body: &Value) -> Result<HttpResponse, NetworkError> {
    Ok(HttpResponse::new(200, body.to_string()))
}

/// 200 response with a zstd-compressed JSON body.
pub fn zstd_json_response(body: &Value) -> Result<HttpResponse, NetworkError> {
    let compressed = zstd::encode_all(body.to_string().as_bytes(), 3)
        .expect("zstd encoding of an in-memory buffer");
    Ok(HttpResponse::new(200, compressed).with_header("content-encoding", "zstd"))
}

/// 200 login page setting the given cookies.
pub fn login_response(cookies: &[&str]) -> Result<HttpResponse, NetworkError> {
    let mut response = HttpResponse::new(200, "<html></html>");
    for cookie in cookies {
        response = response.with_header("set-cookie", format!("{}; Path=/; HttpOnly", cookie));
    }
    Ok(response)
}

pub fn timeout_error(endpoint: &str) -> Result<HttpResponse, NetworkError> {
    Err(NetworkError::Timeout {
        timeout_ms: 10_000,
        endpoint: endpoint.to_string(),
    })
}
