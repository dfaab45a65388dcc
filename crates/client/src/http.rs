//! Single-request HTTP client with engine-native error classification.
//!
//! One [`ServiceClient`] is created at startup and reused for the process
//! lifetime; the underlying `reqwest::Client` maintains a connection pool.
//! Transport failures, timeouts, and non-2xx statuses are wrapped into the
//! closed error set at this boundary so the executor never sees a raw
//! `reqwest::Error`.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use weft_domain::binding::HttpMethod;
use weft_domain::config::ClientConfig;
use weft_domain::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Decoded response payload: JSON when the server says so, raw bytes
/// otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedBody {
    Json(Value),
    Bytes(Vec<u8>),
}

impl DecodedBody {
    /// Coerce to a JSON value; raw bytes become a lossy UTF-8 string.
    pub fn into_value(self) -> Value {
        match self {
            Self::Json(value) => value,
            Self::Bytes(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: DecodedBody,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: Client,
    timeout: Duration,
}

impl ServiceClient {
    /// Build a new client from the shared [`ClientConfig`].
    pub fn new(cfg: &ClientConfig) -> Result<Self> {
        let timeout = Duration::from_millis(cfg.timeout_ms);
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::ToolHttp(e.to_string()))?;
        Ok(Self { http, timeout })
    }

    /// The configured per-request timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Issue one HTTP request and return the normalized result.
    ///
    /// - Bodies are JSON-encoded; a body on GET/DELETE is a `validation`
    ///   error before any network traffic.
    /// - Timeouts map to `tool_timeout`, connect/DNS/TLS failures to
    ///   `tool_http`, and any status ≥ 400 to `tool_non_2xx` with the
    ///   decoded body preserved.
    pub async fn request(
        &self,
        method: HttpMethod,
        url: &str,
        query: &[(String, String)],
        headers: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<HttpResponse> {
        if body.is_some() && !method.allows_body() {
            return Err(Error::Validation(format!(
                "{method} request to {url} may not carry a body"
            )));
        }

        let mut rb = match method {
            HttpMethod::Get => self.http.get(url),
            HttpMethod::Post => self.http.post(url),
            HttpMethod::Put => self.http.put(url),
            HttpMethod::Patch => self.http.patch(url),
            HttpMethod::Delete => self.http.delete(url),
        };
        if !query.is_empty() {
            rb = rb.query(query);
        }
        for (name, value) in headers {
            rb = rb.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            rb = rb.json(body);
        }

        let resp = rb.send().await.map_err(|e| self.classify_transport(e))?;
        let status = resp.status().as_u16();

        let header_map: BTreeMap<String, String> = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_owned(), v.to_owned()))
            })
            .collect();

        let is_json = header_map
            .get("content-type")
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false);

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| self.classify_transport(e))?;

        let body = if is_json {
            match serde_json::from_slice::<Value>(&bytes) {
                Ok(value) => DecodedBody::Json(value),
                // Server lied about the content type; keep the raw payload.
                Err(_) => DecodedBody::Bytes(bytes.to_vec()),
            }
        } else {
            DecodedBody::Bytes(bytes.to_vec())
        };

        if status >= 400 {
            return Err(Error::ToolNon2xx {
                status,
                body: body.into_value(),
            });
        }

        Ok(HttpResponse {
            status,
            headers: header_map,
            body,
        })
    }

    fn classify_transport(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::ToolTimeout(self.timeout.as_millis() as u64)
        } else {
            Error::ToolHttp(err.to_string())
        }
    }
}
