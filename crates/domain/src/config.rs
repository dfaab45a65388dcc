//! Process configuration, loaded from `config.toml`.
//!
//! Every section has serde defaults so an empty (or absent) file yields a
//! runnable configuration. `Config::validate` reports issues with a
//! severity; the gateway refuses to start on `Error`-level issues.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub services: ServicesConfig,
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Server
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
    /// Origins allowed for CORS. Use `["*"]` for permissive.
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,
    /// Cap on in-flight HTTP requests (tower concurrency limit).
    #[serde(default = "d_max_requests")]
    pub max_concurrent_requests: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: d_host(),
            port: d_port(),
            cors_allowed_origins: Vec::new(),
            max_concurrent_requests: d_max_requests(),
        }
    }
}

impl ServerConfig {
    /// Bind address, honoring the `LISTEN_ADDR` environment override.
    pub fn listen_addr(&self) -> String {
        std::env::var("LISTEN_ADDR").unwrap_or_else(|_| format!("{}:{}", self.host, self.port))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Executions running at once; submissions above this hold `pending`.
    #[serde(default = "d_max_concurrent")]
    pub max_concurrent_executions: usize,
    /// Pending + running ceiling; above this, submissions are rejected.
    #[serde(default = "d_admission_cap")]
    pub admission_cap: usize,
    /// How long terminal records stay queryable.
    #[serde(default = "d_retention_secs")]
    pub retention_secs: u64,
    /// Hard cap on retained terminal records (LRU beyond it).
    #[serde(default = "d_retention_cap")]
    pub retention_cap: usize,
    #[serde(default = "d_max_retries")]
    pub default_max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_executions: d_max_concurrent(),
            admission_cap: d_admission_cap(),
            retention_secs: d_retention_secs(),
            retention_cap: d_retention_cap(),
            default_max_retries: d_max_retries(),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Client
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Per-tool-call timeout.
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self { timeout_ms: d_timeout_ms() }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Downstream services
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Base URLs for the downstream services the built-in catalog binds to.
/// Unlisted services fall back to the stock compose-network defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServicesConfig {
    #[serde(flatten)]
    pub base_urls: BTreeMap<String, String>,
}

impl ServicesConfig {
    pub fn base_url(&self, service: &str) -> Option<String> {
        if let Some(url) = self.base_urls.get(service) {
            return Some(url.trim_end_matches('/').to_owned());
        }
        default_service_url(service).map(str::to_owned)
    }
}

fn default_service_url(service: &str) -> Option<&'static str> {
    match service {
        "doc_store" => Some("http://localhost:5087"),
        "prompt_store" => Some("http://localhost:5110"),
        "summarizer_hub" => Some("http://localhost:5160"),
        "analysis_service" => Some("http://localhost:5080"),
        "notification_service" => Some("http://localhost:5130"),
        "source_agent" => Some("http://localhost:5085"),
        "interpreter" => Some("http://localhost:5120"),
        "secure_analyzer" => Some("http://localhost:5070"),
        _ => None,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Persistence
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Optional terminal-snapshot sink. No path ⇒ in-memory-only operation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PersistenceConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.port == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }
        if self.server.host.is_empty() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.host".into(),
                message: "host must not be empty".into(),
            });
        }

        if self.engine.max_concurrent_executions == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "engine.max_concurrent_executions".into(),
                message: "must be at least 1".into(),
            });
        }
        if self.engine.admission_cap < self.engine.max_concurrent_executions {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "engine.admission_cap".into(),
                message: "must be >= engine.max_concurrent_executions".into(),
            });
        }

        if self.client.timeout_ms < 100 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "client.timeout_ms".into(),
                message: format!(
                    "{}ms is very aggressive; downstream calls will likely time out",
                    self.client.timeout_ms
                ),
            });
        }

        for (service, url) in &self.services.base_urls {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: format!("services.{service}"),
                    message: format!("base URL must start with http:// or https:// (got \"{url}\")"),
                });
            }
        }

        issues
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_host() -> String {
    "0.0.0.0".into()
}
fn d_port() -> u16 {
    5099
}
fn d_max_requests() -> usize {
    256
}
fn d_max_concurrent() -> usize {
    64
}
fn d_admission_cap() -> usize {
    1024
}
fn d_retention_secs() -> u64 {
    3600
}
fn d_retention_cap() -> usize {
    10_000
}
fn d_max_retries() -> u32 {
    3
}
fn d_timeout_ms() -> u64 {
    10_000
}
