use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::Parser;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use weft_client::ServiceClient;
use weft_domain::config::{Config, ConfigSeverity};
use weft_engine::persist::{FsSink, SnapshotSink};
use weft_engine::{ConditionRegistry, ExecutionRegistry, Executor, TemplateLibrary};
use weft_gateway::cli::{self, Cli, Command, ConfigCommand};
use weft_gateway::state::AppState;
use weft_gateway::api;
use weft_tools::{catalog, DiscoveryAdapter, ToolRegistry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            init_tracing();
            let config = cli::load_config(&cli.config)?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let config = cli::load_config(&cli.config)?;
            let issues = config.validate();
            for issue in &issues {
                eprintln!("{issue}");
            }
            if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
                std::process::exit(1);
            }
            println!("configuration ok");
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let config = cli::load_config(&cli.config)?;
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
        Some(Command::Version) => {
            println!("weft {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize structured JSON tracing (only for the `serve` command).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,weft_gateway=debug")),
        )
        .json()
        .init();
}

/// Start the orchestrator server with the given configuration.
async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("weft orchestrator starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Tool registry + built-in catalog discovery ──────────────────
    let tools = Arc::new(ToolRegistry::new());
    let adapter = DiscoveryAdapter::new(tools.clone());
    for descriptor in catalog::default_descriptors(&config.services) {
        let service = descriptor.service_name.clone();
        match adapter.apply(&descriptor) {
            Ok(report) => {
                if !report.warnings.is_empty() {
                    tracing::warn!(
                        service = %service,
                        warnings = report.warnings.len(),
                        "catalog descriptor applied with warnings"
                    );
                }
            }
            Err(e) => tracing::error!(service = %service, error = %e, "catalog descriptor rejected"),
        }
    }
    tracing::info!(tools = tools.len(), "tool registry ready");

    // ── Condition + template registries ─────────────────────────────
    let conditions = Arc::new(ConditionRegistry::with_builtins());
    let templates = Arc::new(
        TemplateLibrary::with_builtins(&conditions).context("registering builtin templates")?,
    );
    tracing::info!(
        conditions = conditions.len(),
        templates = templates.len(),
        "workflow library ready"
    );

    // ── Service client ───────────────────────────────────────────────
    let client = Arc::new(
        ServiceClient::new(&config.client).context("building the service client")?,
    );
    tracing::info!(timeout_ms = config.client.timeout_ms, "service client ready");

    // ── Snapshot sink (optional persistence) ────────────────────────
    let sink: Option<Arc<dyn SnapshotSink>> = match &config.persistence.path {
        Some(path) => {
            let sink = FsSink::new(path.clone())
                .with_context(|| format!("creating snapshot sink at {}", path.display()))?;
            tracing::info!(path = %path.display(), "snapshot persistence enabled");
            Some(Arc::new(sink))
        }
        None => {
            tracing::info!("snapshot persistence disabled (in-memory only)");
            None
        }
    };

    // ── Executor + execution registry ───────────────────────────────
    let executor = Arc::new(Executor::new(tools.clone(), conditions.clone(), client));
    let executions = Arc::new(ExecutionRegistry::new(
        config.engine.clone(),
        executor,
        sink,
    ));
    tracing::info!(
        max_concurrent = config.engine.max_concurrent_executions,
        admission_cap = config.engine.admission_cap,
        "execution registry ready"
    );

    // ── Periodic retention sweep ────────────────────────────────────
    {
        let executions = executions.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                interval.tick().await;
                let evicted = executions.sweep();
                if evicted > 0 {
                    tracing::info!(evicted, "swept terminal execution records");
                }
            }
        });
    }

    // ── App state ───────────────────────────────────────────────────
    let state = AppState {
        config: config.clone(),
        tools,
        conditions,
        templates,
        executions,
        started_at: Instant::now(),
    };

    // ── Router + layers ─────────────────────────────────────────────
    let mut app = api::router().with_state(state).layer(
        tower::limit::ConcurrencyLimitLayer::new(config.server.max_concurrent_requests),
    );
    if let Some(cors) = build_cors_layer(&config.server.cors_allowed_origins) {
        app = app.layer(cors);
    }

    // ── Bind ────────────────────────────────────────────────────────
    let addr = config.server.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "weft orchestrator listening");

    axum::serve(listener, app).await.context("axum server error")?;

    Ok(())
}

/// Build a [`CorsLayer`] from the configured allowed origins. An empty
/// list disables CORS entirely; a literal `"*"` allows all origins.
fn build_cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }

    let allow_origin = if origins.len() == 1 && origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        AllowOrigin::any()
    } else {
        let exact: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse::<HeaderValue>() {
                Ok(hv) => Some(hv),
                Err(_) => {
                    tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
                    None
                }
            })
            .collect();
        AllowOrigin::list(exact)
    };

    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([axum::http::header::CONTENT_TYPE]),
    )
}
