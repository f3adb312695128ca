//! scholar-record - Google Scholar profile publication harvester
//!
//! Pages through a Scholar profile, follows every publication to its detail
//! page and writes the records as one JSON array.
//!
//! ## Usage
//!
//! ### CLI Mode
//! ```bash
//! scholar-record fetch --user 61Ou1P8AAAAJ --output data/scholar.json
//! ```
//!
//! ### GitHub Action step
//! ```bash
//! env "INPUT_GOOGLE-SCHOLAR-ID=61Ou1P8AAAAJ" scholar-record action
//! ```
//!
//! ### HTTP Server Mode
//! ```bash
//! scholar-record serve --port 3000
//! ```

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use clap::{Args, Parser, Subcommand};
use scholar_record::{
    config::{self, Config, SourceKind},
    cookies::CookieJar,
    harvest,
    output::OutputSink,
    PublicationRecord, ScholarError,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// ============================================================================
// CLI Definition
// ============================================================================

/// Google Scholar profile publication harvester
#[derive(Parser)]
#[command(name = "scholar-record")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Harvest a profile and write the result set
    Fetch(FetchArgs),

    /// Run as a GitHub Actions step, configured through INPUT_* variables
    Action,

    /// Run as HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[command(flatten)]
        tuning: TuningArgs,
    },

    /// Manage cookies
    Cookies {
        /// Cookie file (default: ~/.scholar_record_cookies.json)
        #[arg(long)]
        file: Option<PathBuf>,

        #[command(subcommand)]
        action: CookieAction,
    },
}

#[derive(Args)]
struct FetchArgs {
    /// Scholar profile id (the `user=` parameter of the profile URL)
    #[arg(long, env = "GOOGLE_SCHOLAR_ID")]
    user: String,

    /// Write the JSON array to this file instead of publishing an output value
    #[arg(short, long, env = "RECORD_FILE")]
    output: Option<PathBuf>,

    /// Name of the published output value
    #[arg(long, default_value = config::DEFAULT_OUTPUT_NAME)]
    output_name: String,

    /// Listing source: scholar or serpapi
    #[arg(long, default_value = "scholar", value_parser = ["scholar", "serpapi"])]
    source: String,

    /// SerpApi key (required for --source serpapi)
    #[arg(long, env = "SERPAPI_KEY", hide_env_values = true)]
    serpapi_key: Option<String>,

    /// Indent the JSON output
    #[arg(long)]
    pretty: bool,

    #[command(flatten)]
    tuning: TuningArgs,
}

/// Request pacing and transport options shared by `fetch` and `serve`
#[derive(Args, Clone, Debug)]
struct TuningArgs {
    /// Rows requested per listing page
    #[arg(long, default_value_t = config::DEFAULT_PAGE_SIZE)]
    page_size: usize,

    /// Delay before each listing page request (ms)
    #[arg(long, default_value = "1000")]
    page_delay_ms: u64,

    /// Delay before each detail page request (ms)
    #[arg(long, default_value = "2000")]
    detail_delay_ms: u64,

    /// Random extra delay added to each request (ms)
    #[arg(long, default_value = "0")]
    jitter_ms: u64,

    /// Timeout for each HTTP call (seconds)
    #[arg(long, default_value = "30")]
    timeout_secs: u64,

    /// Retries for transient failures
    #[arg(long, default_value = "0")]
    retries: u32,

    /// Scholar base URL (mirror)
    #[arg(long, default_value = config::DEFAULT_SCHOLAR_URL)]
    base_url: String,

    /// Proxy URL (e.g., http://127.0.0.1:7890)
    #[arg(long)]
    proxy: Option<String>,

    /// Cookie file sent with Scholar requests
    #[arg(long)]
    cookies: Option<PathBuf>,
}

impl TuningArgs {
    fn apply(&self, config: &mut Config) {
        config.page_size = self.page_size;
        config.pacing.page_delay = Duration::from_millis(self.page_delay_ms);
        config.pacing.detail_delay = Duration::from_millis(self.detail_delay_ms);
        config.pacing.jitter = Duration::from_millis(self.jitter_ms);
        config.request_timeout = Duration::from_secs(self.timeout_secs);
        config.max_retries = self.retries;
        config.base_url = self.base_url.clone();
        config.proxy = self.proxy.clone();
        config.cookie_file = self.cookies.clone();
    }
}

impl FetchArgs {
    fn into_config(self) -> Result<Config> {
        let mut config = Config::new(self.user);
        self.tuning.apply(&mut config);
        config.record_file = self.output.filter(|p| !p.as_os_str().is_empty());
        config.output_name = self.output_name;
        config.source = self.source.parse::<SourceKind>()?;
        config.serpapi_key = self.serpapi_key;
        config.pretty = self.pretty;
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum CookieAction {
    /// Show cookie file path
    Path,
    /// Clear stored cookies
    Clear,
    /// Import cookies exported from a browser as JSON
    Import {
        /// JSON file: [{"name":"NID","value":"...","domain":".google.com"}, ...]
        source: PathBuf,
    },
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug, cli.log_json);

    let outcome = match cli.command {
        Commands::Fetch(args) => run_fetch(args).await,
        Commands::Action => run_action().await,
        Commands::Serve { port, host, tuning } => run_server(host, port, tuning).await,
        Commands::Cookies { file, action } => handle_cookies(file, action),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let message = format!("{:#}", e);
            error!(error = %message, "Run failed");
            if std::env::var("GITHUB_ACTIONS").is_ok_and(|v| v == "true") {
                println!("::error::{}", escape_workflow_data(&message));
            }
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so a JSON result on stdout stays parseable.
fn init_logging(debug: bool, json: bool) {
    let log_level = if debug { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn escape_workflow_data(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

// ============================================================================
// Harvest
// ============================================================================

async fn run_fetch(args: FetchArgs) -> Result<()> {
    let config = args.into_config().context("Invalid configuration")?;
    harvest_and_write(&config).await
}

async fn run_action() -> Result<()> {
    let config = Config::from_inputs(config::action_input).context("Invalid action inputs")?;
    harvest_and_write(&config).await
}

async fn harvest_and_write(config: &Config) -> Result<()> {
    let report = harvest::harvest(config).await?;
    OutputSink::from_config(config)
        .write(&report.records, config.pretty)
        .context("Failed to write result set")?;
    Ok(())
}

// ============================================================================
// HTTP Server
// ============================================================================

async fn run_server(host: String, port: u16, tuning: TuningArgs) -> Result<()> {
    info!(host = %host, port = port, "Starting HTTP server");

    let app_state = Arc::new(AppState { tuning });

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/records", post(records_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .context("Invalid host:port")?;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Listening");

    axum::serve(listener, app)
        .await
        .context("Server error")?;

    Ok(())
}

struct AppState {
    tuning: TuningArgs,
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

/// Records request body
#[derive(Debug, Deserialize)]
struct RecordsRequest {
    user: String,
    page_size: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, e: impl std::fmt::Display) -> ApiError {
    (status, Json(ErrorBody { error: e.to_string() }))
}

/// Harvest endpoint handler
async fn records_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RecordsRequest>,
) -> std::result::Result<Json<Vec<PublicationRecord>>, ApiError> {
    info!(user = %req.user, "Records request");

    let mut config = Config::new(req.user);
    state.tuning.apply(&mut config);
    if let Some(page_size) = req.page_size {
        config.page_size = page_size;
    }
    config
        .validate()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;

    match harvest::harvest(&config).await {
        Ok(report) => Ok(Json(report.records)),
        Err(e) => {
            error!(error = %e, "Harvest failed");
            let status = match e {
                ScholarError::Config(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::BAD_GATEWAY,
            };
            Err(api_error(status, e))
        }
    }
}

// ============================================================================
// Cookie Management
// ============================================================================

fn handle_cookies(file: Option<PathBuf>, action: CookieAction) -> Result<()> {
    let jar = match file {
        Some(path) => CookieJar::at(path),
        None => CookieJar::default_location()?,
    };

    match action {
        CookieAction::Path => {
            println!("Cookie file: {}", jar.path().display());
        }
        CookieAction::Clear => {
            jar.clear()?;
            println!("Cookies cleared.");
        }
        CookieAction::Import { source } => {
            let count = jar
                .import(&source)
                .with_context(|| format!("Failed to import cookies from {}", source.display()))?;
            println!("Saved {} cookies to {}", count, jar.path().display());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_fetch_args_into_config() {
        let cli = Cli::try_parse_from([
            "scholar-record",
            "fetch",
            "--user",
            "abc",
            "--output",
            "out.json",
            "--page-size",
            "20",
            "--page-delay-ms",
            "0",
        ])
        .expect("parse");
        let Commands::Fetch(args) = cli.command else {
            panic!("expected fetch");
        };
        let config = args.into_config().expect("config");
        assert_eq!(config.subject_id, "abc");
        assert_eq!(config.record_file, Some(PathBuf::from("out.json")));
        assert_eq!(config.page_size, 20);
        assert_eq!(config.pacing.page_delay, Duration::ZERO);
        assert_eq!(config.pacing.detail_delay, Duration::from_secs(2));
    }

    #[test]
    fn test_escape_workflow_data() {
        assert_eq!(escape_workflow_data("a\nb 100%"), "a%0Ab 100%25");
    }
}
