//! Tracing setup shared by the binaries.
//!
//! - `SOLRINDEXER_LOGLEVEL`: TRACE, DEBUG, INFO, WARN or ERROR (default INFO)
//! - `SOLRINDEXER_LOGFILE`: also write logs to this file, without colours
//! - `SOLRINDEXER_LOG_FORMAT=json`: structured JSON output
//! - `RUST_LOG`: a full filter directive, overriding the level

use std::env;
use std::fs::OpenOptions;
use std::str::FromStr;
use std::sync::Mutex;

use tracing::{info, warn, Level};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry,
};

use crate::IndexingError;

const ENV_LOG_LEVEL: &str = "SOLRINDEXER_LOGLEVEL";
const ENV_LOG_FILE: &str = "SOLRINDEXER_LOGFILE";
const ENV_LOG_FORMAT: &str = "SOLRINDEXER_LOG_FORMAT";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Parse a log level name. Unknown names give `None`.
pub fn parse_level(value: &str) -> Option<Level> {
    Level::from_str(value.trim()).ok()
}

fn filter(level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()))
}

/// Initialize tracing for a binary.
///
/// # Arguments
///
/// * `service_name` - Name of the binary, logged once at startup
pub fn init_tracing(service_name: &str) -> Result<(), IndexingError> {
    let requested = env::var(ENV_LOG_LEVEL).ok();
    let level = requested
        .as_deref()
        .map(|value| parse_level(value).unwrap_or(Level::INFO))
        .unwrap_or(Level::INFO);
    let verbose = matches!(level, Level::DEBUG | Level::TRACE);
    let json = env::var(ENV_LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let console = fmt::layer().with_target(verbose).with_thread_ids(verbose);
    layers.push(if json {
        console.json().with_filter(filter(level)).boxed()
    } else {
        console.with_filter(filter(level)).boxed()
    });

    let log_file = env::var(ENV_LOG_FILE).ok().filter(|p| !p.trim().is_empty());
    if let Some(path) = &log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| IndexingError::config(format!("cannot open log file {}: {}", path, e)))?;
        layers.push(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(verbose)
                .with_filter(filter(level))
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| IndexingError::config(format!("cannot initialize tracing: {}", e)))?;

    if let Some(value) = requested.filter(|v| parse_level(v).is_none()) {
        warn!(value = %value, "Invalid {}, using INFO", ENV_LOG_LEVEL);
    }
    info!(
        service_name = service_name,
        service_version = env!("CARGO_PKG_VERSION"),
        level = %level,
        log_file = ?log_file,
        "Tracing initialized"
    );
    Ok(())
}
