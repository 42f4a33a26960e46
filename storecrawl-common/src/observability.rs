//! Crawl logging: one daily log file per run, optionally mirrored to stderr.
//!
//! The `crawl.progress` target carries the data a verbose run prints (found
//! developers, app URLs, crawled apps); the other targets are diagnostics.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

const LOG_DIR_ENV: &str = "STORECRAWL_LOG_DIR";

type SinkLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Used as the data directory name and the log file stem.
    pub app_name: &'static str,
    /// Overrides `STORECRAWL_LOG_DIR` and the platform data directory.
    pub log_dir: Option<PathBuf>,
    pub emit_stderr: bool,
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            app_name: "storecrawl",
            log_dir: None,
            emit_stderr: false,
            format: LogFormat::Text,
            default_filter: "info".to_string(),
        }
    }
}

/// Install the global subscriber and return today's log file.
///
/// Only the first call installs anything; later calls return the path chosen
/// by the first.
pub fn init_logging(config: LogConfig) -> anyhow::Result<PathBuf> {
    if let Some(path) = LOG_PATH.get() {
        return Ok(path.clone());
    }

    let dir = resolve_log_dir(
        config.app_name,
        config.log_dir.as_deref(),
        std::env::var_os(LOG_DIR_ENV).map(PathBuf::from),
    );
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;

    let stem = format!("{}.log", config.app_name);
    let (file_writer, guard) = tracing_appender::non_blocking(rolling::daily(&dir, &stem));
    let _ = LOG_GUARD.set(guard);

    let mut sinks = vec![sink(config.format, file_writer, false)];
    if config.emit_stderr {
        sinks.push(sink(config.format, std::io::stderr, true));
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_filter));

    tracing_subscriber::registry()
        .with(sinks)
        .with(filter)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing setup failed: {e}"))?;

    let path = log_file_path(&dir, config.app_name, Local::now().date_naive());
    let _ = LOG_PATH.set(path.clone());
    Ok(path)
}

fn sink<W>(format: LogFormat, writer: W, ansi: bool) -> SinkLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    match format {
        LogFormat::Text => fmt::layer().with_writer(writer).with_ansi(ansi).boxed(),
        LogFormat::Json => fmt::layer().json().with_writer(writer).boxed(),
    }
}

/// File written by the daily appender on `date`.
fn log_file_path(dir: &Path, app_name: &str, date: NaiveDate) -> PathBuf {
    dir.join(format!("{app_name}.log.{}", date.format("%Y-%m-%d")))
}

/// Explicit directory, then the environment override, then the platform's
/// local data directory.
fn resolve_log_dir(app_name: &str, explicit: Option<&Path>, env_dir: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = explicit {
        return expand_home(dir);
    }
    if let Some(dir) = env_dir {
        return expand_home(&dir);
    }
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(app_name)
}

fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), dirs::home_dir()) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
