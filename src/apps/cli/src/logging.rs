//! Logging Configuration
//!
//! Library crates log through the `log` facade; the subscriber installed here
//! captures those records as well as `tracing` events. Output goes to a file
//! by default so it never interleaves with the chat transcript.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Local};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

pub const ENV_LOG_LEVEL: &str = "TABBY_LOG_LEVEL";
const LOG_DIR: &str = ".logs";
const NOISY_TARGETS: [&str; 3] = ["hyper", "h2", "reqwest"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    File(PathBuf),
    Stderr,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: log::LevelFilter,
    pub target: LogTarget,
}

impl LogConfig {
    /// Resolves the level from `flag`, then `TABBY_LOG_LEVEL`, then the
    /// default (`debug` with `is_debug`, else `info`).
    pub fn new(
        flag: Option<&str>,
        is_debug: bool,
        log_file: Option<PathBuf>,
        to_stderr: bool,
    ) -> Self {
        let env = std::env::var(ENV_LOG_LEVEL).ok();
        let level = resolve_level(flag, env.as_deref(), is_debug);
        let target = if to_stderr {
            LogTarget::Stderr
        } else {
            LogTarget::File(log_file.unwrap_or_else(|| default_log_path(Local::now())))
        };
        Self { level, target }
    }
}

pub fn parse_log_level(value: &str) -> Option<log::LevelFilter> {
    match value.trim().to_lowercase().as_str() {
        "trace" => Some(log::LevelFilter::Trace),
        "debug" => Some(log::LevelFilter::Debug),
        "info" => Some(log::LevelFilter::Info),
        "warn" => Some(log::LevelFilter::Warn),
        "error" => Some(log::LevelFilter::Error),
        "off" => Some(log::LevelFilter::Off),
        _ => None,
    }
}

pub fn level_to_str(level: log::LevelFilter) -> &'static str {
    match level {
        log::LevelFilter::Trace => "trace",
        log::LevelFilter::Debug => "debug",
        log::LevelFilter::Info => "info",
        log::LevelFilter::Warn => "warn",
        log::LevelFilter::Error => "error",
        log::LevelFilter::Off => "off",
    }
}

fn default_level(is_debug: bool) -> log::LevelFilter {
    if is_debug {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    }
}

pub fn resolve_level(flag: Option<&str>, env: Option<&str>, is_debug: bool) -> log::LevelFilter {
    let (source, value) = match (flag, env) {
        (Some(flag), _) => ("--log-level", flag),
        (None, Some(env)) => (ENV_LOG_LEVEL, env),
        (None, None) => return default_level(is_debug),
    };
    parse_log_level(value).unwrap_or_else(|| {
        eprintln!(
            "Warning: Invalid {} '{}', falling back to default",
            source, value
        );
        default_level(is_debug)
    })
}

pub fn default_log_path(now: DateTime<Local>) -> PathBuf {
    let timestamp = now.format("%Y%m%dT%H%M%S").to_string();
    Path::new(LOG_DIR).join(format!("tabby-cli-{}.log", timestamp))
}

/// Filter directives: the chosen level, with HTTP internals clamped to `warn`.
pub fn filter_directives(level: log::LevelFilter) -> String {
    let base = level_to_str(level);
    let clamped = level_to_str(level.min(log::LevelFilter::Warn));
    let mut directives = vec![base.to_string()];
    directives.extend(
        NOISY_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, clamped)),
    );
    directives.join(",")
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create log directory {}", parent.display()))?;
    }
    File::create(path).with_context(|| format!("Failed to create log file {}", path.display()))
}

pub fn init_logging(config: &LogConfig) -> Result<()> {
    let (writer, ansi) = match &config.target {
        LogTarget::Stderr => (BoxMakeWriter::new(std::io::stderr), true),
        LogTarget::File(path) => (BoxMakeWriter::new(Mutex::new(open_log_file(path)?)), false),
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter_directives(config.level)))
        .with_writer(writer)
        .with_ansi(ansi)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))?;

    log::info!(
        "Logging initialized: level={}, target={:?}",
        level_to_str(config.level),
        config.target
    );
    Ok(())
}
