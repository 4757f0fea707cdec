//! Logging initialization helpers.
//!
//! Installs the global `tracing` subscriber from a [`LogConfig`]: JSON or
//! plain text, written to stdout or to a file with optional rotation.

use crate::config::LogConfig;
use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use std::path::Path;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Keeps the background file writer alive for the lifetime of the process.
static FILE_GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Compute the effective filter spec.
///
/// Precedence: `RUST_LOG` > CLI verbosity > `cfg.level`.
///
/// - `RUST_LOG` set and non-empty: returned unchanged.
/// - verbosity 0 or none: `warn,lazyresolv=<cfg.level>`
/// - verbosity 1: `warn,lazyresolv=debug`
/// - verbosity 2: `warn,lazyresolv=trace`
/// - verbosity 3 and up: `trace`, external crates included
pub(crate) fn effective_log_spec(cfg: &LogConfig, cli_verbose: Option<u8>) -> String {
    match std::env::var("RUST_LOG") {
        Ok(v) if !v.is_empty() => return v,
        _ => {}
    }

    match cli_verbose.unwrap_or(0) {
        0 => format!("warn,lazyresolv={}", cfg.level),
        1 => "warn,lazyresolv=debug".to_string(),
        2 => "warn,lazyresolv=trace".to_string(),
        _ => "trace".to_string(),
    }
}

/// Open the configured log destination.
///
/// Returns `None` when logging goes to stdout.
fn file_writer(cfg: &LogConfig) -> Result<Option<BoxMakeWriter>> {
    let Some(path) = &cfg.file else {
        return Ok(None);
    };
    let path = Path::new(path);

    let (non_blocking, guard) = match cfg.rotate.as_str() {
        "daily" | "hourly" => {
            let rotation_dir = cfg
                .rotate_dir
                .as_deref()
                .map(Path::new)
                .or_else(|| path.parent().filter(|p| !p.as_os_str().is_empty()))
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .and_then(|s| s.to_str())
                .unwrap_or("lazyresolv.log");

            let rolling = if cfg.rotate == "daily" {
                tracing_appender::rolling::daily(rotation_dir, file_name)
            } else {
                tracing_appender::rolling::hourly(rotation_dir, file_name)
            };
            tracing_appender::non_blocking(rolling)
        }
        _ => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            tracing_appender::non_blocking(file)
        }
    };

    let _ = FILE_GUARD.set(guard);
    Ok(Some(BoxMakeWriter::new(non_blocking)))
}

/// Initialize global logging according to `cfg`.
///
/// A second call is a no-op: the first subscriber stays installed.
pub fn init_logging(cfg: &LogConfig, cli_verbose: Option<u8>) -> Result<()> {
    let filter = EnvFilter::try_new(effective_log_spec(cfg, cli_verbose))
        .context("invalid log filter")?;
    let file = file_writer(cfg)?;
    let ansi = file.is_none();
    let writer = file.unwrap_or_else(|| BoxMakeWriter::new(std::io::stdout));

    let registry = tracing_subscriber::registry().with(filter);

    if cfg.format == "json" {
        let layer = tracing_subscriber::fmt::layer()
            .json()
            .with_ansi(false)
            .with_writer(writer);
        let _ = registry.with(layer).try_init();
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_ansi(ansi)
            .with_writer(writer);
        let _ = registry.with(layer).try_init();
    }

    Ok(())
}
