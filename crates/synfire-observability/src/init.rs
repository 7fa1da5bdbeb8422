// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialization.
//!
//! Console output always; with the `file-logging` feature a JSON file layer
//! is added under a timestamped run folder.

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

/// Keeps file-appender worker guards alive for the lifetime of the run.
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Run-folder path when file logging is active.
    pub fn log_dir(&self) -> Option<&PathBuf> {
        self.log_dir.as_ref()
    }
}

/// Initialize logging.
///
/// `filter` is a tracing env-filter expression (e.g. `"synfire_engine=debug"`);
/// when `None`, the `SYNFIRE_LOG` environment variable is consulted with an
/// `info` fallback.
pub fn init_logging(filter: Option<&str>, log_dir: Option<PathBuf>) -> Result<LoggingGuard> {
    let env_filter = match filter {
        Some(expr) => EnvFilter::new(expr),
        None => EnvFilter::try_from_env("SYNFIRE_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(env_filter);

    #[cfg(feature = "file-logging")]
    {
        use anyhow::Context;

        let base_log_dir = log_dir.unwrap_or_else(|| PathBuf::from("./logs"));
        let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let run_folder = base_log_dir.join(format!("run_{timestamp}"));
        std::fs::create_dir_all(&run_folder)
            .with_context(|| format!("failed to create log directory: {}", run_folder.display()))?;

        let file_appender = tracing_appender::rolling::daily(&run_folder, "synfire.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .json()
            .boxed();

        Registry::default()
            .with(console_layer)
            .with(file_layer)
            .init();

        return Ok(LoggingGuard {
            _file_guards: vec![guard],
            log_dir: Some(run_folder),
        });
    }

    #[cfg(not(feature = "file-logging"))]
    {
        let _ = log_dir;
        Registry::default().with(console_layer).init();
        Ok(LoggingGuard { log_dir: None })
    }
}

/// Initialize logging with default settings.
pub fn init_logging_default() -> Result<LoggingGuard> {
    init_logging(None, None)
}
