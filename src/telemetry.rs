//! Logging setup

use crate::config::LoggingConfig;
use crate::error::Result;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::debug;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Current local date as `mm_dd_yy`, used for log files and output folders
pub fn date_stamp() -> String {
    chrono::Local::now().format("%m_%d_%y").to_string()
}

/// Path of the log file for today, if file logging is configured
pub fn log_file_path(config: &LoggingConfig) -> Option<PathBuf> {
    config
        .log_dir
        .as_ref()
        .map(|dir| dir.join(format!("{}{}.log", config.file_prefix, date_stamp())))
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. When `log_dir` is set,
/// output is appended to `<log_dir>/<file_prefix><mm_dd_yy>.log`. Calling this
/// twice keeps the first subscriber.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let (writer, ansi) = match log_file_path(config) {
        Some(path) => {
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stdout), true),
    };

    let layer = if config.json {
        fmt::layer().json().with_writer(writer).boxed()
    } else {
        fmt::layer().with_ansi(ansi).with_writer(writer).boxed()
    };

    if let Err(e) = tracing_subscriber::registry().with(filter).with(layer).try_init() {
        debug!("Tracing subscriber already installed: {}", e);
    }

    Ok(())
}
