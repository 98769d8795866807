use std::fs;
use std::path::Path;

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LogConfig;
use crate::core::error::IntelError;

const ROTATE_BYTES: u64 = 1_000_000;

/// Installs the global subscriber: `RUST_LOG` wins over the configured level, output
/// goes to stdout and, when configured, to an append-only file rotated once past 1 MB.
pub fn init_tracing(cfg: &LogConfig) -> Result<(), IntelError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));

    let file_layer = match &cfg.file {
        Some(path) => {
            let log_path = Path::new(path);
            if let Some(parent) = log_path.parent() {
                fs::create_dir_all(parent).map_err(|e| IntelError::Config(e.to_string()))?;
            }
            rotate_if_large(log_path);
            let file = fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(log_path)
                .map_err(|e| IntelError::Config(e.to_string()))?;
            Some(
                fmt::layer()
                    .with_writer(file)
                    .with_ansi(false)
                    .with_target(false)
                    .boxed(),
            )
        }
        None => None,
    };

    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .map_err(|e| IntelError::Config(e.to_string()))
}

fn rotate_if_large(log_path: &Path) {
    if let Ok(meta) = fs::metadata(log_path) {
        if meta.len() > ROTATE_BYTES {
            let rotated = log_path.with_extension("log.1");
            let _ = fs::rename(log_path, rotated);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_layer_creates_log_file() {
        let dir = std::env::temp_dir().join("stasis_logger_test");
        let path = dir.join("stasis.log");
        let cfg = LogConfig {
            level: "debug".into(),
            file: Some(path.to_string_lossy().to_string()),
        };
        init_tracing(&cfg).unwrap();
        tracing::info!(actor_id = "TA24RUS-APT1F3", "logger online");
        assert!(path.exists());

        // the global subscriber can only be installed once
        assert!(matches!(init_tracing(&cfg), Err(IntelError::Config(_))));
    }
}
