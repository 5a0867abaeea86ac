use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use tracing::debug;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::errors::SyncError;

pub const LOG_FILE_NAME: &str = "plsync.log";

/// Console directives: RUST_LOG wins, otherwise `level_console` for this crate
/// (and for every crate when `console_globally` is set)
pub fn console_directives(cfg: &LoggingConfig, rust_log: Option<&str>) -> String {
    match rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        Some(env) => env.to_string(),
        None if cfg.console_globally => cfg.level_console.clone(),
        None => format!("warn,{}={}", env!("CARGO_CRATE_NAME"), cfg.level_console),
    }
}

fn parse_filter(directives: &str) -> Result<EnvFilter, SyncError> {
    EnvFilter::try_new(directives)
        .map_err(|e| SyncError::Config(format!("invalid log level '{directives}': {e}")))
}

/// Console output plus `<logs_dir>/plsync.log`, each with its own level
pub fn init_logging(cfg: &LoggingConfig, logs_dir: &Path) -> Result<(), SyncError> {
    std::fs::create_dir_all(logs_dir)
        .map_err(|e| SyncError::PathCreationFailed(format!("{}: {e}", logs_dir.display())))?;
    let log_path = logs_dir.join(LOG_FILE_NAME);
    let file = OpenOptions::new().create(true).append(true).open(&log_path)?;

    let rust_log = std::env::var("RUST_LOG").ok();
    let console_filter = parse_filter(&console_directives(cfg, rust_log.as_deref()))?;
    let file_filter = parse_filter(&cfg.level_logfiles)?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .without_time()
                .with_filter(console_filter),
        )
        .with(
            fmt::layer()
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .try_init()
        .map_err(|e| SyncError::Config(format!("logger already initialized: {e}")))?;

    debug!("[Logging] Writing logs to '{}'", log_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_console_directives() {
        let mut cfg = LoggingConfig::default();
        assert_eq!(console_directives(&cfg, Some("trace")), "trace");
        assert_eq!(console_directives(&cfg, Some("  ")), "warn,plsync=warn");
        cfg.level_console = "info".to_string();
        assert_eq!(console_directives(&cfg, None), "warn,plsync=info");
        cfg.console_globally = true;
        assert_eq!(console_directives(&cfg, None), "info");
    }

    #[test]
    fn test_bad_level_is_config_error() {
        assert!(matches!(parse_filter("plsync=loud"), Err(SyncError::Config(_))));
    }
}
