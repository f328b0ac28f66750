//! log4rs setup: rolling `app.log` plus an `audit.log` fed by the `bookshelf::audit` target.

use crate::config::LogConfig;
use crate::errors::DbError;
use log::LevelFilter;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::Path;

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;

/// Initializes the logging system from a log4rs YAML file.
///
/// # Errors
/// Returns an error if the file cannot be loaded.
pub fn init_path(path: &Path) -> Result<(), DbError> {
    log4rs::init_file(path, log4rs::config::Deserializers::default())
        .map_err(|e| DbError::Config(format!("log config {}: {e}", path.display())))
}

#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

fn rolling(base: &Path, stem: &str, keep: u32) -> Result<RollingFileAppender, DbError> {
    let roller = FixedWindowRoller::builder()
        .build(&format!("{}", base.join(format!("{stem}.{{}}.log")).display()), keep)
        .map_err(|e| DbError::Config(e.to_string()))?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(base.join(format!("{stem}.log")), Box::new(policy))
        .map_err(|e| DbError::Io(e.to_string()))
}

/// Builds the log4rs config for `dir`. `trace` additionally routes `bookshelf::trace` lines
/// into `trace.log`.
///
/// # Errors
/// Returns an error if the directory or an appender cannot be created.
pub fn build_config(dir: &Path, level: &str, retention: usize, trace: bool) -> Result<Config, DbError> {
    std::fs::create_dir_all(dir)?;
    let lvl = parse_level(level);
    let keep = u32::try_from(retention.max(1)).unwrap_or(u32::MAX);
    let mut builder = Config::builder()
        .appender(Appender::builder().build("app", Box::new(rolling(dir, "app", keep)?)))
        .appender(Appender::builder().build("audit", Box::new(rolling(dir, "audit", keep)?)))
        .logger(Logger::builder().appender("audit").additive(false).build("bookshelf::audit", lvl));
    builder = if trace {
        builder
            .appender(Appender::builder().build("trace", Box::new(rolling(dir, "trace", keep)?)))
            .logger(
                Logger::builder()
                    .appender("trace")
                    .additive(false)
                    .build("bookshelf::trace", LevelFilter::Trace),
            )
    } else {
        builder.logger(Logger::builder().additive(false).build("bookshelf::trace", LevelFilter::Off))
    };
    builder
        .build(Root::builder().appender("app").build(lvl))
        .map_err(|e| DbError::Config(e.to_string()))
}

/// Configure logging globally for the process. A second call is a no-op once a logger is set.
///
/// # Errors
/// Returns an error if the configuration cannot be built.
pub fn configure_logging(cfg: &LogConfig, trace: bool) -> Result<(), DbError> {
    let Some(dir) = cfg.dir.as_deref() else {
        return Ok(());
    };
    let config = build_config(dir, &cfg.level, cfg.retention, trace)?;
    if log4rs::init_config(config).is_err() {
        log::debug!("logger already initialized; keeping existing configuration");
    }
    Ok(())
}

/// Configure logging from environment variables if present:
/// - `BOOKSHELF_LOG_DIR`
/// - `BOOKSHELF_LOG_LEVEL`
/// - `BOOKSHELF_LOG_RETENTION`
/// - `BOOKSHELF_TRACE` (`1`/`true`/`yes` routes query traces to `trace.log`)
///
/// # Errors
/// Returns an error if the configuration cannot be built.
pub fn configure_from_env() -> Result<(), DbError> {
    let mut cfg = crate::config::ShelfConfig::default();
    cfg.apply_env(std::env::vars());
    let trace = std::env::var("BOOKSHELF_TRACE")
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);
    configure_logging(&cfg.log, trace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names_map_to_filters() {
        assert_eq!(parse_level("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_level("off"), LevelFilter::Off);
        assert_eq!(parse_level("bogus"), LevelFilter::Info);
    }

    #[test]
    fn build_config_creates_log_dir() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        build_config(&logs, "info", 3, true).unwrap();
        assert!(logs.is_dir());
    }

    #[test]
    fn missing_yaml_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = init_path(&dir.path().join("log4rs.yaml")).unwrap_err();
        assert!(matches!(err, DbError::Config(ref m) if m.contains("log4rs.yaml")));
    }

    #[test]
    fn no_dir_means_no_logger() {
        assert!(configure_logging(&LogConfig::default(), false).is_ok());
    }
}
