//! File-based logging for the Cascata runtime
//!
//! Components write to separate daily-rolling log files, routed by their
//! `tracing` target (Rust module path):
//!
//! | Log File         | Component                    | Target Prefixes |
//! |------------------|------------------------------|-----------------|
//! | cascata.log      | Root logger (all components) | (all)           |
//! | core-auth.log    | Authentication/authorization | cascata_auth    |
//! | usage-collect.log| Usage data collection        | cascata_udc     |
//! | http-context.log | Outstanding-request registry | cascata_http    |
//!
//! File logging is enabled by configuring `cascata.logs.path` (or the
//! `--log-dir` flag); without it only the console layer is installed.

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{LevelFilter, Targets};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

/// Internal definition for a component log file.
struct ComponentLogDef {
    /// Log file name (e.g. "core-auth.log")
    file_name: &'static str,
    /// Target module prefixes routed to this file
    targets: &'static [&'static str],
}

const COMPONENT_LOGS: &[ComponentLogDef] = &[
    ComponentLogDef {
        file_name: "core-auth.log",
        targets: &["cascata_auth"],
    },
    ComponentLogDef {
        file_name: "usage-collect.log",
        targets: &["cascata_udc"],
    },
    ComponentLogDef {
        file_name: "http-context.log",
        targets: &["cascata_http"],
    },
];

/// Log rotation policy
#[derive(Debug, Clone, Copy)]
pub enum LogRotation {
    /// Rotate daily (default)
    Daily,
    /// Rotate hourly
    Hourly,
    /// Never rotate (single file)
    Never,
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Daily => Rotation::DAILY,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Never => Rotation::NEVER,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for log files; `None` disables file logging
    pub dir: Option<PathBuf>,
    pub rotation: LogRotation,
    /// Default level when `RUST_LOG` is not set
    pub level: String,
    /// Whether to also log to the console
    pub console: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            rotation: LogRotation::Daily,
            level: "info".to_string(),
            console: true,
        }
    }
}

/// Install the global subscriber
///
/// The returned guards flush the non-blocking file writers; keep them alive
/// for the life of the process.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<Vec<WorkerGuard>> {
    let mut guards = Vec::new();
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    if config.console {
        layers.push(fmt::layer().boxed());
    }

    if let Some(dir) = &config.dir {
        let rotation: Rotation = config.rotation.into();

        // the root file captures every component
        let root = RollingFileAppender::new(rotation.clone(), dir, "cascata.log");
        let (root_writer, root_guard) = tracing_appender::non_blocking(root);
        guards.push(root_guard);
        layers.push(
            fmt::layer()
                .with_writer(root_writer)
                .with_ansi(false)
                .boxed(),
        );

        for def in COMPONENT_LOGS {
            let appender = RollingFileAppender::new(rotation.clone(), dir, def.file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            guards.push(guard);

            let targets = def
                .targets
                .iter()
                .fold(Targets::new(), |targets, prefix| {
                    targets.with_target(*prefix, LevelFilter::TRACE)
                });
            layers.push(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_filter(targets)
                    .boxed(),
            );
        }
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()?;

    Ok(guards)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotation_mapping() {
        assert_eq!(Rotation::from(LogRotation::Daily), Rotation::DAILY);
        assert_eq!(Rotation::from(LogRotation::Hourly), Rotation::HOURLY);
        assert_eq!(Rotation::from(LogRotation::Never), Rotation::NEVER);
    }

    #[test]
    fn test_logging_config_defaults() {
        let config = LoggingConfig::default();
        assert!(config.dir.is_none());
        assert!(config.console);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_init_logging_creates_component_files() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            dir: Some(dir.path().to_path_buf()),
            rotation: LogRotation::Never,
            console: false,
            ..Default::default()
        };

        // a subscriber may already be installed by another test; creating the
        // appenders is the part under test
        let _ = init_logging(&config);

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.contains(&"cascata.log".to_string()));
        assert!(names.contains(&"core-auth.log".to_string()));
        assert!(names.contains(&"http-context.log".to_string()));
    }
}
