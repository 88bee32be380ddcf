use serde::Serialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{info, warn};
use tracing_appender::{
    non_blocking::{NonBlocking, WorkerGuard},
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt,
};

use crate::config::LoggingConfig;

/// Flush handles for the file sinks. Keep alive until the process exits.
#[must_use = "dropping the guards stops the file writers"]
pub struct LogGuards(Vec<WorkerGuard>);

/// Installs the global tracing subscriber: compact console output, plus optional
/// plain-text files for all lines and for errors only.
///
/// `RUST_LOG` overrides the configured level unless `errors_only` is set.
pub fn init_logging(
    cfg: &LoggingConfig,
) -> Result<LogGuards, Box<dyn std::error::Error + Send + Sync>> {
    let mut guards = Vec::new();

    let conf_level = cfg
        .log_level_conf
        .as_deref()
        .map(|path| read_conf_level(path, &cfg.service_name));

    let level = if cfg.errors_only {
        "error".to_string()
    } else {
        match &conf_level {
            Some(Ok(Some(level))) => level.clone(),
            _ => cfg.level.clone(),
        }
    };

    let env_filter = if cfg.errors_only {
        EnvFilter::new(&level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level))
    };

    let logs_layer = match &cfg.logs_file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            guards.push(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer),
            )
        }
        None => None,
    };
    let errors_layer = match &cfg.errors_file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;
            guards.push(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(LevelFilter::ERROR),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_level(true)
                .with_target(false),
        )
        .with(logs_layer)
        .with(errors_layer)
        .try_init()?;

    if let Some(Err((path, e))) = conf_level {
        warn!(path = %path.display(), error = %e, "Couldn't read logging level from config file");
    }
    info!(level = %level, service = %cfg.service_name, "Logging initialized");
    Ok(LogGuards(guards))
}

fn read_conf_level(
    path: &Path,
    service: &str,
) -> Result<Option<String>, (PathBuf, std::io::Error)> {
    fs::read_to_string(path)
        .map(|contents| level_from_logging_conf(&contents, service))
        .map_err(|e| (path.to_path_buf(), e))
}

/// Finds the level for `service` in a manager logging configuration file.
///
/// Each non-comment line is `LEVEL ... SERVICE`; the first line whose last word is
/// `service` wins. `warning` is mapped to `warn`.
pub fn level_from_logging_conf(contents: &str, service: &str) -> Option<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .map(|line| line.split_whitespace().collect::<Vec<_>>())
        .find(|words| words.last() == Some(&service))
        .and_then(|words| words.first().map(|w| w.to_lowercase()))
        .map(|level| {
            if level == "warning" {
                "warn".to_string()
            } else {
                level
            }
        })
}

/// Non-blocking appender for a single, never-rotated log file.
fn file_writer(
    path: &Path,
) -> Result<(NonBlocking, WorkerGuard), Box<dyn std::error::Error + Send + Sync>> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let name = path
        .file_name()
        .ok_or_else(|| format!("log file path has no file name: {}", path.display()))?;
    fs::create_dir_all(dir)?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name.to_string_lossy())
        .build(dir)?;
    Ok(tracing_appender::non_blocking(appender))
}

pub(crate) fn with_pretty_json_debug<T, F>(value: &T, log_action: F)
where
    T: Serialize,
    F: FnOnce(&str),
{
    if !tracing::enabled!(tracing::Level::DEBUG) {
        return;
    }

    let pretty_json = serde_json::to_string_pretty(value)
        .unwrap_or_else(|error| format!("<pretty serialize failed: {error}>"));
    log_action(pretty_json.as_str());
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONF: &str = "\
# level   service
INFO      mgmtworker
WARNING   dbstrap
#DEBUG    dbstrap
DEBUG     stage-backend
";

    #[test]
    fn level_is_read_for_matching_service() {
        assert_eq!(
            level_from_logging_conf(CONF, "stage-backend").as_deref(),
            Some("debug")
        );
        assert_eq!(
            level_from_logging_conf(CONF, "mgmtworker").as_deref(),
            Some("info")
        );
    }

    #[test]
    fn warning_maps_to_warn_and_comments_are_skipped() {
        assert_eq!(
            level_from_logging_conf(CONF, "dbstrap").as_deref(),
            Some("warn")
        );
    }

    #[test]
    fn file_writer_appends_to_the_named_file() {
        use std::io::Write;

        let dir = std::env::temp_dir().join(format!(
            "dbstrap-logs-{}-{}",
            std::process::id(),
            chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let path = dir.join("nested").join("dbstrap.log");

        let (mut writer, guard) = file_writer(&path).unwrap();
        writer.write_all(b"first line\n").unwrap();
        drop(writer);
        drop(guard);

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first line\n");
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn file_writer_rejects_path_without_file_name() {
        assert!(file_writer(Path::new("/")).is_err());
    }

    #[test]
    fn unknown_service_has_no_level() {
        assert_eq!(level_from_logging_conf(CONF, "composer"), None);
        assert_eq!(level_from_logging_conf("", "dbstrap"), None);
    }
}
