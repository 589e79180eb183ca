//! Process-wide log sink for MediVault binaries.
//!
//! # Responsibility
//! - Start flexi_logger once, writing either to rotated files or stderr.
//! - Capture panics as single-line `panic_captured` events.
//!
//! # Invariants
//! - A second init with identical settings is a no-op; different settings
//!   are rejected with [`LoggingError::AlreadyInitialized`].
//! - Initialization never panics.
//! - Panic payloads are flattened, capped and scrubbed of bearer tokens
//!   before they reach the log.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "medivault";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
const KEEP_ROTATED_FILES: usize = 5;
const PANIC_PAYLOAD_LIMIT: usize = 160;
const LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();
static BEARER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)bearer\s+\S+").expect("valid bearer regex"));

/// Where log records are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// Size-rotated `medivault_r*.log` files under an absolute directory.
    Directory(PathBuf),
    Stderr,
}

impl Display for LogTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Directory(dir) => write!(f, "{}", dir.display()),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoggingError {
    UnknownLevel(String),
    InvalidDirectory(String),
    AlreadyInitialized {
        active: String,
        requested: String,
    },
    Backend(String),
}

impl Display for LoggingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownLevel(level) => write!(
                f,
                "unsupported log level `{level}`; expected one of {}",
                LEVELS.join("|")
            ),
            Self::InvalidDirectory(message) => write!(f, "invalid log directory: {message}"),
            Self::AlreadyInitialized { active, requested } => write!(
                f,
                "logging already running as {active}; cannot switch to {requested}"
            ),
            Self::Backend(message) => write!(f, "log backend failed: {message}"),
        }
    }
}

impl Error for LoggingError {}

struct ActiveLogger {
    level: &'static str,
    target: LogTarget,
    _handle: LoggerHandle,
}

impl ActiveLogger {
    fn describe(level: &str, target: &LogTarget) -> String {
        format!("level={level} target={target}")
    }

    fn ensure_same(&self, level: &'static str, target: &LogTarget) -> Result<(), LoggingError> {
        if self.level == level && &self.target == target {
            return Ok(());
        }
        Err(LoggingError::AlreadyInitialized {
            active: Self::describe(self.level, &self.target),
            requested: Self::describe(level, target),
        })
    }
}

/// Starts file logging under `log_dir`, which must be absolute.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), LoggingError> {
    let level = normalize_level(level)?;
    let dir = absolute_dir(log_dir)?;
    start(level, LogTarget::Directory(dir))
}

/// Starts stderr logging; used by the server when no log directory is set.
pub fn init_stderr_logging(level: &str) -> Result<(), LoggingError> {
    start(normalize_level(level)?, LogTarget::Stderr)
}

fn start(level: &'static str, target: LogTarget) -> Result<(), LoggingError> {
    let active = ACTIVE.get_or_try_init(|| open_backend(level, target.clone()))?;
    active.ensure_same(level, &target)
}

fn open_backend(level: &'static str, target: LogTarget) -> Result<ActiveLogger, LoggingError> {
    let logger =
        Logger::try_with_str(level).map_err(|err| LoggingError::Backend(err.to_string()))?;
    let handle = match &target {
        LogTarget::Directory(dir) => {
            std::fs::create_dir_all(dir).map_err(|err| {
                LoggingError::InvalidDirectory(format!("cannot create `{}`: {err}", dir.display()))
            })?;
            logger
                .log_to_file(
                    FileSpec::default()
                        .directory(dir.as_path())
                        .basename(LOG_FILE_BASENAME),
                )
                .rotate(
                    Criterion::Size(ROTATE_AT_BYTES),
                    Naming::Numbers,
                    Cleanup::KeepLogFiles(KEEP_ROTATED_FILES),
                )
                .write_mode(WriteMode::BufferAndFlush)
                .append()
                .format_for_files(flexi_logger::detailed_format)
                .start()
        }
        LogTarget::Stderr => logger
            .log_to_stderr()
            .format_for_stderr(flexi_logger::detailed_format)
            .start(),
    }
    .map_err(|err| LoggingError::Backend(err.to_string()))?;

    install_panic_hook();
    info!(
        "event=logging_start module=core status=ok level={} target={} version={} os={}",
        level,
        target,
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS
    );

    Ok(ActiveLogger {
        level,
        target,
        _handle: handle,
    })
}

/// Active level and target, or `None` before initialization.
pub fn logging_status() -> Option<(&'static str, LogTarget)> {
    ACTIVE
        .get()
        .map(|active| (active.level, active.target.clone()))
}

/// `debug` for debug builds, `info` for release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

/// Maps user input (any case, `warning` alias) onto a canonical level.
pub(crate) fn normalize_level(level: &str) -> Result<&'static str, LoggingError> {
    let lowered = level.trim().to_ascii_lowercase();
    let wanted = if lowered == "warning" { "warn" } else { lowered.as_str() };
    LEVELS
        .iter()
        .copied()
        .find(|known| *known == wanted)
        .ok_or(LoggingError::UnknownLevel(lowered))
}

fn absolute_dir(raw: &str) -> Result<PathBuf, LoggingError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LoggingError::InvalidDirectory("path is empty".to_string()));
    }
    let path = Path::new(trimmed);
    if !path.is_absolute() {
        return Err(LoggingError::InvalidDirectory(format!(
            "`{trimmed}` is not absolute"
        )));
    }
    Ok(path.to_path_buf())
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = panic_info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        error!(
            "event=panic_captured module=core status=error location={} payload={}",
            location,
            scrub_for_log(&payload, PANIC_PAYLOAD_LIMIT)
        );
        previous(panic_info);
    }));
}

/// Single-line, length-capped copy of `value` with bearer tokens masked.
fn scrub_for_log(value: &str, limit: usize) -> String {
    let masked = BEARER_RE.replace_all(value, "Bearer <redacted>");
    let flat = masked.replace(['\n', '\r'], " ");
    if flat.chars().count() <= limit {
        return flat;
    }
    let mut capped: String = flat.chars().take(limit).collect();
    capped.push_str("...");
    capped
}

#[cfg(test)]
mod tests {
    use super::{
        absolute_dir, init_logging, init_stderr_logging, logging_status, normalize_level,
        scrub_for_log, LogTarget, LoggingError,
    };

    #[test]
    fn levels_are_case_insensitive_with_warning_alias() {
        assert_eq!(normalize_level("INFO").unwrap(), "info");
        assert_eq!(normalize_level(" warning ").unwrap(), "warn");
        assert_eq!(
            normalize_level("verbose").unwrap_err(),
            LoggingError::UnknownLevel("verbose".to_string())
        );
    }

    #[test]
    fn log_directory_must_be_absolute_and_non_empty() {
        assert!(matches!(
            absolute_dir("logs/dev"),
            Err(LoggingError::InvalidDirectory(_))
        ));
        assert!(absolute_dir("   ").is_err());
    }

    #[test]
    fn panic_payloads_are_flattened_capped_and_token_free() {
        let scrubbed = scrub_for_log("authorization: Bearer abc.def.ghi\nnext line", 200);
        assert!(!scrubbed.contains("abc.def.ghi"));
        assert!(scrubbed.contains("Bearer <redacted>"));
        assert!(!scrubbed.contains('\n'));

        let capped = scrub_for_log("patient-note-patient-note", 8);
        assert_eq!(capped, "patient-...");
    }

    #[test]
    fn repeat_init_is_idempotent_and_conflicts_are_rejected() {
        let log_dir = tempfile::tempdir().unwrap();
        let log_dir_str = log_dir.path().to_str().unwrap().to_string();

        init_logging("info", &log_dir_str).unwrap();
        init_logging("INFO", &log_dir_str).unwrap();

        let level_conflict = init_logging("debug", &log_dir_str).unwrap_err();
        assert!(matches!(level_conflict, LoggingError::AlreadyInitialized { .. }));

        let target_conflict = init_stderr_logging("info").unwrap_err();
        assert!(matches!(target_conflict, LoggingError::AlreadyInitialized { .. }));

        let (level, target) = logging_status().unwrap();
        assert_eq!(level, "info");
        assert_eq!(target, LogTarget::Directory(log_dir.path().to_path_buf()));
    }
}
