//! Process-wide logging bootstrap.
//!
//! # Responsibility
//! - Start one rolling file logger per process.
//! - Optionally echo warnings to stderr for operator-driven runs
//!   (reconciliation, manual CLI use).
//! - Capture panics as sanitized log events.
//!
//! # Invariants
//! - Initialization is idempotent for identical settings and never panics.
//! - Any change of level, directory, or echo mode after start is rejected.
//! - Events carry codes, ids and counters only; record titles and bodies
//!   are never logged.

use flexi_logger::{
    Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming, WriteMode,
};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "stcode";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;
const MAX_PANIC_PAYLOAD_CHARS: usize = 160;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

/// Logger configuration accepted by [`init_logging_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// One of `trace|debug|info|warn|error`, case-insensitive.
    pub level: String,
    /// Absolute directory for rolling log files.
    pub log_dir: PathBuf,
    /// Mirror `warn` and above to stderr.
    pub echo_stderr: bool,
}

impl LogSettings {
    pub fn new(level: impl Into<String>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            level: level.into(),
            log_dir: log_dir.into(),
            echo_stderr: false,
        }
    }

    pub fn with_stderr_echo(mut self, echo: bool) -> Self {
        self.echo_stderr = echo;
        self
    }
}

#[derive(Debug, PartialEq, Eq)]
struct Resolved {
    level: &'static str,
    log_dir: PathBuf,
    echo_stderr: bool,
}

struct ActiveLogger {
    resolved: Resolved,
    _handle: LoggerHandle,
}

/// Initializes file logging with `level` under `log_dir`.
///
/// # Errors
/// - Unsupported level, empty or relative directory.
/// - Directory creation or backend start failure.
/// - Logging already active with different settings.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), String> {
    init_logging_with(&LogSettings::new(level, log_dir.trim()))
}

/// Initializes logging from full settings. See [`init_logging`].
pub fn init_logging_with(settings: &LogSettings) -> Result<(), String> {
    let wanted = resolve(settings)?;

    let active = ACTIVE.get_or_try_init(|| start_logger(&wanted))?;
    if active.resolved != wanted {
        return Err(format!(
            "logging already initialized (level `{}`, dir `{}`, echo {}); refusing to switch to (level `{}`, dir `{}`, echo {})",
            active.resolved.level,
            active.resolved.log_dir.display(),
            active.resolved.echo_stderr,
            wanted.level,
            wanted.log_dir.display(),
            wanted.echo_stderr
        ));
    }
    Ok(())
}

/// Returns `(level, log_dir)` once logging is active.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    ACTIVE
        .get()
        .map(|active| (active.resolved.level, active.resolved.log_dir.clone()))
}

/// `debug` for debug builds, `info` for release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn start_logger(resolved: &Resolved) -> Result<ActiveLogger, String> {
    std::fs::create_dir_all(&resolved.log_dir).map_err(|err| {
        format!(
            "failed to create log directory `{}`: {err}",
            resolved.log_dir.display()
        )
    })?;

    let duplicate = if resolved.echo_stderr {
        Duplicate::Warn
    } else {
        Duplicate::None
    };

    let handle = Logger::try_with_str(resolved.level)
        .map_err(|err| format!("invalid log level `{}`: {err}", resolved.level))?
        .log_to_file(
            FileSpec::default()
                .directory(resolved.log_dir.as_path())
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .duplicate_to_stderr(duplicate)
        .append()
        // [YYYY-MM-DD HH:MM:SS.ffffff TZ] LEVEL [module] file:line: message
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    install_panic_hook();

    info!(
        "event=logging_start module=core status=ok platform={} version={} level={} log_dir={}",
        std::env::consts::OS,
        env!("CARGO_PKG_VERSION"),
        resolved.level,
        resolved.log_dir.display()
    );

    Ok(ActiveLogger {
        resolved: Resolved {
            level: resolved.level,
            log_dir: resolved.log_dir.clone(),
            echo_stderr: resolved.echo_stderr,
        },
        _handle: handle,
    })
}

fn resolve(settings: &LogSettings) -> Result<Resolved, String> {
    Ok(Resolved {
        level: normalize_level(&settings.level)?,
        log_dir: normalize_log_dir(&settings.log_dir)?,
        echo_stderr: settings.echo_stderr,
    })
}

fn normalize_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error"
        )),
    }
}

fn normalize_log_dir(log_dir: &Path) -> Result<PathBuf, String> {
    if log_dir.as_os_str().is_empty() {
        return Err("log_dir cannot be empty".to_string());
    }
    if !log_dir.is_absolute() {
        return Err(format!(
            "log_dir must be an absolute path, got `{}`",
            log_dir.display()
        ));
    }
    Ok(log_dir.to_path_buf())
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }

    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = if let Some(message) = panic_info.payload().downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = panic_info.payload().downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };
        // Payload may carry record text: strip newlines and cap length.
        error!(
            "event=panic_captured module=core status=error location={} payload={}",
            location,
            sanitize_message(&payload, MAX_PANIC_PAYLOAD_CHARS)
        );
        previous_hook(panic_info);
    }));
}

fn sanitize_message(value: &str, max_chars: usize) -> String {
    let normalized = value.replace(['\n', '\r'], " ");
    let mut truncated = normalized.chars().take(max_chars).collect::<String>();
    if normalized.chars().count() > max_chars {
        truncated.push_str("...");
    }
    truncated
}
