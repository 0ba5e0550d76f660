//! Logging bootstrap for hosts embedding the OCA core.
//!
//! # Responsibility
//! - Start a stderr logger behind the `log` facade at most once per process.
//! - Keep core diagnostics metadata-only (counts, kinds, digests).
//!
//! # Invariants
//! - Initialization is idempotent for the same level and never panics.
//! - Re-initialization with a different level is rejected.
//! - Hosts that install their own `log` backend simply never call this.

use flexi_logger::{Logger, LoggerHandle, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;

const MAX_PANIC_PAYLOAD_CHARS: usize = 160;

static LOGGING_STATE: OnceCell<LoggingState> = OnceCell::new();
static PANIC_HOOK_INSTALLED: OnceCell<()> = OnceCell::new();

struct LoggingState {
    level: &'static str,
    _logger: LoggerHandle,
}

/// Starts core logging on stderr at `level`.
///
/// # Errors
/// - Returns an error when `level` is unsupported.
/// - Returns an error when logging already runs at a different level.
/// - Returns an error when the logger backend cannot start (for example
///   because the host already installed another `log` backend).
pub fn init_logging(level: &str) -> Result<(), String> {
    let requested = normalize_level(level)?;

    let state = LOGGING_STATE.get_or_try_init(|| -> Result<LoggingState, String> {
        let logger = Logger::try_with_str(requested)
            .map_err(|err| format!("invalid log level `{requested}`: {err}"))?
            .log_to_stderr()
            .format_for_stderr(flexi_logger::detailed_format)
            .write_mode(WriteMode::Direct)
            .start()
            .map_err(|err| format!("failed to start logger: {err}"))?;

        install_panic_hook_once();

        info!(
            "event=core_init module=logging status=ok level={} build_mode={} version={}",
            requested,
            build_mode(),
            env!("CARGO_PKG_VERSION")
        );

        Ok(LoggingState {
            level: requested,
            _logger: logger,
        })
    })?;

    if state.level != requested {
        return Err(format!(
            "logging already initialized with level `{}`; refusing to switch to `{}`",
            state.level, requested
        ));
    }
    Ok(())
}

/// Active log level, or `None` before `init_logging` succeeded.
pub fn logging_status() -> Option<&'static str> {
    LOGGING_STATE.get().map(|state| state.level)
}

/// `debug` for debug builds, `info` for release builds.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
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

fn build_mode() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "release"
    }
}

fn install_panic_hook_once() {
    if PANIC_HOOK_INSTALLED.set(()).is_err() {
        return;
    }
    let previous_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        // Payloads may echo attribute labels; keep one capped line.
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
            "event=panic_captured module=logging status=error location={} payload={}",
            location,
            single_line(&payload, MAX_PANIC_PAYLOAD_CHARS)
        );
        previous_hook(panic_info);
    }));
}

fn single_line(value: &str, max_chars: usize) -> String {
    let flattened = value.replace(['\n', '\r'], " ");
    if flattened.chars().count() <= max_chars {
        return flattened;
    }
    let mut truncated: String = flattened.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}
