//! Forwards `log` records to a logger implemented by the host app.

use std::sync::{Arc, OnceLock};

/// Receives log messages produced by the storage layer.
///
/// Implemented by the host app and installed once with [`set_logger`].
///
/// ## Kotlin
///
/// ```kotlin
/// object MiniAppLoggerBridge : Logger {
///     override fun log(level: LogLevel, message: String) {
///         Log.println(level.toPriority(), "MiniAppSecureStorage", message)
///     }
/// }
///
/// setLogger(MiniAppLoggerBridge) // once, at SDK init
/// ```
#[uniffi::export(with_foreign)]
pub trait Logger: Sync + Send {
    /// Logs `message` at `level`.
    fn log(&self, level: LogLevel, message: String);
}

/// Severity of a log message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, uniffi::Enum)]
pub enum LogLevel {
    /// Very detailed tracing output.
    Trace,
    /// Debugging information.
    Debug,
    /// Normal progress messages.
    Info,
    /// Recoverable problems.
    Warn,
    /// Failed operations.
    Error,
}

impl From<log::Level> for LogLevel {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug => Self::Debug,
            log::Level::Trace => Self::Trace,
        }
    }
}

/// `log::Log` implementation forwarding to the installed [`Logger`].
struct ForeignLogger;

impl log::Log for ForeignLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        if !should_forward(record.level(), record.module_path()) {
            return;
        }
        if let Some(logger) = LOGGER_INSTANCE.get() {
            logger.log(record.level().into(), format!("{}", record.args()));
        } else {
            eprintln!("Logger not set: {}", record.args());
        }
    }

    fn flush(&self) {}
}

/// Debug and trace records are only forwarded from this workspace's crates.
fn should_forward(level: log::Level, module_path: Option<&str>) -> bool {
    let is_verbose = matches!(level, log::Level::Debug | log::Level::Trace);
    let is_own_record = module_path.is_some_and(|path| path.starts_with("miniapp"));
    !is_verbose || is_own_record
}

static LOGGER_INSTANCE: OnceLock<Arc<dyn Logger>> = OnceLock::new();

/// Installs the host logger. Only the first call has an effect.
#[uniffi::export]
pub fn set_logger(logger: Arc<dyn Logger>) {
    if LOGGER_INSTANCE.set(logger).is_err() {
        println!("Logger already set");
    }

    if let Err(e) = init_logger() {
        eprintln!("Failed to set logger: {e}");
    }
}

fn init_logger() -> Result<(), log::SetLoggerError> {
    static LOGGER: ForeignLogger = ForeignLogger;
    log::set_logger(&LOGGER)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}
