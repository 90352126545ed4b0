use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

/// Privacy-preserving file logger for linai
///
/// Questions, answers and extracted commands are never written here. Only
/// operational events (provider calls, failures, history problems) are kept,
/// and messages are scrubbed of keys, tokens and home directory names before
/// they reach the file. Debug entries are only written when debug logging is on.
pub struct PrivacyLogger {
    log_file_path: PathBuf,
    debug_mode: bool,
    writer: Arc<Mutex<Option<fs::File>>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub category: LogCategory,
    pub message: String,
    pub context: Option<LogContext>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum LogLevel {
    Error,
    Warning,
    Info,
    Debug,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum LogCategory {
    System,
    Configuration,
    Provider,
    History,
    Execution,
    Clipboard,
}

/// Context information for log entries (privacy-safe)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogContext {
    pub component: Option<String>,
    pub operation: Option<String>,
    pub duration_ms: Option<u64>,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub success: Option<bool>,
}

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_component(mut self, component: &str) -> Self {
        self.component = Some(component.to_string());
        self
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_provider(mut self, provider: &str) -> Self {
        self.provider = Some(provider.to_string());
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    pub fn with_success(mut self, success: bool) -> Self {
        self.success = Some(success);
        self
    }
}

static REDACTIONS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();

fn redactions() -> &'static [(Regex, &'static str)] {
    REDACTIONS.get_or_init(|| {
        vec![
            (Regex::new(r"/home/[^/\s]+").unwrap(), "/home/[USER]"),
            (Regex::new(r"/Users/[^/\s]+").unwrap(), "/Users/[USER]"),
            (Regex::new(r"(?i)(api_key|key|token|password)=\S+").unwrap(), "$1=[REDACTED]"),
            (Regex::new(r"(?i)bearer\s+\S+").unwrap(), "Bearer [REDACTED]"),
            (Regex::new(r"\b(?:sk-|gsk_)[A-Za-z0-9_-]{16,}").unwrap(), "[REDACTED]"),
            (Regex::new(r"\bAIza[0-9A-Za-z_-]{20,}").unwrap(), "[REDACTED]"),
        ]
    })
}

impl PrivacyLogger {
    /// Create a logger appending to `log_file_path`, creating its directory if needed
    pub fn new(log_file_path: PathBuf, debug_mode: bool) -> Result<Self> {
        if let Some(parent) = log_file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(Self {
            log_file_path,
            debug_mode,
            writer: Arc::new(Mutex::new(None)),
        })
    }

    pub fn log_error(&self, category: LogCategory, message: String, context: Option<LogContext>) -> Result<()> {
        self.log(LogLevel::Error, category, &message, context)
    }

    pub fn log_warning(&self, category: LogCategory, message: String, context: Option<LogContext>) -> Result<()> {
        self.log(LogLevel::Warning, category, &message, context)
    }

    pub fn log_info(&self, category: LogCategory, message: String, context: Option<LogContext>) -> Result<()> {
        self.log(LogLevel::Info, category, &message, context)
    }

    /// Log a debug event (dropped unless debug logging is enabled)
    pub fn log_debug(&self, category: LogCategory, message: String, context: Option<LogContext>) -> Result<()> {
        if !self.debug_mode {
            return Ok(());
        }
        self.log(LogLevel::Debug, category, &format!("[DEBUG] {}", message), context)
    }

    pub fn log_startup(&self, version: &str, provider: &str) -> Result<()> {
        let context = LogContext::new()
            .with_component("system")
            .with_operation("startup")
            .with_provider(provider);

        self.log_info(
            LogCategory::System,
            format!("linai {} started on {} {}", version, std::env::consts::OS, std::env::consts::ARCH),
            Some(context),
        )
    }

    /// Record one provider round trip
    pub fn log_provider_operation(
        &self,
        provider: &str,
        model: &str,
        operation: &str,
        duration_ms: u64,
        success: bool,
    ) -> Result<()> {
        let context = LogContext::new()
            .with_component("provider")
            .with_operation(operation)
            .with_provider(provider)
            .with_model(model)
            .with_duration_ms(duration_ms)
            .with_success(success);

        let level = if success { LogLevel::Info } else { LogLevel::Warning };
        let message = format!(
            "Provider {} {}: {} ({}ms)",
            provider,
            operation,
            if success { "success" } else { "failed" },
            duration_ms
        );

        self.log(level, LogCategory::Provider, &message, Some(context))
    }

    pub fn is_debug_mode(&self) -> bool {
        self.debug_mode
    }

    pub fn log_file_path(&self) -> &Path {
        &self.log_file_path
    }

    fn log(&self, level: LogLevel, category: LogCategory, message: &str, context: Option<LogContext>) -> Result<()> {
        let entry = LogEntry {
            timestamp: Utc::now(),
            level,
            category,
            message: redact_sensitive_info(message),
            context,
        };

        self.write_log_entry(&entry)
    }

    fn write_log_entry(&self, entry: &LogEntry) -> Result<()> {
        let mut writer_guard = self
            .writer
            .lock()
            .map_err(|_| anyhow!("Failed to acquire log writer lock"))?;

        if writer_guard.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.log_file_path)?;
            *writer_guard = Some(file);
        }

        if let Some(ref mut file) = *writer_guard {
            writeln!(file, "{}", format_log_entry(entry))?;
            file.flush()?;
        }

        Ok(())
    }
}

fn format_log_entry(entry: &LogEntry) -> String {
    let timestamp = entry.timestamp.format("%Y-%m-%d %H:%M:%S UTC");
    let level = format!("{:?}", entry.level).to_uppercase();
    let category = format!("{:?}", entry.category).to_uppercase();

    let mut formatted = format!("[{}] {} {} {}", timestamp, level, category, entry.message);

    if let Some(ref context) = entry.context {
        let mut parts = Vec::new();

        if let Some(ref component) = context.component {
            parts.push(format!("component={}", component));
        }
        if let Some(ref operation) = context.operation {
            parts.push(format!("operation={}", operation));
        }
        if let Some(duration) = context.duration_ms {
            parts.push(format!("duration={}ms", duration));
        }
        if let Some(ref provider) = context.provider {
            parts.push(format!("provider={}", provider));
        }
        if let Some(ref model) = context.model {
            parts.push(format!("model={}", model));
        }
        if let Some(success) = context.success {
            parts.push(format!("success={}", success));
        }

        if !parts.is_empty() {
            formatted.push_str(&format!(" [{}]", parts.join(", ")));
        }
    }

    formatted
}

/// Scrub user names, API keys and tokens out of a log message
pub fn redact_sensitive_info(message: &str) -> String {
    redactions()
        .iter()
        .fold(message.to_string(), |text, (pattern, replacement)| {
            pattern.replace_all(&text, *replacement).to_string()
        })
}

static GLOBAL_LOGGER: OnceLock<Arc<Mutex<PrivacyLogger>>> = OnceLock::new();

/// Initialize the global logger; later calls keep the first logger
pub fn init_logger(log_file_path: PathBuf, debug_mode: bool) -> Result<()> {
    let logger = PrivacyLogger::new(log_file_path, debug_mode)?;
    let _ = GLOBAL_LOGGER.set(Arc::new(Mutex::new(logger)));
    Ok(())
}

pub fn get_logger() -> Result<Arc<Mutex<PrivacyLogger>>> {
    GLOBAL_LOGGER
        .get()
        .cloned()
        .ok_or_else(|| anyhow!("Logger not initialized. Call init_logger() first."))
}

#[macro_export]
macro_rules! log_error {
    ($category:expr, $message:expr) => {
        if let Ok(logger) = $crate::logging::get_logger() {
            if let Ok(logger_guard) = logger.lock() {
                let _ = logger_guard.log_error($category, $message.to_string(), None);
            }
        }
    };
    ($category:expr, $message:expr, $context:expr) => {
        if let Ok(logger) = $crate::logging::get_logger() {
            if let Ok(logger_guard) = logger.lock() {
                let _ = logger_guard.log_error($category, $message.to_string(), Some($context));
            }
        }
    };
}

#[macro_export]
macro_rules! log_warning {
    ($category:expr, $message:expr) => {
        if let Ok(logger) = $crate::logging::get_logger() {
            if let Ok(logger_guard) = logger.lock() {
                let _ = logger_guard.log_warning($category, $message.to_string(), None);
            }
        }
    };
    ($category:expr, $message:expr, $context:expr) => {
        if let Ok(logger) = $crate::logging::get_logger() {
            if let Ok(logger_guard) = logger.lock() {
                let _ = logger_guard.log_warning($category, $message.to_string(), Some($context));
            }
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($category:expr, $message:expr) => {
        if let Ok(logger) = $crate::logging::get_logger() {
            if let Ok(logger_guard) = logger.lock() {
                let _ = logger_guard.log_info($category, $message.to_string(), None);
            }
        }
    };
    ($category:expr, $message:expr, $context:expr) => {
        if let Ok(logger) = $crate::logging::get_logger() {
            if let Ok(logger_guard) = logger.lock() {
                let _ = logger_guard.log_info($category, $message.to_string(), Some($context));
            }
        }
    };
}

#[macro_export]
macro_rules! log_debug {
    ($category:expr, $message:expr) => {
        if let Ok(logger) = $crate::logging::get_logger() {
            if let Ok(logger_guard) = logger.lock() {
                let _ = logger_guard.log_debug($category, $message.to_string(), None);
            }
        }
    };
    ($category:expr, $message:expr, $context:expr) => {
        if let Ok(logger) = $crate::logging::get_logger() {
            if let Ok(logger_guard) = logger.lock() {
                let _ = logger_guard.log_debug($category, $message.to_string(), Some($context));
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_logger(debug_mode: bool) -> (PrivacyLogger, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let logger = PrivacyLogger::new(temp_dir.path().join("logs").join("error.log"), debug_mode).unwrap();
        (logger, temp_dir)
    }

    #[test]
    fn test_log_error_writes_level_and_category() {
        let (logger, _temp_dir) = create_test_logger(false);

        logger
            .log_error(LogCategory::Provider, "Request failed".to_string(), None)
            .unwrap();

        let content = fs::read_to_string(logger.log_file_path()).unwrap();
        assert!(content.contains("ERROR"));
        assert!(content.contains("PROVIDER"));
        assert!(content.contains("Request failed"));
    }

    #[test]
    fn test_context_is_appended() {
        let (logger, _temp_dir) = create_test_logger(false);

        logger
            .log_provider_operation("google", "gemini-2.0-flash", "generate", 420, true)
            .unwrap();

        let content = fs::read_to_string(logger.log_file_path()).unwrap();
        assert!(content.contains("INFO"));
        assert!(content.contains("provider=google"));
        assert!(content.contains("model=gemini-2.0-flash"));
        assert!(content.contains("duration=420ms"));
        assert!(content.contains("success=true"));
    }

    #[test]
    fn test_failed_provider_operation_is_a_warning() {
        let (logger, _temp_dir) = create_test_logger(false);

        logger.log_provider_operation("groq", "llama", "generate", 12, false).unwrap();

        let content = fs::read_to_string(logger.log_file_path()).unwrap();
        assert!(content.contains("WARNING"));
        assert!(content.contains("failed"));
    }

    #[test]
    fn test_debug_entries_need_debug_mode() {
        let (quiet, _dir1) = create_test_logger(false);
        quiet.log_debug(LogCategory::System, "hidden".to_string(), None).unwrap();
        assert!(!quiet.log_file_path().exists());

        let (verbose, _dir2) = create_test_logger(true);
        verbose.log_debug(LogCategory::System, "shown".to_string(), None).unwrap();
        let content = fs::read_to_string(verbose.log_file_path()).unwrap();
        assert!(content.contains("[DEBUG] shown"));
        assert!(verbose.is_debug_mode());
    }

    #[test]
    fn test_redact_sensitive_info() {
        let redacted = redact_sensitive_info("reading /home/alice/.config/linai/.env");
        assert_eq!(redacted, "reading /home/[USER]/.config/linai/.env");

        let redacted = redact_sensitive_info("url?key=AIzaSyA1234567890abcdefghijk failed");
        assert!(!redacted.contains("AIzaSy"));

        let redacted = redact_sensitive_info("Authorization: Bearer sk-abcdef123456");
        assert!(!redacted.contains("sk-abcdef123456"));

        let redacted = redact_sensitive_info("gsk_short stays but gsk_abcdefghijklmnop123 goes");
        assert!(redacted.contains("gsk_short"));
        assert!(!redacted.contains("gsk_abcdefghijklmnop123"));
    }

    #[test]
    fn test_messages_are_redacted_on_write() {
        let (logger, _temp_dir) = create_test_logger(false);

        logger
            .log_warning(LogCategory::Configuration, "bad api_key=secret123".to_string(), None)
            .unwrap();

        let content = fs::read_to_string(logger.log_file_path()).unwrap();
        assert!(content.contains("api_key=[REDACTED]"));
        assert!(!content.contains("secret123"));
    }
}
