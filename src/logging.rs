//! Decision log and diagnostic tracing setup.
//!
//! Two separate channels:
//!
//! - The **decision log** ([`DecisionLogger`]) appends one line per evaluated
//!   command to a file, as text or JSON, with optional redaction. It is off
//!   unless `[logging] enabled = true`.
//! - **Diagnostics** go through `tracing`. [`init_tracing`] installs a stderr
//!   subscriber only when asked to, so the hook stays silent by default.

use crate::evaluator::EvaluationResult;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Environment variable holding an `EnvFilter` directive for diagnostics.
pub const TRACE_ENV: &str = "GIT_GUARD_LOG";

// ============================================================================
// Configuration Types
// ============================================================================

/// `[logging]` configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub enabled: bool,
    /// Log file path. `~/` is expanded.
    pub file: Option<String>,
    pub format: LogFormat,
    pub events: LogEventFilter,
    pub redaction: RedactionConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            file: None,
            format: LogFormat::Text,
            events: LogEventFilter::default(),
            redaction: RedactionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Which decisions are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogEventFilter {
    pub deny: bool,
    pub allow: bool,
}

impl Default for LogEventFilter {
    fn default() -> Self {
        Self {
            deny: true,
            allow: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedactionConfig {
    pub enabled: bool,
    pub mode: RedactionMode,
    pub max_argument_len: usize,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: RedactionMode::Arguments,
            max_argument_len: 50,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RedactionMode {
    /// Log commands verbatim.
    None,
    /// Truncate long arguments and quoted strings.
    #[default]
    Arguments,
    /// Keep only the program name.
    Full,
}

// ============================================================================
// Log Entry
// ============================================================================

/// One decision-log record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub decision: &'static str,
    pub command: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub_command: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub branch_lookup_used: bool,
}

impl LogEntry {
    #[must_use]
    pub fn from_result(
        result: &EvaluationResult,
        command: &str,
        redaction: &RedactionConfig,
    ) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            decision: if result.is_blocked() { "deny" } else { "allow" },
            command: redact_command(command, redaction),
            sub_command: result
                .sub_command
                .as_deref()
                .map(|sub| redact_command(sub, redaction)),
            rule_id: result.rule_id,
            reason: result.reason().map(str::to_string),
            branch_lookup_used: result.branch_lookup_used,
        }
    }

    /// `[timestamp] DENY rule=<id> reason="…" command="…"`
    #[must_use]
    pub fn format_text(&self) -> String {
        let mut line = format!("[{}] {}", self.timestamp, self.decision.to_uppercase());
        if let Some(rule_id) = self.rule_id {
            line.push_str(&format!(" rule={rule_id}"));
        }
        if let Some(reason) = &self.reason {
            line.push_str(&format!(" reason={}", quote(reason)));
        }
        line.push_str(&format!(" command={}", quote(&self.command)));
        line
    }

    #[must_use]
    pub fn format_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Double-quote `text`, escaping quotes, backslashes and newlines so each
/// entry stays on one line.
fn quote(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

// ============================================================================
// Logger
// ============================================================================

/// Appends evaluation decisions to the configured log file.
pub struct DecisionLogger {
    config: LoggingConfig,
    writer: Mutex<BufWriter<File>>,
}

impl DecisionLogger {
    /// Open the log described by `config`.
    ///
    /// Returns `None` when logging is disabled, no file is configured, or the
    /// file cannot be opened.
    #[must_use]
    pub fn new(config: &LoggingConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let path = expand_tilde(config.file.as_deref()?);
        match open_log_file(&path) {
            Ok(file) => Some(Self {
                config: config.clone(),
                writer: Mutex::new(BufWriter::new(file)),
            }),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cannot open decision log");
                None
            }
        }
    }

    /// Record `result` for `command` if the event filter selects it.
    pub fn log(&self, result: &EvaluationResult, command: &str) {
        if !self.should_log(result) {
            return;
        }
        let entry = LogEntry::from_result(result, command, &self.config.redaction);
        let line = match self.config.format {
            LogFormat::Text => entry.format_text(),
            LogFormat::Json => entry.format_json(),
        };
        if let Ok(mut writer) = self.writer.lock() {
            let _ = writeln!(writer, "{line}");
            let _ = writer.flush();
        }
    }

    const fn should_log(&self, result: &EvaluationResult) -> bool {
        if result.is_blocked() {
            self.config.events.deny
        } else {
            self.config.events.allow
        }
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Install a stderr `tracing` subscriber.
///
/// Uses the [`TRACE_ENV`] directive when set; otherwise `debug` for this
/// crate when `verbose`; otherwise installs nothing.
pub fn init_tracing(verbose: bool) {
    let filter = match std::env::var(TRACE_ENV) {
        Ok(directive) => match EnvFilter::try_new(&directive) {
            Ok(filter) => filter,
            Err(err) => {
                eprintln!("ignoring invalid {TRACE_ENV}={directive:?}: {err}");
                return;
            }
        },
        Err(_) if verbose => EnvFilter::new("git_guard=debug"),
        Err(_) => return,
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand a leading `~/` to the home directory.
#[must_use]
pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

fn open_log_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn redact_command(command: &str, config: &RedactionConfig) -> String {
    if !config.enabled {
        return command.to_string();
    }
    match config.mode {
        RedactionMode::None => command.to_string(),
        RedactionMode::Full => {
            let program = command.split_whitespace().next().unwrap_or_default();
            format!("{program} …")
        }
        RedactionMode::Arguments => redact_arguments(command, config.max_argument_len),
    }
}

/// Truncate every word or quoted string longer than `max_len` characters to
/// its first `max_len` characters followed by `...`.
fn redact_arguments(command: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(command.len());
    let mut quote: Option<char> = None;
    let mut run = 0usize;

    for c in command.chars() {
        let ends_run = match quote {
            Some(q) => c == q,
            None => c.is_whitespace() || c == '"' || c == '\'',
        };

        if ends_run {
            if run > max_len {
                out.push_str("...");
            }
            run = 0;
            out.push(c);
            quote = match quote {
                Some(_) => None,
                None if c == '"' || c == '\'' => Some(c),
                None => None,
            };
            continue;
        }

        if run < max_len {
            out.push(c);
        }
        run += 1;
    }

    if run > max_len {
        out.push_str("...");
    }
    out
}
