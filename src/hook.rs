//! The `PreToolUse` hook protocol.
//!
//! One JSON request arrives on stdin. A denial is one JSON line on stdout plus
//! a banner on stderr; an allow prints nothing.

use crate::config::ColorMode;
use colored::Colorize;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::io::{self, IsTerminal, Read, Write};
use std::path::PathBuf;
use thiserror::Error;

/// A `PreToolUse` request.
#[derive(Debug, Deserialize)]
pub struct HookInput {
    /// Only `Bash` requests are evaluated.
    pub tool_name: Option<String>,

    pub tool_input: Option<ToolInput>,

    /// Working directory of the session, used for the branch lookup.
    pub cwd: Option<PathBuf>,
}

/// The `tool_input` object of a request.
#[derive(Debug, Deserialize)]
pub struct ToolInput {
    /// Kept as a raw value so a non-string command is ignored, not a parse error.
    pub command: Option<serde_json::Value>,
}

/// The deny response written to stdout.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookOutput<'a> {
    pub hook_specific_output: HookSpecificOutput<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSpecificOutput<'a> {
    pub hook_event_name: &'static str,
    pub permission_decision: &'static str,
    /// Shown to the agent.
    pub permission_decision_reason: Cow<'a, str>,
}

impl<'a> HookOutput<'a> {
    #[must_use]
    pub const fn deny(reason: Cow<'a, str>) -> Self {
        Self {
            hook_specific_output: HookSpecificOutput {
                hook_event_name: "PreToolUse",
                permission_decision: "deny",
                permission_decision_reason: reason,
            },
        }
    }
}

/// Why a hook request could not be read.
#[derive(Debug, Error)]
pub enum HookReadError {
    #[error("failed to read hook input: {0}")]
    Io(#[from] io::Error),
    #[error("hook input exceeds {limit} bytes")]
    InputTooLarge { limit: usize },
    #[error("invalid hook JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read one hook request from stdin.
///
/// # Errors
///
/// Fails on I/O errors, on input longer than `max_bytes`, and on JSON that
/// does not match [`HookInput`].
pub fn read_hook_input(max_bytes: usize) -> Result<HookInput, HookReadError> {
    parse_hook_input(io::stdin().lock(), max_bytes)
}

/// Parse hook input from any reader, reading at most `max_bytes + 1` bytes.
///
/// # Errors
///
/// See [`read_hook_input`].
pub fn parse_hook_input(reader: impl Read, max_bytes: usize) -> Result<HookInput, HookReadError> {
    let mut input = String::new();
    // One extra byte tells "exactly at the limit" from "over it".
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX).saturating_add(1);
    reader.take(limit).read_to_string(&mut input)?;

    if input.len() > max_bytes {
        return Err(HookReadError::InputTooLarge { limit: max_bytes });
    }

    Ok(serde_json::from_str(&input)?)
}

/// The command to evaluate: only a non-empty string from a `Bash` request.
#[must_use]
pub fn extract_command(input: &HookInput) -> Option<&str> {
    if input.tool_name.as_deref() != Some("Bash") {
        return None;
    }

    match input.tool_input.as_ref()?.command.as_ref()? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s),
        _ => None,
    }
}

/// Apply the configured color mode; `auto` turns colors off when stderr is
/// not a terminal.
pub fn configure_colors(mode: ColorMode) {
    match mode {
        ColorMode::Always => colored::control::set_override(true),
        ColorMode::Never => colored::control::set_override(false),
        ColorMode::Auto => {
            if !io::stderr().is_terminal() {
                colored::control::set_override(false);
            }
        }
    }
}

/// The plain-text `permissionDecisionReason`.
#[must_use]
pub fn format_denial_message(command: &str, reason: &str, escalation_hint: &str) -> String {
    let mut message = format!("BLOCKED: {reason}\n\nCommand: {command}");
    if !escalation_hint.is_empty() {
        message.push_str("\n\n");
        message.push_str(escalation_hint);
    }
    message
}

/// Print a boxed warning to stderr for human visibility.
pub fn print_colorful_warning(command: &str, reason: &str, rule_id: Option<&str>) {
    const WIDTH: usize = 66;

    let stderr = io::stderr();
    let mut handle = stderr.lock();
    let bar = "│".red();

    let _ = writeln!(handle);
    let _ = writeln!(handle, "{}{}{}", "╭".red(), "─".repeat(WIDTH).red(), "╮".red());
    let _ = writeln!(
        handle,
        "{bar}  {}  {}{bar}",
        "BLOCKED".white().on_red().bold(),
        " ".repeat(WIDTH - 11),
    );
    let title = "  git-guard";
    let _ = writeln!(
        handle,
        "{bar}{}{}{bar}",
        title.bright_black(),
        " ".repeat(WIDTH - title.len()),
    );
    let _ = writeln!(
        handle,
        "{}{}{}",
        "├".red(),
        "─".repeat(WIDTH).red().dimmed(),
        "┤".red()
    );

    if let Some(rule) = rule_id {
        let used = "  Rule: ".len() + rule.chars().count();
        let _ = writeln!(
            handle,
            "{bar}  {} {}{}{bar}",
            "Rule:".bright_black(),
            rule.yellow(),
            " ".repeat(WIDTH.saturating_sub(used)),
        );
    }

    // Reasons carry their own line breaks (suggested commands).
    let label = "  Reason: ";
    let mut first = true;
    for paragraph in reason.lines() {
        for line in wrap_text(paragraph, WIDTH - label.len() - 1) {
            let used = label.len() + line.chars().count();
            let head = if first {
                format!("  {} ", "Reason:".yellow().bold())
            } else {
                " ".repeat(label.len())
            };
            first = false;
            let _ = writeln!(
                handle,
                "{bar}{head}{}{}{bar}",
                line.white(),
                " ".repeat(WIDTH.saturating_sub(used)),
            );
        }
    }

    let display_cmd = truncate_for_display(command, 50);
    let used = "  Command: ".len() + display_cmd.chars().count();
    let _ = writeln!(
        handle,
        "{bar}  {} {}{}{bar}",
        "Command:".cyan().bold(),
        display_cmd.bright_white().bold(),
        " ".repeat(WIDTH.saturating_sub(used)),
    );

    let _ = writeln!(handle, "{}{}{}", "╰".red(), "─".repeat(WIDTH).red(), "╯".red());
    let _ = writeln!(handle);
}

/// Truncate to at most `max_chars` characters, ending in `...` when cut.
fn truncate_for_display(s: &str, max_chars: usize) -> Cow<'_, str> {
    if s.chars().count() <= max_chars {
        Cow::Borrowed(s)
    } else {
        let kept: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        Cow::Owned(format!("{kept}..."))
    }
}

/// Greedy word wrap; a single over-long word gets its own line.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current_line = String::new();

    for word in text.split_whitespace() {
        if current_line.is_empty() {
            current_line = word.to_string();
        } else if current_line.chars().count() + 1 + word.chars().count() <= width {
            current_line.push(' ');
            current_line.push_str(word);
        } else {
            lines.push(std::mem::take(&mut current_line));
            current_line = word.to_string();
        }
    }

    if !current_line.is_empty() || lines.is_empty() {
        lines.push(current_line);
    }
    lines
}

/// Write the deny decision as hook JSON to `out`.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn write_denial(
    out: &mut impl Write,
    command: &str,
    reason: &str,
    escalation_hint: &str,
) -> io::Result<()> {
    let message = format_denial_message(command, reason, escalation_hint);
    serde_json::to_writer(&mut *out, &HookOutput::deny(Cow::Owned(message)))?;
    writeln!(out)
}

/// Output a denial: the stderr banner plus the hook JSON on stdout.
#[cold]
#[inline(never)]
pub fn output_denial(command: &str, reason: &str, rule_id: Option<&str>, escalation_hint: &str) {
    print_colorful_warning(command, reason, rule_id);

    let stdout = io::stdout();
    let mut handle = stdout.lock();
    let _ = write_denial(&mut handle, command, reason, escalation_hint);
}
