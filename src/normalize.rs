//! Token helpers shared by the rule pipeline.
//!
//! Rules never look at raw bytes directly; they go through these helpers so
//! that quoting is handled the same way everywhere:
//!
//! - [`shell_split`] tokenizes a sub-command honoring shell quotes
//!   (`git push origin 'main'` yields the same tokens as the unquoted form).
//! - [`strip_refs_heads`] reduces a fully-qualified branch ref to its name.
//! - [`mask_quoted_literals`] blanks the inside of quoted strings so that
//!   literal substring matching does not fire on commit messages and the like.

use std::borrow::Cow;

/// Prefix carried by fully-qualified local branch refs.
pub const REFS_HEADS: &str = "refs/heads/";

/// Split a shell command into words while honoring quotes.
///
/// Falls back to plain whitespace splitting when the quoting is unbalanced,
/// so a malformed command is still inspected rather than skipped.
#[must_use]
pub fn shell_split(command: &str) -> Vec<String> {
    shlex::split(command)
        .unwrap_or_else(|| command.split_whitespace().map(str::to_string).collect())
}

/// Strip a leading `refs/heads/` from a ref, if present.
#[inline]
#[must_use]
pub fn strip_refs_heads(reference: &str) -> &str {
    reference.strip_prefix(REFS_HEADS).unwrap_or(reference)
}

/// Returns true if `token` is an option-looking word (`-x`, `--long`).
#[inline]
#[must_use]
pub fn is_option(token: &str) -> bool {
    token.starts_with('-')
}

/// Returns true if `token` is a short-flag bundle (`-fd`, `-uf`) containing `flag`.
///
/// Long options (`--foo`) never count as bundles.
#[must_use]
pub fn short_bundle_contains(token: &str, flag: char) -> bool {
    token
        .strip_prefix('-')
        .is_some_and(|rest| !rest.starts_with('-') && rest.contains(flag))
}

/// Replace the contents of single- and double-quoted strings with spaces.
///
/// Quote characters themselves are kept and the output has the same byte
/// length as the input, so offsets stay meaningful. Backslash escapes are
/// honored inside double quotes. An unterminated quote masks to the end of
/// the string.
#[must_use]
pub fn mask_quoted_literals(command: &str) -> Cow<'_, str> {
    if !command.bytes().any(|b| b == b'\'' || b == b'"') {
        return Cow::Borrowed(command);
    }

    let mut out = String::with_capacity(command.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for ch in command.chars() {
        match quote {
            None => {
                if ch == '\'' || ch == '"' {
                    quote = Some(ch);
                }
                out.push(ch);
            }
            Some(q) => {
                if escaped {
                    escaped = false;
                    push_blank(&mut out, ch);
                } else if q == '"' && ch == '\\' {
                    escaped = true;
                    push_blank(&mut out, ch);
                } else if ch == q {
                    quote = None;
                    out.push(ch);
                } else {
                    push_blank(&mut out, ch);
                }
            }
        }
    }

    Cow::Owned(out)
}

/// Push one space per byte of `ch` to keep the output length stable.
fn push_blank(out: &mut String, ch: char) {
    for _ in 0..ch.len_utf8() {
        out.push(' ');
    }
}
