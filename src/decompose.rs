//! Shell decomposition: split a raw command line into independently
//! classifiable sub-commands.
//!
//! # Pipeline
//!
//! ```text
//! raw ──► extract $( … ) / ` … ` bodies ──► flatten outer text
//!              │                                   │
//!              ▼ (work list, any depth)            ▼
//!         same treatment             split on && || ; | & newline
//!                                                  │
//!                                                  ▼
//!                                     strip ( … ) and { … ; } grouping
//! ```
//!
//! This is a conservative grammar, not a shell parser. It may yield spurious
//! fragments but never hides a command behind composition: substitution
//! bodies are always inspected on their own, and quoting is not tracked when
//! splitting.

use memchr::{memchr, memmem};
use regex::Regex;
use std::borrow::Cow;
use std::collections::{HashSet, VecDeque};
use std::sync::LazyLock;
use tracing::trace;

/// Command boundaries: `&&`, `||`, `;`, `|`, a background `&` and newlines,
/// with surrounding whitespace.
static COMPOUND_SEPARATOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\s*(?:&&|\|\||[;|&\n])\s*").expect("compound separator regex compiles")
});

/// A substitution body found while flattening, with its nesting depth.
#[derive(Debug)]
struct Body {
    depth: usize,
    text: String,
}

/// Decompose `raw` into its sub-commands.
///
/// Fragments of the outer command come first, followed by the fragments of
/// every `$( … )` / backtick body, deepest nesting first. Duplicates are
/// dropped (first occurrence kept) and empty fragments discarded. The result
/// is deterministic for a given input.
#[must_use]
pub fn decompose(raw: &str) -> Vec<String> {
    let mut outer: Vec<String> = Vec::new();
    let mut nested: Vec<(usize, String)> = Vec::new();

    let mut work: VecDeque<Body> = VecDeque::new();
    work.push_back(Body {
        depth: 0,
        text: raw.to_string(),
    });

    while let Some(body) = work.pop_front() {
        let (flattened, inner) = flatten_substitutions(&body.text);
        for text in inner {
            work.push_back(Body {
                depth: body.depth + 1,
                text,
            });
        }

        for fragment in split_compound(&flattened) {
            if body.depth == 0 {
                outer.push(fragment);
            } else {
                nested.push((body.depth, fragment));
            }
        }
    }

    // Stable: equal depths keep discovery order.
    nested.sort_by(|a, b| b.0.cmp(&a.0));

    let mut seen = HashSet::new();
    let parts: Vec<String> = outer
        .into_iter()
        .chain(nested.into_iter().map(|(_, fragment)| fragment))
        .filter(|fragment| seen.insert(fragment.clone()))
        .collect();

    trace!(raw, ?parts, "decomposed command");
    parts
}

/// Replace every top-level `$( … )` and `` ` … ` `` in `text` with a single
/// space, returning the flattened text and the bodies that were removed.
///
/// `$(` is matched to its closing `)` by depth counting, so bodies may contain
/// further parentheses or substitutions; those are handled when the body is
/// processed in turn. An unterminated substitution swallows the rest of the
/// text as its body.
fn flatten_substitutions(text: &str) -> (Cow<'_, str>, Vec<String>) {
    let bytes = text.as_bytes();
    if memmem::find(bytes, b"$(").is_none() && memchr(b'`', bytes).is_none() {
        return (Cow::Borrowed(text), Vec::new());
    }

    let mut out = String::with_capacity(text.len());
    let mut bodies = Vec::new();
    let mut copied_up_to = 0;
    let mut i = 0;

    while i < bytes.len() {
        let (body_start, body_end, resume) = match bytes[i] {
            b'$' if bytes.get(i + 1) == Some(&b'(') => {
                let start = i + 2;
                match find_closing_paren(bytes, start) {
                    Some(end) => (start, end, end + 1),
                    None => (start, bytes.len(), bytes.len()),
                }
            }
            b'`' => {
                let start = i + 1;
                match memchr(b'`', &bytes[start..]) {
                    Some(offset) => (start, start + offset, start + offset + 1),
                    None => (start, bytes.len(), bytes.len()),
                }
            }
            _ => {
                i += 1;
                continue;
            }
        };

        // All delimiters are ASCII, so these are char boundaries.
        out.push_str(&text[copied_up_to..i]);
        out.push(' ');
        bodies.push(text[body_start..body_end].to_string());
        copied_up_to = resume;
        i = resume;
    }

    out.push_str(&text[copied_up_to..]);
    (Cow::Owned(out), bodies)
}

/// Index of the `)` closing a `(` whose content starts at `start`.
fn find_closing_paren(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 1usize;
    for (offset, &b) in bytes[start..].iter().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Split on compound boundaries and strip grouping from each piece.
fn split_compound(text: &str) -> impl Iterator<Item = String> + '_ {
    let mut pieces = Vec::new();
    let mut start = 0;
    for sep in COMPOUND_SEPARATOR.find_iter(text) {
        if is_redirection(text, sep.start(), sep.end()) {
            continue;
        }
        pieces.push(&text[start..sep.start()]);
        start = sep.end();
    }
    pieces.push(&text[start..]);

    pieces
        .into_iter()
        .map(strip_grouping)
        .filter(|fragment| !fragment.is_empty())
        .map(str::to_string)
}

/// A lone `&` touching `>` or `<` is part of a redirection (`2>&1`, `&>log`,
/// `<&3`), not a background separator.
fn is_redirection(text: &str, start: usize, end: usize) -> bool {
    text[start..end].trim() == "&"
        && (text[..start].ends_with(['>', '<']) || text[end..].starts_with('>'))
}

/// Strip bare subshell parens and brace groups: leading `(`/`{` and trailing
/// `)`/`}`/`;`, as many layers as are present.
#[must_use]
pub fn strip_grouping(fragment: &str) -> &str {
    let mut s = fragment.trim();
    while let Some(rest) = s.strip_prefix(['(', '{']) {
        s = rest.trim_start();
    }
    while let Some(rest) = s.strip_suffix([')', '}', ';']) {
        s = rest.trim_end();
    }
    s
}
