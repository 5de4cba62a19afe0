//! Regression corpus: TOML case files run through the evaluator.
//!
//! # Corpus Structure
//!
//! ```text
//! tests/corpus/
//!   true_positives/   # Commands that MUST be blocked
//!   false_positives/  # Commands that MUST be allowed
//!   bypass_attempts/  # Dangerous commands hidden by composition (blocked)
//! ```
//!
//! # Test Case Format (TOML)
//!
//! ```toml
//! [[case]]
//! description = "direct push to main"
//! command = "git push origin main"
//! branch = "main"                    # optional, unknown when absent
//! rule_id = "push-protection"        # optional
//! reason_contains = "Direct push"    # optional
//! ```
//!
//! The expected decision comes from the directory.

use std::fs;
use std::path::Path;

use git_guard::branch::FixedBranch;
use git_guard::evaluator::evaluate_command;
use git_guard::rules::Classifier;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct CorpusFile {
    #[serde(default)]
    case: Vec<CorpusCase>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CorpusCase {
    description: String,
    command: String,
    branch: Option<String>,
    rule_id: Option<String>,
    reason_contains: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Category {
    TruePositives,
    FalsePositives,
    BypassAttempts,
}

impl Category {
    const fn dir(self) -> &'static str {
        match self {
            Self::TruePositives => "true_positives",
            Self::FalsePositives => "false_positives",
            Self::BypassAttempts => "bypass_attempts",
        }
    }

    const fn expects_block(self) -> bool {
        !matches!(self, Self::FalsePositives)
    }
}

/// Load every case in a category, tagged with its file name.
fn load_cases(category: Category) -> Vec<(String, CorpusCase)> {
    let dir = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/corpus")
        .join(category.dir());

    let mut paths: Vec<_> = fs::read_dir(&dir)
        .unwrap_or_else(|e| panic!("cannot read {}: {e}", dir.display()))
        .map(|entry| entry.expect("dir entry").path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();

    let mut cases = Vec::new();
    for path in paths {
        let text = fs::read_to_string(&path).expect("read corpus file");
        let file: CorpusFile = toml::from_str(&text)
            .unwrap_or_else(|e| panic!("invalid corpus file {}: {e}", path.display()));
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        cases.extend(file.case.into_iter().map(|case| (name.clone(), case)));
    }
    cases
}

fn verify(category: Category, case: &CorpusCase) -> Result<(), String> {
    let lookup = case
        .branch
        .as_deref()
        .map_or_else(FixedBranch::unknown, FixedBranch::new);
    let result = evaluate_command(&case.command, &Classifier::default(), &lookup);

    if result.is_blocked() != category.expects_block() {
        return Err(format!(
            "{:?}: expected {}, got {} (rule {:?}, reason {:?})",
            case.command,
            if category.expects_block() { "block" } else { "allow" },
            if result.is_blocked() { "block" } else { "allow" },
            result.rule_id,
            result.reason(),
        ));
    }

    if let Some(expected) = &case.rule_id {
        if result.rule_id != Some(expected.as_str()) {
            return Err(format!(
                "{:?}: expected rule {expected}, got {:?}",
                case.command, result.rule_id
            ));
        }
    }

    if let Some(needle) = &case.reason_contains {
        let reason = result.reason().unwrap_or_default();
        if !reason.contains(needle.as_str()) {
            return Err(format!(
                "{:?}: reason {reason:?} does not contain {needle:?}",
                case.command
            ));
        }
    }

    // Deterministic across repeated evaluation.
    let again = evaluate_command(&case.command, &Classifier::default(), &lookup);
    if again != result {
        return Err(format!("{:?}: result changed on re-evaluation", case.command));
    }
    Ok(())
}

fn run_category(category: Category) {
    let cases = load_cases(category);
    assert!(!cases.is_empty(), "no cases in {}", category.dir());

    let failures: Vec<String> = cases
        .iter()
        .filter_map(|(file, case)| {
            verify(category, case)
                .err()
                .map(|msg| format!("[{file}] {}: {msg}", case.description))
        })
        .collect();

    assert!(
        failures.is_empty(),
        "\n{}/{} {} case(s) failed:\n  {}\n",
        failures.len(),
        cases.len(),
        category.dir(),
        failures.join("\n  ")
    );
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn corpus_true_positives() {
    run_category(Category::TruePositives);
}

#[test]
fn corpus_false_positives() {
    run_category(Category::FalsePositives);
}

#[test]
fn corpus_bypass_attempts() {
    run_category(Category::BypassAttempts);
}
