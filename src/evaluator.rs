//! Shared command evaluator for hook mode and CLI.
//!
//! Evaluation is `decompose` followed by classification of each sub-command,
//! stopping at the first block:
//!
//! 1. **Decompose** the raw command into sub-commands ([`crate::decompose`]).
//! 2. **Classify** each sub-command with the rule pipeline
//!    ([`crate::rules::Classifier`]).
//! 3. **Report** the first block, or allow.
//!
//! The branch lookup handed in is wrapped in a per-call memo, so git is run
//! at most once per evaluation no matter how many bare pushes the command
//! contains.
//!
//! # Example
//!
//! ```
//! use git_guard::branch::FixedBranch;
//! use git_guard::evaluator::evaluate_command;
//! use git_guard::rules::Classifier;
//!
//! let classifier = Classifier::default();
//! let result = evaluate_command("echo hi && git push origin main", &classifier, &FixedBranch::unknown());
//! assert!(result.is_blocked());
//! assert_eq!(result.rule_id, Some("push-protection"));
//! ```

use crate::branch::{BranchLookup, MemoizedLookup};
use crate::decompose::decompose;
use crate::rules::{Classifier, Verdict};
use std::sync::LazyLock;
use tracing::debug;

static DEFAULT_CLASSIFIER: LazyLock<Classifier> = LazyLock::new(Classifier::default);

/// Result of evaluating a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationResult {
    pub verdict: Verdict,
    /// Rule that blocked the command.
    pub rule_id: Option<&'static str>,
    /// The sub-command the blocking rule fired on.
    pub sub_command: Option<String>,
    /// Whether the branch lookup was consulted.
    pub branch_lookup_used: bool,
}

impl EvaluationResult {
    #[inline]
    #[must_use]
    pub const fn allowed() -> Self {
        Self {
            verdict: Verdict::Allow,
            rule_id: None,
            sub_command: None,
            branch_lookup_used: false,
        }
    }

    #[inline]
    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        !self.verdict.is_blocked()
    }

    #[inline]
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        self.verdict.is_blocked()
    }

    /// The block reason, if blocked.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.is_blocked().then(|| self.verdict.reason())
    }
}

/// Evaluate `command` against `classifier`.
///
/// Total: never panics and never errors. Empty or garbage input is allowed.
#[must_use]
pub fn evaluate_command(
    command: &str,
    classifier: &Classifier,
    branch: &dyn BranchLookup,
) -> EvaluationResult {
    let memo = MemoizedLookup::new(branch);

    for sub in decompose(command) {
        if let Some(hit) = classifier.check(&sub, &memo) {
            debug!(rule = hit.rule_id, sub_command = %sub, "command blocked");
            return EvaluationResult {
                verdict: Verdict::Block { reason: hit.reason },
                rule_id: Some(hit.rule_id),
                sub_command: Some(sub),
                branch_lookup_used: memo.was_consulted(),
            };
        }
    }

    EvaluationResult {
        branch_lookup_used: memo.was_consulted(),
        ..EvaluationResult::allowed()
    }
}

/// Evaluate `command` with the default catalog.
#[must_use]
pub fn evaluate(command: &str, branch: &dyn BranchLookup) -> Verdict {
    evaluate_command(command, &DEFAULT_CLASSIFIER, branch).verdict
}


// =============================================================================
// Property-based invariants
// =============================================================================

#[cfg(test)]
mod proptest_invariants {
    use super::*;
    use crate::branch::FixedBranch;
    use proptest::prelude::*;

    /// Commands that must be blocked when `main` is checked out.
    const DANGEROUS: &[&str] = &[
        "git push origin main",
        "git push",
        "git push origin +main",
        "git push --force origin feature",
        "git push -uf origin feature",
        "git push origin HEAD:refs/heads/master",
        "git push --mirror",
        "git rebase -i HEAD~3",
        "git filter-branch HEAD",
        "git clean -fdx",
        "git reset --hard",
        "git stash drop",
        "gh repo delete org/repo",
        "git commit --no-verify -m wip",
    ];

    const SEPARATORS: &[&str] = &["&&", "||", ";", "|", "\n"];
    const FORCE_FORMS: &[&str] = &["--force", "-f", "-uf"];
    const LEASE_FORMS: &[&str] = &[
        "--force-with-lease",
        "--force-if-includes",
        "--force-with-lease=feature:abc",
    ];

    fn command_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            // Normal-looking commands
            "[a-zA-Z][a-zA-Z0-9_\\-]{0,50}( [a-zA-Z0-9_\\-./]+){0,10}",
            // git-flavored commands
            "git (push|rebase|clean|reset|stash|commit)( [a-z+:/\\-]{1,12}){0,4}",
            // Shell metacharacters
            "[!-~]{0,100}",
            // Unicode
            "\\PC{0,100}",
            Just(String::new()),
        ]
    }

    fn dangerous() -> impl Strategy<Value = &'static str> {
        prop::sample::select(DANGEROUS)
    }

    fn main_branch() -> FixedBranch {
        FixedBranch::new("main")
    }

    proptest! {
        /// Evaluating the same input twice yields identical results.
        #[test]
        fn evaluation_is_deterministic(cmd in command_strategy()) {
            let classifier = Classifier::default();
            let first = evaluate_command(&cmd, &classifier, &main_branch());
            let second = evaluate_command(&cmd, &classifier, &main_branch());
            prop_assert_eq!(first, second, "nondeterministic for {:?}", cmd);
        }

        /// Evaluation is total for arbitrary UTF-8.
        #[test]
        fn evaluation_never_panics(cmd in "\\PC{0,1000}") {
            let _ = evaluate(&cmd, &main_branch());
        }

        /// Blocks carry a reason; allows carry none.
        #[test]
        fn reason_matches_verdict(cmd in command_strategy()) {
            let result = evaluate_command(&cmd, &Classifier::default(), &main_branch());
            prop_assert_eq!(result.is_blocked(), !result.verdict.reason().is_empty());
            prop_assert_eq!(result.is_blocked(), result.rule_id.is_some());
        }

        /// Adding commands around a blocked command never unblocks it.
        #[test]
        fn composition_is_monotonic(
            danger in dangerous(),
            other in "[!-~]{0,20}",
            sep in prop::sample::select(SEPARATORS),
        ) {
            prop_assert!(evaluate(danger, &main_branch()).is_blocked());
            let after = format!("{danger} {sep} {other}");
            let before = format!("{other} {sep} {danger}");
            prop_assert!(evaluate(&after, &main_branch()).is_blocked(), "{:?}", after);
            prop_assert!(evaluate(&before, &main_branch()).is_blocked(), "{:?}", before);
        }

        /// Substitution and grouping never hide a blocked command.
        #[test]
        fn subshells_are_transparent(danger in dangerous(), depth in 1usize..4) {
            let mut wrapped = [
                danger.to_string(),
                danger.to_string(),
                danger.to_string(),
                danger.to_string(),
            ];
            for _ in 0..depth {
                wrapped[0] = format!("echo $({})", wrapped[0]);
                wrapped[1] = format!("({})", wrapped[1]);
                wrapped[2] = format!("{{ {}; }}", wrapped[2]);
            }
            wrapped[3] = format!("echo `{danger}`");
            for cmd in &wrapped {
                prop_assert!(evaluate(cmd, &main_branch()).is_blocked(), "{:?}", cmd);
            }
        }

        /// A lease flag turns a force-flag push into an allowed push.
        #[test]
        fn safe_force_overrides_force(
            force in prop::sample::select(FORCE_FORMS),
            lease in prop::sample::select(LEASE_FORMS),
        ) {
            let cmd = format!("git push {lease} origin {force} feature");
            prop_assert!(!evaluate(&cmd, &main_branch()).is_blocked(), "{:?}", cmd);
        }

        /// A `+` refspec stays blocked whatever lease flag accompanies it.
        #[test]
        fn safe_force_never_excuses_plus_refspec(
            lease in prop::sample::select(LEASE_FORMS),
            target in "[a-z]{1,8}",
        ) {
            let cmd = format!("git push {lease} origin +{target}");
            prop_assert!(evaluate(&cmd, &main_branch()).is_blocked(), "{:?}", cmd);
        }

        /// Flags only match as whole words.
        #[test]
        fn flag_match_is_word_exact(suffix in "[a-z\\-]{1,10}") {
            let cmd = format!("git commit --no-verify{suffix} -m x");
            prop_assert!(!evaluate(&cmd, &main_branch()).is_blocked(), "{:?}", cmd);
        }
    }
}
