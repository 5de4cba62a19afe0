//! The destructive-operation classifier.
//!
//! A [`Classifier`] is an ordered list of [`Rule`]s built once from a
//! [`Catalog`]. Each sub-command is tokenized once into a [`SubCommand`] and
//! offered to every rule in order; the first rule that blocks decides.
//!
//! # Rule order
//!
//! | # | Id | Module |
//! |---|----|--------|
//! | 1 | `push-protection` | [`push`] |
//! | 2 | `force-push` | [`force_push`] |
//! | 3 | `history-rewrite` | [`history`] |
//! | 4 | `clean` | [`clean`] |
//! | 5 | `destructive-command` | [`catalog`] |
//! | 6 | `dangerous-flag` | [`catalog`] |
//!
//! Rules are stateless. Only push protection consults the branch lookup,
//! and only for a push without explicit targets.

pub mod catalog;
pub mod clean;
pub mod force_push;
pub mod history;
pub mod push;

use crate::branch::BranchLookup;
use crate::catalog::Catalog;
use crate::normalize::shell_split;
use push::PushInvocation;

/// Stable identifiers for the built-in rules, in pipeline order.
pub const RULE_IDS: [&str; 6] = [
    push::PushProtection::ID,
    force_push::ForcePushProtection::ID,
    history::HistoryRewrite::ID,
    clean::CleanProtection::ID,
    catalog::DestructiveCommand::ID,
    catalog::DangerousFlag::ID,
];

/// The outcome of classifying a command.
///
/// A block always carries a non-empty reason; an allow carries none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Block { reason: String },
}

impl Verdict {
    #[must_use]
    pub const fn allow() -> Self {
        Self::Allow
    }

    #[must_use]
    pub fn block(reason: impl Into<String>) -> Self {
        Self::Block {
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::Block { .. })
    }

    /// The block reason, or `""` for an allow.
    #[must_use]
    pub fn reason(&self) -> &str {
        match self {
            Self::Allow => "",
            Self::Block { reason } => reason,
        }
    }
}

/// One decomposed sub-command, tokenized once and shared by every rule.
#[derive(Debug, Clone)]
pub struct SubCommand<'a> {
    text: &'a str,
    tokens: Vec<String>,
}

impl<'a> SubCommand<'a> {
    #[must_use]
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            tokens: shell_split(text),
        }
    }

    /// The sub-command as it appeared after decomposition.
    #[must_use]
    pub const fn text(&self) -> &'a str {
        self.text
    }

    /// Shell words, quotes removed.
    #[must_use]
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// True when the first two words are `git` and `subcommand`.
    #[must_use]
    pub fn is_git(&self, subcommand: &str) -> bool {
        matches!(self.tokens.as_slice(), [git, sub, ..] if git == "git" && sub == subcommand)
    }

    /// The `git push` invocation this sub-command makes, if any.
    #[must_use]
    pub fn push(&self) -> Option<PushInvocation<'_>> {
        PushInvocation::parse(&self.tokens)
    }
}

/// A single check in the classifier pipeline.
pub trait Rule: Send + Sync {
    /// Stable identifier used in configuration, logs and CLI output.
    fn id(&self) -> &'static str;

    /// One-line summary for `git-guard rules`.
    fn description(&self) -> &'static str;

    /// Decide whether `sub` must be blocked.
    fn check(&self, sub: &SubCommand<'_>, branch: &dyn BranchLookup) -> Verdict;
}

/// A block produced by a specific rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub rule_id: &'static str,
    pub reason: String,
}

/// Ordered rule pipeline with first-block-wins semantics.
pub struct Classifier {
    rules: Vec<Box<dyn Rule>>,
}

impl Classifier {
    /// Build the full pipeline over `catalog`.
    #[must_use]
    pub fn new(catalog: &Catalog) -> Self {
        Self::with_disabled(catalog, &[])
    }

    /// Build the pipeline, leaving out every rule whose id is in `disabled`.
    ///
    /// Unknown ids are ignored.
    #[must_use]
    pub fn with_disabled(catalog: &Catalog, disabled: &[String]) -> Self {
        let all: Vec<Box<dyn Rule>> = vec![
            Box::new(push::PushProtection::new(catalog)),
            Box::new(force_push::ForcePushProtection::new(catalog)),
            Box::new(history::HistoryRewrite),
            Box::new(clean::CleanProtection),
            Box::new(catalog::DestructiveCommand::new(catalog)),
            Box::new(catalog::DangerousFlag::new(catalog)),
        ];
        let rules = all
            .into_iter()
            .filter(|rule| !disabled.iter().any(|id| id == rule.id()))
            .collect();
        Self { rules }
    }

    /// Rules in evaluation order.
    pub fn rules(&self) -> impl Iterator<Item = &(dyn Rule + 'static)> {
        self.rules.iter().map(AsRef::as_ref)
    }

    /// Run the pipeline on one sub-command and report which rule blocked it.
    #[must_use]
    pub fn check(&self, sub: &str, branch: &dyn BranchLookup) -> Option<RuleMatch> {
        let sub = SubCommand::new(sub);
        self.rules.iter().find_map(|rule| match rule.check(&sub, branch) {
            Verdict::Allow => None,
            Verdict::Block { reason } => Some(RuleMatch {
                rule_id: rule.id(),
                reason,
            }),
        })
    }

    /// Run the pipeline on one sub-command.
    #[must_use]
    pub fn classify(&self, sub: &str, branch: &dyn BranchLookup) -> Verdict {
        self.check(sub, branch)
            .map_or(Verdict::Allow, |hit| Verdict::Block { reason: hit.reason })
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&Catalog::default())
    }
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("rules", &self.rules().map(Rule::id).collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test_helpers {
    use super::{Rule, SubCommand, Verdict};
    use crate::branch::{BranchLookup, FixedBranch};

    /// Assert `rule` blocks `command` with a reason containing `expected`.
    #[track_caller]
    pub fn assert_blocks(rule: &dyn Rule, command: &str, expected: &str) {
        assert_blocks_on(rule, command, &FixedBranch::unknown(), expected);
    }

    #[track_caller]
    pub fn assert_blocks_on(
        rule: &dyn Rule,
        command: &str,
        branch: &dyn BranchLookup,
        expected: &str,
    ) {
        match rule.check(&SubCommand::new(command), branch) {
            Verdict::Block { reason } => assert!(
                reason.contains(expected),
                "rule '{}' blocked '{command}' with unexpected reason.\n\
                 Expected to contain: '{expected}'\n\
                 Actual: '{reason}'",
                rule.id()
            ),
            Verdict::Allow => panic!("rule '{}' allowed '{command}'", rule.id()),
        }
    }

    #[track_caller]
    pub fn assert_allows(rule: &dyn Rule, command: &str) {
        assert_allows_on(rule, command, &FixedBranch::unknown());
    }

    #[track_caller]
    pub fn assert_allows_on(rule: &dyn Rule, command: &str, branch: &dyn BranchLookup) {
        let verdict = rule.check(&SubCommand::new(command), branch);
        assert!(
            !verdict.is_blocked(),
            "rule '{}' blocked '{command}': {}",
            rule.id(),
            verdict.reason()
        );
    }
}
