//! Catalog-driven rules: literal destructive phrases and dangerous flags.

use super::{Rule, SubCommand, Verdict};
use crate::branch::BranchLookup;
use crate::catalog::{Catalog, CatalogEntry};
use crate::normalize::mask_quoted_literals;
use memchr::memmem;
use regex::Regex;
use tracing::warn;

/// Blocks sub-commands containing any destructive catalog phrase.
#[derive(Debug, Clone)]
pub struct DestructiveCommand {
    phrases: Vec<(memmem::Finder<'static>, String)>,
    mask_quoted_literals: bool,
}

impl DestructiveCommand {
    pub const ID: &'static str = "destructive-command";

    #[must_use]
    pub fn new(catalog: &Catalog) -> Self {
        let phrases = catalog
            .destructive
            .iter()
            .filter(|entry| !entry.pattern.is_empty())
            .map(|entry| {
                (
                    memmem::Finder::new(entry.pattern.as_bytes()).into_owned(),
                    entry.reason.clone(),
                )
            })
            .collect();
        Self {
            phrases,
            mask_quoted_literals: catalog.mask_quoted_literals,
        }
    }
}

impl Rule for DestructiveCommand {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn description(&self) -> &'static str {
        "Blocks catalog phrases such as 'git reset --hard' anywhere in a command"
    }

    fn check(&self, sub: &SubCommand<'_>, _branch: &dyn BranchLookup) -> Verdict {
        let haystack = if self.mask_quoted_literals {
            mask_quoted_literals(sub.text())
        } else {
            sub.text().into()
        };
        self.phrases
            .iter()
            .find(|(finder, _)| finder.find(haystack.as_bytes()).is_some())
            .map_or(Verdict::Allow, |(_, reason)| Verdict::block(reason.as_str()))
    }
}

/// Blocks catalog flags appearing as a whitespace-delimited word, or as a
/// whole shell word once quotes are removed (`'--no-verify'`).
#[derive(Debug, Clone)]
pub struct DangerousFlag {
    flags: Vec<FlagMatcher>,
}

#[derive(Debug, Clone)]
struct FlagMatcher {
    flag: String,
    word: Regex,
    reason: String,
}

impl FlagMatcher {
    fn matches(&self, sub: &SubCommand<'_>) -> bool {
        self.word.is_match(sub.text()) || sub.tokens().iter().any(|t| *t == self.flag)
    }
}

impl DangerousFlag {
    pub const ID: &'static str = "dangerous-flag";

    #[must_use]
    pub fn new(catalog: &Catalog) -> Self {
        let flags = catalog
            .dangerous_flags
            .iter()
            .filter(|entry| !entry.pattern.is_empty())
            .filter_map(|entry| match flag_regex(entry) {
                Ok(word) => Some(FlagMatcher {
                    flag: entry.pattern.clone(),
                    word,
                    reason: entry.reason.clone(),
                }),
                Err(err) => {
                    warn!(flag = %entry.pattern, error = %err, "skipping dangerous flag");
                    None
                }
            })
            .collect();
        Self { flags }
    }
}

fn flag_regex(entry: &CatalogEntry) -> Result<Regex, regex::Error> {
    Regex::new(&format!(r"(?:^|\s){}(?:\s|$)", regex::escape(&entry.pattern)))
}

impl Rule for DangerousFlag {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn description(&self) -> &'static str {
        "Blocks catalog flags such as --no-verify when used as a standalone word"
    }

    fn check(&self, sub: &SubCommand<'_>, _branch: &dyn BranchLookup) -> Verdict {
        self.flags
            .iter()
            .find(|flag| flag.matches(sub))
            .map_or(Verdict::Allow, |flag| Verdict::block(flag.reason.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_helpers::{assert_allows, assert_blocks};

    fn destructive() -> DestructiveCommand {
        DestructiveCommand::new(&Catalog::default())
    }

    fn flags() -> DangerousFlag {
        DangerousFlag::new(&Catalog::default())
    }

    // =========================================================================
    // Destructive phrases
    // =========================================================================

    #[test]
    fn blocks_default_phrases() {
        let rule = destructive();
        assert_blocks(&rule, "git reset --hard HEAD~1", "Destroys all uncommitted work");
        assert_blocks(&rule, "git stash drop stash@{0}", "Permanently deletes stashed changes.");
        assert_blocks(&rule, "git stash clear", "Permanently deletes ALL stashed changes.");
        assert_blocks(&rule, "gh pr merge 42 --squash", "Merges PR. Run manually to review.");
        assert_blocks(&rule, "gh repo delete org/repo", "Permanently deletes repository.");
    }

    #[test]
    fn phrase_matches_anywhere() {
        assert_blocks(&destructive(), "echo 'git reset --hard'", "Destroys");
        assert_blocks(&destructive(), "sudo git reset --hard", "Destroys");
    }

    #[test]
    fn allows_safe_relatives() {
        let rule = destructive();
        for cmd in [
            "git reset --soft HEAD~1",
            "git reset HEAD file",
            "git stash",
            "git stash pop",
            "git stash list",
            "gh pr create",
            "gh pr view 42",
        ] {
            assert_allows(&rule, cmd);
        }
    }

    #[test]
    fn first_matching_phrase_wins() {
        let verdict = destructive().check(
            &SubCommand::new("git stash clear; git reset --hard"),
            &crate::branch::FixedBranch::unknown(),
        );
        assert_eq!(
            verdict.reason(),
            "Destroys all uncommitted work. Use 'git stash' first."
        );
    }

    #[test]
    fn masking_ignores_quoted_phrases() {
        let catalog = Catalog {
            mask_quoted_literals: true,
            ..Catalog::default()
        };
        let rule = DestructiveCommand::new(&catalog);
        assert_allows(&rule, r#"git commit -m "never run git reset --hard""#);
        assert_allows(&rule, "echo 'gh repo delete'");
        assert_blocks(&rule, "git reset --hard", "Destroys");
    }

    #[test]
    fn extra_phrases_are_matched() {
        let mut catalog = Catalog::default();
        catalog
            .destructive
            .push(CatalogEntry::new("git branch -D", "Force-deletes a branch."));
        assert_blocks(
            &DestructiveCommand::new(&catalog),
            "git branch -D old",
            "Force-deletes a branch.",
        );
    }

    // =========================================================================
    // Dangerous flags
    // =========================================================================

    #[test]
    fn blocks_no_verify_as_a_word() {
        for cmd in [
            "git commit --no-verify -m x",
            "git commit -m x --no-verify",
            "git push --no-verify origin feature",
            "--no-verify",
            "git commit\t--no-verify",
            "git commit '--no-verify' -m x",
            "git commit \"--no-verify\" -m x",
            "git commit -m x '--no-verify'",
        ] {
            assert_blocks(&flags(), cmd, "Skips git hooks");
        }
    }

    #[test]
    fn flag_boundaries_are_exact() {
        for cmd in [
            "git commit --no-verify-custom",
            "git commit x--no-verify",
            "git commit --no-verify=true",
            "git commit -m no-verify",
            "git commit '--no-verify-custom'",
            "git commit \"--no-verify=true\"",
        ] {
            assert_allows(&flags(), cmd);
        }
    }

    #[test]
    fn flag_metacharacters_are_literal() {
        let mut catalog = Catalog::default();
        catalog
            .dangerous_flags
            .push(CatalogEntry::new("--a.b", "dotted"));
        let rule = DangerousFlag::new(&catalog);
        assert_blocks(&rule, "tool --a.b", "dotted");
        assert_allows(&rule, "tool --axb");
    }
}
