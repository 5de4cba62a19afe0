//! Pattern catalog: the data every rule runs against.
//!
//! The rules themselves contain no branch names, phrases or flags. Everything
//! they match is listed here so it can be extended from configuration without
//! touching rule logic. [`Catalog::default`] is the reference catalog.

use serde::{Deserialize, Serialize};

/// One catalog entry: a literal to look for and the reason reported when it
/// matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Literal substring (destructive phrases) or flag token (dangerous flags).
    pub pattern: String,
    /// Human-readable reason shown to the operator.
    pub reason: String,
}

impl CatalogEntry {
    #[must_use]
    pub fn new(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}

/// Everything the rule pipeline matches against.
///
/// List order matters only for reporting: the first matching entry's reason
/// wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Catalog {
    /// Branches that must never receive a direct or force push.
    pub protected_branches: Vec<String>,
    /// Force variants that refuse to overwrite unexpected remote work.
    /// A token matches a flag exactly or as `flag=value`.
    pub safe_force_flags: Vec<String>,
    /// Push flags that can update every ref on the remote.
    pub push_all_flags: Vec<String>,
    /// Blank out quoted string contents before destructive-phrase matching.
    pub mask_quoted_literals: bool,
    /// Phrases blocked wherever they appear in a sub-command.
    pub destructive: Vec<CatalogEntry>,
    /// Flags blocked when they appear as a standalone token.
    pub dangerous_flags: Vec<CatalogEntry>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self {
            protected_branches: vec!["main".to_string(), "master".to_string()],
            safe_force_flags: vec![
                "--force-with-lease".to_string(),
                "--force-if-includes".to_string(),
            ],
            push_all_flags: vec!["--all".to_string(), "--mirror".to_string()],
            mask_quoted_literals: false,
            destructive: vec![
                CatalogEntry::new(
                    "git reset --hard",
                    "Destroys all uncommitted work. Use 'git stash' first.",
                ),
                CatalogEntry::new("git stash drop", "Permanently deletes stashed changes."),
                CatalogEntry::new(
                    "git stash clear",
                    "Permanently deletes ALL stashed changes.",
                ),
                CatalogEntry::new("gh pr merge", "Merges PR. Run manually to review."),
                CatalogEntry::new("gh repo delete", "Permanently deletes repository."),
            ],
            dangerous_flags: vec![CatalogEntry::new(
                "--no-verify",
                "Skips git hooks. Hooks enforce quality gates, don't bypass them.",
            )],
        }
    }
}

impl Catalog {
    /// Returns true if `branch` is in the protected set.
    #[must_use]
    pub fn is_protected(&self, branch: &str) -> bool {
        self.protected_branches.iter().any(|b| b == branch)
    }

    /// Returns true if `token` is one of the safe force flags (`--flag` or
    /// `--flag=value`).
    #[must_use]
    pub fn is_safe_force_flag(&self, token: &str) -> bool {
        self.safe_force_flags.iter().any(|flag| {
            token
                .strip_prefix(flag.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('='))
        })
    }

    /// Returns the push-all flag `token` matches, if any.
    #[must_use]
    pub fn push_all_flag<'a>(&self, token: &'a str) -> Option<&'a str> {
        self.push_all_flags
            .iter()
            .any(|flag| flag == token)
            .then_some(token)
    }

    /// Append entries from `extra`, skipping exact duplicates.
    pub fn extend(&mut self, extra: Self) {
        extend_unique(&mut self.protected_branches, extra.protected_branches);
        extend_unique(&mut self.destructive, extra.destructive);
        extend_unique(&mut self.dangerous_flags, extra.dangerous_flags);
        extend_unique(&mut self.safe_force_flags, extra.safe_force_flags);
        extend_unique(&mut self.push_all_flags, extra.push_all_flags);
        self.mask_quoted_literals |= extra.mask_quoted_literals;
    }
}

fn extend_unique<T: PartialEq>(target: &mut Vec<T>, extra: Vec<T>) {
    for item in extra {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}
