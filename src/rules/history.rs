//! History-rewrite protection: `git rebase` and `git filter-branch`.

use super::{Rule, SubCommand, Verdict};
use crate::branch::BranchLookup;

/// Blocks commands that rewrite existing commits.
#[derive(Debug, Clone, Copy, Default)]
pub struct HistoryRewrite;

impl HistoryRewrite {
    pub const ID: &'static str = "history-rewrite";
}

impl Rule for HistoryRewrite {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn description(&self) -> &'static str {
        "Blocks git rebase and git filter-branch"
    }

    fn check(&self, sub: &SubCommand<'_>, _branch: &dyn BranchLookup) -> Verdict {
        if sub.is_git("rebase") {
            Verdict::block("git rebase rewrites history. Use 'git merge main' instead.")
        } else if sub.is_git("filter-branch") {
            Verdict::block("git filter-branch rewrites history. Not allowed.")
        } else {
            Verdict::Allow
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_helpers::{assert_allows, assert_blocks};

    #[test]
    fn blocks_rebase() {
        assert_blocks(&HistoryRewrite, "git rebase main", "git rebase rewrites history");
        assert_blocks(&HistoryRewrite, "git rebase -i HEAD~3", "git merge main");
        assert_blocks(&HistoryRewrite, "git rebase", "git rebase");
        assert_blocks(&HistoryRewrite, "git  rebase  --onto a b", "git rebase");
    }

    #[test]
    fn blocks_filter_branch() {
        assert_blocks(
            &HistoryRewrite,
            "git filter-branch --tree-filter 'rm x' HEAD",
            "git filter-branch rewrites history. Not allowed.",
        );
    }

    #[test]
    fn only_leading_tokens_count() {
        assert_allows(&HistoryRewrite, "echo git rebase main");
        assert_allows(&HistoryRewrite, "git log --grep rebase");
        assert_allows(&HistoryRewrite, "git rebased");
        assert_allows(&HistoryRewrite, "git merge main");
        assert_allows(&HistoryRewrite, "git-rebase main");
    }
}
