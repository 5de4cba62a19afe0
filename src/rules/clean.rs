//! `git clean` protection.

use super::{Rule, SubCommand, Verdict};
use crate::branch::BranchLookup;
use crate::normalize::short_bundle_contains;

/// Blocks `git clean` unless it is a dry run.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanProtection;

impl CleanProtection {
    pub const ID: &'static str = "clean";
}

/// `--dry-run` or a short bundle containing `n`, before any `--`.
fn is_dry_run(args: &[String]) -> bool {
    args.iter()
        .take_while(|arg| *arg != "--")
        .any(|arg| arg == "--dry-run" || short_bundle_contains(arg, 'n'))
}

impl Rule for CleanProtection {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn description(&self) -> &'static str {
        "Blocks git clean unless -n/--dry-run is given"
    }

    fn check(&self, sub: &SubCommand<'_>, _branch: &dyn BranchLookup) -> Verdict {
        if !sub.is_git("clean") || is_dry_run(&sub.tokens()[2..]) {
            return Verdict::Allow;
        }
        Verdict::block(
            "git clean deletes untracked files permanently. Use 'git clean -n' to preview.",
        )
    }
}
