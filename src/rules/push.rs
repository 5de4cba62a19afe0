//! Push-target protection and the `git push` argument parser it shares with
//! force-push protection.

use super::{Rule, SubCommand, Verdict};
use crate::branch::BranchLookup;
use crate::catalog::Catalog;
use crate::normalize::{REFS_HEADS, is_option, strip_refs_heads};

/// Git global options that consume the following word (or `--opt=value`).
const GLOBAL_OPTIONS_WITH_VALUE: &[&str] = &[
    "-C",
    "-c",
    "--config-env",
    "--exec-path",
    "--git-dir",
    "--namespace",
    "--super-prefix",
    "--work-tree",
];

/// Git global options that stand alone.
const GLOBAL_FLAGS: &[&str] = &[
    "--bare",
    "--literal-pathspecs",
    "--glob-pathspecs",
    "--noglob-pathspecs",
    "--icase-pathspecs",
    "--no-pager",
    "-p",
    "--paginate",
    "-P",
    "--no-optional-locks",
    "--no-replace-objects",
    "--no-lazy-fetch",
    "--no-advice",
];

/// `git push` options whose value is a separate word that is not a ref.
const PUSH_OPTIONS_WITH_VALUE: &[&str] =
    &["-o", "--push-option", "--repo", "--receive-pack", "--exec"];

/// The arguments of a `git push` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PushInvocation<'a> {
    args: &'a [String],
}

impl<'a> PushInvocation<'a> {
    /// Recognize `git [global options] push [args]`.
    ///
    /// Returns `None` for anything that is not a push: a first word other
    /// than `git`, an unrecognized global option, `--`, a value option with
    /// no value, or a git subcommand other than `push`.
    #[must_use]
    pub fn parse(tokens: &'a [String]) -> Option<Self> {
        let (first, rest) = tokens.split_first()?;
        if first != "git" {
            return None;
        }

        let mut i = 0;
        while let Some(token) = rest.get(i) {
            let token = token.as_str();
            if token == "push" {
                return Some(Self { args: &rest[i + 1..] });
            }
            if GLOBAL_OPTIONS_WITH_VALUE.contains(&token) {
                rest.get(i + 1)?;
                i += 2;
            } else if is_attached_global_value(token) || GLOBAL_FLAGS.contains(&token) {
                i += 1;
            } else {
                return None;
            }
        }
        None
    }

    /// Everything after `push`.
    #[must_use]
    pub const fn args(&self) -> &'a [String] {
        self.args
    }

    /// Non-option words, excluding the values of push options that take one.
    #[must_use]
    pub fn positionals(&self) -> Vec<&'a str> {
        let mut out = Vec::new();
        let mut skip_value = false;
        for arg in self.args {
            if std::mem::take(&mut skip_value) {
                continue;
            }
            if PUSH_OPTIONS_WITH_VALUE.contains(&arg.as_str()) {
                skip_value = true;
            } else if !arg.is_empty() && !is_option(arg) {
                out.push(arg.as_str());
            }
        }
        out
    }

    /// Refs or refspecs being pushed.
    ///
    /// The first positional is the remote unless it already looks like a ref:
    /// it contains `:`, starts with `+` or `refs/heads/`, or names a protected
    /// branch.
    #[must_use]
    pub fn targets(&self, is_protected: impl Fn(&str) -> bool) -> Vec<&'a str> {
        let positionals = self.positionals();
        let Some((&first, rest)) = positionals.split_first() else {
            return Vec::new();
        };
        let first_is_ref = first.contains(':')
            || first.starts_with('+')
            || first.starts_with(REFS_HEADS)
            || is_protected(strip_refs_heads(first));

        let mut targets = Vec::with_capacity(positionals.len());
        if first_is_ref {
            targets.push(first);
        }
        targets.extend_from_slice(rest);
        targets
    }
}

fn is_attached_global_value(token: &str) -> bool {
    token.split_once('=').is_some_and(|(name, _)| {
        name.starts_with("--") && GLOBAL_OPTIONS_WITH_VALUE.contains(&name)
    })
}

/// Blocks pushes that can land on a protected branch.
#[derive(Debug, Clone)]
pub struct PushProtection {
    catalog: Catalog,
}

impl PushProtection {
    pub const ID: &'static str = "push-protection";

    #[must_use]
    pub fn new(catalog: &Catalog) -> Self {
        Self {
            catalog: catalog.clone(),
        }
    }

    fn is_protected(&self, branch: &str) -> bool {
        self.catalog.is_protected(branch)
    }

    fn check_target(&self, target: &str) -> Option<String> {
        let target = target.trim_start_matches('+');
        if let Some((_, destination)) = target.rsplit_once(':') {
            let branch = strip_refs_heads(destination);
            return self
                .is_protected(branch)
                .then(|| format!("Refspec targeting {branch} blocked. Use PR workflow."));
        }

        let branch = strip_refs_heads(target);
        self.is_protected(branch).then(|| {
            format!(
                "Direct push to {branch} blocked. Use PR workflow:\n  \
                 git push origin <feature-branch>\n  gh pr create"
            )
        })
    }
}

impl Rule for PushProtection {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn description(&self) -> &'static str {
        "Blocks pushes to protected branches, push-all flags, and bare pushes from a protected branch"
    }

    fn check(&self, sub: &SubCommand<'_>, branch: &dyn BranchLookup) -> Verdict {
        let Some(push) = sub.push() else {
            return Verdict::Allow;
        };

        if let Some(flag) = push
            .args()
            .iter()
            .find_map(|arg| self.catalog.push_all_flag(arg))
        {
            return Verdict::block(format!(
                "{flag} can update protected branches. Use PR workflow:\n  \
                 git push origin <feature-branch>\n  gh pr create"
            ));
        }

        let targets = push.targets(|b| self.is_protected(b));
        if let Some(reason) = targets.iter().find_map(|t| self.check_target(t)) {
            return Verdict::block(reason);
        }

        if targets.is_empty() {
            if let Some(current) = branch.current_branch() {
                if self.is_protected(&current) {
                    return Verdict::block(format!(
                        "On {current}. Direct push blocked.\n\
                         Switch to feature branch:\n  \
                         git checkout -b <feature>\n  \
                         git push -u origin <feature>"
                    ));
                }
            }
        }

        Verdict::Allow
    }
}
