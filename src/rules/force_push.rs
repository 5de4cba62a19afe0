//! Force-push protection.

use super::{Rule, SubCommand, Verdict};
use crate::branch::BranchLookup;
use crate::catalog::Catalog;
use crate::normalize::short_bundle_contains;

const FORCE_REFSPEC_REASON: &str =
    "Force refspec (+) overwrites remote history. Use '--force-with-lease' instead.";
const FORCE_FLAG_REASON: &str = "Overwrites remote history. Use '--force-with-lease' instead.";

/// Blocks force pushes. A lease-style safe flag excuses `--force`/`-f`, never
/// a `+` refspec.
#[derive(Debug, Clone)]
pub struct ForcePushProtection {
    catalog: Catalog,
}

impl ForcePushProtection {
    pub const ID: &'static str = "force-push";

    #[must_use]
    pub fn new(catalog: &Catalog) -> Self {
        Self {
            catalog: catalog.clone(),
        }
    }
}

fn is_force_flag(arg: &str) -> bool {
    arg == "--force" || short_bundle_contains(arg, 'f')
}

impl Rule for ForcePushProtection {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn description(&self) -> &'static str {
        "Blocks +refspec pushes, and --force/-f pushes unless --force-with-lease or --force-if-includes is used"
    }

    fn check(&self, sub: &SubCommand<'_>, _branch: &dyn BranchLookup) -> Verdict {
        let Some(push) = sub.push() else {
            return Verdict::Allow;
        };

        let targets = push.targets(|b| self.catalog.is_protected(b));
        if targets.iter().any(|t| t.starts_with('+')) {
            return Verdict::block(FORCE_REFSPEC_REASON);
        }

        let args = push.args();
        if args.iter().any(|arg| self.catalog.is_safe_force_flag(arg)) {
            return Verdict::Allow;
        }

        if args.iter().any(|arg| is_force_flag(arg)) {
            return Verdict::block(FORCE_FLAG_REASON);
        }

        Verdict::Allow
    }
}
