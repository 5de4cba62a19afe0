#![forbid(unsafe_code)]
//! git-guard for Claude Code.
//!
//! Blocks git commands that rewrite history, mutate protected remote branches
//! or throw away uncommitted work. This hook runs before Bash commands execute
//! and can deny dangerous operations.
//!
//! Exit behavior:
//!   - Exit 0 with JSON {"hookSpecificOutput": {"permissionDecision": "deny", ...}} = block
//!   - Exit 0 with no output = allow
//!
//! Every failure on the hook path (unreadable stdin, bad JSON, broken config)
//! allows the command.

use clap::Parser;
use clap::error::ErrorKind;
use colored::Colorize;
use git_guard::branch::GitBranchLookup;
use git_guard::cli::{self, Blocked, Cli};
use git_guard::config::Config;
use git_guard::evaluator::evaluate_command;
use git_guard::hook::{self, HookReadError};
use git_guard::logging::{DecisionLogger, init_tracing};
use tracing::{debug, warn};

// Build metadata from vergen (set by build.rs)
const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");
const BUILD_TIMESTAMP: Option<&str> = option_env!("VERGEN_BUILD_TIMESTAMP");
const RUSTC_SEMVER: Option<&str> = option_env!("VERGEN_RUSTC_SEMVER");
const CARGO_TARGET: Option<&str> = option_env!("VERGEN_CARGO_TARGET_TRIPLE");

/// Print version information.
fn print_version() {
    println!("git-guard {PKG_VERSION}");
    if let Some(ts) = BUILD_TIMESTAMP {
        let date = ts.split('T').next().unwrap_or(ts);
        println!("{} {date}", "built:".bright_black());
    }
    if let Some(rustc) = RUSTC_SEMVER {
        println!("{} {rustc}", "rustc:".bright_black());
    }
    if let Some(target) = CARGO_TARGET {
        println!("{} {target}", "target:".bright_black());
    }
}

fn main() {
    // Parse errors exit instead of falling into hook mode and blocking on stdin.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if e.kind() == ErrorKind::DisplayVersion => {
            print_version();
            return;
        }
        Err(e) => e.exit(),
    };

    if cli.command.is_some() {
        let verbose = std::env::var_os("GIT_GUARD_VERBOSE").is_some();
        init_tracing(verbose);
        if let Err(e) = cli::run_command(cli) {
            if !e.is::<Blocked>() {
                eprintln!("Error: {e}");
            }
            std::process::exit(1);
        }
        return;
    }

    run_hook();
}

/// Hook mode: read one request from stdin, answer with a denial or nothing.
fn run_hook() {
    // Escape hatch, checked before anything touches the filesystem.
    if Config::is_bypassed() {
        return;
    }

    // The cwd only arrives with the request, so the input size limit comes
    // from the process-directory config.
    let base = Config::load(None);
    init_tracing(base.general.verbose);

    let input = match hook::read_hook_input(base.general.max_hook_input_bytes) {
        Ok(input) => input,
        Err(err @ HookReadError::InputTooLarge { .. }) => {
            warn!(error = %err, "allowing command (fail-open)");
            return;
        }
        Err(err) => {
            debug!(error = %err, "unreadable hook input, allowing");
            return;
        }
    };

    let Some(command) = hook::extract_command(&input) else {
        return;
    };

    let config = match input.cwd.as_deref() {
        Some(cwd) => Config::load(Some(cwd)),
        None => base,
    };
    hook::configure_colors(config.general.color);

    let mut lookup =
        GitBranchLookup::new().with_timeout(config.general.branch_lookup_timeout());
    if let Some(cwd) = &input.cwd {
        lookup = lookup.with_cwd(cwd);
    }

    let result = evaluate_command(command, &config.classifier(), &lookup);

    if let Some(logger) = DecisionLogger::new(&config.logging) {
        logger.log(&result, command);
    }

    if let Some(reason) = result.reason() {
        hook::output_denial(
            command,
            reason,
            result.rule_id,
            &config.general.escalation_hint,
        );
    }
}
