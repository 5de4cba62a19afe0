//! CLI argument parsing and command handling.
//!
//! This module provides the command-line interface for git-guard, including
//! subcommands for trying the classifier by hand and managing configuration.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;

use crate::branch::{BranchLookup, FixedBranch, GitBranchLookup};
use crate::config::Config;
use crate::decompose::decompose;
use crate::evaluator::{EvaluationResult, evaluate_command};

/// Claude Code hook that blocks history-rewriting and remote-mutating git commands.
///
/// With no subcommand, git-guard reads a `PreToolUse` hook request from stdin
/// and denies commands that push to protected branches, force-push, rebase,
/// clean the worktree or match the destructive catalog.
#[derive(Parser, Debug)]
#[command(name = "git-guard")]
#[command(version, about, long_about = None)]
#[command(after_help = "Run 'git-guard test \"<command>\"' to see how a command is classified.")]
pub struct Cli {
    /// Subcommand to run (omit to run in hook mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate a command and print the verdict (exit 1 when blocked)
    #[command(name = "test")]
    Test {
        /// Command to evaluate
        command: String,

        /// Pretend the current branch is NAME instead of asking git
        #[arg(long, value_name = "NAME")]
        branch: Option<String>,

        /// Output format
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Pretty)]
        format: OutputFormat,
    },

    /// Print the sub-commands a command decomposes into
    #[command(name = "split")]
    Split {
        /// Command to decompose
        command: String,
    },

    /// List the rule pipeline in evaluation order and the active catalog
    #[command(name = "rules")]
    Rules,

    /// Generate a sample configuration file
    #[command(name = "init")]
    Init {
        /// Write to PATH instead of stdout
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Print the effective configuration
    #[command(name = "config")]
    ShowConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Pretty,
    Json,
}

/// Error returned when `git-guard test` classifies a command as blocked.
///
/// `main` maps it to exit status 1 without printing an error line.
#[derive(Debug, thiserror::Error)]
#[error("command blocked")]
pub struct Blocked;

/// Run a CLI subcommand.
///
/// # Errors
///
/// Returns [`Blocked`] when `test` blocks its command, or any I/O,
/// configuration or serialization error raised by the subcommand.
pub fn run_command(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load(None);

    match cli.command {
        Some(Command::Test {
            command,
            branch,
            format,
        }) => {
            let result = test_command(&config, &command, branch, format)?;
            if result.is_blocked() {
                return Err(Blocked.into());
            }
        }
        Some(Command::Split { command }) => split_command(&command),
        Some(Command::Rules) => list_rules(&config),
        Some(Command::Init { output, force }) => init_config(output, force)?,
        Some(Command::ShowConfig) => show_config(&config)?,
        None => {
            // Hook mode is handled by main.rs
            return Err("No subcommand provided. Running in hook mode.".into());
        }
    }

    Ok(())
}

fn test_command(
    config: &Config,
    command: &str,
    branch: Option<String>,
    format: OutputFormat,
) -> Result<EvaluationResult, Box<dyn std::error::Error>> {
    let lookup: Box<dyn BranchLookup> = match branch {
        Some(name) => Box::new(FixedBranch::new(name)),
        None => Box::new(
            GitBranchLookup::new().with_timeout(config.general.branch_lookup_timeout()),
        ),
    };

    let result = evaluate_command(command, &config.classifier(), lookup.as_ref());

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "command": command,
                "decision": if result.is_blocked() { "deny" } else { "allow" },
                "rule_id": result.rule_id,
                "sub_command": result.sub_command,
                "reason": result.reason(),
                "branch_lookup_used": result.branch_lookup_used,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Pretty => print_result(command, &result),
    }

    Ok(result)
}

fn print_result(command: &str, result: &EvaluationResult) {
    println!("Command: {command}");
    println!();

    let Some(reason) = result.reason() else {
        println!("Result: {}", "ALLOWED".green().bold());
        return;
    };

    println!("Result: {}", "BLOCKED".red().bold());
    if let Some(rule) = result.rule_id {
        println!("Rule: {rule}");
    }
    if let Some(sub) = &result.sub_command {
        if sub != command {
            println!("Sub-command: {sub}");
        }
    }
    println!("Reason:");
    for line in reason.lines() {
        println!("  {line}");
    }
}

fn split_command(command: &str) {
    for (i, sub) in decompose(command).iter().enumerate() {
        println!("{:>3}  {sub}", i + 1);
    }
}

fn list_rules(config: &Config) {
    let classifier = config.classifier();
    let catalog = config.catalog();

    println!("Rule pipeline (first block wins):");
    for (i, rule) in classifier.rules().enumerate() {
        println!(
            "  {}. {:<20} {}",
            i + 1,
            rule.id().cyan(),
            rule.description()
        );
    }
    if !config.rules.disabled.is_empty() {
        println!("  disabled: {}", config.rules.disabled.join(", "));
    }

    println!();
    println!("Protected branches: {}", catalog.protected_branches.join(", "));
    println!("Safe force flags: {}", catalog.safe_force_flags.join(", "));
    println!("Push-all flags: {}", catalog.push_all_flags.join(", "));
    println!("Mask quoted literals: {}", catalog.mask_quoted_literals);

    println!();
    println!("Destructive phrases:");
    for entry in &catalog.destructive {
        println!("  {:<22} {}", entry.pattern.yellow(), first_line(&entry.reason));
    }

    println!();
    println!("Dangerous flags:");
    for entry in &catalog.dangerous_flags {
        println!("  {:<22} {}", entry.pattern.yellow(), first_line(&entry.reason));
    }
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or_default()
}

/// Generate a sample configuration file
fn init_config(output: Option<PathBuf>, force: bool) -> Result<(), Box<dyn std::error::Error>> {
    match output {
        Some(path) => {
            Config::write_sample(&path, force)?;
            println!("Configuration written to: {}", path.display());
        }
        None => println!("{}", Config::generate_sample_config()),
    }
    Ok(())
}

/// Show the current configuration
fn show_config(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let env = |key: &str| std::env::var(key).ok();
    let cwd = std::env::current_dir().ok();

    println!("# Config sources (lowest → highest priority):");
    for path in Config::file_layers(cwd.as_deref(), &env) {
        let state = if path.is_file() { "" } else { " (missing)" };
        println!("#   {}{state}", path.display());
    }
    println!();
    print!("{}", config.to_toml()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_is_hook_mode() {
        let cli = Cli::try_parse_from(["git-guard"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_parse_test_subcommand() {
        let cli =
            Cli::try_parse_from(["git-guard", "test", "git push", "--branch", "main", "-f", "json"])
                .unwrap();
        match cli.command {
            Some(Command::Test {
                command,
                branch,
                format,
            }) => {
                assert_eq!(command, "git push");
                assert_eq!(branch.as_deref(), Some("main"));
                assert_eq!(format, OutputFormat::Json);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_test_defaults_to_pretty() {
        let cli = Cli::try_parse_from(["git-guard", "test", "git status"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Test {
                branch: None,
                format: OutputFormat::Pretty,
                ..
            })
        ));
    }

    #[test]
    fn test_parse_init() {
        let cli = Cli::try_parse_from(["git-guard", "init", "-o", "x.toml", "--force"]).unwrap();
        match cli.command {
            Some(Command::Init { output, force }) => {
                assert_eq!(output, Some(PathBuf::from("x.toml")));
                assert!(force);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_simple_subcommands() {
        assert!(matches!(
            Cli::try_parse_from(["git-guard", "rules"]).unwrap().command,
            Some(Command::Rules)
        ));
        assert!(matches!(
            Cli::try_parse_from(["git-guard", "config"]).unwrap().command,
            Some(Command::ShowConfig)
        ));
        assert!(matches!(
            Cli::try_parse_from(["git-guard", "split", "a && b"]).unwrap().command,
            Some(Command::Split { .. })
        ));
    }

    #[test]
    fn test_version_flag_is_reported_by_clap() {
        for flag in ["--version", "-V"] {
            let err = Cli::try_parse_from(["git-guard", flag]).unwrap_err();
            assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
        }
    }

    #[test]
    fn test_version_lookalike_after_subcommand_is_an_argument() {
        let cli = Cli::try_parse_from(["git-guard", "test", "--", "-V"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Test { command, .. }) if command == "-V"
        ));
    }

    #[test]
    fn test_unknown_subcommand_is_an_error() {
        assert!(Cli::try_parse_from(["git-guard", "doctor"]).is_err());
        assert!(Cli::try_parse_from(["git-guard", "test"]).is_err());
    }

    #[test]
    fn test_command_with_fixed_branch() {
        let config = Config::default();
        let blocked =
            test_command(&config, "git push", Some("main".into()), OutputFormat::Json).unwrap();
        assert!(blocked.is_blocked());
        assert_eq!(blocked.rule_id, Some("push-protection"));

        let allowed =
            test_command(&config, "git push", Some("feature".into()), OutputFormat::Pretty)
                .unwrap();
        assert!(allowed.is_allowed());
    }

    #[test]
    fn test_first_line() {
        assert_eq!(first_line("a\nb"), "a");
        assert_eq!(first_line(""), "");
    }
}
