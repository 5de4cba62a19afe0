#![cfg_attr(not(test), forbid(unsafe_code))]
//! git-guard library.
//!
//! Classifies shell commands issued by AI coding agents and blocks the git
//! operations that rewrite history, mutate protected remote branches or
//! discard uncommitted work.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Configuration                             │
//! │  (env vars → project config → user config → system → defaults)  │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//!                                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Decomposer                               │
//! │  (split on && || ; | newline, extract $( ) ` ` ( ) { ; })       │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │  one sub-command at a time
//!                                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Rule pipeline                             │
//! │  push → force-push → history → clean → destructive → flags      │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │  lazily, at most once
//!                                  ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Branch lookup (git, timeout)                    │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use git_guard::branch::FixedBranch;
//! use git_guard::evaluate;
//!
//! let verdict = evaluate("git status && git push origin main", &FixedBranch::unknown());
//! assert!(verdict.is_blocked());
//! assert!(verdict.reason().contains("main"));
//! ```

pub mod branch;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod decompose;
pub mod evaluator;
pub mod hook;
pub mod logging;
pub mod normalize;
pub mod rules;

// Re-export commonly used types
pub use branch::{BranchLookup, FixedBranch, GitBranchLookup};
pub use catalog::{Catalog, CatalogEntry};
pub use config::Config;
pub use decompose::decompose;
pub use evaluator::{EvaluationResult, evaluate, evaluate_command};
pub use hook::{HookInput, HookOutput, HookSpecificOutput};
pub use rules::{Classifier, Rule, Verdict};
