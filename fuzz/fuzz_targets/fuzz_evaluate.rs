//! Fuzz target for the main evaluator entry point.
//!
//! This fuzzes `evaluate_command` with arbitrary command strings to find:
//! - Panics from unexpected input
//! - Regex blowups on adversarial separators
//! - Verdicts that change between identical calls

#![no_main]

use libfuzzer_sys::fuzz_target;

use git_guard::branch::FixedBranch;
use git_guard::evaluator::evaluate_command;
use git_guard::rules::Classifier;
use std::sync::LazyLock;

static CLASSIFIER: LazyLock<Classifier> = LazyLock::new(Classifier::default);

fuzz_target!(|data: &[u8]| {
    let Ok(command) = std::str::from_utf8(data) else {
        return;
    };
    // Skip extremely large inputs to avoid timeout (not a real bug)
    if command.len() > 10_000 {
        return;
    }

    for branch in [FixedBranch::unknown(), FixedBranch::new("main")] {
        let first = evaluate_command(command, &CLASSIFIER, &branch);
        let second = evaluate_command(command, &CLASSIFIER, &branch);
        assert_eq!(first, second);
        assert_eq!(first.is_blocked(), first.reason().is_some());
    }
});
