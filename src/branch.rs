//! Current-branch lookup.
//!
//! Rules that need repository state (only the bare-push case today) receive a
//! [`BranchLookup`] rather than calling git themselves. Production code uses
//! [`GitBranchLookup`]; tests substitute [`FixedBranch`] or a closure.
//!
//! A lookup never fails from the caller's point of view: every problem (git
//! missing, not a repository, detached HEAD, timeout) collapses to `None`,
//! which rules treat as "branch unknown".

use std::cell::OnceCell;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

/// Default upper bound on how long a git lookup may take.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// How often a running git child is polled for completion.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Capability that reports the currently checked-out branch.
pub trait BranchLookup {
    /// The current branch name, or `None` when it cannot be determined.
    fn current_branch(&self) -> Option<String>;
}

impl<F> BranchLookup for F
where
    F: Fn() -> Option<String>,
{
    fn current_branch(&self) -> Option<String> {
        self()
    }
}

/// Why a git lookup produced no branch.
#[derive(Debug, Error)]
pub enum BranchLookupError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed waiting for git: {0}")]
    Wait(#[source] std::io::Error),
    #[error("git did not finish within {0:?}")]
    Timeout(Duration),
    #[error("git exited with {0}")]
    Failed(ExitStatus),
    #[error("no branch checked out")]
    Detached,
}

/// Looks up the branch with `git branch --show-current`, bounded by a timeout.
#[derive(Debug, Clone)]
pub struct GitBranchLookup {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    timeout: Duration,
}

impl Default for GitBranchLookup {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
            args: vec!["branch".to_string(), "--show-current".to_string()],
            cwd: None,
            timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }
}

impl GitBranchLookup {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run git in `cwd` instead of the process working directory.
    #[must_use]
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replace the git binary (e.g. an absolute path).
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    #[cfg(test)]
    fn with_args(mut self, args: &[&str]) -> Self {
        self.args = args.iter().map(|a| (*a).to_string()).collect();
        self
    }

    /// Run the lookup, reporting why it failed.
    ///
    /// # Errors
    ///
    /// Returns a [`BranchLookupError`] when git cannot be started, does not
    /// finish within the timeout, exits unsuccessfully, or prints no branch.
    pub fn lookup(&self) -> Result<String, BranchLookupError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|source| BranchLookupError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait().map_err(BranchLookupError::Wait)? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(BranchLookupError::Timeout(self.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        };

        if !status.success() {
            return Err(BranchLookupError::Failed(status));
        }

        let mut stdout = String::new();
        if let Some(mut pipe) = child.stdout.take() {
            pipe.read_to_string(&mut stdout)
                .map_err(BranchLookupError::Wait)?;
        }

        let branch = stdout.trim();
        if branch.is_empty() {
            return Err(BranchLookupError::Detached);
        }
        Ok(branch.to_string())
    }
}

impl BranchLookup for GitBranchLookup {
    fn current_branch(&self) -> Option<String> {
        match self.lookup() {
            Ok(branch) => {
                debug!(branch = %branch, "current branch resolved");
                Some(branch)
            }
            Err(err) => {
                debug!(error = %err, "current branch unknown");
                None
            }
        }
    }
}

/// A lookup that always reports the same answer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixedBranch(Option<String>);

impl FixedBranch {
    #[must_use]
    pub fn new(branch: impl Into<String>) -> Self {
        Self(Some(branch.into()))
    }

    /// A lookup that never knows the branch.
    #[must_use]
    pub const fn unknown() -> Self {
        Self(None)
    }
}

impl BranchLookup for FixedBranch {
    fn current_branch(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Wraps a lookup so it runs at most once; later calls reuse the first answer.
///
/// One of these is created per evaluation, so repository state is never
/// cached across evaluations.
pub struct MemoizedLookup<'a> {
    inner: &'a dyn BranchLookup,
    answer: OnceCell<Option<String>>,
}

impl<'a> MemoizedLookup<'a> {
    #[must_use]
    pub fn new(inner: &'a dyn BranchLookup) -> Self {
        Self {
            inner,
            answer: OnceCell::new(),
        }
    }

    /// Whether the wrapped lookup has been consulted.
    #[must_use]
    pub fn was_consulted(&self) -> bool {
        self.answer.get().is_some()
    }
}

impl BranchLookup for MemoizedLookup<'_> {
    fn current_branch(&self) -> Option<String> {
        self.answer
            .get_or_init(|| self.inner.current_branch())
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn fixed_branch_reports_value() {
        assert_eq!(FixedBranch::new("main").current_branch().as_deref(), Some("main"));
        assert_eq!(FixedBranch::unknown().current_branch(), None);
    }

    #[test]
    fn closures_are_lookups() {
        let lookup = || Some("feature".to_string());
        assert_eq!(lookup.current_branch().as_deref(), Some("feature"));
    }

    #[test]
    fn memoized_lookup_runs_once() {
        let calls = Cell::new(0);
        let counting = || {
            calls.set(calls.get() + 1);
            Some("main".to_string())
        };
        let memo = MemoizedLookup::new(&counting);
        assert!(!memo.was_consulted());

        assert_eq!(memo.current_branch().as_deref(), Some("main"));
        assert_eq!(memo.current_branch().as_deref(), Some("main"));
        assert!(memo.was_consulted());
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn memoized_lookup_caches_unknown_too() {
        let calls = Cell::new(0);
        let failing = || {
            calls.set(calls.get() + 1);
            None::<String>
        };
        let memo = MemoizedLookup::new(&failing);
        assert_eq!(memo.current_branch(), None);
        assert_eq!(memo.current_branch(), None);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn missing_binary_is_unknown() {
        let lookup = GitBranchLookup::new().with_program("git-guard-no-such-binary");
        assert!(matches!(
            lookup.lookup(),
            Err(BranchLookupError::Spawn { .. })
        ));
        assert_eq!(lookup.current_branch(), None);
    }

    #[test]
    fn outside_a_repository_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let lookup = GitBranchLookup::new().with_cwd(dir.path());
        // Either git is absent (spawn error) or it fails outside a repo.
        assert_eq!(lookup.current_branch(), None);
    }

    #[cfg(unix)]
    #[test]
    fn slow_lookup_times_out() {
        let lookup = GitBranchLookup::new()
            .with_program("sh")
            .with_args(&["-c", "sleep 5"])
            .with_timeout(Duration::from_millis(50));

        let started = Instant::now();
        assert!(matches!(lookup.lookup(), Err(BranchLookupError::Timeout(_))));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[cfg(unix)]
    #[test]
    fn empty_output_is_detached() {
        let lookup = GitBranchLookup::new()
            .with_program("sh")
            .with_args(&["-c", "printf ''"]);
        assert!(matches!(lookup.lookup(), Err(BranchLookupError::Detached)));
    }

    #[cfg(unix)]
    #[test]
    fn output_is_trimmed() {
        let lookup = GitBranchLookup::new()
            .with_program("sh")
            .with_args(&["-c", "echo '  main  '"]);
        assert_eq!(lookup.lookup().unwrap(), "main");
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_failure() {
        let lookup = GitBranchLookup::new()
            .with_program("sh")
            .with_args(&["-c", "exit 3"]);
        assert!(matches!(lookup.lookup(), Err(BranchLookupError::Failed(_))));
    }
}
