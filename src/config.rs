//! Configuration system for git-guard.
//!
//! Supports layered configuration from multiple sources:
//! 1. Environment variables (highest priority)
//! 2. Project config (`.git-guard.toml`, searched upward to the repo root)
//! 3. User config (`~/.config/git-guard/config.toml`)
//! 4. System config (`/etc/git-guard/config.toml`)
//! 5. Compiled defaults (lowest priority)
//!
//! `GIT_GUARD_CONFIG` names a single file that replaces layers 2-4.
//!
//! Loading never fails: unreadable or invalid files are skipped with a
//! warning and the remaining layers still apply.

use crate::branch::DEFAULT_LOOKUP_TIMEOUT;
use crate::catalog::{Catalog, CatalogEntry};
use crate::logging::LoggingConfig;
use crate::rules::Classifier;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Environment variable prefix for all config options.
pub const ENV_PREFIX: &str = "GIT_GUARD";

/// Directory name under the system and user config roots.
const APP_DIR: &str = "git-guard";

/// Default config file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Project-level config file name.
pub const PROJECT_CONFIG_NAME: &str = ".git-guard.toml";

/// Default cap on hook input size.
pub const DEFAULT_MAX_HOOK_INPUT_BYTES: usize = 256 * 1024;

/// Default text appended to every denial.
pub const DEFAULT_ESCALATION_HINT: &str = "If truly needed, ask your coordinator.";

/// Errors from reading or writing configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid TOML in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} already exists (use --force to overwrite)")]
    Exists(PathBuf),
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub general: GeneralConfig,
    pub catalog: CatalogConfig,
    pub rules: RulesConfig,
    pub logging: LoggingConfig,
}

/// When to colorize stderr output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "always" => Some(Self::Always),
            "never" => Some(Self::Never),
            _ => None,
        }
    }
}

/// `[general]` settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    pub color: ColorMode,
    pub verbose: bool,
    /// Hook input larger than this is ignored.
    pub max_hook_input_bytes: usize,
    pub branch_lookup_timeout_ms: u64,
    /// Appended to the denial message shown to the agent.
    pub escalation_hint: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            color: ColorMode::Auto,
            verbose: false,
            max_hook_input_bytes: DEFAULT_MAX_HOOK_INPUT_BYTES,
            branch_lookup_timeout_ms: u64::try_from(DEFAULT_LOOKUP_TIMEOUT.as_millis())
                .unwrap_or(u64::MAX),
            escalation_hint: DEFAULT_ESCALATION_HINT.to_string(),
        }
    }
}

impl GeneralConfig {
    #[must_use]
    pub const fn branch_lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.branch_lookup_timeout_ms)
    }
}

/// `[catalog]` additions. Everything listed here is appended to the
/// built-in catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub protected_branches: Vec<String>,
    pub mask_quoted_literals: bool,
    pub destructive: Vec<CatalogEntry>,
    pub dangerous_flags: Vec<CatalogEntry>,
    /// Full replacement for the protected set, from the environment.
    #[serde(skip)]
    pub protected_branches_override: Option<Vec<String>>,
}

/// `[rules]` settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Rule ids to leave out of the pipeline.
    pub disabled: Vec<String>,
}

impl Config {
    /// Load configuration from all sources, merging them in priority order.
    ///
    /// `cwd` is where the project config search starts; `None` uses the
    /// process working directory.
    #[must_use]
    pub fn load(cwd: Option<&Path>) -> Self {
        let env = |key: &str| std::env::var(key).ok();
        let start = cwd
            .map(Path::to_path_buf)
            .or_else(|| std::env::current_dir().ok());
        let layers = Self::file_layers(start.as_deref(), &env);
        Self::load_layers(&layers, &env)
    }

    /// Config files to read, lowest priority first.
    #[must_use]
    pub fn file_layers(
        start: Option<&Path>,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Vec<PathBuf> {
        if let Some(explicit) = env(&format!("{ENV_PREFIX}_CONFIG")).filter(|p| !p.is_empty()) {
            return vec![PathBuf::from(explicit)];
        }

        let mut layers = vec![Self::system_config_path()];
        layers.extend(Self::user_config_path());
        layers.extend(start.and_then(find_project_config));
        layers
    }

    /// Merge the given files over the defaults, then apply environment
    /// overrides. Missing files are skipped silently, broken ones with a
    /// warning.
    #[must_use]
    pub fn load_layers(layers: &[PathBuf], env: &dyn Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        for path in layers {
            if !path.is_file() {
                continue;
            }
            match Self::load_from_file(path) {
                Ok(layer) => {
                    debug!(path = %path.display(), "loaded config layer");
                    config.merge(layer);
                }
                Err(err) => warn!(error = %err, "skipping config file"),
            }
        }
        config.apply_env_overrides(env);
        config
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid configuration TOML.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    #[must_use]
    pub fn system_config_path() -> PathBuf {
        PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILE_NAME)
    }

    #[must_use]
    pub fn user_config_path() -> Option<PathBuf> {
        Some(dirs::config_dir()?.join(APP_DIR).join(CONFIG_FILE_NAME))
    }

    /// Merge another config into this one (other takes priority).
    fn merge(&mut self, other: Self) {
        let defaults = GeneralConfig::default();
        let general = other.general;
        if general.color != defaults.color {
            self.general.color = general.color;
        }
        if general.verbose {
            self.general.verbose = true;
        }
        if general.max_hook_input_bytes != defaults.max_hook_input_bytes {
            self.general.max_hook_input_bytes = general.max_hook_input_bytes;
        }
        if general.branch_lookup_timeout_ms != defaults.branch_lookup_timeout_ms {
            self.general.branch_lookup_timeout_ms = general.branch_lookup_timeout_ms;
        }
        if general.escalation_hint != defaults.escalation_hint {
            self.general.escalation_hint = general.escalation_hint;
        }

        // Catalog additions append.
        let catalog = other.catalog;
        self.catalog.protected_branches.extend(catalog.protected_branches);
        self.catalog.destructive.extend(catalog.destructive);
        self.catalog.dangerous_flags.extend(catalog.dangerous_flags);
        self.catalog.mask_quoted_literals |= catalog.mask_quoted_literals;

        self.rules.disabled.extend(other.rules.disabled);

        let logging = other.logging;
        let log_defaults = LoggingConfig::default();
        if logging.enabled {
            self.logging.enabled = true;
        }
        if logging.file.is_some() {
            self.logging.file = logging.file;
        }
        if logging.format != log_defaults.format {
            self.logging.format = logging.format;
        }
        if logging.events != log_defaults.events {
            self.logging.events = logging.events;
        }
        if logging.redaction != log_defaults.redaction {
            self.logging.redaction = logging.redaction;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self, env: &dyn Fn(&str) -> Option<String>) {
        let var = |name: &str| env(&format!("{ENV_PREFIX}_{name}"));

        // GIT_GUARD_PROTECTED_BRANCHES="main,release"
        if let Some(branches) = var("PROTECTED_BRANCHES") {
            self.catalog.protected_branches_override = Some(split_list(&branches));
        }

        // GIT_GUARD_DISABLE="clean,dangerous-flag"
        if let Some(disabled) = var("DISABLE") {
            self.rules.disabled = split_list(&disabled);
        }

        if var("VERBOSE").is_some() {
            self.general.verbose = true;
        }

        if let Some(color) = var("COLOR") {
            match ColorMode::parse(&color) {
                Some(mode) => self.general.color = mode,
                None => warn!(value = %color, "ignoring invalid {ENV_PREFIX}_COLOR"),
            }
        }

        // Naming a log file turns the decision log on.
        if let Some(file) = var("LOG_FILE").filter(|f| !f.is_empty()) {
            self.logging.enabled = true;
            self.logging.file = Some(file);
        }

        if let Some(ms) = var("BRANCH_TIMEOUT_MS") {
            match ms.trim().parse() {
                Ok(ms) => self.general.branch_lookup_timeout_ms = ms,
                Err(_) => warn!(value = %ms, "ignoring invalid {ENV_PREFIX}_BRANCH_TIMEOUT_MS"),
            }
        }
    }

    /// Check if the bypass flag is set (escape hatch).
    #[must_use]
    pub fn is_bypassed() -> bool {
        std::env::var_os(format!("{ENV_PREFIX}_BYPASS")).is_some()
    }

    /// The effective catalog: built-in entries plus configured additions.
    #[must_use]
    pub fn catalog(&self) -> Catalog {
        let mut catalog = Catalog::default();
        catalog.extend(Catalog {
            protected_branches: self.catalog.protected_branches.clone(),
            safe_force_flags: Vec::new(),
            push_all_flags: Vec::new(),
            mask_quoted_literals: self.catalog.mask_quoted_literals,
            destructive: self.catalog.destructive.clone(),
            dangerous_flags: self.catalog.dangerous_flags.clone(),
        });
        if let Some(branches) = &self.catalog.protected_branches_override {
            catalog.protected_branches.clone_from(branches);
        }
        catalog
    }

    /// The rule pipeline this configuration describes.
    #[must_use]
    pub fn classifier(&self) -> Classifier {
        Classifier::with_disabled(&self.catalog(), &self.rules.disabled)
    }

    /// Render the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write the commented sample configuration to `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Exists`] if `path` exists and `force` is false,
    /// or [`ConfigError::Write`] if the file or its parent directory cannot
    /// be written.
    pub fn write_sample(path: &Path, force: bool) -> Result<(), ConfigError> {
        if path.exists() && !force {
            return Err(ConfigError::Exists(path.to_path_buf()));
        }
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, Self::generate_sample_config()).map_err(write_err)
    }

    /// Generate a sample configuration string with comments.
    #[must_use]
    pub fn generate_sample_config() -> String {
        r#"# git-guard configuration
#
# Files are merged in order: /etc/git-guard/config.toml,
# ~/.config/git-guard/config.toml, then .git-guard.toml in the repository.
# Lists append to the built-in defaults.

[general]
# Color output on stderr: "auto" | "always" | "never"
color = "auto"

# Print diagnostics to stderr (same as GIT_GUARD_VERBOSE=1)
verbose = false

# Hook input larger than this is ignored
max_hook_input_bytes = 262144

# Upper bound for `git branch --show-current`
branch_lookup_timeout_ms = 5000

# Appended to every denial message
escalation_hint = "If truly needed, ask your coordinator."

#─────────────────────────────────────────────────────────────
# CATALOG
#─────────────────────────────────────────────────────────────

[catalog]
# Extra protected branches (main and master are always protected)
protected_branches = [
    # "release",
    # "production",
]

# Ignore destructive phrases that only appear inside quoted strings,
# e.g. in a commit message
mask_quoted_literals = false

# Extra phrases blocked anywhere in a command
destructive = [
    # { pattern = "git branch -D", reason = "Force-deletes a branch." },
]

# Extra flags blocked when used as a standalone word
dangerous_flags = [
    # { pattern = "--no-gpg-sign", reason = "Commits must be signed." },
]

#─────────────────────────────────────────────────────────────
# RULES
#─────────────────────────────────────────────────────────────

[rules]
# Available: push-protection, force-push, history-rewrite, clean,
#            destructive-command, dangerous-flag
disabled = []

#─────────────────────────────────────────────────────────────
# DECISION LOG
#─────────────────────────────────────────────────────────────

[logging]
enabled = false
# file = "~/.local/share/git-guard/decisions.log"
format = "text"          # "text" | "json"

[logging.events]
deny = true
allow = false

[logging.redaction]
enabled = false
mode = "arguments"       # "none" | "arguments" | "full"
max_argument_len = 50
"#
        .to_string()
    }
}

/// Find `.git-guard.toml` in `start` or its parents, stopping at the
/// repository root.
fn find_project_config(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        let candidate = current.join(PROJECT_CONFIG_NAME);
        if candidate.is_file() {
            return Some(candidate);
        }
        if current.join(".git").exists() || !current.pop() {
            return None;
        }
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
