use crate::command_line::{MIN_COMMAND_LINE_CAPACITY, QuotingPolicy};
use crate::error::{RelaunchError, Result};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_TIMEOUT_SECS: &str = "LUACONFIG_TIMEOUT_SECS";
pub const ENV_MAX_COMMAND_LINE: &str = "LUACONFIG_MAX_COMMAND_LINE";
pub const ENV_STRICT_QUOTING: &str = "LUACONFIG_STRICT_QUOTING";

/// Everything the relauncher needs to know about where the CLI lives and how to call it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[serde(rename_all = "camelCase")]
#[builder(setter(into), build_fn(validate = "Self::validate_builder"))]
pub struct RelauncherConfig {
    /// Directory the relative paths are resolved against. `None` means the
    /// directory of the running executable.
    #[serde(default)]
    #[builder(default, setter(into, strip_option))]
    pub base_dir: Option<PathBuf>,

    /// Location of the LuaEnv CLI relative to the base directory
    #[serde(default = "default_cli_relative_path")]
    #[builder(default = "default_cli_relative_path()")]
    pub cli_relative_path: PathBuf,

    /// Location of the backend configuration relative to the base directory
    #[serde(default = "default_config_relative_path")]
    #[builder(default = "default_config_relative_path()")]
    pub config_relative_path: PathBuf,

    /// CLI subcommand placed after `--config <path>`
    #[serde(default = "default_subcommand")]
    #[builder(default = "default_subcommand()")]
    pub subcommand: String,

    /// Seconds to wait for the child before killing it. `None` waits forever.
    #[serde(default = "default_timeout_secs")]
    #[builder(default = "default_timeout_secs()", setter(custom))]
    pub timeout_secs: Option<u64>,

    /// Upper bound on the assembled command line, in characters
    #[serde(default = "default_max_command_line_len")]
    #[builder(default = "default_max_command_line_len()")]
    pub max_command_line_len: usize,

    /// Upper bound on each resolved path, in bytes
    #[serde(default = "default_max_path_len")]
    #[builder(default = "default_max_path_len()")]
    pub max_path_len: usize,

    #[serde(default)]
    #[builder(default)]
    pub quoting: QuotingPolicy,

    /// Refuse resolved paths that contain a `..` segment
    #[serde(default = "default_reject_traversal")]
    #[builder(default = "default_reject_traversal()")]
    pub reject_traversal: bool,
}

impl Default for RelauncherConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            cli_relative_path: default_cli_relative_path(),
            config_relative_path: default_config_relative_path(),
            subcommand: default_subcommand(),
            timeout_secs: default_timeout_secs(),
            max_command_line_len: default_max_command_line_len(),
            max_path_len: default_max_path_len(),
            quoting: QuotingPolicy::default(),
            reject_traversal: default_reject_traversal(),
        }
    }
}

impl RelauncherConfig {
    pub fn builder() -> RelauncherConfigBuilder {
        RelauncherConfigBuilder::default()
    }

    /// Defaults overlaid with `LUACONFIG_*` variables from the process environment
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides looked up by variable name. Unset variables leave the field alone.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            let secs: u64 = parse_env(ENV_TIMEOUT_SECS, &raw)?;
            self.timeout_secs = (secs > 0).then_some(secs);
        }

        if let Some(raw) = lookup(ENV_MAX_COMMAND_LINE) {
            self.max_command_line_len = parse_env(ENV_MAX_COMMAND_LINE, &raw)?;
        }

        if let Some(raw) = lookup(ENV_STRICT_QUOTING) {
            self.quoting = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => QuotingPolicy::Strict,
                "0" | "false" | "no" | "off" | "" => QuotingPolicy::Standard,
                other => {
                    return Err(RelaunchError::Configuration(format!(
                        "{ENV_STRICT_QUOTING} must be a boolean, got {other:?}"
                    )));
                }
            };
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_command_line_len < MIN_COMMAND_LINE_CAPACITY {
            return Err(RelaunchError::Configuration(format!(
                "max_command_line_len must be at least {MIN_COMMAND_LINE_CAPACITY}, got {}",
                self.max_command_line_len
            )));
        }

        if self.timeout_secs == Some(0) {
            return Err(RelaunchError::Configuration(
                "timeout_secs must be positive; use None to wait indefinitely".to_string(),
            ));
        }

        if self.max_path_len == 0 {
            return Err(RelaunchError::Configuration(
                "max_path_len must be positive".to_string(),
            ));
        }

        if self.subcommand.is_empty() {
            return Err(RelaunchError::Configuration(
                "subcommand must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl RelauncherConfigBuilder {
    pub fn timeout_secs(&mut self, secs: u64) -> &mut Self {
        self.timeout_secs = Some(Some(secs));
        self
    }

    pub fn wait_indefinitely(&mut self) -> &mut Self {
        self.timeout_secs = Some(None);
        self
    }

    fn validate_builder(&self) -> std::result::Result<(), String> {
        if let Some(len) = self.max_command_line_len {
            if len < MIN_COMMAND_LINE_CAPACITY {
                return Err(format!(
                    "max_command_line_len must be at least {MIN_COMMAND_LINE_CAPACITY}"
                ));
            }
        }
        if let Some(Some(0)) = self.timeout_secs {
            return Err("timeout_secs must be positive".to_string());
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e| {
        RelaunchError::Configuration(format!("{name} has invalid value {raw:?}: {e}"))
    })
}

// Default value functions for serde
fn default_cli_relative_path() -> PathBuf {
    PathBuf::from("cli").join(format!("LuaEnv.CLI{}", std::env::consts::EXE_SUFFIX))
}
fn default_config_relative_path() -> PathBuf {
    PathBuf::from("backend.config")
}
fn default_subcommand() -> String {
    "pkg-config".to_string()
}
fn default_timeout_secs() -> Option<u64> {
    Some(20)
}
fn default_max_command_line_len() -> usize {
    4096
}
fn default_max_path_len() -> usize {
    if cfg!(windows) { 260 } else { 4096 }
}
fn default_reject_traversal() -> bool {
    true
}
