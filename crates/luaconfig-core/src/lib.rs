//! luaconfig core - platform-independent pieces of the LuaEnv `pkg-config` relauncher
//!
//! This crate provides configuration, the error taxonomy, path resolution and
//! validation, command-line escaping, and the process traits that the
//! platform crates implement.

pub mod command_line;
pub mod config;
pub mod error;
pub mod paths;
pub mod process;
pub mod relauncher;
pub mod timing;

pub use command_line::{CommandLine, QuotingPolicy, build_command_line, split_command_line};
pub use config::{RelauncherConfig, RelauncherConfigBuilder};
pub use error::{RelaunchError, Result};
pub use paths::{ResolvedPaths, ValidatedTargets, resolve_paths, validate_targets};
pub use process::*;
pub use relauncher::{
    CommandLineBuilt, PathsResolved, ProcessLaunched, Relauncher, Start, TargetsValidated,
};
pub use timing::PhaseTimer;
