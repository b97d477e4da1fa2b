//! Relauncher for the LuaEnv CLI `pkg-config` command.
//!
//! `luaconfig` finds `cli/LuaEnv.CLI` and `backend.config` next to its own
//! executable, runs `LuaEnv.CLI --config <backend.config> pkg-config <args>`
//! and exits with the CLI's exit code.

mod factory;
mod logging;

pub use factory::PlatformProcessManagerFactory;
pub use logging::{ENV_LOG, init_logging};

use luaconfig_core::{
    ProcessManagerFactory, RelaunchError, Relauncher, RelauncherConfig, Result, Start,
};
use std::ffi::OsString;
use std::sync::Arc;
use tracing::debug;

/// Process manager for the platform this binary was compiled for
pub type PlatformManager = <PlatformProcessManagerFactory as ProcessManagerFactory>::Manager;

/// High-level platform-independent relauncher
pub struct LuaConfigRelauncher {
    config: RelauncherConfig,
}

impl LuaConfigRelauncher {
    pub fn new(config: RelauncherConfig) -> Self {
        Self { config }
    }

    /// Default layout with `LUACONFIG_*` overrides from the environment
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(RelauncherConfig::from_env()?))
    }

    pub fn config(&self) -> &RelauncherConfig {
        &self.config
    }

    /// A fresh relauncher in its start state, for callers that drive the phases themselves
    pub fn relauncher(&self) -> Relauncher<Start, PlatformManager> {
        let manager = PlatformProcessManagerFactory::create_process_manager();
        Relauncher::new(self.config.clone(), Arc::new(manager))
    }

    /// Relaunch the CLI with `args` and return its exit code
    pub async fn run<S: AsRef<str>>(&self, args: &[S]) -> Result<i32> {
        debug!(
            platform = PlatformProcessManagerFactory::platform_name(),
            args = args.len(),
            "Relaunching LuaEnv CLI"
        );
        self.relauncher().run(args).await
    }
}

/// Convert the process arguments to strings, rejecting any that are not UTF-8.
///
/// Indices in errors count from the first forwarded argument, starting at 1.
pub fn collect_args<I>(args: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .enumerate()
        .map(|(i, arg)| {
            arg.into_string()
                .map_err(|raw| RelaunchError::InvalidArgument {
                    index: i + 1,
                    lossy: raw.to_string_lossy().into_owned(),
                })
        })
        .collect()
}
