use crate::config::RelauncherConfig;
use crate::error::{RelaunchError, Result};
use std::fs::File;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

pub const CLI_LABEL: &str = "CLI executable";
pub const CONFIG_LABEL: &str = "Configuration file";

/// The installation layout as seen from the running executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub base_dir: PathBuf,
    pub cli_path: PathBuf,
    pub config_path: PathBuf,
}

/// Locate the CLI and its configuration next to the running executable.
pub fn resolve_paths(config: &RelauncherConfig) -> Result<ResolvedPaths> {
    let base_dir = match &config.base_dir {
        Some(dir) => dir.clone(),
        None => executable_dir()?,
    };
    resolve_from(base_dir, config)
}

/// Same as [`resolve_paths`] with an explicit base directory.
pub fn resolve_from(base_dir: PathBuf, config: &RelauncherConfig) -> Result<ResolvedPaths> {
    let cli_path = base_dir.join(&config.cli_relative_path);
    let config_path = base_dir.join(&config.config_relative_path);

    for path in [&cli_path, &config_path] {
        check_length(path, config.max_path_len)?;
        if config.reject_traversal && has_traversal(path) {
            return Err(RelaunchError::PathTraversal(path.clone()));
        }
    }

    debug!(
        base_dir = %base_dir.display(),
        cli = %cli_path.display(),
        config = %config_path.display(),
        "Resolved LuaEnv paths"
    );

    Ok(ResolvedPaths {
        base_dir,
        cli_path,
        config_path,
    })
}

fn executable_dir() -> Result<PathBuf> {
    let exe = std::env::current_exe()
        .map_err(|e| RelaunchError::PathResolution(format!("could not get executable path: {e}")))?;
    exe.parent().map(Path::to_path_buf).ok_or_else(|| {
        RelaunchError::PathResolution(format!(
            "invalid executable path format: {}",
            exe.display()
        ))
    })
}

fn check_length(path: &Path, max_len: usize) -> Result<()> {
    let len = path.as_os_str().len();
    if len > max_len {
        return Err(RelaunchError::PathResolution(format!(
            "path is too long ({len} > {max_len}): {}",
            path.display()
        )));
    }
    Ok(())
}

fn has_traversal(path: &Path) -> bool {
    path.components().any(|c| c == Component::ParentDir)
}

/// A target that passed validation, kept open until the child has been created
#[derive(Debug)]
pub struct HeldTarget {
    path: PathBuf,
    _file: File,
}

impl HeldTarget {
    /// Open `path` read-only after checking that it is a regular file.
    pub fn open(what: &'static str, path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| RelaunchError::from_target_io(what, path.to_path_buf(), e))?;

        if metadata.is_dir() {
            return Err(RelaunchError::InvalidTarget {
                what,
                path: path.to_path_buf(),
                reason: "is a directory".to_string(),
            });
        }
        if !metadata.is_file() {
            return Err(RelaunchError::InvalidTarget {
                what,
                path: path.to_path_buf(),
                reason: "is not a regular file".to_string(),
            });
        }

        let file = File::open(path)
            .map_err(|e| RelaunchError::from_target_io(what, path.to_path_buf(), e))?;

        Ok(Self {
            path: path.to_path_buf(),
            _file: file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Open handles on both targets. Dropping this releases them.
#[derive(Debug)]
pub struct ValidatedTargets {
    pub cli: HeldTarget,
    pub config: HeldTarget,
}

/// Check that the CLI and the configuration are regular files and hold them open.
pub fn validate_targets(cli_path: &Path, config_path: &Path) -> Result<ValidatedTargets> {
    let cli = HeldTarget::open(CLI_LABEL, cli_path)?;
    let config = HeldTarget::open(CONFIG_LABEL, config_path)?;
    debug!(
        cli = %cli.path().display(),
        config = %config.path().display(),
        "Holding validated targets"
    );
    Ok(ValidatedTargets { cli, config })
}
