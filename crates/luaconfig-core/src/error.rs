use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Every way a relaunch can fail. All of them end the invocation with exit code 1.
#[derive(Error, Debug)]
pub enum RelaunchError {
    #[error("Could not resolve executable path: {0}")]
    PathResolution(String),

    #[error("Path contains a parent-directory segment: {}", .0.display())]
    PathTraversal(PathBuf),

    #[error("{what} not found: {}", path.display())]
    NotFound {
        what: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{what} is not a regular file: {} ({reason})", path.display())]
    InvalidTarget {
        what: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("Command line too long: needs {required} characters, limit is {limit}")]
    CommandLineTooLong { required: usize, limit: usize },

    #[error("Argument {index} is not valid UTF-8: {lossy}")]
    InvalidArgument { index: usize, lossy: String },

    #[error("Failed to create process {}: {message}", path.display())]
    Launch { path: PathBuf, message: String },

    #[error("Process did not exit within {}s and was terminated", .0.as_secs_f64())]
    Timeout(Duration),

    #[error("Could not retrieve exit code of child process: {0}")]
    ExitCodeUnavailable(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RelaunchError {
    /// Sentinel exit code used for every failure path
    pub const EXIT_CODE: i32 = 1;

    pub fn exit_code(&self) -> i32 {
        Self::EXIT_CODE
    }

    /// True when the child has already run to completion (or was killed) before the error occurred
    pub fn is_post_launch(&self) -> bool {
        matches!(
            self,
            RelaunchError::Timeout(_) | RelaunchError::ExitCodeUnavailable(_)
        )
    }

    /// Map an `io::Error` from probing or opening a target onto the taxonomy
    pub(crate) fn from_target_io(what: &'static str, path: PathBuf, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            RelaunchError::NotFound {
                what,
                path,
                source: err,
            }
        } else {
            RelaunchError::InvalidTarget {
                what,
                path,
                reason: err.to_string(),
            }
        }
    }
}

pub type Result<T, E = RelaunchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_error_exits_with_one() {
        let errors = [
            RelaunchError::PathResolution("no exe".to_string()),
            RelaunchError::PathTraversal(PathBuf::from("a/../b")),
            RelaunchError::CommandLineTooLong {
                required: 5000,
                limit: 4096,
            },
            RelaunchError::Timeout(Duration::from_secs(20)),
            RelaunchError::ExitCodeUnavailable("signal 9".to_string()),
        ];
        for error in errors {
            assert_eq!(error.exit_code(), 1);
        }
    }

    #[test]
    fn test_error_display_names_path() {
        let error = RelaunchError::InvalidTarget {
            what: "Configuration file",
            path: PathBuf::from("/opt/luaenv/backend.config"),
            reason: "is a directory".to_string(),
        };
        let display = format!("{error}");
        assert!(display.contains("Configuration file"));
        assert!(display.contains("/opt/luaenv/backend.config"));
        assert!(display.contains("is a directory"));
    }

    #[test]
    fn test_from_target_io_maps_not_found() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let mapped = RelaunchError::from_target_io("CLI executable", PathBuf::from("x"), err);
        assert!(matches!(mapped, RelaunchError::NotFound { what: "CLI executable", .. }));

        let err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let mapped = RelaunchError::from_target_io("CLI executable", PathBuf::from("x"), err);
        assert!(matches!(mapped, RelaunchError::InvalidTarget { .. }));
    }

    #[test]
    fn test_post_launch_categorization() {
        assert!(RelaunchError::Timeout(Duration::from_secs(1)).is_post_launch());
        assert!(RelaunchError::ExitCodeUnavailable("x".to_string()).is_post_launch());
        assert!(!RelaunchError::PathResolution("x".to_string()).is_post_launch());
        assert!(
            !RelaunchError::Launch {
                path: PathBuf::from("cli"),
                message: "denied".to_string()
            }
            .is_post_launch()
        );
    }
}
