use crate::command_line::CommandLine;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Unique identifier for a process
pub type ProcessId = u32;

/// How a child process ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessStatus {
    /// Process exited normally with the given exit code
    Exited(i32),
    /// Process ended without an exit code, e.g. killed by a signal
    NoExitCode(String),
}

impl From<std::process::ExitStatus> for ProcessStatus {
    fn from(status: std::process::ExitStatus) -> Self {
        match status.code() {
            Some(code) => ProcessStatus::Exited(code),
            None => ProcessStatus::NoExitCode(status.to_string()),
        }
    }
}

/// Result of a process termination operation
#[derive(Debug, Clone, PartialEq)]
pub enum TerminationResult {
    /// Process was successfully terminated
    Success,
    /// Process was not found (already exited)
    ProcessNotFound,
    /// Insufficient privileges to terminate the process
    AccessDenied,
    /// Operation failed with specific error message
    Failed(String),
}

/// Trait representing a handle to a running child process
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    /// Get the process ID (None if process has exited)
    fn get_pid(&self) -> Option<ProcessId>;

    /// The program this process was started from
    fn get_program(&self) -> &Path;

    /// Try to get exit status without blocking
    async fn try_wait(&mut self) -> Result<Option<ProcessStatus>>;

    /// Wait for the process to exit
    async fn wait(&mut self) -> Result<ProcessStatus>;

    /// Kill the process and reap it
    async fn kill(&mut self) -> Result<()>;
}

/// Spawning and waiting on the CLI process
#[async_trait]
pub trait ProcessLifecycle: Send + Sync {
    /// The type of process handle this lifecycle manager produces
    type Handle: ProcessHandle + 'static;

    /// Start `program` with the given assembled command line.
    ///
    /// Standard streams, environment and working directory are inherited.
    async fn spawn_process(
        &self,
        program: &Path,
        command_line: &CommandLine,
    ) -> Result<Self::Handle>;

    /// Wait for a process to exit. Returns `Ok(None)` when `timeout` elapses first.
    async fn wait_for_exit(
        &self,
        handle: &mut Self::Handle,
        timeout: Option<Duration>,
    ) -> Result<Option<ProcessStatus>> {
        match timeout {
            Some(duration) => match tokio::time::timeout(duration, handle.wait()).await {
                Ok(status) => status.map(Some),
                Err(_) => Ok(None),
            },
            None => handle.wait().await.map(Some),
        }
    }
}

/// Forced termination of a child and everything it started
#[async_trait]
pub trait ProcessTermination: Send + Sync {
    /// Force kill a single process (SIGKILL on Unix, taskkill on Windows)
    async fn force_kill_pid(&self, pid: ProcessId) -> TerminationResult;

    /// Find all descendants of a given process, deepest first
    async fn find_child_processes(&self, pid: ProcessId) -> Result<Vec<ProcessId>>;

    /// Kill every descendant of the handle's process, then the process itself
    async fn terminate_completely(&self, handle: &mut dyn ProcessHandle) -> TerminationResult {
        if let Some(pid) = handle.get_pid() {
            match self.find_child_processes(pid).await {
                Ok(children) => {
                    for child_pid in children {
                        match self.force_kill_pid(child_pid).await {
                            TerminationResult::Success | TerminationResult::ProcessNotFound => {}
                            result => {
                                tracing::warn!(
                                    pid = %child_pid,
                                    result = ?result,
                                    "Failed to terminate descendant process"
                                );
                            }
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(pid = %pid, error = %e, "Failed to enumerate descendant processes");
                }
            }
        }

        match handle.kill().await {
            Ok(()) => TerminationResult::Success,
            Err(e) => match handle.try_wait().await {
                Ok(Some(_)) => TerminationResult::ProcessNotFound,
                _ => TerminationResult::Failed(format!("Failed to kill process: {e}")),
            },
        }
    }
}

/// Platform process manager combining lifecycle and termination
pub trait ProcessManager: ProcessLifecycle + ProcessTermination {
    /// Create a new process manager instance
    fn new() -> Self
    where
        Self: Sized;
}

/// Factory trait for creating platform-specific process managers
pub trait ProcessManagerFactory {
    /// The type of process manager this factory creates
    type Manager: ProcessManager;

    /// Create a process manager for the current platform
    fn create_process_manager() -> Self::Manager;

    /// Get the platform name for logging and debugging
    fn platform_name() -> &'static str;
}
