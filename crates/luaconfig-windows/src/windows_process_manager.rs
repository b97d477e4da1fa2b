use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Output;
use sysinfo::System;
use tokio::process::{Child, Command};
use tracing::{info, warn};

use luaconfig_core::*;

/// taskkill's exit code when no process matches the pid
const TASKKILL_NOT_FOUND: i32 = 128;

/// Windows-specific process handle implementation
pub struct WindowsProcessHandle {
    child: Child,
    program: PathBuf,
}

impl WindowsProcessHandle {
    pub fn new(child: Child, program: PathBuf) -> Self {
        Self { child, program }
    }
}

#[async_trait]
impl ProcessHandle for WindowsProcessHandle {
    fn get_pid(&self) -> Option<ProcessId> {
        self.child.id()
    }

    fn get_program(&self) -> &Path {
        &self.program
    }

    async fn try_wait(&mut self) -> Result<Option<ProcessStatus>> {
        Ok(self.child.try_wait()?.map(ProcessStatus::from))
    }

    async fn wait(&mut self) -> Result<ProcessStatus> {
        let status = self.child.wait().await?;
        Ok(ProcessStatus::from(status))
    }

    async fn kill(&mut self) -> Result<()> {
        self.child
            .kill()
            .await
            .map_err(|e| anyhow!("Failed to kill process: {e}"))
    }
}

/// Windows-specific process manager with process tree termination
pub struct WindowsProcessManager {
    system: std::sync::Mutex<System>,
}

impl Default for WindowsProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessLifecycle for WindowsProcessManager {
    type Handle = WindowsProcessHandle;

    async fn spawn_process(
        &self,
        program: &Path,
        command_line: &CommandLine,
    ) -> Result<WindowsProcessHandle> {
        // The standard library quotes the program name itself; everything
        // after it goes through verbatim so the CLI sees our escaping.
        let child = Command::new(program)
            .raw_arg(command_line.raw_arguments())
            .spawn()
            .with_context(|| format!("Failed to create process {}", program.display()))?;

        if let Some(pid) = child.id() {
            info!(
                pid = %pid,
                command_line = %command_line,
                "Spawned Windows process"
            );
        }

        Ok(WindowsProcessHandle::new(child, program.to_path_buf()))
    }
}

#[async_trait]
impl ProcessTermination for WindowsProcessManager {
    async fn force_kill_pid(&self, pid: ProcessId) -> TerminationResult {
        match self.taskkill(pid).await {
            Ok(output) if output.status.success() => {
                info!(pid = %pid, "Terminated process");
                TerminationResult::Success
            }
            Ok(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let result = classify_taskkill_failure(output.status.code(), &stderr);
                if matches!(result, TerminationResult::ProcessNotFound) {
                    info!(pid = %pid, "Process not found (already terminated)");
                } else {
                    warn!(pid = %pid, error = %stderr.trim(), "Failed to terminate process");
                }
                result
            }
            Err(e) => {
                warn!(pid = %pid, error = %e, "Failed to run taskkill");
                TerminationResult::Failed(format!("taskkill failed: {e}"))
            }
        }
    }

    async fn find_child_processes(&self, parent_pid: ProcessId) -> Result<Vec<ProcessId>> {
        let mut system = self
            .system
            .lock()
            .map_err(|_| anyhow!("Process table lock poisoned"))?;
        system.refresh_processes_specifics(
            sysinfo::ProcessesToUpdate::All,
            true,
            sysinfo::ProcessRefreshKind::default(),
        );

        let mut children = Vec::new();
        Self::find_children_recursive(&system, parent_pid, &mut children);
        Ok(children)
    }
}

impl WindowsProcessManager {
    /// Force-terminate a single process with taskkill
    async fn taskkill(&self, pid: ProcessId) -> Result<Output> {
        Command::new("taskkill")
            .args(["/F", "/PID", &pid.to_string()])
            .output()
            .await
            .context("Failed to run taskkill")
    }

    /// Recursively find all child processes
    fn find_children_recursive(system: &System, parent_pid: u32, result: &mut Vec<u32>) {
        for (pid, process) in system.processes() {
            if process.parent().map(|ppid| ppid.as_u32()) == Some(parent_pid) {
                let child_pid = pid.as_u32();
                // Recursively find grandchildren first
                Self::find_children_recursive(system, child_pid, result);
                result.push(child_pid);
            }
        }
    }
}

/// Map a failed taskkill run onto a termination result
fn classify_taskkill_failure(code: Option<i32>, stderr: &str) -> TerminationResult {
    match code {
        Some(TASKKILL_NOT_FOUND) => TerminationResult::ProcessNotFound,
        _ if stderr.contains("Access is denied") => TerminationResult::AccessDenied,
        _ => TerminationResult::Failed(format!("taskkill failed: {}", stderr.trim())),
    }
}

impl ProcessManager for WindowsProcessManager {
    fn new() -> Self {
        info!("Initializing Windows process manager with system monitoring");
        Self {
            system: std::sync::Mutex::new(System::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_force_kill_missing_process() {
        let manager = WindowsProcessManager::new();
        // Windows pids are multiples of four
        let result = manager.force_kill_pid(2_147_483_646).await;
        assert_eq!(result, TerminationResult::ProcessNotFound);
    }

    #[test]
    fn test_classify_taskkill_failure() {
        assert_eq!(
            classify_taskkill_failure(Some(128), "ERROR: The process \"42\" not found."),
            TerminationResult::ProcessNotFound
        );
        assert_eq!(
            classify_taskkill_failure(Some(1), "ERROR: Access is denied."),
            TerminationResult::AccessDenied
        );
        assert!(matches!(
            classify_taskkill_failure(Some(1), "ERROR: something else\r\n"),
            TerminationResult::Failed(msg) if msg == "taskkill failed: ERROR: something else"
        ));
    }

    #[tokio::test]
    async fn test_force_kill_running_process() {
        let manager = WindowsProcessManager::new();
        let mut child = Command::new("ping")
            .args(["-n", "30", "127.0.0.1"])
            .stdout(std::process::Stdio::null())
            .spawn()
            .unwrap();
        let pid = child.id().unwrap();

        assert_eq!(manager.force_kill_pid(pid).await, TerminationResult::Success);
        let status = child.wait().await.unwrap();
        assert!(!status.success());
    }

    #[tokio::test]
    async fn test_no_children_for_fresh_process() {
        let manager = WindowsProcessManager::new();
        let children = manager.find_child_processes(u32::MAX - 2).await.unwrap();
        assert!(children.is_empty());
    }
}
