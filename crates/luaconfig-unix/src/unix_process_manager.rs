use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use luaconfig_core::{
    CommandLine, ProcessHandle, ProcessId, ProcessLifecycle, ProcessManager, ProcessStatus,
    ProcessTermination, TerminationResult,
};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid as NixPid;
use std::path::{Path, PathBuf};
use sysinfo::System;
use tokio::process::{Child, Command};
use tracing::{info, warn};

/// Unix-specific process handle implementation
pub struct UnixProcessHandle {
    child: Child,
    program: PathBuf,
}

impl UnixProcessHandle {
    pub fn new(child: Child, program: PathBuf) -> Self {
        Self { child, program }
    }
}

#[async_trait]
impl ProcessHandle for UnixProcessHandle {
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

/// Unix process manager. Descendants are found through the process table so
/// the child can stay in the terminal's foreground process group.
pub struct UnixProcessManager {
    system: std::sync::Mutex<System>,
}

impl Default for UnixProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessLifecycle for UnixProcessManager {
    type Handle = UnixProcessHandle;

    async fn spawn_process(
        &self,
        program: &Path,
        command_line: &CommandLine,
    ) -> Result<UnixProcessHandle> {
        // execve takes a vector, so the structured arguments are passed as-is
        let child = Command::new(program)
            .args(command_line.args())
            .spawn()
            .with_context(|| format!("Failed to spawn {}", program.display()))?;

        if let Some(pid) = child.id() {
            info!(
                pid = %pid,
                program = %program.display(),
                args = ?command_line.args(),
                "Spawned Unix process"
            );
        }

        Ok(UnixProcessHandle::new(child, program.to_path_buf()))
    }
}

#[async_trait]
impl ProcessTermination for UnixProcessManager {
    async fn force_kill_pid(&self, pid: ProcessId) -> TerminationResult {
        let nix_pid = NixPid::from_raw(pid as i32);

        match signal::kill(nix_pid, Signal::SIGKILL) {
            Ok(()) => {
                info!(pid = %pid, "Sent SIGKILL to process");
                TerminationResult::Success
            }
            Err(nix::errno::Errno::ESRCH) => {
                info!(pid = %pid, "Process not found (already terminated)");
                TerminationResult::ProcessNotFound
            }
            Err(nix::errno::Errno::EPERM) => {
                warn!(pid = %pid, "Permission denied to kill process");
                TerminationResult::AccessDenied
            }
            Err(e) => {
                warn!(pid = %pid, error = %e, "Failed to send SIGKILL to process");
                TerminationResult::Failed(format!("SIGKILL failed: {e}"))
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

impl UnixProcessManager {
    /// Recursively find all child processes, grandchildren before their parents
    fn find_children_recursive(system: &System, parent_pid: u32, result: &mut Vec<u32>) {
        for (pid, process) in system.processes() {
            if process.parent().map(|ppid| ppid.as_u32()) == Some(parent_pid) {
                let child_pid = pid.as_u32();
                Self::find_children_recursive(system, child_pid, result);
                result.push(child_pid);
            }
        }
    }
}

impl ProcessManager for UnixProcessManager {
    fn new() -> Self {
        Self {
            system: std::sync::Mutex::new(System::new()),
        }
    }
}
