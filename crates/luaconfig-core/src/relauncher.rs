use crate::command_line::{CommandLine, build_command_line};
use crate::config::RelauncherConfig;
use crate::error::{RelaunchError, Result};
use crate::paths::{ResolvedPaths, ValidatedTargets, resolve_paths, validate_targets};
use crate::process::{
    ProcessHandle, ProcessId, ProcessLifecycle, ProcessManager, ProcessStatus, ProcessTermination,
    TerminationResult,
};
use crate::timing::PhaseTimer;
use std::sync::Arc;
use tracing::{error, info, warn};

pub struct Start;

pub struct PathsResolved {
    paths: ResolvedPaths,
}

pub struct TargetsValidated {
    paths: ResolvedPaths,
    targets: ValidatedTargets,
}

pub struct CommandLineBuilt {
    paths: ResolvedPaths,
    targets: ValidatedTargets,
    command_line: CommandLine,
}

pub struct ProcessLaunched<Handle> {
    handle: Handle,
    execution: PhaseTimer,
}

/// One relaunch of the LuaEnv CLI, moving through
/// `Start -> PathsResolved -> TargetsValidated -> CommandLineBuilt -> ProcessLaunched`.
///
/// Each transition consumes the previous state, so a failure at any step
/// leaves nothing behind to clean up by hand: the held target handles are
/// dropped with the value.
pub struct Relauncher<State, Manager> {
    config: RelauncherConfig,
    process_manager: Arc<Manager>,
    state: State,
}

impl<State, Manager> Relauncher<State, Manager> {
    pub fn config(&self) -> &RelauncherConfig {
        &self.config
    }

    fn transition<Next>(self, state: Next) -> Relauncher<Next, Manager> {
        Relauncher {
            config: self.config,
            process_manager: self.process_manager,
            state,
        }
    }
}

impl<Manager: ProcessManager> Relauncher<Start, Manager> {
    pub fn new(config: RelauncherConfig, process_manager: Arc<Manager>) -> Self {
        Self {
            config,
            process_manager,
            state: Start,
        }
    }

    /// Run every phase and return the child's exit code
    pub async fn run<S: AsRef<str>>(self, args: &[S]) -> Result<i32> {
        let total = PhaseTimer::start("Total execution");
        let result = async {
            self.resolve_paths()?
                .validate_targets()?
                .build_command_line(args)?
                .launch()
                .await?
                .wait()
                .await
        }
        .await;
        total.finish();
        result
    }

    pub fn resolve_paths(self) -> Result<Relauncher<PathsResolved, Manager>> {
        let timer = PhaseTimer::start("Path resolution");
        self.config.validate()?;
        let paths = resolve_paths(&self.config)?;
        timer.finish();
        Ok(self.transition(PathsResolved { paths }))
    }
}

impl<Manager: ProcessManager> Relauncher<PathsResolved, Manager> {
    pub fn paths(&self) -> &ResolvedPaths {
        &self.state.paths
    }

    pub fn validate_targets(self) -> Result<Relauncher<TargetsValidated, Manager>> {
        let timer = PhaseTimer::start("File system validation");
        let targets = validate_targets(&self.state.paths.cli_path, &self.state.paths.config_path)?;
        timer.finish();

        let paths = self.state.paths.clone();
        Ok(self.transition(TargetsValidated { paths, targets }))
    }
}

impl<Manager: ProcessManager> Relauncher<TargetsValidated, Manager> {
    pub fn paths(&self) -> &ResolvedPaths {
        &self.state.paths
    }

    pub fn build_command_line<S: AsRef<str>>(
        self,
        args: &[S],
    ) -> Result<Relauncher<CommandLineBuilt, Manager>> {
        let timer = PhaseTimer::start("Command line construction");
        let command_line = build_command_line(
            &self.state.paths.cli_path,
            &self.state.paths.config_path,
            &self.config.subcommand,
            args,
            self.config.quoting,
            self.config.max_command_line_len,
        )?;
        timer.finish();

        let Relauncher {
            config,
            process_manager,
            state: TargetsValidated { paths, targets },
        } = self;
        Ok(Relauncher {
            config,
            process_manager,
            state: CommandLineBuilt {
                paths,
                targets,
                command_line,
            },
        })
    }
}

impl<Manager: ProcessManager> Relauncher<CommandLineBuilt, Manager> {
    pub fn command_line(&self) -> &CommandLine {
        &self.state.command_line
    }

    /// Spawn the CLI. The validation handles stay open until the spawn returns.
    pub async fn launch(self) -> Result<Relauncher<ProcessLaunched<Manager::Handle>, Manager>> {
        let timer = PhaseTimer::start("Process creation");
        let Relauncher {
            config,
            process_manager,
            state:
                CommandLineBuilt {
                    paths,
                    targets,
                    command_line,
                },
        } = self;

        let spawned = process_manager
            .spawn_process(&paths.cli_path, &command_line)
            .await;
        drop(targets);

        let handle = spawned.map_err(|e| RelaunchError::Launch {
            path: paths.cli_path,
            message: format!("{e:#}"),
        })?;
        timer.finish();

        info!(
            pid = ?handle.get_pid(),
            program = %handle.get_program().display(),
            "Launched LuaEnv CLI"
        );
        Ok(Relauncher {
            config,
            process_manager,
            state: ProcessLaunched {
                handle,
                execution: PhaseTimer::start("CLI execution"),
            },
        })
    }
}

impl<Manager: ProcessManager> Relauncher<ProcessLaunched<Manager::Handle>, Manager> {
    pub fn pid(&self) -> Option<ProcessId> {
        self.state.handle.get_pid()
    }

    /// Wait for the CLI within the configured timeout and return its exit code.
    ///
    /// On timeout the CLI and its descendants are killed.
    pub async fn wait(self) -> Result<i32> {
        let timeout = self.config.timeout();
        let process_manager = self.process_manager;
        let ProcessLaunched {
            mut handle,
            execution,
        } = self.state;

        let waited = process_manager.wait_for_exit(&mut handle, timeout).await;
        execution.finish();

        match waited {
            Ok(Some(ProcessStatus::Exited(code))) => {
                info!(exit_code = code, "LuaEnv CLI exited");
                Ok(code)
            }
            Ok(Some(ProcessStatus::NoExitCode(status))) => {
                Err(RelaunchError::ExitCodeUnavailable(status))
            }
            Ok(None) => {
                let limit = timeout.unwrap_or_default();
                warn!(
                    pid = ?handle.get_pid(),
                    program = %handle.get_program().display(),
                    timeout_secs = limit.as_secs(),
                    "LuaEnv CLI timed out, terminating"
                );
                match process_manager.terminate_completely(&mut handle).await {
                    TerminationResult::Success | TerminationResult::ProcessNotFound => {}
                    result => error!(result = ?result, "Failed to terminate timed out process"),
                }
                Err(RelaunchError::Timeout(limit))
            }
            Err(e) => Err(RelaunchError::ExitCodeUnavailable(format!("{e:#}"))),
        }
    }
}
