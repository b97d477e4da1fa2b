//! End-to-end runs of the `luaconfig` binary against a fake LuaEnv install.
#![cfg(unix)]

use luaconfig::LuaConfigRelauncher;
use luaconfig_core::{RelaunchError, RelauncherConfig};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{Duration, Instant};
use tempfile::TempDir;

/// A copy of the binary with `cli/LuaEnv.CLI` and `backend.config` beside it
struct Install {
    dir: TempDir,
}

impl Install {
    fn new(cli_body: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let binary = dir.path().join("luaconfig");
        std::fs::copy(env!("CARGO_BIN_EXE_luaconfig"), &binary).unwrap();

        std::fs::create_dir(dir.path().join("cli")).unwrap();
        let install = Self { dir };
        install.write_cli(cli_body);
        std::fs::write(install.config_path(), "{}").unwrap();
        install
    }

    fn write_cli(&self, body: &str) {
        let cli = self.cli_path();
        std::fs::write(&cli, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&cli, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    fn cli_path(&self) -> PathBuf {
        self.dir.path().join("cli").join("LuaEnv.CLI")
    }

    fn config_path(&self) -> PathBuf {
        self.dir.path().join("backend.config")
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn run(&self, args: &[&str]) -> Output {
        self.command(args).output().unwrap()
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut command = Command::new(self.dir.path().join("luaconfig"));
        command
            .args(args)
            .env_remove("LUACONFIG_TIMEOUT_SECS")
            .env_remove("LUACONFIG_MAX_COMMAND_LINE")
            .env_remove("LUACONFIG_STRICT_QUOTING")
            .env_remove("LUACONFIG_LOG");
        command
    }
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn record_args_to(path: &Path) -> String {
    format!("printf '%s\\n' \"$@\" > '{}'", path.display())
}

#[test]
fn test_exit_code_is_forwarded() {
    let install = Install::new("exit 42");
    let output = install.run(&["--cflags"]);
    assert_eq!(output.status.code(), Some(42), "{}", stderr(&output));
}

#[test]
fn test_success_passes_through_stdout() {
    let install = Install::new("echo '-I/opt/lua/include'");
    let output = install.run(&["--cflags"]);
    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "-I/opt/lua/include\n");
}

#[test]
fn test_arguments_are_forwarded_verbatim() {
    let install = Install::new("");
    let recorded = install.path("args.txt");
    install.write_cli(&record_args_to(&recorded));

    let args = ["--libs", "", "lua 5.4", r#"say "hi""#, r"C:\Lua\", "a&b"];
    let output = install.run(&args);
    assert_eq!(output.status.code(), Some(0), "{}", stderr(&output));

    let written = std::fs::read_to_string(&recorded).unwrap();
    let lines: Vec<&str> = written.lines().collect();
    assert_eq!(lines[0], "--config");
    assert_eq!(Path::new(lines[1]), install.config_path());
    assert_eq!(lines[2], "pkg-config");
    assert_eq!(&lines[3..], args);
}

#[test]
fn test_missing_cli_exits_one() {
    let install = Install::new("exit 0");
    std::fs::remove_file(install.cli_path()).unwrap();

    let output = install.run(&[]);
    assert_eq!(output.status.code(), Some(1));
    let message = stderr(&output);
    assert!(message.contains("CLI executable not found"), "{message}");
    assert!(message.contains(install.cli_path().to_str().unwrap()), "{message}");
}

#[test]
fn test_config_directory_exits_one() {
    let install = Install::new("exit 0");
    std::fs::remove_file(install.config_path()).unwrap();
    std::fs::create_dir(install.config_path()).unwrap();

    let output = install.run(&[]);
    assert_eq!(output.status.code(), Some(1));
    let message = stderr(&output);
    assert!(message.contains("Configuration file is not a regular file"), "{message}");
    assert!(message.contains(install.config_path().to_str().unwrap()), "{message}");
}

#[test]
fn test_oversized_command_line_never_runs_cli() {
    let install = Install::new("");
    let marker = install.path("ran");
    install.write_cli(&format!("touch '{}'", marker.display()));

    let huge = "x".repeat(5000);
    let output = install.run(&[huge.as_str()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Command line too long"));
    assert!(!marker.exists());
}

#[test]
fn test_hanging_cli_is_terminated() {
    let install = Install::new("exec sleep 30");
    let started = Instant::now();

    let output = install
        .command(&[])
        .env("LUACONFIG_TIMEOUT_SECS", "1")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(started.elapsed() < Duration::from_secs(20));
    assert!(stderr(&output).contains("was terminated"));
}

#[test]
fn test_killed_cli_has_no_exit_code() {
    let install = Install::new("kill -9 $$");
    let output = install.run(&[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Could not retrieve exit code"));
}

#[test]
fn test_invalid_environment_exits_one() {
    let install = Install::new("exit 0");
    let output = install
        .command(&[])
        .env("LUACONFIG_MAX_COMMAND_LINE", "lots")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Configuration error"));
}

#[tokio::test]
async fn test_library_relauncher_with_base_dir() {
    let install = Install::new("exit 7");
    let config = RelauncherConfig::builder()
        .base_dir(install.dir.path())
        .timeout_secs(10)
        .build()
        .unwrap();

    let relauncher = LuaConfigRelauncher::new(config);
    assert_eq!(relauncher.run(&["--modversion"]).await.unwrap(), 7);

    std::fs::remove_file(install.config_path()).unwrap();
    let err = relauncher.run::<&str>(&[]).await.unwrap_err();
    assert!(matches!(err, RelaunchError::NotFound { .. }));
}
