//! The escaped command line must reach a real Windows child unchanged.
//!
//! This binary plays both roles. Started by the test runner it spawns itself
//! through `WindowsProcessManager`; started with `--config <file>` it acts as
//! the CLI and writes the argv it parsed into `<file>`, NUL separated.

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.first().map(String::as_str) == Some("--config") {
        record_argv(&args);
        return;
    }

    #[cfg(windows)]
    windows_tests::run();
}

fn record_argv(args: &[String]) {
    let out = &args[1];
    std::fs::write(out, args.join("\0")).unwrap();
}

#[cfg(windows)]
mod windows_tests {
    use luaconfig_core::{
        ProcessLifecycle, ProcessManager, ProcessStatus, QuotingPolicy, build_command_line,
    };
    use luaconfig_windows::WindowsProcessManager;
    use std::time::Duration;
    use tempfile::TempDir;

    const CASES: &[&[&str]] = &[
        &["--cflags", "lua"],
        &[""],
        &["", "--libs", ""],
        &["lua 5.4", "tab\there"],
        &[r#"say "hi""#, r#""""#, r#"a\"b"#],
        &[r"C:\Lua\", r"C:\Program Files\Lua\", r"\\server\share\\"],
        &[r"inner\back\slash", r#"\\""#],
        &["a&b", "x|y", "100%", "<in>", "it's", "^caret"],
    ];

    pub fn run() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        for policy in [QuotingPolicy::Standard, QuotingPolicy::Strict] {
            for case in CASES {
                runtime.block_on(assert_round_trip(case, policy));
            }
        }
        println!("raw_arg_tests: {} cases passed", CASES.len() * 2);
    }

    async fn assert_round_trip(args: &[&str], policy: QuotingPolicy) {
        let dir = TempDir::new().unwrap();
        let program = std::env::current_exe().unwrap();
        let recorded = dir.path().join("backend.config");

        let command_line =
            build_command_line(&program, &recorded, "pkg-config", args, policy, 4096).unwrap();

        let manager = WindowsProcessManager::new();
        let mut handle = manager
            .spawn_process(&program, &command_line)
            .await
            .unwrap();
        let status = manager
            .wait_for_exit(&mut handle, Some(Duration::from_secs(30)))
            .await
            .unwrap();
        assert_eq!(status, Some(ProcessStatus::Exited(0)), "{command_line}");

        let written = std::fs::read_to_string(&recorded).unwrap();
        let parsed: Vec<&str> = written.split('\0').collect();
        assert_eq!(parsed, command_line.args(), "{command_line}");
    }
}
