use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter, e.g. `LUACONFIG_LOG=debug`
pub const ENV_LOG: &str = "LUACONFIG_LOG";

/// Install a stderr subscriber. Defaults to `warn` so the CLI's own output stays clean.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(ENV_LOG).unwrap_or_else(|_| EnvFilter::new("warn"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
