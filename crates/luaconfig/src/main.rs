use luaconfig::{LuaConfigRelauncher, collect_args, init_logging};
use luaconfig_core::Result;
use tracing::debug;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    init_logging();

    let code = match run().await {
        Ok(code) => code,
        Err(e) => {
            debug!(post_launch = e.is_post_launch(), "Relaunch failed");
            eprintln!("Error: {e}");
            e.exit_code()
        }
    };

    std::process::exit(code);
}

async fn run() -> Result<i32> {
    let args = collect_args(std::env::args_os().skip(1))?;
    LuaConfigRelauncher::from_env()?.run(&args).await
}
