use std::process::ExitCode;
use std::sync::Arc;

use spa_origin::config::{AppState, Config};
use spa_origin::{logger, server};

/// Config file used when no path is given, extension optional
const DEFAULT_CONFIG_PATH: &str = "config";

fn main() -> ExitCode {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    match run(&config_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("[FATAL] {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(config_path: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cfg = Config::load_from(config_path)?;
    logger::init(&cfg)?;

    // Validate the asset root and fallback document before binding
    let state = Arc::new(AppState::new(cfg)?);

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = state.config.server.workers.filter(|&n| n > 0) {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(server::run(state))
}
