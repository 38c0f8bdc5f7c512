use std::process::ExitCode;

use dotenvy::dotenv;
use tracing::{error, info};

fn main() -> ExitCode {
    // load .env first so RUST_LOG / LOG_FORMAT apply
    dotenv().ok();
    common::utils::logging::init_logging_from_env();

    std::panic::set_hook(Box::new(|info| {
        error!(service = "phonebook", event = "panic", message = %info, "unhandled panic occurred");
    }));

    let cfg = match configs::AppConfig::load_or_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            error!(service = "phonebook", event = "config_invalid", error = format!("{e:#}"), "invalid configuration");
            return ExitCode::FAILURE;
        }
    };

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(w) = cfg.server.worker_threads {
        builder.worker_threads(w);
    }
    let rt = match builder.build() {
        Ok(rt) => rt,
        Err(e) => {
            error!(service = "phonebook", event = "runtime_build_failed", error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    info!(service = "phonebook", event = "start", version = env!("CARGO_PKG_VERSION"), "server starting");
    rt.block_on(async move {
        tokio::select! {
            res = server::run(cfg) => match res {
                Ok(()) => ExitCode::SUCCESS,
                Err(e) => {
                    error!(service = "phonebook", event = "run_failed", error = %e, "server stopped with error");
                    ExitCode::FAILURE
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!(service = "phonebook", event = "shutdown_signal", "received Ctrl+C, shutting down");
                ExitCode::SUCCESS
            }
        }
    })
}
