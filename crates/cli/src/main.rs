// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use mortality_cli::config::EmergentConfig;
use mortality_cli::run;
use tracing::error;

#[tokio::main]
async fn main() {
    let config = EmergentConfig::parse();

    if let Err(err) = config.validate() {
        eprintln!("error: {err:#}");
        std::process::exit(2);
    }

    run::init_tracing();

    match run::run(config).await {
        Ok(result) => {
            tracing::info!(path = %result.bundle_path.display(), interrupted = result.interrupted, "bundle written");
            std::process::exit(if result.interrupted { 130 } else { 0 });
        }
        Err(err) => {
            error!("fatal: {err:#}");
            std::process::exit(1);
        }
    }
}
