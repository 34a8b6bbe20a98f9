// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tracing::error;

use robot_agent::config::RobotAgentConfig;

#[tokio::main]
async fn main() {
    let config = RobotAgentConfig::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone()));

    if config.log_format == "json" {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    if let Err(e) = robot_agent::run::run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}
