//! Checks for a new CHR release once and exits. Meant to be run on a schedule, such as a Kubernetes CronJob.

use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt as _, util::SubscriberInitExt as _};

use chr_release_watch::{
    checker::{GitHubChecker, exit_code},
    env::{Config, json_logs},
};

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json_logs() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    init_tracing();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(err) => {
            error!("{err:#}");
            return ExitCode::FAILURE;
        }
    };
    info!(
        "watching {} for releases, dispatching {} on {}",
        config.download_page_url, config.workflow_id, config.repository
    );

    let checker = match GitHubChecker::from_config(&config) {
        Ok(checker) => checker,
        Err(err) => {
            error!("{err:#}");
            return ExitCode::FAILURE;
        }
    };

    ExitCode::from(exit_code(&checker.run().await))
}
