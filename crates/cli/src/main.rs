mod browser;
mod cli;
mod logging;

use clap::Parser;
use tracing::{error, info};

use crate::browser::{CdpDriver, LaunchOptions};
use crate::cli::Cli;
use xpost::{run_flow, FileSessionStore, StdinPrompt};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    if let Err(err) = run(cli).await {
        error!(target = "xpost", error = %err, "run failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.flow_config()?;

    let store = FileSessionStore::new(cli.session_file.clone());
    let driver = CdpDriver::launch(LaunchOptions {
        headless: cli.effective_headless(),
        user_agent: cli.engine.user_agent(),
        chrome: cli.chrome.clone(),
    })
    .await?;

    let result = run_flow(&driver, &store, &config, &StdinPrompt).await;
    driver.close().await;
    result?;

    info!(target = "xpost", "done");
    Ok(())
}
