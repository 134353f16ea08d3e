//: An agency: submits its dataset of bets in batches,
//: then waits for the draw and reports how many of its bets won.

use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use clap::Parser;
use lottery_server::{
    client::{self, AgencyClient},
    config, shutdown,
};

#[derive(Parser, Debug)]
#[command(name = "agency", about = "Submits an agency's bets to the lottery server")]
struct AgencyConfig {
    /// Agency id
    #[arg(long, env = "CLI_ID")]
    id: String,

    /// Lottery server address
    #[arg(long, env = "CLI_SERVER_ADDRESS", default_value = "127.0.0.1:12345")]
    server_address: String,

    /// Dataset of bets: first_name,last_name,document,birthdate,number
    #[arg(long, env = "CLI_DATA_FILE")]
    data_file: PathBuf,

    /// Maximum number of bets per batch
    #[arg(
        long,
        env = "CLI_BATCH_MAX_AMOUNT",
        default_value_t = 100,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    batch_max_amount: u64,

    /// How long to wait before asking for the winners again
    #[arg(long, env = "CLI_RETRY_INTERVAL_MS", default_value_t = 1000)]
    retry_interval_ms: u64,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, env = "LOGGING_LEVEL", default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AgencyConfig::parse();
    config::init_tracing(&config.log_level);

    tokio::select! {
        result = run(&config) => result,
        result = shutdown::signal() => {
            tracing::info!(agency = %config.id, "action: signal_received | result: success");
            Ok(result?)
        }
    }
}

async fn run(config: &AgencyConfig) -> anyhow::Result<()> {
    let bets = client::load_dataset(&config.data_file, &config.id)
        .await
        .with_context(|| format!("failed to read {}", config.data_file.display()))?;

    let max_amount = usize::try_from(config.batch_max_amount).unwrap_or(usize::MAX);
    let client = AgencyClient::new(config.id.clone(), config.server_address.clone());

    for batch in client::split_batches(bets, max_amount) {
        client
            .send_batch(&batch)
            .await
            .context("failed to send a batch")?;
        tracing::info!(
            agency = %client.agency(),
            count = batch.len(),
            "action: batch_sent | result: success"
        );
    }

    client.finish().await.context("failed to notify the end of the batches")?;
    tracing::info!(agency = %client.agency(), "action: batch_end | result: success");

    let retry_interval = Duration::from_millis(config.retry_interval_ms);
    let winners = loop {
        match client.winners().await.context("failed to query the winners")? {
            Some(winners) => break winners,
            None => tokio::time::sleep(retry_interval).await,
        }
    };

    tracing::info!(
        agency = %client.agency(),
        count = winners.len(),
        "action: query_winners | result: success"
    );

    Ok(())
}
