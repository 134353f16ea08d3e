use anyhow::Context;
use clap::Parser;
use lottery_server::{
    config::{self, Config},
    draw::WinningNumber,
    lottery::Lottery,
    server::Server,
    shutdown,
    storage::FileBetStore,
};
use tokio::sync::watch;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    config::init_tracing(&config.log_level);
    tracing::debug!("loaded configuration: {:?}", config);

    let agencies = usize::try_from(config.agencies).context("too many agencies")?;
    let lottery = Lottery::new(
        FileBetStore::new(&config.bets_file),
        WinningNumber(config.winning_number),
        agencies,
    )
    .shared();

    let server = Server::bind(config.listen_addr(), config.listen_backlog, lottery)
        .with_context(|| format!("failed to listen on {}", config.listen_addr()))?;
    tracing::info!("server is listening on: {}", server.local_addr()?);

    let (stop, stopped) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(err) = shutdown::signal().await {
            tracing::error!("failed to listen for shutdown signals: {}", err);
            return;
        }

        tracing::info!("action: signal_received | result: in_progress");
        let _ = stop.send(true);
    });

    server.run(stopped).await;

    Ok(())
}
