pub mod cli;
mod commands;
mod config;

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use common::logger::init_logger;
use sources::RpcClient;
use store::SqliteRecordStore;

use cli::{Cli, Command};
use config::IndexerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Config errors surface before any logging or processing.
    let cfg = IndexerConfig::from_env()?.with_overrides(&cli.overrides);

    init_logger("wap-indexer", cfg.json_logs);
    info!(
        database_url = %cfg.database_url,
        rpc_url = %cfg.rpc_url,
        oracle_feed = %cfg.oracle_feed,
        mode = %cfg.mode,
        start_sample_id = cfg.start_sample_id,
        "configuration loaded"
    );

    let store = Arc::new(SqliteRecordStore::new(&cfg.database_url).await?);

    match cli.command {
        Command::Replay { feed } => {
            let rpc = Arc::new(RpcClient::new(cfg.rpc_url.clone())?);
            let summary = commands::replay(store, rpc.clone(), rpc, &cfg, &feed).await?;
            info!(
                processed = summary.processed,
                skipped_blank = summary.skipped_blank,
                "done"
            );
        }
        Command::Status => commands::status(store.as_ref()).await?,
    }

    Ok(())
}
