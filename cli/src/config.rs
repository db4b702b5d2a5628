use anyhow::Context;

use model::{Address, AveragingMode};

use crate::cli::Overrides;

/// FTM/USD aggregator feed (8 decimals) read for the second leg of the price.
pub const DEFAULT_ORACLE_FEED: &str = "0xf4766552D15AE4d256Ad41B6cf2933482B0680dc";

#[derive(Clone, Debug)]
pub struct IndexerConfig {
    /// SQLite connection string. `sqlite::memory:` is accepted.
    pub database_url: String,

    /// JSON-RPC endpoint answering `eth_call` at historical blocks.
    pub rpc_url: String,

    pub oracle_feed: Address,

    /// Weighting used when folding samples into the running sums.
    pub mode: AveragingMode,

    /// Only consulted when the metadata record does not exist yet.
    pub start_sample_id: u64,

    pub json_logs: bool,
}

impl IndexerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://wap_indexer.db".to_string());
        let rpc_url = lookup("RPC_URL").unwrap_or_else(|| "http://127.0.0.1:8545".to_string());

        let oracle_feed = lookup("ORACLE_FEED_ADDRESS")
            .as_deref()
            .unwrap_or(DEFAULT_ORACLE_FEED)
            .parse::<Address>()
            .context("invalid ORACLE_FEED_ADDRESS")?;

        let mode = match lookup("AVERAGING_MODE") {
            Some(raw) => raw
                .parse::<AveragingMode>()
                .context("invalid AVERAGING_MODE")?,
            None => AveragingMode::default(),
        };

        let start_sample_id = match lookup("START_SAMPLE_ID") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("invalid START_SAMPLE_ID {raw:?}"))?,
            None => 1,
        };

        let json_logs = lookup("APP_ENV").is_some_and(|env| env == "production");

        Ok(Self {
            database_url,
            rpc_url,
            oracle_feed,
            mode,
            start_sample_id,
            json_logs,
        })
    }

    pub fn with_overrides(mut self, flags: &Overrides) -> Self {
        if let Some(url) = &flags.database_url {
            self.database_url = url.clone();
        }
        if let Some(url) = &flags.rpc_url {
            self.rpc_url = url.clone();
        }
        if let Some(feed) = flags.oracle_feed {
            self.oracle_feed = feed;
        }
        if let Some(mode) = flags.mode {
            self.mode = mode.into();
        }
        if let Some(id) = flags.start_sample_id {
            self.start_sample_id = id;
        }
        self.json_logs |= flags.json_logs;
        self
    }
}
