use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use model::{Address, AveragingMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeCli {
    /// Weight by elapsed time (TWAP)
    #[value(alias = "twap")]
    Time,
    /// Weight by the change of the first pool reserve (VWAP)
    #[value(alias = "vwap")]
    Volume,
}

impl From<ModeCli> for AveragingMode {
    fn from(mode: ModeCli) -> Self {
        match mode {
            ModeCli::Time => AveragingMode::Time,
            ModeCli::Volume => AveragingMode::Volume,
        }
    }
}

#[derive(Debug, Parser)]
#[clap(name = "wap-indexer", version)]
pub struct Cli {
    #[clap(flatten)]
    pub overrides: Overrides,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Feed newline-delimited JSON observations through the accumulator
    Replay {
        /// File to read, or `-` for stdin
        #[clap(long, default_value = "-")]
        feed: PathBuf,
    },

    /// Print metadata, the last pointer and the latest aggregate
    Status,
}

/// Flags that win over the environment. Unset flags leave the env value.
#[derive(Debug, Default, Args)]
pub struct Overrides {
    /// SQLite store location
    #[clap(long, global = true)]
    pub database_url: Option<String>,

    /// JSON-RPC endpoint used for eth_call
    #[clap(long, global = true)]
    pub rpc_url: Option<String>,

    /// Oracle feed contract
    #[clap(long, global = true)]
    pub oracle_feed: Option<Address>,

    /// Averaging mode
    #[clap(long, value_enum, global = true)]
    pub mode: Option<ModeCli>,

    /// Initial nextSampleId when metadata is first created
    #[clap(long = "start-id", global = true)]
    pub start_sample_id: Option<u64>,

    /// Emit JSON logs
    #[clap(long, global = true)]
    pub json_logs: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_replay_with_overrides() {
        let cli = Cli::parse_from([
            "wap-indexer",
            "replay",
            "--feed",
            "blocks.ndjson",
            "--mode",
            "vwap",
            "--start-id",
            "1000",
        ]);

        match cli.command {
            Command::Replay { feed } => assert_eq!(feed, PathBuf::from("blocks.ndjson")),
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.overrides.mode, Some(ModeCli::Volume));
        assert_eq!(
            cli.overrides.mode.map(AveragingMode::from),
            Some(AveragingMode::Volume)
        );
        assert_eq!(cli.overrides.start_sample_id, Some(1_000));
        assert!(!cli.overrides.json_logs);
    }

    #[test]
    fn rejects_unknown_mode() {
        let res = Cli::try_parse_from(["wap-indexer", "status", "--mode", "median"]);
        assert!(res.is_err());
    }

    #[test]
    fn rejects_malformed_oracle_address() {
        let res = Cli::try_parse_from(["wap-indexer", "status", "--oracle-feed", "0x1234"]);
        assert!(res.is_err());
    }
}
