//! ibcload CLI
//!
//! Fills blocks of Cosmos chains with IBC transfer transactions.

use clap::{Args, Parser, Subcommand, ValueEnum};
use ibcload_spammer::client::RpcConnector;
use ibcload_spammer::config::{AppConfig, ConfigError};
use ibcload_spammer::orchestrator::{MultiTransferRequest, Orchestrator, TransferRequest};
use ibcload_types::{
    ChainId, Coin, IbcHeight, PacketTimeout, RunParameters, DEFAULT_PACKET_TIMEOUT_TIMESTAMP,
};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "ibcload")]
#[command(about = "Block-paced IBC transfer load generator")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, default_value = AppConfig::DEFAULT_PATH)]
    config: PathBuf,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Args)]
struct TimeoutArgs {
    /// Packet timeout height on the destination chain; 0-0 disables it
    #[arg(long, default_value = "0-1000")]
    packet_timeout_height: IbcHeight,

    /// Packet timeout timestamp in nanoseconds; 0 disables it
    #[arg(long, default_value_t = DEFAULT_PACKET_TIMEOUT_TIMESTAMP)]
    packet_timeout_timestamp: u64,

    /// Treat timeout values as absolute instead of relative
    #[arg(long)]
    absolute_timeouts: bool,
}

impl From<TimeoutArgs> for PacketTimeout {
    fn from(args: TimeoutArgs) -> Self {
        PacketTimeout {
            height: args.packet_timeout_height,
            timestamp_nanos: args.packet_timeout_timestamp,
            absolute: args.absolute_timeouts,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Send transfers over one channel
    #[command(visible_alias = "t")]
    Transfer {
        src_chain_id: String,
        src_port: String,
        src_channel: String,
        receiver: String,
        /// Amount with denom, e.g. 10uatom
        amount: String,
        /// Number of blocks to fill
        blocks: String,
        /// Transactions per block
        tx_num: String,
        /// Transfer messages per transaction
        msg_num: String,

        #[command(flatten)]
        timeouts: TimeoutArgs,
    },

    /// Send transfers from every source chain to every destination chain
    #[command(visible_alias = "mt")]
    MultiTransfer {
        /// Comma-separated source chain ids
        src_chains: String,
        /// Comma-separated destination chain ids
        dst_chains: String,
        /// Amount per message in each source chain's token denom
        amount: u128,
        /// Number of blocks to fill
        blocks: String,
        /// Transactions per block
        tx_num: String,
        /// Transfer messages per transaction
        msg_num: String,

        #[command(flatten)]
        timeouts: TimeoutArgs,
    },
}

fn init_tracing(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn parse_chain_list(list: &str) -> Vec<ChainId> {
    list.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(ChainId::from)
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_format);

    let config = AppConfig::read(&cli.config)?;
    info!(path = %cli.config.display(), chains = config.ibc.chains.len(), "Loaded config");

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling in-flight requests");
                cancel.cancel();
            }
        });
    }

    let connector = RpcConnector::new(config.client.clone(), cancel);
    let orchestrator = Orchestrator::new(connector, config);

    let report = match cli.command {
        Commands::Transfer {
            src_chain_id,
            src_port,
            src_channel,
            receiver,
            amount,
            blocks,
            tx_num,
            msg_num,
            timeouts,
        } => {
            let coin: Coin = amount.parse().map_err(ConfigError::from)?;
            let params = RunParameters::parse(&blocks, &tx_num, &msg_num).map_err(ConfigError::from)?;
            orchestrator
                .run_single(TransferRequest {
                    source: ChainId::new(src_chain_id),
                    port: src_port,
                    channel: src_channel,
                    receiver,
                    coin,
                    params,
                    timeout: timeouts.into(),
                })
                .await?
        }

        Commands::MultiTransfer {
            src_chains,
            dst_chains,
            amount,
            blocks,
            tx_num,
            msg_num,
            timeouts,
        } => {
            let params = RunParameters::parse(&blocks, &tx_num, &msg_num).map_err(ConfigError::from)?;
            orchestrator
                .run_multi(MultiTransferRequest {
                    sources: parse_chain_list(&src_chains),
                    destinations: parse_chain_list(&dst_chains),
                    amount,
                    params,
                    timeout: timeouts.into(),
                })
                .await?
        }
    };

    report.print();

    if report.is_success() {
        return Ok(());
    }
    let failed = report.failures().count();
    let cancelled = report.cancelled();
    if cancelled == failed {
        return Err(format!("Interrupted: {cancelled} chain pairs did not finish").into());
    }
    Err(format!(
        "{failed} of {} chain pairs failed ({cancelled} cancelled)",
        report.outcomes.len()
    )
    .into())
}
