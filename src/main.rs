use alloy::primitives::B256;
use anyhow::{ensure, Context, Result};
use clap::{Parser, Subcommand};
use ctf_settler::config::{Config, Credentials};
use ctf_settler::onchain::{format_usdc, RpcChain};
use ctf_settler::positions::PositionsClient;
use ctf_settler::settle::{PositionRedeemer, SettlementOrchestrator};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "settler")]
#[command(about = "Merge and redeem Polymarket positions held in a Gnosis Safe")]
struct Args {
    /// Path to TOML config (optional; env-only config when absent)
    #[arg(long, default_value = "settler.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Settle every condition the Safe holds
    RedeemAll,

    /// Settle conditions in markets matching a slug
    RedeemMarket {
        #[arg(long)]
        slug: String,
    },

    /// Merge balanced YES/NO positions without waiting for resolution
    MergeBalanced,

    /// Merge and, if resolved, redeem a single condition
    Settle {
        #[arg(long)]
        condition: B256,

        /// Route through the neg-risk adapter
        #[arg(long)]
        neg_risk: bool,
    },

    /// Merge a single condition only
    Merge {
        #[arg(long)]
        condition: B256,

        #[arg(long)]
        neg_risk: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let config = if args.config.exists() {
        Config::load(&args.config)
            .with_context(|| format!("failed to load {}", args.config.display()))?
    } else {
        Config::from_env()
    };

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .init();
    }

    info!("settler v{} starting", env!("CARGO_PKG_VERSION"));
    if !args.config.exists() {
        info!(path = %args.config.display(), "no config file found, using env-only config");
    }

    config.validate()?;
    let creds = Credentials::from_config(&config.wallet)?;
    info!(safe = %creds.safe, owner = %creds.signer.address(), "loaded credentials");

    let chain = Arc::new(RpcChain::connect_http(&config.chain.rpc_url, creds.signer.clone())?);
    let orchestrator = SettlementOrchestrator::new(
        chain,
        creds.signer,
        creds.safe,
        config.settlement_settings(),
    );
    let positions = PositionsClient::new(
        config.positions.data_api_url.clone(),
        creds.safe,
        config.positions.size_threshold,
        config.positions.page_limit,
        config.positions.max_pages,
    )?;
    let redeemer = PositionRedeemer::new(positions, orchestrator);

    match args.command {
        Commands::RedeemAll => {
            let tally = redeemer.redeem_all_positions().await;
            info!(successful = tally.successful, total = tally.total, "redeem-all finished");
            ensure!(tally.failed() == 0, "{} of {} conditions failed", tally.failed(), tally.total);
        }
        Commands::RedeemMarket { slug } => {
            let tally = redeemer.redeem_market_positions(&slug).await;
            info!(market = %slug, successful = tally.successful, total = tally.total, "redeem-market finished");
            ensure!(tally.failed() == 0, "{} of {} conditions failed", tally.failed(), tally.total);
        }
        Commands::MergeBalanced => {
            let summary = redeemer.merge_balanced_positions().await;
            info!(
                merges = summary.merges,
                total = summary.total,
                recovered = %format_usdc(summary.recovered),
                "merge-balanced finished"
            );
        }
        Commands::Settle { condition, neg_risk } => {
            let outcome = redeemer.orchestrator().settle_condition(condition, neg_risk).await;
            info!(condition = %condition, state = %outcome.state(), ?outcome, "settle finished");
            ensure!(outcome.is_success(), "settlement failed for {condition}");
        }
        Commands::Merge { condition, neg_risk } => {
            let outcome = redeemer.orchestrator().merge_condition(condition, neg_risk).await;
            info!(
                condition = %condition,
                merged = %format_usdc(outcome.merged_amount()),
                "merge finished"
            );
            ensure!(outcome.is_success(), "merge failed for {condition}");
        }
    }

    Ok(())
}
