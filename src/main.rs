//! CLI entry point for the LP band rebalancer.
//!
//! Subcommands:
//!   - `pools`       List pools known to the gateway
//!   - `positions`   List a wallet's positions
//!   - `plan-band`   Target bin range for a band around the mid price
//!   - `plan-order`  Bins for a synthetic limit or stop order
//!   - `backtest`    Replay a candle CSV against the band strategy
//!   - `sweep`       Parallel bandBps x cooldownSec sweep over a candle CSV
//!   - `link`        Issue a wallet link code

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use lp_rebalancer_lib::commands;
use lp_rebalancer_lib::data::loader;
use lp_rebalancer_lib::models::api::{AdvancedOrderPlanRequest, RebalancePlanRequest};
use lp_rebalancer_lib::models::config::AppConfig;
use lp_rebalancer_lib::models::order::{AdvancedOrderKind, AdvancedOrderSpec};
use lp_rebalancer_lib::models::result::{BacktestParams, ObjectiveFunction, SweepConfig, SweepRange};
use lp_rebalancer_lib::utils::export;
use lp_rebalancer_lib::{init_tracing, AppState};

#[derive(Parser)]
#[command(
    name = "lp-rebalancer",
    version,
    about = "Band planning and backtesting for concentrated-liquidity positions",
    propagate_version = true
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List pools known to the gateway
    Pools,
    /// List positions held by a wallet
    Positions {
        #[arg(long)]
        wallet: String,
    },
    /// Plan the target bin range for a band around the current price
    PlanBand {
        #[arg(long)]
        wallet: String,
        #[arg(long)]
        pool: String,
        #[arg(long)]
        band_bps: u32,
    },
    /// Plan the bins of a limit-buy, limit-sell or stop-loss order
    PlanOrder(PlanOrderArgs),
    /// Run a band backtest over a candle CSV
    Backtest(BacktestArgs),
    /// Sweep band widths and cooldowns over a candle CSV
    Sweep(SweepArgs),
    /// Issue a one-shot code that links a chat to a wallet
    Link {
        #[arg(long)]
        wallet: String,
    },
}

#[derive(Parser)]
struct PlanOrderArgs {
    #[arg(long)]
    wallet: String,
    #[arg(long)]
    pool: String,
    /// limitBuy, limitSell or stopLoss
    #[arg(long)]
    kind: AdvancedOrderKind,
    #[arg(long)]
    target_price: f64,
    #[arg(long)]
    size_base: Option<String>,
    #[arg(long)]
    size_quote: Option<String>,
}

#[derive(Parser)]
struct BacktestArgs {
    /// Candle CSV with timestamp, open, high, low and close columns
    #[arg(long)]
    csv: PathBuf,
    #[arg(long)]
    band_bps: u32,
    #[arg(long, default_value_t = 0)]
    cooldown_sec: u64,
    /// Overrides LP_FEE_PER_EXIT
    #[arg(long)]
    fee_per_exit: Option<f64>,
    /// Write equity.csv, exits.csv and metrics.csv into this directory
    #[arg(long)]
    export_dir: Option<PathBuf>,
    /// Print only the metrics instead of the full results
    #[arg(long, default_value_t = false)]
    summary: bool,
}

#[derive(Parser)]
struct SweepArgs {
    #[arg(long)]
    csv: PathBuf,
    #[arg(long)]
    band_min: u64,
    #[arg(long)]
    band_max: u64,
    #[arg(long, default_value_t = 10)]
    band_step: u64,
    #[arg(long, default_value_t = 0)]
    cooldown_min: u64,
    #[arg(long, default_value_t = 0)]
    cooldown_max: u64,
    #[arg(long, default_value_t = 60)]
    cooldown_step: u64,
    /// totalFees or timeInBand
    #[arg(long, default_value = "totalFees")]
    objective: ObjectiveFunction,
    #[arg(long)]
    fee_per_exit: Option<f64>,
    /// Write the ranked results to this CSV file
    #[arg(long)]
    output: Option<PathBuf>,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = AppConfig::from_env().context("reading LP_* configuration")?;
    let state = AppState::from_config(config).context("building application state")?;

    match cli.command {
        Commands::Pools => print_json(&commands::list_pools(&state).await?)?,
        Commands::Positions { wallet } => print_json(&commands::get_positions(&state, &wallet).await?)?,
        Commands::PlanBand { wallet, pool, band_bps } => {
            let req = RebalancePlanRequest { wallet, pool, band_bps };
            print_json(&commands::plan_rebalance(&state, req).await?)?
        }
        Commands::PlanOrder(args) => {
            let req = AdvancedOrderPlanRequest {
                wallet: args.wallet,
                pool: args.pool,
                spec: AdvancedOrderSpec {
                    kind: args.kind,
                    target_price: args.target_price,
                    size_base: args.size_base,
                    size_quote: args.size_quote,
                },
            };
            print_json(&commands::plan_advanced_order(&state, req).await?)?
        }
        Commands::Backtest(args) => {
            let candles = loader::load_candles_csv(&args.csv)?;
            let fee = args.fee_per_exit.unwrap_or(state.config.fee_per_exit);
            let params = BacktestParams::new(args.band_bps, args.cooldown_sec).with_fee_per_exit(fee);
            let results = commands::backtest_candles(&state, candles, params).await?;

            if let Some(dir) = &args.export_dir {
                let written = export::export_backtest(&results, dir)?;
                info!("Wrote {} files to {}", written.len(), dir.display());
            }
            if args.summary {
                print_json(&results.metrics)?
            } else {
                print_json(&results)?
            }
        }
        Commands::Sweep(args) => {
            let candles = loader::load_candles_csv(&args.csv)?;
            let config = SweepConfig {
                band_bps: SweepRange {
                    min: args.band_min,
                    max: args.band_max,
                    step: args.band_step,
                },
                cooldown_sec: SweepRange {
                    min: args.cooldown_min,
                    max: args.cooldown_max,
                    step: args.cooldown_step,
                },
                fee_per_exit: args.fee_per_exit,
                objective: args.objective,
            };
            let results = commands::sweep_candles(&state, candles, config).await?;
            if let Some(path) = &args.output {
                export::write_sweep_csv(&results, path)?;
            }
            print_json(&results)?
        }
        Commands::Link { wallet } => print_json(&commands::issue_link_code(&state, &wallet).await?)?,
    }

    Ok(())
}
