mod cli;
mod config;
mod contracts;
mod farm;
mod fetcher;
mod pow;
mod rpc;
mod server;
mod signer;
mod tracing;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::config::Config;
use crate::contracts::KaleContract;
use crate::farm::{Farm, Ledger};
use crate::fetcher::Fetcher;
use crate::pow::{Solver, WorkInput};
use crate::server::AppState;
use crate::tracing::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    crate::tracing::init_stdout();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            let kale = KaleContract::from_config(&config.ledger)?;
            info!(contract = %config.ledger.contract_id, rpc = %config.ledger.rpc_url, "Connected to KALE contract");

            let state = Arc::new(AppState {
                fetcher: Fetcher::from_config(config.fetch)?,
                farm: Farm::new(kale, config.farm),
            });
            server::serve(config.bind_addr, state).await?;
        }

        Commands::Holders { limit } => {
            let fetcher = Fetcher::from_config(config.fetch)?;
            let limit = limit.unwrap_or_else(|| fetcher.default_limit());
            let board = fetcher.top_holders(limit).await?;

            println!(
                "Top {} of {} KALE holders (source: {})",
                board.holders.len(),
                board.holder_count,
                board.endpoint
            );
            for holder in &board.holders {
                println!(
                    "{:>3}. {}  {:>18.2} KALE  {:>6.2}%",
                    holder.rank,
                    holder.record.short_address(),
                    holder.balance,
                    holder.percentage
                );
            }
        }

        Commands::Price => {
            let fetcher = Fetcher::from_config(config.fetch)?;
            let quote = fetcher.price().await?;
            if !quote.is_live() {
                warn!("No live price source answered, showing the configured placeholder");
            }
            println!("{}", serde_json::to_string_pretty(&quote)?);
            if let Some(change) = quote.change_24h_percent() {
                println!("24h change: {:+.2}%", change);
            }
        }

        Commands::Solve {
            index,
            entropy,
            farmer,
            max_attempts,
        } => {
            let input = WorkInput::new(index, cli::parse_entropy(&entropy)?, &farmer)?;
            let attempts = max_attempts.unwrap_or(config.farm.max_attempts);
            let solver = Solver::new(config.farm.pow_hash, attempts, config.farm.target_score);

            let attempt = tokio::task::spawn_blocking(move || solver.solve(&input))
                .await?
                .with_context(|| format!("No nonce scored above zero within {} attempts", attempts))?;
            println!("{}", serde_json::to_string_pretty(&attempt)?);
        }

        Commands::Health => {
            let kale = KaleContract::from_config(&config.ledger)?;
            let health = kale.health().await?;
            println!("{}", serde_json::to_string_pretty(&health)?);
        }
    }

    Ok(())
}
