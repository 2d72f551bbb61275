mod config;
mod error;
mod fetcher;
mod loader;
mod models;
mod pipeline;
mod quote_api;
mod scraper;
mod series;
mod sources;
mod storage;
#[cfg(test)]
mod testing;
mod utils;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::AppConfig;
use crate::pipeline::Pipeline;
use crate::quote_api::YahooQuoteApi;
use crate::series::SeriesFetcher;
use crate::sources::SourceCode;
use crate::storage::PriceStore;

#[derive(Parser)]
#[command(name = "fund-price-tracker", about = "Daily fund price scraper", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch today's price for every instrument and update the tables
    Update {
        /// Instrument list, one `source,identifier` per line (default: from config)
        #[arg(short, long)]
        funds: Option<PathBuf>,
    },

    /// Download a daily OHLC series for one symbol from the quote API
    History {
        symbol: String,

        /// First day, YYYY-MM-DD
        #[arg(long)]
        start: String,

        /// Last day, YYYY-MM-DD
        #[arg(long)]
        end: String,
    },

    /// Print the latest prices table
    Latest,

    /// Show price history statistics
    Stats,

    /// List the configured price sources
    Sources,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "fund_price_tracker=info,warn",
        1 => "fund_price_tracker=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let config = AppConfig::load()?;

    match cli.command {
        Command::Update { funds } => {
            let _t = utils::Timer::start("Daily update");
            let funds = funds.unwrap_or_else(|| config.input.funds_file.clone());
            Pipeline::new(config)?.run(&funds).await?;
        }

        Command::History { symbol, start, end } => {
            let _t = utils::Timer::start(format!("History for {}", symbol));
            let api = Arc::new(YahooQuoteApi::new(&config.api)?);
            let fetcher = SeriesFetcher::new(api, PriceStore::new(&config.storage));
            match fetcher.fetch_series(&symbol, &start, &end).await {
                Ok(path) => println!("{}", path.display()),
                Err(e) => bail!("{}", e.to_error_string()),
            }
        }

        Command::Latest => {
            let rows = PriceStore::new(&config.storage).read_latest()?;
            if rows.is_empty() {
                println!("No prices yet — run `fund-price-tracker update` first.");
            } else {
                for o in &rows {
                    println!("  {:<16} {}  {}", o.fund, o.date, o.price);
                }
            }
        }

        Command::Stats => {
            let store = PriceStore::new(&config.storage);
            let stats = store.history_stats()?;
            println!("─────────────────────────────────");
            println!("  Fund prices — History Stats");
            println!("─────────────────────────────────");
            println!("  File     : {}", store.history_path().display());
            println!("  Funds    : {}", utils::fmt_count(stats.funds));
            println!("  Rows     : {}", utils::fmt_count(stats.rows));
            println!("  From     : {}", stats.first_date.map(|d| d.to_string()).unwrap_or("—".into()));
            println!("  To       : {}", stats.last_date.map(|d| d.to_string()).unwrap_or("—".into()));
            println!("─────────────────────────────────");
        }

        Command::Sources => {
            for code in SourceCode::ALL {
                println!("  {}  {}", code, code.description());
            }
        }
    }

    Ok(())
}
