//! `metalstack`: precious-metals collection tracker with a live spot-price
//! dashboard in the terminal.

mod commands;
mod logging;
mod terminal;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use metalstack_core::models::metal::Metal;
use metalstack_core::models::period::Period;
use metalstack_core::AppConfig;

#[derive(Debug, Parser)]
#[command(
    name = "metalstack",
    version,
    about = "Track your precious metals portfolio with real-time spot prices"
)]
struct Cli {
    /// Metal to show first (gold, silver, platinum, palladium)
    #[arg(short, long)]
    metal: Option<Metal>,

    /// Chart period (1w, 1m, ytd, 1y, 5y)
    #[arg(short, long)]
    period: Option<Period>,

    /// Start with the price chart visible
    #[arg(short, long)]
    chart: bool,

    /// Print a single frame and exit instead of running the dashboard
    #[arg(short = '1', long)]
    once: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List all items in the collection with current values
    List,

    /// Add an item to the collection
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        metal: Metal,
        /// Fine weight of one item in troy ounces
        #[arg(long)]
        weight: f64,
        #[arg(long, default_value_t = 1)]
        quantity: u32,
        #[arg(long)]
        year: Option<i32>,
    },

    /// Print the price chart of one metal
    Chart {
        #[arg(short, long, default_value = "gold")]
        metal: Metal,
        /// 1w, 1m, ytd, 1y or 5y
        #[arg(short, long, default_value = "1m")]
        period: Period,
    },

    /// Remove an item by its position in `list` (1-based)
    Remove { index: usize },

    /// Change fields of an item by its position in `list` (1-based)
    Edit {
        index: usize,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        metal: Option<Metal>,
        #[arg(long)]
        weight: Option<f64>,
        #[arg(long)]
        quantity: Option<u32>,
        #[arg(long)]
        year: Option<i32>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env is optional; real environment variables win.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let interactive = cli.command.is_none() && !cli.once;
    if let Err(e) = logging::init_logging(&config, interactive) {
        eprintln!("Warning: logging disabled: {e}");
    }
    tracing::debug!(?config, "configuration loaded");

    let result = match cli.command {
        Some(Command::List) => commands::list(&config).await,
        Some(Command::Add {
            name,
            metal,
            weight,
            quantity,
            year,
        }) => commands::add(&config, name, metal, weight, quantity, year),
        Some(Command::Chart { metal, period }) => commands::chart(&config, metal, period).await,
        Some(Command::Remove { index }) => commands::remove(&config, index),
        Some(Command::Edit {
            index,
            name,
            metal,
            weight,
            quantity,
            year,
        }) => commands::edit(
            &config,
            index,
            commands::ItemEdit {
                name,
                metal,
                weight,
                quantity,
                year,
            },
        ),
        None if cli.once => commands::once(&config, cli.metal, cli.period, cli.chart).await,
        None => commands::dashboard(&config, cli.metal, cli.period, cli.chart).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
