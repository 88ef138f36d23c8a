mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "calreg", about = "Rigid motion correction for imaging movies")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show binary movie metadata
    Info(commands::info::InfoArgs),
    /// Register a movie and rewrite it shifted
    Register(commands::register::RegisterArgs),
    /// Estimate the bidirectional scan offset of a movie
    EstimateBidiphase(commands::bidiphase::BidiphaseArgs),
    /// Print or save a default registration config as TOML
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Info(args) => commands::info::run(args),
        Commands::Register(args) => commands::register::run(args),
        Commands::EstimateBidiphase(args) => commands::bidiphase::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
