mod availability;
mod cli;
mod composite;
mod config;
mod download;
mod error;
mod frequency;
mod listing;
mod parquet;
mod raster;
mod tile;
mod vector;

use anyhow::{Error, Result};
use clap::Parser;
use cli::{command, Cli, Commands};
use config::Settings;
use download::HttpFetcher;
use env_logger::Env;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let settings = Settings::resolve(
        cli.options.config.as_deref(),
        cli.options.region,
        cli.options.overrides(),
    )?;
    let fetcher = HttpFetcher::new();

    match &cli.command {
        Commands::Availability {} => match command::availability(&settings, &fetcher).await {
            Ok((_, filename)) => println!("File saved to `{}`", filename),
            Err(e) => eprintln!("Error: {:#}", e),
        },
        Commands::Current {} => match command::current(&settings, &fetcher).await {
            Ok(filename) => println!("File saved to `{}`", filename),
            Err(e) => eprintln!("Error: {:#}", e),
        },
        Commands::Daily { from, to } => {
            match command::daily(&settings, &fetcher, *from, *to).await {
                Ok((summary, dir)) => println!("{}; files saved to `{}`", summary, dir),
                Err(e) => eprintln!("Error: {:#}", e),
            }
        }
        Commands::Frequency { period } => match command::frequency(&settings, *period) {
            Ok((count, dir)) => println!("{} files saved to `{}`", count, dir),
            Err(e) => eprintln!("Error: {:#}", e),
        },
        Commands::Run { from, to } => match command::run(&settings, &fetcher, *from, *to).await {
            Ok((summary, dir)) => println!("{}; files saved to `{}`", summary, dir),
            Err(e) => eprintln!("Error: {:#}", e),
        },
    }

    Ok(())
}
