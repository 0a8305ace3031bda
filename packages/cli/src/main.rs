#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `bidboard`: scrape procurement listings into browsable tables.
//!
//! With a subcommand it runs non-interactively; without one it falls back
//! to a `dialoguer` menu. Logging goes through
//! [`bidboard_cli_utils::init_logger`] so log lines and the scrape spinner
//! never fight for the terminal.

mod interactive;
mod scrape;

use std::path::PathBuf;

use bidboard_listing::ListingDefinition;
use bidboard_listing::pipeline::ScrapeOptions;
use bidboard_listing::registry::{all_listings, find_listing, load_listing_file};
use bidboard_scraper::Transport;
use clap::{Parser, Subcommand};

use crate::scrape::ScrapeRequest;

#[derive(Parser)]
#[command(name = "bidboard", about = "Procurement listing scraper", version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List every configured listing
    List,
    /// Scrape one listing and open the results as an HTML page
    Scrape {
        /// Listing id (see `bidboard list`)
        #[arg(required_unless_present = "file", conflicts_with = "file")]
        id: Option<String>,
        /// Load the listing definition from a TOML file instead
        #[arg(long)]
        file: Option<PathBuf>,
        /// Only keep rows containing this keyword (case-insensitive)
        #[arg(long)]
        keyword: Option<String>,
        /// Lower the listing's page limit
        #[arg(long)]
        max_pages: Option<u32>,
        /// Override the fetch transport (`direct`, `rendered`, `render-proxy`)
        #[arg(long, value_parser = parse_transport)]
        via: Option<Transport>,
        /// Write the page but do not open it
        #[arg(long)]
        no_open: bool,
    },
    /// Start the dashboard
    Serve,
}

fn parse_transport(value: &str) -> Result<Transport, String> {
    value
        .parse()
        .map_err(|_| format!("unknown transport '{value}' (expected direct, rendered or render-proxy)"))
}

/// Prints the listing table for `bidboard list`.
pub fn print_listings(listings: &[ListingDefinition]) {
    println!("{:<30} {:<14} TITLE", "ID", "TRANSPORT");
    println!("{}", "-".repeat(90));
    for def in listings {
        println!(
            "{:<30} {:<14} {}",
            def.id,
            def.fetch.transport().to_string(),
            def.title
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = bidboard_cli_utils::init_logger();
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        return interactive::run(&multi).await;
    };

    match command {
        Commands::List => print_listings(&all_listings()),
        Commands::Scrape {
            id,
            file,
            keyword,
            max_pages,
            via,
            no_open,
        } => {
            let def = match (id, file) {
                (_, Some(path)) => load_listing_file(&path)?,
                (Some(id), None) => find_listing(&id)?,
                (None, None) => return Err("either a listing id or --file is required".into()),
            };

            let request = ScrapeRequest {
                keyword,
                options: ScrapeOptions {
                    max_pages,
                    transport: via,
                },
                open: !no_open,
            };
            scrape::run(&multi, &def, &request).await?;
        }
        Commands::Serve => {
            // The dashboard uses actix-web's runtime, so run it in a
            // blocking task to avoid nesting tokio runtimes.
            tokio::task::spawn_blocking(|| {
                actix_web::rt::System::new().block_on(bidboard_server::run_server())
            })
            .await??;
        }
    }

    Ok(())
}
