//! Menu-driven mode, used when `bidboard` runs without a subcommand.

use bidboard_cli_utils::MultiProgress;
use bidboard_listing::registry::all_listings;
use dialoguer::{Confirm, Input, Select};

use crate::scrape::{self, ScrapeRequest};

/// Top-level actions.
enum Action {
    Scrape,
    List,
    Dashboard,
}

impl Action {
    const ALL: &[Self] = &[Self::Scrape, Self::List, Self::Dashboard];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::Scrape => "Scrape a listing",
            Self::List => "List listings",
            Self::Dashboard => "Start dashboard",
        }
    }
}

/// Runs the interactive menu.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected action fails.
pub async fn run(multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    println!("Bidboard");
    println!();

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();
    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    match Action::ALL[idx] {
        Action::Scrape => scrape_prompt(multi).await,
        Action::List => {
            crate::print_listings(&all_listings());
            Ok(())
        }
        Action::Dashboard => {
            tokio::task::spawn_blocking(|| {
                actix_web::rt::System::new().block_on(bidboard_server::interactive::run())
            })
            .await??;
            Ok(())
        }
    }
}

async fn scrape_prompt(multi: &MultiProgress) -> Result<(), Box<dyn std::error::Error>> {
    let listings = all_listings();
    let titles: Vec<&str> = listings.iter().map(|l| l.title.as_str()).collect();

    let idx = Select::new()
        .with_prompt("Which listing?")
        .items(&titles)
        .default(0)
        .interact()?;
    let def = &listings[idx];

    let keyword: String = Input::new()
        .with_prompt("Keyword filter (blank for none)")
        .allow_empty(true)
        .interact_text()?;

    let open = Confirm::new()
        .with_prompt("Open the results in your browser?")
        .default(true)
        .interact()?;

    let request = ScrapeRequest {
        keyword: Some(keyword).filter(|k| !k.trim().is_empty()),
        open,
        ..ScrapeRequest::default()
    };
    scrape::run(multi, def, &request).await?;
    Ok(())
}
