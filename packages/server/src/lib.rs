#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web dashboard for browsing scraped procurement listings.
//!
//! The home page lists every configured listing. Scraping a listing runs
//! the full pipeline once and stores the raw result in the
//! [`session::SessionCache`]; the listing page then re-filters that cached
//! result on every keyword or dropdown change without fetching again.
//! Only one scrape runs at a time.
//!
//! JSON equivalents live under `/api`.

mod handlers;
pub mod interactive;
pub mod session;

use std::sync::{Mutex, MutexGuard, PoisonError};

use actix_web::{App, HttpServer, middleware, web};
use bidboard_listing::ListingDefinition;
use bidboard_listing::registry::all_listings;
use bidboard_scraper::FetchSettings;

use crate::session::{ScrapeGate, SessionCache};

/// Shared application state.
pub struct AppState {
    /// Listings offered on the dashboard.
    pub listings: Vec<ListingDefinition>,
    /// Fetch settings for every scrape.
    pub settings: FetchSettings,
    /// Most recent scrape per listing.
    pub cache: Mutex<SessionCache>,
    /// Single in-flight scrape gate.
    pub gate: ScrapeGate,
}

impl AppState {
    #[must_use]
    pub fn new(listings: Vec<ListingDefinition>, settings: FetchSettings) -> Self {
        Self {
            listings,
            settings,
            cache: Mutex::new(SessionCache::new()),
            gate: ScrapeGate::default(),
        }
    }

    /// State for every embedded listing with settings from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(all_listings(), FetchSettings::from_env())
    }

    /// Looks up a listing by id.
    #[must_use]
    pub fn listing(&self, id: &str) -> Option<&ListingDefinition> {
        self.listings.iter().find(|l| l.id == id)
    }

    /// Locks the session cache, recovering from a poisoned lock.
    pub fn cache(&self) -> MutexGuard<'_, SessionCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Registers every dashboard and API route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/", web::get().to(handlers::home))
        .service(
            web::scope("/listings")
                .route("/{id}", web::get().to(handlers::listing_page))
                .route("/{id}/fragment", web::get().to(handlers::listing_fragment))
                .route("/{id}/scrape", web::post().to(handlers::scrape)),
        )
        .service(
            web::scope("/api")
                .route("/health", web::get().to(handlers::health))
                .route("/listings", web::get().to(handlers::api_listings))
                .route("/listings/{id}/tables", web::get().to(handlers::api_tables)),
        );
}

/// Starts the dashboard.
///
/// Binds to `BIND_ADDR`:`PORT` (default `127.0.0.1:8080`). This is a
/// regular async function; the caller provides the runtime (e.g. via
/// `#[actix_web::main]`) and initializes logging.
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind or
/// encounters a runtime error.
#[allow(clippy::future_not_send)]
pub async fn run_server() -> std::io::Result<()> {
    let state = web::Data::new(AppState::from_env());
    log::info!("Loaded {} listings", state.listings.len());

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting dashboard on http://{bind_addr}:{port}");

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .configure(configure)
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
