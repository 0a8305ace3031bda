#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! JSON response types for the bidboard dashboard API.
//!
//! Kept apart from the pipeline types so the API contract can evolve
//! independently of the listing configuration.

use bidboard_table_models::Table;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// A configured listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiListing {
    /// Listing id, used in URLs.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Source page.
    pub url: String,
    /// Fetch transport (`direct`, `rendered`, `render-proxy`).
    pub transport: String,
    /// Whether results depend on a rendering wait.
    pub best_effort: bool,
    /// Columns offered as dropdown filters.
    pub facets: Vec<String>,
    /// When the cached result was scraped, if there is one.
    pub scraped_at: Option<DateTime<Utc>>,
}

/// Normalized tables for one listing view.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTables {
    /// Listing id.
    pub listing_id: String,
    /// Outcome kind: `complete`, `best_effort`, `no_data` or `failed`.
    pub outcome: String,
    /// User-facing notice for anything other than a complete scrape.
    pub notice: Option<String>,
    /// When the tables were scraped.
    pub scraped_at: DateTime<Utc>,
    /// Rows skipped during extraction.
    pub skipped_rows: usize,
    /// Tables after the view was applied.
    pub tables: Vec<Table>,
}

/// Error body for non-2xx JSON responses.
#[derive(Debug, Serialize)]
pub struct ApiError {
    /// Human-readable message.
    pub error: String,
}

impl ApiError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
