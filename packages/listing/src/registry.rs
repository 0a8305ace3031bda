//! Listing registry: every listing definition embedded from TOML.
//!
//! Each `.toml` file in `packages/listing/listings/` is baked into the
//! binary at compile time via [`include_str!`]. Adding a new listing means
//! creating a TOML file and adding it to the list below.

use std::path::Path;

use crate::ListingError;
use crate::listing_def::{ListingDefinition, parse_listing_toml};

/// TOML configs embedded at compile time.
const LISTING_TOMLS: &[(&str, &str)] = &[
    // ── New York State ───────────────────────────────────────────────
    (
        "nys_ogs_consultant",
        include_str!("../listings/nys_ogs_consultant.toml"),
    ),
    (
        "nys_dot_detail_ads",
        include_str!("../listings/nys_dot_detail_ads.toml"),
    ),
    (
        "nys_dot_designation",
        include_str!("../listings/nys_dot_designation.toml"),
    ),
    // ── Port Authority of NY & NJ ────────────────────────────────────
    (
        "panynj_construction",
        include_str!("../listings/panynj_construction.toml"),
    ),
    (
        "panynj_professional_services",
        include_str!("../listings/panynj_professional_services.toml"),
    ),
    // ── New York City ────────────────────────────────────────────────
    ("nyc_passport", include_str!("../listings/nyc_passport.toml")),
];

#[cfg(test)]
const EXPECTED_LISTING_COUNT: usize = 6;

/// Returns every embedded listing definition.
///
/// # Panics
///
/// Panics if any embedded TOML is malformed. The configs ship inside the
/// binary, so this fails on the first test run rather than in the field.
#[must_use]
pub fn all_listings() -> Vec<ListingDefinition> {
    LISTING_TOMLS
        .iter()
        .map(|(name, toml)| {
            parse_listing_toml(toml).unwrap_or_else(|e| panic!("Failed to parse {name}.toml: {e}"))
        })
        .collect()
}

/// Looks up an embedded listing by id.
///
/// # Errors
///
/// Returns [`ListingError::UnknownListing`] if no listing has that id.
pub fn find_listing(id: &str) -> Result<ListingDefinition, ListingError> {
    all_listings()
        .into_iter()
        .find(|l| l.id == id)
        .ok_or_else(|| ListingError::UnknownListing(id.to_owned()))
}

/// Loads a listing definition from a TOML file on disk.
///
/// # Errors
///
/// Returns [`ListingError::Read`] if the file cannot be read and
/// [`ListingError::Toml`] if it cannot be parsed.
pub fn load_listing_file(path: &Path) -> Result<ListingDefinition, ListingError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ListingError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_listing_toml(&contents)
}

#[cfg(test)]
mod tests {
    use bidboard_scraper::FetchStrategy;

    use super::*;
    use crate::listing_def::HeaderSource;

    #[test]
    fn loads_all_listings() {
        assert_eq!(all_listings().len(), EXPECTED_LISTING_COUNT);
    }

    #[test]
    fn listing_ids_are_unique_and_match_file_names() {
        let listings = all_listings();
        let mut ids: Vec<&str> = listings.iter().map(|l| l.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), EXPECTED_LISTING_COUNT);

        for ((name, _), listing) in LISTING_TOMLS.iter().zip(&listings) {
            assert_eq!(*name, listing.id);
        }
    }

    #[test]
    fn all_listings_have_required_fields() {
        for listing in &all_listings() {
            assert!(!listing.title.is_empty(), "{}: empty title", listing.id);
            assert!(
                url::Url::parse(listing.link_base()).is_ok(),
                "{}: link base is not an absolute URL",
                listing.id
            );
            if let HeaderSource::Columns { columns } = &listing.rows.header {
                assert!(!columns.is_empty(), "{}: no columns", listing.id);
            }
        }
    }

    #[test]
    fn passport_paginates_through_the_browser() {
        let listing = find_listing("nyc_passport").unwrap();
        match listing.fetch {
            FetchStrategy::Rendered {
                pagination: Some(p),
                ..
            } => assert_eq!(p.max_pages, 6),
            other => panic!("unexpected strategy {other:?}"),
        }
        assert_eq!(listing.view.keep_positions.len(), 7);
        assert_eq!(listing.view.facet_options("Industry").len(), 6);
    }

    #[test]
    fn ogs_maps_four_tables_by_position() {
        let listing = find_listing("nys_ogs_consultant").unwrap();
        assert_eq!(listing.locator.names.len(), 4);
        assert_eq!(listing.locator.names[0], "Current Opportunities");
    }

    #[test]
    fn unreadable_listing_file_reports_its_path() {
        let path = Path::new("/nonexistent/bidboard/listing.toml");
        let err = load_listing_file(path).unwrap_err();
        assert!(matches!(&err, ListingError::Read { path: p, .. } if p == path));
        assert!(err.to_string().contains("listing.toml"));
    }

    #[test]
    fn unknown_listing_is_an_error() {
        assert!(matches!(
            find_listing("nope"),
            Err(ListingError::UnknownListing(id)) if id == "nope"
        ));
    }
}
