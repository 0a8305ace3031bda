//! Table location by structural signature.

use scraper::{ElementRef, Html, Selector};

use crate::ListingError;
use crate::listing_def::LocatorConfig;

/// Parses a CSS selector, returning a [`ListingError`] on failure.
///
/// # Errors
///
/// Returns [`ListingError::InvalidSelector`] if `selector` is not valid CSS.
pub fn parse_selector(selector: &str) -> Result<Selector, ListingError> {
    Selector::parse(selector).map_err(|e| ListingError::InvalidSelector {
        selector: selector.to_owned(),
        message: e.to_string(),
    })
}

/// Finds every element matching the locator, in document order.
///
/// With a container signature, each matching container is searched in
/// turn; an element reachable from several nested containers is returned
/// once.
///
/// # Errors
///
/// Returns [`ListingError::TableNotFound`] if nothing matches, or
/// [`ListingError::InvalidSelector`] for a malformed signature.
pub fn locate_tables<'a>(
    document: &'a Html,
    locator: &LocatorConfig,
) -> Result<Vec<ElementRef<'a>>, ListingError> {
    let target_css = locator.target.to_css();
    let target = parse_selector(&target_css)?;

    let (found, signature) = match &locator.within {
        None => (document.select(&target).collect::<Vec<_>>(), target_css),
        Some(container) => {
            let container_css = container.to_css();
            let container_sel = parse_selector(&container_css)?;
            let mut found: Vec<ElementRef<'a>> = Vec::new();
            for outer in document.select(&container_sel) {
                for el in outer.select(&target) {
                    if !found.iter().any(|f| f.id() == el.id()) {
                        found.push(el);
                    }
                }
            }
            (found, format!("{container_css} {target_css}"))
        }
    };

    if found.is_empty() {
        return Err(ListingError::TableNotFound { signature });
    }

    log::debug!("Located {} element(s) matching '{signature}'", found.len());
    Ok(found)
}

/// Pairs located tables with their names.
///
/// Without configured names every table gets `fallback`, which merges them
/// downstream. With names the mapping is purely positional: surplus tables
/// are skipped and missing ones are reported, but a reordered page cannot
/// be detected.
#[must_use]
pub fn name_tables<'a>(
    located: Vec<ElementRef<'a>>,
    names: &[String],
    fallback: &str,
) -> Vec<(String, ElementRef<'a>)> {
    if names.is_empty() {
        return located
            .into_iter()
            .map(|el| (fallback.to_owned(), el))
            .collect();
    }

    if located.len() > names.len() {
        log::warn!(
            "[{fallback}] page has {} matching tables but only {} names; ignoring the rest",
            located.len(),
            names.len()
        );
    } else if located.len() < names.len() {
        log::warn!(
            "[{fallback}] page has {} matching tables for {} names; missing: {}",
            located.len(),
            names.len(),
            names[located.len()..].join(", ")
        );
    }

    names.iter().cloned().zip(located).collect()
}
