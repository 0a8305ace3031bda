#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Listing definitions and the scrape pipeline.
//!
//! Each procurement page is described by a TOML [`ListingDefinition`]
//! embedded in the [`registry`]. [`pipeline::scrape_listing`] runs one
//! listing end to end:
//!
//! 1. fetch the page(s) with the listing's fetch strategy
//! 2. [`locate`] the data tables by structural signature
//! 3. [`extract`] rows with the per-column rules
//! 4. hand back raw tables plus any per-row [`ParseWarning`]s
//!
//! Normalization (filters, sort, serial numbers) is applied afterwards via
//! the listing's [`ListingView`], so a cached result can be re-viewed
//! without re-fetching.

pub mod extract;
pub mod listing_def;
pub mod locate;
pub mod parsing;
pub mod pipeline;
pub mod progress;
pub mod registry;

use std::fmt;

pub use listing_def::{ListingDefinition, ListingView};

/// Errors from listing configuration and table location.
#[derive(Debug, thiserror::Error)]
pub enum ListingError {
    /// No element matched the table signature.
    #[error("no table matching '{signature}' found")]
    TableNotFound {
        /// The CSS form of the signature that failed to match.
        signature: String,
    },

    /// A configured selector is not valid CSS.
    #[error("invalid CSS selector '{selector}': {message}")]
    InvalidSelector {
        /// The offending selector.
        selector: String,
        /// Parser message.
        message: String,
    },

    /// A configured base URL is not a valid absolute URL.
    #[error("invalid base URL '{url}': {source}")]
    InvalidBaseUrl {
        /// The offending URL.
        url: String,
        /// Parser error.
        source: url::ParseError,
    },

    /// A listing TOML could not be parsed.
    #[error("failed to parse listing TOML: {0}")]
    Toml(#[from] toml::de::Error),

    /// A listing file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File that was to be read.
        path: std::path::PathBuf,
        /// Read error.
        source: std::io::Error,
    },

    /// No listing has the requested id.
    #[error("unknown listing '{0}'")]
    UnknownListing(String),
}

/// What went wrong with a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseWarningKind {
    /// The row had a different number of cells than the header.
    CellCountMismatch {
        /// Header width.
        expected: usize,
        /// Cells found.
        found: usize,
    },
    /// A configured column's cell was not present in the row.
    MissingCell {
        /// Column name.
        column: String,
    },
    /// A date cell did not match the expected format and was kept as-is.
    UnparsedDate {
        /// Column name.
        column: String,
        /// Original text.
        value: String,
    },
    /// The table had no header cells, so no rows could be read.
    MissingHeader,
}

/// A non-fatal anomaly found during extraction.
///
/// Rows with a warning other than [`ParseWarningKind::UnparsedDate`] are
/// dropped; the rest of the table is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseWarning {
    /// Table the row belonged to.
    pub table: String,
    /// 0-based row position among the table's row-selector matches.
    pub row: usize,
    /// What happened.
    pub kind: ParseWarningKind,
}

impl fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] row {}: ", self.table, self.row)?;
        match &self.kind {
            ParseWarningKind::CellCountMismatch { expected, found } => {
                write!(f, "{found} cells, expected {expected}; row skipped")
            }
            ParseWarningKind::MissingCell { column } => {
                write!(f, "no cell for column '{column}'; row skipped")
            }
            ParseWarningKind::UnparsedDate { column, value } => {
                write!(f, "'{value}' in column '{column}' is not a date; kept as-is")
            }
            ParseWarningKind::MissingHeader => write!(f, "no header cells; table skipped"),
        }
    }
}
