#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Normalizer and filter operations over scraped tables.
//!
//! Every operation takes a [`Table`] by reference and returns a new one, so
//! a cached scrape can be re-filtered without ever being modified. The
//! individual operations are composed in a fixed order by
//! [`chain::FilterChain`].

pub mod chain;
pub mod parsing;

use std::cmp::Ordering;

use bidboard_table_models::{Cell, Row, SortDirection, Table};
use chrono::NaiveDate;
use serde::Deserialize;

pub use bidboard_table_models;

/// How a row filter compares a cell against its wanted values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    /// Trimmed cell text equals one of the values.
    #[default]
    Exact,
    /// Cell text contains one of the values, ignoring case.
    Contains,
}

/// Drops every column whose header matches one of `names`.
///
/// Names that are not present are ignored, so dropping only absent columns
/// returns an unchanged table.
#[must_use]
pub fn drop_columns(table: &Table, names: &[String]) -> Table {
    let dropped: Vec<usize> = names.iter().filter_map(|n| table.column_index(n)).collect();
    if dropped.is_empty() {
        return table.clone();
    }
    let keep: Vec<usize> = (0..table.headers().len())
        .filter(|i| !dropped.contains(i))
        .collect();
    table.project(&keep)
}

/// Keeps only the given column positions, in order.
///
/// Positional selection breaks silently when the source page adds or
/// reorders columns, so out-of-range positions are logged rather than
/// guessed at.
#[must_use]
pub fn select_positions(table: &Table, positions: &[usize]) -> Table {
    let width = table.headers().len();
    for &p in positions.iter().filter(|&&p| p >= width) {
        log::warn!(
            "[{}] column position {p} is out of range (table has {width} columns); skipping",
            table.name()
        );
    }
    table.project(positions)
}

/// Keeps rows whose `column` cell matches any of `values`.
///
/// An absent column leaves the table unchanged (with a warning), mirroring
/// [`drop_columns`].
#[must_use]
pub fn filter_values(table: &Table, column: &str, values: &[String], mode: MatchMode) -> Table {
    let Some(idx) = table.column_index(column) else {
        log::warn!(
            "[{}] filter column '{column}' not found; leaving rows unfiltered",
            table.name()
        );
        return table.clone();
    };

    let needles: Vec<String> = match mode {
        MatchMode::Exact => values.iter().map(|v| v.trim().to_owned()).collect(),
        MatchMode::Contains => values.iter().map(|v| v.to_lowercase()).collect(),
    };

    table.retain(|row| {
        let text = row.cell(idx).map_or("", |c| c.text.as_str());
        match mode {
            MatchMode::Exact => needles.iter().any(|n| text.trim() == n),
            MatchMode::Contains => {
                let text = text.to_lowercase();
                needles.iter().any(|n| text.contains(n.as_str()))
            }
        }
    })
}

/// Keeps rows containing `keyword` (case-insensitive) in any cell, or only
/// in `column` when given.
///
/// An empty keyword returns the table unchanged. A keyword found nowhere
/// returns an empty table, never an error.
#[must_use]
pub fn filter_keyword(table: &Table, keyword: &str, column: Option<&str>) -> Table {
    let needle = keyword.trim().to_lowercase();
    if needle.is_empty() {
        return table.clone();
    }

    let idx = match column {
        Some(name) => {
            let Some(idx) = table.column_index(name) else {
                log::warn!(
                    "[{}] keyword column '{name}' not found; leaving rows unfiltered",
                    table.name()
                );
                return table.clone();
            };
            Some(idx)
        }
        None => None,
    };

    table.retain(|row| match idx {
        Some(i) => row
            .cell(i)
            .is_some_and(|c| c.text.to_lowercase().contains(&needle)),
        None => row
            .cells
            .iter()
            .any(|c| c.text.to_lowercase().contains(&needle)),
    })
}

/// Sorts by `column`.
///
/// When every non-empty cell in the column parses as a date the rows are
/// ordered by calendar date; otherwise by case-insensitive text. Empty
/// cells sort last in both directions. The sort is stable. An absent
/// column leaves the table unchanged.
#[must_use]
pub fn sort_by_column(table: &Table, column: &str, direction: SortDirection) -> Table {
    let Some(idx) = table.column_index(column) else {
        log::warn!(
            "[{}] sort column '{column}' not found; leaving order unchanged",
            table.name()
        );
        return table.clone();
    };

    let text_of = |row: &Row| row.cell(idx).map_or("", |c| c.text.trim()).to_owned();

    let dates: Option<Vec<Option<NaiveDate>>> = table
        .rows()
        .iter()
        .map(|row| {
            let text = text_of(row);
            if text.is_empty() {
                Some(None)
            } else {
                parsing::parse_listing_date(&text).map(Some)
            }
        })
        .collect();

    let is_date_column = dates
        .as_ref()
        .is_some_and(|d| d.iter().any(Option::is_some));

    if is_date_column {
        log::debug!("[{}] sorting '{column}' as dates", table.name());
        table.sorted_by(|a, b| {
            let a = parsing::parse_listing_date(&text_of(a));
            let b = parsing::parse_listing_date(&text_of(b));
            compare_present(a.as_ref(), b.as_ref(), direction)
        })
    } else {
        log::debug!("[{}] sorting '{column}' as text", table.name());
        table.sorted_by(|a, b| {
            let a = text_of(a).to_lowercase();
            let b = text_of(b).to_lowercase();
            compare_present(
                (!a.is_empty()).then_some(&a),
                (!b.is_empty()).then_some(&b),
                direction,
            )
        })
    }
}

fn compare_present<T: Ord>(a: Option<&T>, b: Option<&T>, direction: SortDirection) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => match direction {
            SortDirection::Ascending => a.cmp(b),
            SortDirection::Descending => b.cmp(a),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Inserts a 1-based row number as the first column.
///
/// Numbers are assigned from the table's current row order, so applying
/// this last yields a gapless sequence over the visible rows.
#[must_use]
pub fn with_serial_column(table: &Table, header: &str) -> Table {
    table.prepend_column(header, |i, _| Cell::text((i + 1).to_string()))
}
