//! Ordered composition of the table operations.
//!
//! [`FilterChain::apply`] always runs the steps in the same order:
//!
//! 1. column selection (positions, then dropped names)
//! 2. category filters
//! 3. sort
//! 4. keyword filter
//! 5. serial-number column
//!
//! Category filters see the raw row order, and serial numbers always
//! describe the final visible rows.

use std::collections::BTreeMap;

use bidboard_table_models::{SortDirection, Table};
use serde::Deserialize;

use crate::{
    MatchMode, drop_columns, filter_keyword, filter_values, select_positions, sort_by_column,
    with_serial_column,
};

/// Keeps rows whose `column` matches one of `values`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CategoryFilter {
    /// Column header to test.
    pub column: String,
    /// Accepted values.
    pub values: Vec<String>,
    /// Comparison mode.
    #[serde(default, rename = "match")]
    pub mode: MatchMode,
}

/// Sort step configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SortSpec {
    /// Column header to sort by.
    pub column: String,
    /// Sort largest first.
    #[serde(default)]
    pub descending: bool,
}

impl SortSpec {
    #[must_use]
    pub const fn direction(&self) -> SortDirection {
        if self.descending {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        }
    }
}

/// Free-text filter step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordFilter {
    /// Case-insensitive needle.
    pub text: String,
    /// Restrict matching to one column.
    pub column: Option<String>,
}

/// A complete normalization pipeline for one view of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterChain {
    /// Column positions to keep, applied before `drop_columns`.
    pub keep_positions: Option<Vec<usize>>,
    /// Column headers to remove.
    pub drop_columns: Vec<String>,
    /// Row filters by column value.
    pub category_filters: Vec<CategoryFilter>,
    /// Sort step.
    pub sort: Option<SortSpec>,
    /// Keyword filter step.
    pub keyword: Option<KeywordFilter>,
    /// Header for an injected 1-based serial column.
    pub serial_column: Option<String>,
}

impl FilterChain {
    /// Creates an empty chain that returns tables unchanged.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_keep_positions(mut self, positions: Vec<usize>) -> Self {
        self.keep_positions = Some(positions);
        self
    }

    #[must_use]
    pub fn with_drop_column(mut self, name: &str) -> Self {
        self.drop_columns.push(name.to_owned());
        self
    }

    #[must_use]
    pub fn with_category_filter(mut self, filter: CategoryFilter) -> Self {
        self.category_filters.push(filter);
        self
    }

    #[must_use]
    pub fn with_sort(mut self, column: &str, descending: bool) -> Self {
        self.sort = Some(SortSpec {
            column: column.to_owned(),
            descending,
        });
        self
    }

    /// Sets the keyword step. Blank keywords clear it.
    #[must_use]
    pub fn with_keyword(mut self, text: &str, column: Option<&str>) -> Self {
        self.keyword = if text.trim().is_empty() {
            None
        } else {
            Some(KeywordFilter {
                text: text.to_owned(),
                column: column.map(str::to_owned),
            })
        };
        self
    }

    #[must_use]
    pub fn with_serial_column(mut self, header: &str) -> Self {
        self.serial_column = Some(header.to_owned());
        self
    }

    /// Runs every configured step over `table` and returns the result.
    #[must_use]
    pub fn apply(&self, table: &Table) -> Table {
        let mut current = match &self.keep_positions {
            Some(positions) if !positions.is_empty() => select_positions(table, positions),
            _ => table.clone(),
        };

        if !self.drop_columns.is_empty() {
            current = drop_columns(&current, &self.drop_columns);
        }

        for filter in &self.category_filters {
            current = filter_values(&current, &filter.column, &filter.values, filter.mode);
        }

        if let Some(sort) = &self.sort {
            current = sort_by_column(&current, &sort.column, sort.direction());
        }

        if let Some(keyword) = &self.keyword {
            current = filter_keyword(&current, &keyword.text, keyword.column.as_deref());
        }

        if let Some(header) = &self.serial_column {
            current = with_serial_column(&current, header);
        }

        current
    }
}

/// Session-scoped view state: the keyword box plus one selection per
/// category dropdown.
///
/// An empty facet selection (or `"All"`) means "no narrowing beyond the
/// listing's defaults".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterState {
    /// Free-text keyword.
    pub keyword: String,
    /// Facet column header to selected value.
    pub facets: BTreeMap<String, String>,
}

impl FilterState {
    #[must_use]
    pub fn with_keyword(mut self, keyword: &str) -> Self {
        keyword.clone_into(&mut self.keyword);
        self
    }

    #[must_use]
    pub fn with_facet(mut self, column: &str, value: &str) -> Self {
        self.facets.insert(column.to_owned(), value.to_owned());
        self
    }

    /// The selected value for `column`, ignoring blank and `"All"`.
    #[must_use]
    pub fn facet(&self, column: &str) -> Option<&str> {
        self.facets
            .get(column)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
    }
}
