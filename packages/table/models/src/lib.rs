#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Normalized table types for scraped procurement listings.
//!
//! A [`Table`] is a named relation with an ordered header list and rows of
//! [`Cell`]s. Every row in a table has exactly as many cells as the table
//! has headers; [`Table::push_row`] rejects anything else, and the derived
//! constructors ([`Table::project`], [`Table::retain`], ...) can only
//! produce well-formed tables.
//!
//! Tables are values: the derived constructors return new tables and leave
//! the original untouched, so a cached scrape result can be re-filtered any
//! number of times.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Errors raised while assembling a [`Table`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    /// A row's cell count did not match the table's header count.
    #[error("row in table '{table}' has {found} cells, expected {expected}")]
    RowWidth {
        /// Name of the table the row was destined for.
        table: String,
        /// Number of headers in the table.
        expected: usize,
        /// Number of cells in the rejected row.
        found: usize,
    },
}

/// A hyperlink carried by a cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hyperlink {
    /// Visible anchor text.
    pub text: String,
    /// Absolute target URL.
    pub href: String,
}

/// One cell of a scraped row.
///
/// Plain cells carry only `text`. Link cells additionally carry one or more
/// [`Hyperlink`]s; renderers turn those (and only those) into live anchors.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    /// Visible text, used for filtering and sorting.
    pub text: String,
    /// Hyperlinks found in the cell, in document order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Hyperlink>,
    /// Set when the value came from a best-effort text-slicing heuristic.
    #[serde(default)]
    pub heuristic: bool,
}

impl Cell {
    /// Creates a plain text cell.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            links: Vec::new(),
            heuristic: false,
        }
    }

    /// Creates a cell holding a single hyperlink whose text is also the
    /// cell's visible text.
    #[must_use]
    pub fn link(text: impl Into<String>, href: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            links: vec![Hyperlink {
                text: text.clone(),
                href: href.into(),
            }],
            text,
            heuristic: false,
        }
    }

    /// Marks the cell as produced by a low-confidence heuristic.
    #[must_use]
    pub const fn with_heuristic(mut self, heuristic: bool) -> Self {
        self.heuristic = heuristic;
        self
    }

    /// Whether the cell should render as one or more anchors.
    #[must_use]
    pub const fn is_link(&self) -> bool {
        !self.links.is_empty()
    }
}

/// One extracted row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    /// Cells in column order.
    pub cells: Vec<Cell>,
}

impl Row {
    /// Creates a row from its cells.
    #[must_use]
    pub const fn new(cells: Vec<Cell>) -> Self {
        Self { cells }
    }

    /// Convenience constructor for rows of plain text cells.
    #[must_use]
    pub fn from_texts<I, S>(texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cells: texts.into_iter().map(Cell::text).collect(),
        }
    }

    /// Returns the cell at `index`, if any.
    #[must_use]
    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    /// Number of cells in the row.
    #[must_use]
    pub const fn width(&self) -> usize {
        self.cells.len()
    }
}

/// Direction of a column sort.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SortDirection {
    /// Smallest first.
    #[default]
    #[strum(to_string = "ascending", serialize = "asc")]
    Ascending,
    /// Largest first.
    #[strum(to_string = "descending", serialize = "desc")]
    Descending,
}

/// A named, in-memory relation produced by one scrape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    name: String,
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    /// Creates an empty table with the given headers.
    #[must_use]
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Creates a table and appends every row.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::RowWidth`] for the first row whose width does
    /// not match the header count.
    pub fn with_rows(
        name: impl Into<String>,
        headers: Vec<String>,
        rows: Vec<Row>,
    ) -> Result<Self, TableError> {
        let mut table = Self::new(name, headers);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Appends a row, rejecting it if its width differs from the header
    /// count.
    ///
    /// # Errors
    ///
    /// Returns [`TableError::RowWidth`] if the row is too short or too long.
    pub fn push_row(&mut self, row: Row) -> Result<(), TableError> {
        if row.width() != self.headers.len() {
            return Err(TableError::RowWidth {
                table: self.name.clone(),
                expected: self.headers.len(),
                found: row.width(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    /// Table name (e.g. `"Current Opportunities"`).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Column headers in order.
    #[must_use]
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Rows in their current order.
    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the column whose header matches `name`, ignoring
    /// surrounding whitespace and ASCII case.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    }

    /// Returns a new table containing only the given column positions, in
    /// the order given. Positions past the last column are ignored.
    #[must_use]
    pub fn project(&self, positions: &[usize]) -> Self {
        let positions: Vec<usize> = positions
            .iter()
            .copied()
            .filter(|&p| p < self.headers.len())
            .collect();

        Self {
            name: self.name.clone(),
            headers: positions.iter().map(|&p| self.headers[p].clone()).collect(),
            rows: self
                .rows
                .iter()
                .map(|row| Row::new(positions.iter().map(|&p| row.cells[p].clone()).collect()))
                .collect(),
        }
    }

    /// Returns a new table with only the rows matching `keep`.
    #[must_use]
    pub fn retain(&self, mut keep: impl FnMut(&Row) -> bool) -> Self {
        Self {
            name: self.name.clone(),
            headers: self.headers.clone(),
            rows: self.rows.iter().filter(|row| keep(row)).cloned().collect(),
        }
    }

    /// Returns a new table with rows stably sorted by `compare`.
    #[must_use]
    pub fn sorted_by(&self, compare: impl FnMut(&Row, &Row) -> Ordering) -> Self {
        let mut rows = self.rows.clone();
        rows.sort_by(compare);
        Self {
            name: self.name.clone(),
            headers: self.headers.clone(),
            rows,
        }
    }

    /// Returns a new table with an extra first column whose cell for each
    /// row is produced by `make` (called with the row's 0-based position).
    #[must_use]
    pub fn prepend_column(
        &self,
        header: impl Into<String>,
        mut make: impl FnMut(usize, &Row) -> Cell,
    ) -> Self {
        let mut headers = Vec::with_capacity(self.headers.len() + 1);
        headers.push(header.into());
        headers.extend(self.headers.iter().cloned());

        let rows = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let mut cells = Vec::with_capacity(row.cells.len() + 1);
                cells.push(make(i, row));
                cells.extend(row.cells.iter().cloned());
                Row::new(cells)
            })
            .collect();

        Self {
            name: self.name.clone(),
            headers,
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn push_row_rejects_short_and_long_rows() {
        let mut table = Table::new("t", headers(&["A", "B"]));
        assert!(table.push_row(Row::from_texts(["1", "2"])).is_ok());

        let short = table.push_row(Row::from_texts(["1"]));
        assert_eq!(
            short,
            Err(TableError::RowWidth {
                table: "t".to_string(),
                expected: 2,
                found: 1,
            })
        );
        assert!(table.push_row(Row::from_texts(["1", "2", "3"])).is_err());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn project_skips_out_of_range_positions() {
        let table = Table::with_rows(
            "t",
            headers(&["A", "B", "C"]),
            vec![Row::from_texts(["a", "b", "c"])],
        )
        .unwrap();

        let projected = table.project(&[2, 0, 9]);
        assert_eq!(projected.headers(), &["C", "A"]);
        assert_eq!(projected.rows()[0], Row::from_texts(["c", "a"]));
        // original is untouched
        assert_eq!(table.headers().len(), 3);
    }

    #[test]
    fn column_index_ignores_case_and_whitespace() {
        let table = Table::new("t", headers(&[" RFx Status ", "Industry"]));
        assert_eq!(table.column_index("rfx status"), Some(0));
        assert_eq!(table.column_index("Missing"), None);
    }

    #[test]
    fn sort_direction_parses_short_forms() {
        assert_eq!("desc".parse::<SortDirection>().unwrap(), SortDirection::Descending);
        assert_eq!(
            "ascending".parse::<SortDirection>().unwrap(),
            SortDirection::Ascending
        );
        assert!("sideways".parse::<SortDirection>().is_err());
    }

    #[test]
    fn link_cells_serialize_links() {
        let cell = Cell::link("Doc", "https://example.org/doc.pdf");
        let json = serde_json::to_value(&cell).unwrap();
        assert_eq!(json["links"][0]["href"], "https://example.org/doc.pdf");
        assert!(serde_json::to_value(Cell::text("x")).unwrap().get("links").is_none());
    }
}
