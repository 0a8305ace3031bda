//! Config-driven listing definition.
//!
//! [`ListingDefinition`] captures everything unique about one procurement
//! page: where it lives, how to fetch it, how to find its tables, how to
//! read each cell, and how the result is normally filtered and sorted. A
//! single generic pipeline handles every listing, so adding a site means
//! adding a TOML file rather than new control flow.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use bidboard_scraper::FetchStrategy;
use bidboard_table::chain::{CategoryFilter, FilterChain, FilterState, SortSpec};
use bidboard_table::MatchMode;
use serde::Deserialize;

use crate::ListingError;

// ── Top-level listing definition ─────────────────────────────────────────

/// A complete, config-driven listing definition.
#[derive(Debug, Clone, Deserialize)]
pub struct ListingDefinition {
    /// Unique identifier (e.g., `"nyc_passport"`).
    pub id: String,
    /// Human-readable title shown above the rendered tables.
    pub title: String,
    /// Page to fetch.
    pub url: String,
    /// Base for resolving relative links. Defaults to [`Self::url`].
    #[serde(default)]
    pub base_url: Option<String>,
    /// How to fetch the page.
    pub fetch: FetchStrategy,
    /// How to find the data tables in the page.
    pub locator: LocatorConfig,
    /// How to turn located tables into rows.
    pub rows: RowRules,
    /// Default normalization applied before display.
    #[serde(default)]
    pub view: ListingView,
}

impl ListingDefinition {
    /// The URL relative links are resolved against.
    #[must_use]
    pub fn link_base(&self) -> &str {
        self.base_url.as_deref().unwrap_or(&self.url)
    }
}

// ── Table location ───────────────────────────────────────────────────────

/// A structural signature: tag name plus fixed attribute values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Signature {
    /// Element name. Defaults to `table`.
    #[serde(default = "default_tag")]
    pub tag: String,
    /// Required `id` attribute.
    #[serde(default)]
    pub id: Option<String>,
    /// Required classes, space separated. All must be present.
    #[serde(default)]
    pub class: Option<String>,
    /// Other required attribute values, matched exactly.
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
}

fn default_tag() -> String {
    "table".to_owned()
}

impl Signature {
    /// Renders the signature as a CSS selector.
    #[must_use]
    pub fn to_css(&self) -> String {
        let mut css = self.tag.clone();
        if let Some(id) = &self.id {
            css.push('#');
            css.push_str(&css_ident(id));
        }
        if let Some(class) = &self.class {
            for c in class.split_whitespace() {
                css.push('.');
                css.push_str(&css_ident(c));
            }
        }
        for (key, value) in &self.attrs {
            let value = value.replace('\\', "\\\\").replace('"', "\\\"");
            let _ = write!(css, "[{}=\"{value}\"]", css_ident(key));
        }
        css
    }
}

fn css_ident(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for (i, c) in s.chars().enumerate() {
        let plain = c.is_ascii_alphanumeric() || c == '-' || c == '_' || !c.is_ascii();
        if plain && !(i == 0 && c.is_ascii_digit()) {
            out.push(c);
        } else {
            let _ = write!(out, "\\{:x} ", c as u32);
        }
    }
    out
}

/// Where the data tables are on the page.
#[derive(Debug, Clone, Deserialize)]
pub struct LocatorConfig {
    /// Container to search inside ("find container, then table within").
    #[serde(default)]
    pub within: Option<Signature>,
    /// The table signature.
    pub target: Signature,
    /// Semantic names for the matched tables, by document position.
    ///
    /// The mapping is positional: if the page adds, removes, or reorders
    /// matching tables the names silently shift. Without names, every
    /// match is merged into one table named after the listing.
    #[serde(default)]
    pub names: Vec<String>,
}

// ── Row extraction ───────────────────────────────────────────────────────

/// How rows and headers are read from a located table.
#[derive(Debug, Clone, Deserialize)]
pub struct RowRules {
    /// Selector for rows within the table.
    #[serde(default = "default_row_selector")]
    pub row_selector: String,
    /// Selector for cells within a row.
    #[serde(default = "default_cell_selector")]
    pub cell_selector: String,
    /// Leading rows (by row-selector match) that never hold data.
    #[serde(default)]
    pub skip_rows: usize,
    /// Boilerplate substrings removed from every cell.
    #[serde(default)]
    pub strip: Vec<String>,
    /// Where column names come from.
    pub header: HeaderSource,
    /// Rule for cells without an override (header-derived columns only).
    #[serde(default)]
    pub default_rule: ExtractRule,
    /// Per-position rules (header-derived columns only).
    #[serde(default)]
    pub overrides: Vec<CellOverride>,
    /// Derived columns placed before the header-derived ones.
    #[serde(default)]
    pub leading: Vec<ColumnSpec>,
}

fn default_row_selector() -> String {
    "tr".to_owned()
}

fn default_cell_selector() -> String {
    "td".to_owned()
}

impl RowRules {
    /// The rule for the header-derived cell at `index`.
    #[must_use]
    pub fn rule_for(&self, index: usize) -> &ExtractRule {
        self.overrides
            .iter()
            .find(|o| o.index == index)
            .map_or(&self.default_rule, |o| &o.rule)
    }
}

/// Source of a table's column names.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HeaderSource {
    /// The cells of one row (0-based among row-selector matches). That row
    /// is never treated as data.
    Row {
        /// Row position.
        index: usize,
        /// Cell selector for the header row.
        #[serde(default = "default_header_cells")]
        cell_selector: String,
    },
    /// Every element matching `selector` inside the table, in order.
    Selector {
        /// Header cell selector (e.g. `th`).
        selector: String,
    },
    /// Fixed column list; each column says which cell it reads.
    Columns {
        /// Column specifications in output order.
        columns: Vec<ColumnSpec>,
    },
}

fn default_header_cells() -> String {
    "td, th".to_owned()
}

/// One explicitly configured column.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnSpec {
    /// Output column name.
    pub name: String,
    /// Which cell of the row to read.
    pub cell: CellRef,
    /// How to read it.
    #[serde(default)]
    pub rule: ExtractRule,
    /// Extra boilerplate substrings removed from this column.
    #[serde(default)]
    pub strip: Vec<String>,
}

/// A reference to a cell within a row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CellRef {
    /// 0-based position among the row's cells.
    Index(usize),
    /// First element matching this selector within the row.
    Selector(String),
}

/// A rule override for one header-derived position.
#[derive(Debug, Clone, Deserialize)]
pub struct CellOverride {
    /// 0-based cell position.
    pub index: usize,
    /// Rule to use there.
    pub rule: ExtractRule,
}

/// How to read a single cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtractRule {
    /// Trimmed visible text.
    #[default]
    Text,
    /// Anchor text plus absolute href.
    Link {
        /// Anchor selector within the cell.
        #[serde(default = "default_anchor")]
        selector: String,
        /// Base URL for relative hrefs. Defaults to the listing's base.
        #[serde(default)]
        base_url: Option<String>,
        /// Keep every matching anchor instead of only the first.
        #[serde(default)]
        all: bool,
        /// Use the cell's plain text when no anchor is present.
        #[serde(default = "default_true")]
        text_fallback: bool,
    },
    /// Text between two markers in the cell's raw markup.
    ///
    /// A best-effort heuristic for cells that embed free text without a
    /// sub-element boundary. Output is flagged as low confidence.
    Between {
        /// Start marker. Missing markers start at the beginning.
        start: String,
        /// End marker.
        end: String,
        /// Marker tried when `end` is absent; otherwise the cell end.
        #[serde(default)]
        fallback_end: Option<String>,
    },
    /// Reformat a date; unparseable text passes through unchanged.
    DateReformat {
        /// Expected `chrono` format of the cell.
        #[serde(default = "default_input_date")]
        input_format: String,
        /// Output `chrono` format.
        #[serde(default = "default_output_date")]
        output_format: String,
    },
    /// Visible text with every occurrence of a nested tag removed.
    StripNestedTag {
        /// Tag name to remove (e.g. `strong`).
        tag: String,
        /// Keep only the markup after the first occurrence of this marker.
        /// A missing marker keeps the whole cell.
        #[serde(default)]
        after: Option<String>,
    },
    /// Link whose target is the first quoted argument of an element's
    /// `onclick` handler.
    OnclickLink {
        /// Element carrying the handler.
        #[serde(default = "default_onclick_element")]
        element: String,
        /// Base URL for the extracted path.
        #[serde(default)]
        base_url: Option<String>,
    },
    /// First text node of the first element matching `selector`.
    LeadingText {
        /// Element selector within the cell.
        #[serde(default = "default_paragraph")]
        selector: String,
    },
}

fn default_anchor() -> String {
    "a".to_owned()
}

const fn default_true() -> bool {
    true
}

fn default_input_date() -> String {
    "%m/%d/%Y".to_owned()
}

fn default_output_date() -> String {
    "%Y/%m/%d".to_owned()
}

fn default_onclick_element() -> String {
    "button".to_owned()
}

fn default_paragraph() -> String {
    "p".to_owned()
}

// ── Default view ─────────────────────────────────────────────────────────

/// The listing's default normalization and its dashboard facets.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingView {
    /// Column positions to keep, before anything else.
    ///
    /// Positional selection is fragile against markup changes; prefer
    /// `drop_columns` where headers are stable.
    #[serde(default)]
    pub keep_positions: Vec<usize>,
    /// Columns to drop by name.
    #[serde(default)]
    pub drop_columns: Vec<String>,
    /// Category filters.
    #[serde(default)]
    pub filters: Vec<CategoryFilter>,
    /// Default sort.
    #[serde(default)]
    pub sort: Option<SortSpec>,
    /// Columns offered as dropdown filters.
    #[serde(default)]
    pub facets: Vec<String>,
    /// Restrict the keyword filter to one column.
    #[serde(default)]
    pub keyword_column: Option<String>,
    /// Header for an injected serial-number column.
    #[serde(default)]
    pub serial_column: Option<String>,
}

impl ListingView {
    /// Builds the filter chain for the session's `state`.
    ///
    /// A facet selection narrows that column to exactly the selected value;
    /// otherwise the configured filter values apply.
    #[must_use]
    pub fn chain(&self, state: &FilterState) -> FilterChain {
        let mut chain = FilterChain {
            keep_positions: (!self.keep_positions.is_empty()).then(|| self.keep_positions.clone()),
            drop_columns: self.drop_columns.clone(),
            sort: self.sort.clone(),
            serial_column: self.serial_column.clone(),
            ..FilterChain::default()
        };

        for filter in &self.filters {
            let narrowed = self
                .is_facet(&filter.column)
                .then(|| state.facet(&filter.column))
                .flatten();
            chain = chain.with_category_filter(narrowed.map_or_else(
                || filter.clone(),
                |value| CategoryFilter {
                    column: filter.column.clone(),
                    values: vec![value.to_owned()],
                    mode: MatchMode::Exact,
                },
            ));
        }

        for facet in &self.facets {
            let configured = self.filters.iter().any(|f| f.column == *facet);
            if !configured && let Some(value) = state.facet(facet) {
                chain = chain.with_category_filter(CategoryFilter {
                    column: facet.clone(),
                    values: vec![value.to_owned()],
                    mode: MatchMode::Exact,
                });
            }
        }

        chain.with_keyword(&state.keyword, self.keyword_column.as_deref())
    }

    /// Whether `column` is offered as a dropdown.
    #[must_use]
    pub fn is_facet(&self, column: &str) -> bool {
        self.facets.iter().any(|f| f == column)
    }

    /// Configured dropdown values for `facet`, if the listing fixes them.
    #[must_use]
    pub fn facet_options(&self, facet: &str) -> Vec<String> {
        self.filters
            .iter()
            .filter(|f| f.column == facet)
            .flat_map(|f| f.values.iter().cloned())
            .collect()
    }
}

/// Parses a TOML string into a [`ListingDefinition`].
///
/// # Errors
///
/// Returns [`ListingError::Toml`] if the TOML is malformed or missing
/// required fields.
pub fn parse_listing_toml(toml_str: &str) -> Result<ListingDefinition, ListingError> {
    Ok(toml::de::from_str(toml_str)?)
}
