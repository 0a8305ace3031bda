#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! HTML rendering for scraped tables.
//!
//! All cell text goes through askama's HTML escaping. Only hyperlinks with
//! an `http`, `https` or `mailto` target become anchors; anything else is
//! rendered as plain text.
//!
//! [`render_fragment`] produces a bare `<table>` for embedding (the
//! dashboard swaps these in place). [`render_document`] produces a
//! standalone page that [`write_temp_document`] and [`open_in_viewer`]
//! hand to the user's browser.

use std::io::Write as _;
use std::path::{Path, PathBuf};

use askama::Template;
use bidboard_table_models::{Cell, Table};

/// Row shown in place of data when a table has no rows.
pub const EMPTY_TABLE_MESSAGE: &str = "No submissions at this time.";

/// Errors from rendering or displaying a document.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// Template rendering failed.
    #[error("template error: {0}")]
    Template(#[from] askama::Error),

    /// Writing the document failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The default viewer could not be launched.
    #[error("failed to open {} in the default viewer: {source}", path.display())]
    Viewer {
        /// Document that was to be opened.
        path: PathBuf,
        /// Launch error.
        source: std::io::Error,
    },
}

// ── Fragment ────────────────────────────────────────────────────────────

struct LinkView<'a> {
    text: &'a str,
    href: Option<&'a str>,
}

struct CellView<'a> {
    text: &'a str,
    links: Vec<LinkView<'a>>,
    heuristic: bool,
}

impl<'a> From<&'a Cell> for CellView<'a> {
    fn from(cell: &'a Cell) -> Self {
        Self {
            text: &cell.text,
            links: cell
                .links
                .iter()
                .map(|l| LinkView {
                    text: if l.text.trim().is_empty() {
                        &l.href
                    } else {
                        &l.text
                    },
                    href: is_safe_href(&l.href).then_some(l.href.as_str()),
                })
                .collect(),
            heuristic: cell.heuristic,
        }
    }
}

#[derive(Template)]
#[template(path = "table.html")]
struct TableTemplate<'a> {
    table_id: &'a str,
    headers: &'a [String],
    rows: Vec<Vec<CellView<'a>>>,
    colspan: usize,
    empty_message: &'a str,
}

fn is_safe_href(href: &str) -> bool {
    let lower = href.trim_start().to_ascii_lowercase();
    ["http://", "https://", "mailto:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}

/// Renders `table` as a bare `<table id="{table_id}">` element.
///
/// # Errors
///
/// Returns [`RenderError::Template`] if rendering fails.
pub fn render_fragment(table: &Table, table_id: &str) -> Result<String, RenderError> {
    let template = TableTemplate {
        table_id,
        headers: table.headers(),
        rows: table
            .rows()
            .iter()
            .map(|row| row.cells.iter().map(CellView::from).collect())
            .collect(),
        colspan: table.headers().len().max(1),
        empty_message: EMPTY_TABLE_MESSAGE,
    };
    Ok(template.render()?)
}

/// A DOM id for the `index`-th table named `name`.
#[must_use]
pub fn table_dom_id(index: usize, name: &str) -> String {
    let slug: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    format!("table-{index}-{slug}")
}

// ── Document ────────────────────────────────────────────────────────────

/// Content of a standalone results page.
#[derive(Debug, Clone, Default)]
pub struct Document {
    /// Page heading and `<title>`.
    pub title: String,
    /// Target of the "Website" button.
    pub source_url: String,
    /// Tables in display order, already normalized.
    pub tables: Vec<Table>,
    /// Disclaimer or status message shown above the tables.
    pub notice: Option<String>,
    /// Initial value of the keyword box.
    pub keyword: String,
    /// Human-readable scrape time.
    pub scraped_at: Option<String>,
}

impl Document {
    #[must_use]
    pub fn new(title: impl Into<String>, source_url: impl Into<String>, tables: Vec<Table>) -> Self {
        Self {
            title: title.into(),
            source_url: source_url.into(),
            tables,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_notice(mut self, notice: impl Into<String>) -> Self {
        self.notice = Some(notice.into());
        self
    }

    #[must_use]
    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keyword = keyword.into();
        self
    }

    #[must_use]
    pub fn with_scraped_at(mut self, scraped_at: impl Into<String>) -> Self {
        self.scraped_at = Some(scraped_at.into());
        self
    }
}

#[derive(Template)]
#[template(path = "document.html")]
struct DocumentTemplate<'a> {
    title: &'a str,
    source_url: &'a str,
    notice: Option<&'a str>,
    keyword: &'a str,
    tables_html: String,
    scraped_at: Option<&'a str>,
}

/// Renders every table of `doc` into a standalone HTML page.
///
/// # Errors
///
/// Returns [`RenderError::Template`] if rendering fails.
pub fn render_document(doc: &Document) -> Result<String, RenderError> {
    let template = DocumentTemplate {
        title: &doc.title,
        source_url: &doc.source_url,
        notice: doc.notice.as_deref(),
        keyword: &doc.keyword,
        tables_html: render_tables(&doc.tables)?,
        scraped_at: doc.scraped_at.as_deref(),
    };
    Ok(template.render()?)
}

#[derive(Template)]
#[template(path = "sections.html")]
struct SectionsTemplate<'a> {
    sections: Vec<Section<'a>>,
}

struct Section<'a> {
    name: &'a str,
    html: String,
}

/// Renders each table as a `<section>` with an `<h2>` heading followed by
/// its fragment, in order.
///
/// # Errors
///
/// Returns [`RenderError::Template`] if rendering fails.
pub fn render_tables(tables: &[Table]) -> Result<String, RenderError> {
    let sections = tables
        .iter()
        .enumerate()
        .map(|(i, table)| {
            Ok(Section {
                name: table.name(),
                html: render_fragment(table, &table_dom_id(i, table.name()))?,
            })
        })
        .collect::<Result<Vec<_>, RenderError>>()?;
    Ok(SectionsTemplate { sections }.render()?)
}

// ── Output ──────────────────────────────────────────────────────────────

/// Writes `html` to a uniquely named `.html` file in the system temp
/// directory and returns its path. The file is kept after return.
///
/// # Errors
///
/// Returns [`RenderError::Io`] if the file cannot be created or written.
pub fn write_temp_document(html: &str, stem: &str) -> Result<PathBuf, RenderError> {
    let mut file = tempfile::Builder::new()
        .prefix(&format!("{stem}-"))
        .suffix(".html")
        .tempfile()?;
    file.write_all(html.as_bytes())?;
    file.flush()?;

    let (_, path) = file.keep().map_err(|e| e.error)?;
    log::debug!("Wrote {} bytes to {}", html.len(), path.display());
    Ok(path)
}

/// Opens `path` with the platform's default viewer.
///
/// # Errors
///
/// Returns [`RenderError::Viewer`] if the viewer process cannot be started.
pub fn open_in_viewer(path: &Path) -> Result<(), RenderError> {
    let mut command = viewer_command(path);
    log::info!("Opening {}", path.display());
    command
        .spawn()
        .map(|_| ())
        .map_err(|source| RenderError::Viewer {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(target_os = "macos")]
fn viewer_command(path: &Path) -> std::process::Command {
    let mut command = std::process::Command::new("open");
    command.arg(path);
    command
}

#[cfg(target_os = "windows")]
fn viewer_command(path: &Path) -> std::process::Command {
    let mut command = std::process::Command::new("cmd");
    command.args(["/C", "start", ""]).arg(path);
    command
}

#[cfg(not(any(target_os = "macos", target_os = "windows")))]
fn viewer_command(path: &Path) -> std::process::Command {
    let mut command = std::process::Command::new("xdg-open");
    command.arg(path);
    command
}

#[cfg(test)]
mod tests {
    use bidboard_table_models::{Hyperlink, Row};

    use super::*;

    fn bids() -> Table {
        Table::with_rows(
            "Current Opportunities",
            vec!["Title".to_string(), "Link".to_string()],
            vec![
                Row::new(vec![
                    Cell::text("Pier <repairs> & \"dredging\""),
                    Cell::link("Plans", "https://example.org/a.pdf?x=1&y=2"),
                ]),
                Row::new(vec![
                    Cell::text("Bad link"),
                    Cell::link("click", "javascript:alert(1)"),
                ]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn escapes_cell_text_and_attributes() {
        let html = render_fragment(&bids(), "t").unwrap();
        assert!(html.contains("Pier &lt;repairs&gt; &amp; &quot;dredging&quot;"));
        assert!(!html.contains("<repairs>"));
        assert!(html.contains("a.pdf?x=1&amp;y=2"));
    }

    #[test]
    fn only_web_links_become_anchors() {
        let html = render_fragment(&bids(), "t").unwrap();
        assert_eq!(html.matches("<a ").count(), 1);
        assert!(html.contains("target=\"_blank\""));
        assert!(!html.contains("javascript:"));
        assert!(html.contains("click"));
    }

    #[test]
    fn multiple_links_render_in_one_cell() {
        let mut cell = Cell::text("Plans Addendum");
        cell.links = vec![
            Hyperlink {
                text: "Plans".to_string(),
                href: "https://example.org/p.pdf".to_string(),
            },
            Hyperlink {
                text: "Addendum".to_string(),
                href: "https://example.org/a.pdf".to_string(),
            },
        ];
        let table = Table::with_rows("T", vec!["Docs".to_string()], vec![Row::new(vec![cell])])
            .unwrap();
        let html = render_fragment(&table, "t").unwrap();
        assert_eq!(html.matches("<a ").count(), 2);
        assert!(html.contains("<br>"));
    }

    #[test]
    fn empty_table_renders_placeholder_row() {
        let table = Table::new("Empty", vec!["A".to_string(), "B".to_string()]);
        let html = render_fragment(&table, "empty").unwrap();
        assert!(html.contains(EMPTY_TABLE_MESSAGE));
        assert!(html.contains("colspan=\"2\""));
    }

    #[test]
    fn heuristic_cells_are_marked() {
        let table = Table::with_rows(
            "T",
            vec!["Description".to_string()],
            vec![Row::new(vec![Cell::text("guess").with_heuristic(true)])],
        )
        .unwrap();
        assert!(render_fragment(&table, "t").unwrap().contains("class=\"heuristic\""));
    }

    #[test]
    fn document_has_one_section_per_table() {
        let doc = Document::new("Demo <Bids>", "https://example.org/bids", vec![bids(), bids()])
            .with_notice("Best-effort scrape");
        let html = render_document(&doc).unwrap();
        assert_eq!(html.matches("<h2>").count(), 2);
        assert!(html.contains("Demo &lt;Bids&gt;"));
        assert!(html.contains("Best-effort scrape"));
        assert!(html.contains(">Website</a>"));
        assert!(html.contains("id=\"table-0-current-opportunities\""));
        assert!(html.contains("id=\"table-1-current-opportunities\""));
    }

    #[test]
    fn dom_ids_are_slugs() {
        assert_eq!(table_dom_id(2, "Under Review / Pending"), "table-2-under-review-pending");
    }

    #[test]
    fn temp_document_is_kept_on_disk() {
        let path = write_temp_document("<p>hi</p>", "demo").unwrap();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("html"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<p>hi</p>");
        std::fs::remove_file(path).unwrap();
    }
}
