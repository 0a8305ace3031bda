//! Row extraction from a located table element.
//!
//! Extraction only reads the parsed document. Rules that need to "remove"
//! markup (nested tags, text outside markers) work on text copies or on a
//! freshly parsed fragment, never on the source tree.

use bidboard_table_models::{Cell, Hyperlink, Row, Table};
use scraper::{ElementRef, Html, Node, Selector};
use url::Url;

use crate::listing_def::{CellRef, ColumnSpec, ExtractRule, HeaderSource, RowRules};
use crate::locate::parse_selector;
use crate::parsing::{
    clean_text, first_quoted_argument, reformat_date, resolve_href, strip_boilerplate,
};
use crate::{ListingError, ParseWarning, ParseWarningKind};

/// Result of extracting one table element.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Well-formed rows under the resolved headers.
    pub table: Table,
    /// Per-row anomalies, in row order.
    pub warnings: Vec<ParseWarning>,
}

/// Extracts a [`Table`] named `name` from `element` using `rules`.
///
/// Rows whose cell count differs from the header count are dropped with a
/// [`ParseWarningKind::CellCountMismatch`] warning. Rows with no cells at
/// all (layout and header rows) are skipped silently.
///
/// # Errors
///
/// Returns [`ListingError`] only for configuration problems (invalid
/// selectors or base URLs), never for page content.
pub fn extract_table(
    element: ElementRef<'_>,
    name: &str,
    rules: &RowRules,
    base: &Url,
) -> Result<Extraction, ListingError> {
    let row_sel = parse_selector(&rules.row_selector)?;
    let cell_sel = parse_selector(&rules.cell_selector)?;
    let rows: Vec<ElementRef<'_>> = element.select(&row_sel).collect();

    let mut warnings = Vec::new();
    let warn = |warnings: &mut Vec<ParseWarning>, row: usize, kind: ParseWarningKind| {
        let warning = ParseWarning {
            table: name.to_owned(),
            row,
            kind,
        };
        log::warn!("{warning}");
        warnings.push(warning);
    };

    // ── Resolve headers ─────────────────────────────────────────────────
    let (header_cells, header_row): (Vec<String>, Option<usize>) = match &rules.header {
        HeaderSource::Row {
            index,
            cell_selector,
        } => {
            let sel = parse_selector(cell_selector)?;
            let cells = rows
                .get(*index)
                .map(|r| r.select(&sel).map(element_text).collect())
                .unwrap_or_default();
            (cells, Some(*index))
        }
        HeaderSource::Selector { selector } => {
            let sel = parse_selector(selector)?;
            (element.select(&sel).map(element_text).collect(), None)
        }
        HeaderSource::Columns { .. } => (Vec::new(), None),
    };

    let explicit = match &rules.header {
        HeaderSource::Columns { columns } => Some(columns.as_slice()),
        _ => None,
    };

    let mut headers: Vec<String> = Vec::new();
    match explicit {
        Some(columns) => headers.extend(columns.iter().map(|c| c.name.clone())),
        None => {
            if header_cells.is_empty() {
                warn(&mut warnings, 0, ParseWarningKind::MissingHeader);
                return Ok(Extraction {
                    table: Table::new(name, Vec::new()),
                    warnings,
                });
            }
            headers.extend(rules.leading.iter().map(|c| c.name.clone()));
            headers.extend(header_cells.iter().cloned());
        }
    }

    let mut table = Table::new(name, headers);

    // ── Extract rows ────────────────────────────────────────────────────
    for (i, row) in rows.iter().enumerate() {
        if i < rules.skip_rows || Some(i) == header_row {
            continue;
        }

        let read = match explicit {
            Some(columns) => match explicit_row(*row, &cell_sel, columns, rules, base)? {
                Some(read) => read,
                None => continue,
            },
            None => {
                let raw: Vec<ElementRef<'_>> = row.select(&cell_sel).collect();
                if raw.is_empty() {
                    continue;
                }
                if raw.len() != header_cells.len() {
                    warn(
                        &mut warnings,
                        i,
                        ParseWarningKind::CellCountMismatch {
                            expected: header_cells.len(),
                            found: raw.len(),
                        },
                    );
                    continue;
                }

                auto_row(*row, &raw, &header_cells, rules, base)?
            }
        };

        let cells = match read {
            RowRead::Missing(column) => {
                warn(&mut warnings, i, ParseWarningKind::MissingCell { column });
                continue;
            }
            RowRead::Cells(cells, date_warnings) => {
                for kind in date_warnings {
                    warn(&mut warnings, i, kind);
                }
                cells
            }
        };

        if let Err(e) = table.push_row(Row::new(cells)) {
            log::warn!("[{name}] row {i}: {e}");
        }
    }

    log::debug!(
        "[{name}] extracted {} rows ({} warnings)",
        table.len(),
        warnings.len()
    );
    Ok(Extraction { table, warnings })
}

enum RowRead {
    Missing(String),
    Cells(Vec<Cell>, Vec<ParseWarningKind>),
}

/// Reads one row against explicit columns. `None` marks a layout row where
/// no column resolves.
fn explicit_row(
    row: ElementRef<'_>,
    cell_sel: &Selector,
    columns: &[ColumnSpec],
    rules: &RowRules,
    base: &Url,
) -> Result<Option<RowRead>, ListingError> {
    let raw: Vec<ElementRef<'_>> = row.select(cell_sel).collect();
    let mut resolved = Vec::with_capacity(columns.len());
    for column in columns {
        resolved.push(resolve_cell(row, &raw, &column.cell)?);
    }

    if resolved.iter().all(Option::is_none) {
        return Ok(None);
    }

    let mut cells = Vec::with_capacity(columns.len());
    let mut notes = Vec::new();
    for (column, cell) in columns.iter().zip(resolved) {
        let Some(cell) = cell else {
            return Ok(Some(RowRead::Missing(column.name.clone())));
        };
        let strip = combined_strip(&rules.strip, &column.strip);
        let (value, note) = apply_rule(cell, &column.rule, &column.name, &strip, base)?;
        cells.push(value);
        notes.extend(note);
    }
    Ok(Some(RowRead::Cells(cells, notes)))
}

fn auto_row<'a>(
    row: ElementRef<'a>,
    raw: &[ElementRef<'a>],
    header_cells: &[String],
    rules: &RowRules,
    base: &Url,
) -> Result<RowRead, ListingError> {
    let mut cells = Vec::with_capacity(rules.leading.len() + raw.len());
    let mut notes = Vec::new();

    for column in &rules.leading {
        let Some(cell) = resolve_cell(row, raw, &column.cell)? else {
            return Ok(RowRead::Missing(column.name.clone()));
        };
        let strip = combined_strip(&rules.strip, &column.strip);
        let (value, note) = apply_rule(cell, &column.rule, &column.name, &strip, base)?;
        cells.push(value);
        notes.extend(note);
    }

    for (idx, (cell, header)) in raw.iter().zip(header_cells).enumerate() {
        let (value, note) = apply_rule(*cell, rules.rule_for(idx), header, &rules.strip, base)?;
        cells.push(value);
        notes.extend(note);
    }

    Ok(RowRead::Cells(cells, notes))
}

fn resolve_cell<'a>(
    row: ElementRef<'a>,
    raw: &[ElementRef<'a>],
    cell: &CellRef,
) -> Result<Option<ElementRef<'a>>, ListingError> {
    Ok(match cell {
        CellRef::Index(i) => raw.get(*i).copied(),
        CellRef::Selector(css) => row.select(&parse_selector(css)?).next(),
    })
}

fn combined_strip(row_level: &[String], column_level: &[String]) -> Vec<String> {
    row_level.iter().chain(column_level).cloned().collect()
}

/// Applies one extraction rule to a cell.
///
/// Returns the produced cell and, for unparseable dates, the warning to
/// record against the row.
///
/// # Errors
///
/// Returns [`ListingError`] for invalid rule selectors or base URLs.
pub fn apply_rule(
    cell: ElementRef<'_>,
    rule: &ExtractRule,
    column: &str,
    strip: &[String],
    base: &Url,
) -> Result<(Cell, Option<ParseWarningKind>), ListingError> {
    let visible = || strip_boilerplate(&element_text(cell), strip);

    let value = match rule {
        ExtractRule::Text => Cell::text(visible()),
        ExtractRule::Link {
            selector,
            base_url,
            all,
            text_fallback,
        } => {
            let base = rule_base(base_url.as_deref(), base)?;
            let sel = parse_selector(selector)?;
            let anchors = cell
                .select(&sel)
                .filter_map(|a| a.value().attr("href").map(|href| (a, href)));

            let mut links: Vec<Hyperlink> = Vec::new();
            for (anchor, href) in anchors {
                let href = resolve_href(&base, href);
                let text = strip_boilerplate(&element_text(anchor), strip);
                let text = if text.is_empty() { href.clone() } else { text };
                links.push(Hyperlink { text, href });
                if !*all {
                    break;
                }
            }

            if links.is_empty() {
                Cell::text(if *text_fallback { visible() } else { String::new() })
            } else {
                let text = links
                    .iter()
                    .map(|l| l.text.as_str())
                    .collect::<Vec<_>>()
                    .join(" ");
                Cell {
                    text,
                    links,
                    heuristic: false,
                }
            }
        }
        ExtractRule::Between {
            start,
            end,
            fallback_end,
        } => {
            let text = between_markers(&cell.inner_html(), start, end, fallback_end.as_deref());
            Cell::text(strip_boilerplate(&text, strip)).with_heuristic(true)
        }
        ExtractRule::DateReformat {
            input_format,
            output_format,
        } => {
            let text = visible();
            if text.is_empty() {
                Cell::text(text)
            } else if let Some(date) = reformat_date(&text, input_format, output_format) {
                Cell::text(date)
            } else {
                return Ok((
                    Cell::text(text.clone()),
                    Some(ParseWarningKind::UnparsedDate {
                        column: column.to_owned(),
                        value: text,
                    }),
                ));
            }
        }
        ExtractRule::StripNestedTag { tag, after } => {
            let markup = cell.inner_html();
            let tail = after
                .as_deref()
                .and_then(|marker| markup.find(marker).map(|i| &markup[i + marker.len()..]));
            let text = match tail {
                Some(tail) => text_without_tag(Html::parse_fragment(tail).root_element(), tag),
                None => text_without_tag(cell, tag),
            };
            Cell::text(strip_boilerplate(&text, strip))
        }
        ExtractRule::OnclickLink { element, base_url } => {
            let base = rule_base(base_url.as_deref(), base)?;
            let sel = parse_selector(&format!("{element}[onclick]"))?;
            let target = cell
                .select(&sel)
                .find_map(|el| el.value().attr("onclick").and_then(first_quoted_argument));
            let text = visible();
            match target {
                Some(path) => Cell::link(text, resolve_href(&base, path)),
                None => Cell::text(text),
            }
        }
        ExtractRule::LeadingText { selector } => {
            let sel = parse_selector(selector)?;
            let text = cell
                .select(&sel)
                .next()
                .and_then(|el| {
                    el.text()
                        .map(str::trim)
                        .find(|t| !t.is_empty())
                        .map(|t| clean_text([t]))
                })
                .unwrap_or_default();
            Cell::text(strip_boilerplate(&text, strip))
        }
    };

    Ok((value, None))
}

fn rule_base(override_url: Option<&str>, base: &Url) -> Result<Url, ListingError> {
    override_url.map_or_else(
        || Ok(base.clone()),
        |url| {
            Url::parse(url).map_err(|source| ListingError::InvalidBaseUrl {
                url: url.to_owned(),
                source,
            })
        },
    )
}

/// Visible text of an element with whitespace collapsed.
fn element_text(el: ElementRef<'_>) -> String {
    clean_text(el.text())
}

/// Text between `start` and `end` in raw markup.
///
/// A missing start marker starts at the beginning; a missing end marker
/// falls back to `fallback_end`, then to the end of the markup. Tags inside
/// the slice are dropped by re-parsing it as a fragment.
#[must_use]
pub fn between_markers(markup: &str, start: &str, end: &str, fallback_end: Option<&str>) -> String {
    let from = markup.find(start).map_or(0, |i| i + start.len());
    let rest = &markup[from..];
    let to = rest
        .find(end)
        .or_else(|| fallback_end.and_then(|f| rest.find(f)))
        .unwrap_or(rest.len());

    let fragment = Html::parse_fragment(&rest[..to]);
    clean_text(fragment.root_element().text())
}

/// Visible text of `cell` skipping everything inside `tag` elements.
fn text_without_tag(cell: ElementRef<'_>, tag: &str) -> String {
    let parts = cell.descendants().filter_map(|node| {
        let Node::Text(text) = node.value() else {
            return None;
        };
        let inside_tag = node
            .ancestors()
            .take_while(|a| a.id() != cell.id())
            .any(|a| {
                a.value()
                    .as_element()
                    .is_some_and(|e| e.name().eq_ignore_ascii_case(tag))
            });
        (!inside_tag).then_some(&**text)
    });
    clean_text(parts)
}
