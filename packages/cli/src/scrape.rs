//! One-shot scrape: run the pipeline, render a standalone page, open it.

use std::path::PathBuf;
use std::time::Instant;

use bidboard_cli_utils::{IndicatifProgress, MultiProgress};
use bidboard_listing::ListingDefinition;
use bidboard_listing::pipeline::{ScrapeOptions, ScrapeReport, scrape_listing};
use bidboard_render::{Document, open_in_viewer, render_document, write_temp_document};
use bidboard_scraper::FetchSettings;
use bidboard_table::chain::FilterState;

/// What the user asked for beyond the listing itself.
#[derive(Debug, Clone, Default)]
pub struct ScrapeRequest {
    /// Keyword applied to the view and pre-filled in the page.
    pub keyword: Option<String>,
    /// Pipeline overrides.
    pub options: ScrapeOptions,
    /// Open the page in the default viewer when done.
    pub open: bool,
}

/// Scrapes `def` and writes the rendered page to a temp file.
///
/// Returns the page path, or `None` when there was nothing to render (the
/// reason has already been printed).
///
/// # Errors
///
/// Returns an error if the page cannot be rendered, written or opened.
pub async fn run(
    multi: &MultiProgress,
    def: &ListingDefinition,
    request: &ScrapeRequest,
) -> Result<Option<PathBuf>, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let settings = FetchSettings::from_env();
    let progress = IndicatifProgress::scrape_spinner(multi, &format!("Scraping {}", def.title));

    let report = scrape_listing(def, &settings, request.options, &progress).await;
    log::debug!(
        "[{}] Pipeline finished in {:.1}s",
        def.id,
        start.elapsed().as_secs_f64()
    );

    if !report.outcome.has_tables() {
        if let Some(message) = report.outcome.notice() {
            println!("{message}");
        }
        return Ok(None);
    }

    if !report.warnings.is_empty() {
        println!(
            "{} malformed row(s) skipped (run with RUST_LOG=warn for details)",
            report.warnings.len()
        );
    }

    let doc = build_document(def, &report, request.keyword.as_deref());
    for table in &doc.tables {
        println!("{:<40} {} rows", table.name(), table.len());
    }

    let html = render_document(&doc)?;
    let path = write_temp_document(&html, &def.id)?;
    println!("Wrote {}", path.display());

    if request.open {
        open_in_viewer(&path)?;
    }

    Ok(Some(path))
}

/// Applies the listing's view (plus `keyword`) to `report` and wraps the
/// result in a [`Document`].
#[must_use]
pub fn build_document(
    def: &ListingDefinition,
    report: &ScrapeReport,
    keyword: Option<&str>,
) -> Document {
    let keyword = keyword.unwrap_or_default();
    let state = FilterState::default().with_keyword(keyword);

    let mut doc = Document::new(&def.title, &def.url, report.view(&def.view, &state))
        .with_keyword(keyword)
        .with_scraped_at(report.scraped_at.format("%Y-%m-%d %H:%M UTC").to_string());
    if let Some(notice) = report.outcome.notice() {
        doc = doc.with_notice(notice);
    }
    doc
}

#[cfg(test)]
mod tests {
    use bidboard_listing::pipeline::ScrapeOutcome;
    use bidboard_listing::registry::find_listing;
    use bidboard_table_models::{Row, Table};
    use chrono::Utc;

    use super::*;

    fn report(outcome: ScrapeOutcome) -> ScrapeReport {
        let table = Table::with_rows(
            "Current Opportunities",
            vec![
                "Title".to_string(),
                "Agency".to_string(),
                "Due".to_string(),
            ],
            vec![
                Row::from_texts(["Pier repairs", "OGS", "01/02/2024"]),
                Row::from_texts(["Roof survey", "OGS", "03/04/2024"]),
            ],
        )
        .unwrap();

        ScrapeReport {
            listing_id: "nys_ogs_consultant".to_string(),
            title: "NYS OGS".to_string(),
            source_url: "https://example.org".to_string(),
            tables: vec![table],
            warnings: Vec::new(),
            outcome,
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn keyword_narrows_document_tables() {
        let def = find_listing("nys_ogs_consultant").unwrap();
        let doc = build_document(&def, &report(ScrapeOutcome::Complete), Some("roof"));
        assert_eq!(doc.tables.len(), 1);
        assert_eq!(doc.tables[0].len(), 1);
        assert_eq!(doc.keyword, "roof");
        assert!(doc.notice.is_none());
        assert_eq!(doc.source_url, def.url);
    }

    #[test]
    fn best_effort_notice_is_carried() {
        let def = find_listing("nys_ogs_consultant").unwrap();
        let outcome = ScrapeOutcome::BestEffort {
            reason: "may be incomplete".to_string(),
        };
        let doc = build_document(&def, &report(outcome), None);
        assert_eq!(doc.notice.as_deref(), Some("may be incomplete"));
        assert_eq!(doc.tables[0].len(), 2);
    }
}
