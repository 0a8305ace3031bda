//! One parameterized scrape pipeline for every listing.
//!
//! [`scrape_listing`] never fails: fetch and locate problems become a
//! [`ScrapeOutcome`] with an empty table list, and per-row problems become
//! [`ParseWarning`]s next to the rows that did extract.

use std::sync::Arc;

use bidboard_scraper::{FetchSettings, Transport, fetch_pages};
use bidboard_table::chain::FilterState;
use bidboard_table_models::Table;
use chrono::{DateTime, Utc};
use scraper::Html;
use url::Url;

use crate::extract::extract_table;
use crate::listing_def::{ListingDefinition, ListingView};
use crate::locate::{locate_tables, name_tables};
use crate::progress::ProgressCallback;
use crate::{ListingError, ParseWarning, ParseWarningKind};

/// Message shown when a listing has nothing to display.
pub const NO_DATA_MESSAGE: &str = "No submissions at this time.";

/// Caller overrides for one scrape.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrapeOptions {
    /// Lowers the listing's page limit.
    pub max_pages: Option<u32>,
    /// Swaps the listing's transport.
    pub transport: Option<Transport>,
}

/// How a scrape ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScrapeOutcome {
    /// Deterministic fetch, tables extracted.
    Complete,
    /// Tables extracted, but completeness depends on a rendering wait or
    /// pagination stopped early.
    BestEffort {
        /// Shown to the user as a disclaimer.
        reason: String,
    },
    /// The page was fetched but the expected table was not there.
    NoData {
        /// Shown to the user.
        message: String,
    },
    /// The page could not be fetched, or the listing definition is broken.
    Failed {
        /// Shown to the user.
        message: String,
    },
}

impl ScrapeOutcome {
    /// Whether tables were produced.
    #[must_use]
    pub const fn has_tables(&self) -> bool {
        matches!(self, Self::Complete | Self::BestEffort { .. })
    }

    /// Short machine-readable name of the outcome.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::BestEffort { .. } => "best_effort",
            Self::NoData { .. } => "no_data",
            Self::Failed { .. } => "failed",
        }
    }

    /// A user-facing notice, if the outcome warrants one.
    #[must_use]
    pub fn notice(&self) -> Option<&str> {
        match self {
            Self::Complete => None,
            Self::BestEffort { reason } => Some(reason),
            Self::NoData { message } | Self::Failed { message } => Some(message),
        }
    }
}

/// Everything one scrape produced.
#[derive(Debug, Clone)]
pub struct ScrapeReport {
    /// Listing id.
    pub listing_id: String,
    /// Listing title.
    pub title: String,
    /// Page that was scraped.
    pub source_url: String,
    /// Raw extracted tables, before any view is applied.
    pub tables: Vec<Table>,
    /// Per-row anomalies.
    pub warnings: Vec<ParseWarning>,
    /// How the scrape ended.
    pub outcome: ScrapeOutcome,
    /// When the scrape finished.
    pub scraped_at: DateTime<Utc>,
}

impl ScrapeReport {
    fn empty(def: &ListingDefinition, outcome: ScrapeOutcome) -> Self {
        Self {
            listing_id: def.id.clone(),
            title: def.title.clone(),
            source_url: def.url.clone(),
            tables: Vec::new(),
            warnings: Vec::new(),
            outcome,
            scraped_at: Utc::now(),
        }
    }

    /// Applies `view` with the session `state` to every table.
    ///
    /// The report itself is not modified, so any number of views can be
    /// taken from one scrape.
    #[must_use]
    pub fn view(&self, view: &ListingView, state: &FilterState) -> Vec<Table> {
        let chain = view.chain(state);
        self.tables.iter().map(|t| chain.apply(t)).collect()
    }

    /// Total rows across all raw tables.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.tables.iter().map(Table::len).sum()
    }
}

/// Runs the full pipeline for `def`.
///
/// Never returns an error: see [`ScrapeOutcome`].
pub async fn scrape_listing(
    def: &ListingDefinition,
    settings: &FetchSettings,
    options: ScrapeOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> ScrapeReport {
    let strategy = options
        .transport
        .map_or_else(|| def.fetch.clone(), |t| def.fetch.switched_to(t));

    log::info!(
        "[{}] Fetching {} via {}",
        def.id,
        def.url,
        strategy.transport()
    );
    progress.set_message(format!("Fetching {}", def.title));

    let fetched = match fetch_pages(&def.url, &strategy, settings, options.max_pages).await {
        Ok(fetched) => fetched,
        Err(e) => {
            log::error!("[{}] Fetch failed: {e}", def.id);
            progress.finish_and_clear();
            return ScrapeReport::empty(
                def,
                ScrapeOutcome::Failed {
                    message: format!("Error fetching page: {e}"),
                },
            );
        }
    };

    progress.set_total(fetched.pages.len() as u64);
    progress.set_message(format!("Extracting {}", def.title));

    let (tables, warnings) = match extract_pages(def, &fetched.pages, progress.as_ref()) {
        Ok(extracted) => extracted,
        Err(e) => {
            progress.finish_and_clear();
            return ScrapeReport::empty(def, extract_failure(&def.id, &e));
        }
    };

    let outcome = if let Some(reason) = &fetched.stopped_early {
        ScrapeOutcome::BestEffort {
            reason: format!(
                "Best-effort scrape: pagination stopped after {} page(s) ({reason}).",
                fetched.pages.len()
            ),
        }
    } else if fetched.best_effort {
        ScrapeOutcome::BestEffort {
            reason: "Best-effort scrape: the page was captured after a fixed rendering wait and \
                     may be incomplete."
                .to_owned(),
        }
    } else {
        ScrapeOutcome::Complete
    };

    let report = ScrapeReport {
        listing_id: def.id.clone(),
        title: def.title.clone(),
        source_url: def.url.clone(),
        tables,
        warnings,
        outcome,
        scraped_at: Utc::now(),
    };

    log::info!(
        "[{}] Extracted {} rows in {} table(s), {} warning(s)",
        def.id,
        report.row_count(),
        report.tables.len(),
        report.warnings.len()
    );
    progress.finish(format!("{}: {} rows", def.title, report.row_count()));
    report
}

/// A missing table means the site has nothing listed; anything else is a
/// broken listing definition.
fn extract_failure(id: &str, e: &ListingError) -> ScrapeOutcome {
    if matches!(e, ListingError::TableNotFound { .. }) {
        log::warn!("[{id}] {e}");
        ScrapeOutcome::NoData {
            message: format!("No data found: {e}"),
        }
    } else {
        log::error!("[{id}] Listing definition error: {e}");
        ScrapeOutcome::Failed {
            message: format!("Listing definition error: {e}"),
        }
    }
}

/// Locates and extracts every page, merging same-named tables.
///
/// The first page must contain the target table; later pages without it
/// are skipped with a warning.
///
/// # Errors
///
/// Returns [`ListingError::TableNotFound`] if the first page has no match,
/// or a configuration error from the locator or extractor.
pub fn extract_pages(
    def: &ListingDefinition,
    pages: &[String],
    progress: &dyn ProgressCallback,
) -> Result<(Vec<Table>, Vec<ParseWarning>), ListingError> {
    let base = Url::parse(def.link_base()).map_err(|source| ListingError::InvalidBaseUrl {
        url: def.link_base().to_owned(),
        source,
    })?;

    let mut tables: Vec<Table> = Vec::new();
    let mut warnings = Vec::new();

    for (page_no, html) in pages.iter().enumerate() {
        let document = Html::parse_document(html);

        let located = match locate_tables(&document, &def.locator) {
            Ok(located) => located,
            Err(e @ ListingError::TableNotFound { .. }) if page_no > 0 => {
                log::warn!("[{}] page {}: {e}; skipping page", def.id, page_no + 1);
                progress.inc(1);
                continue;
            }
            Err(e) => return Err(e),
        };

        for (name, element) in name_tables(located, &def.locator.names, &def.title) {
            let extraction = extract_table(element, &name, &def.rows, &base)?;
            warnings.extend(extraction.warnings);
            merge_table(&mut tables, extraction.table, &mut warnings);
        }

        progress.inc(1);
    }

    Ok((tables, warnings))
}

/// Appends `incoming` to the same-named table, or adds it as a new one.
///
/// Rows that do not fit the existing header width are reported and
/// dropped.
fn merge_table(tables: &mut Vec<Table>, incoming: Table, warnings: &mut Vec<ParseWarning>) {
    let Some(existing) = tables.iter_mut().find(|t| t.name() == incoming.name()) else {
        tables.push(incoming);
        return;
    };

    if existing.headers().is_empty() {
        *existing = incoming;
        return;
    }

    for (i, row) in incoming.rows().iter().enumerate() {
        let found = row.width();
        if existing.push_row(row.clone()).is_err() {
            let warning = ParseWarning {
                table: existing.name().to_owned(),
                row: i,
                kind: ParseWarningKind::CellCountMismatch {
                    expected: existing.headers().len(),
                    found,
                },
            };
            log::warn!("{warning}");
            warnings.push(warning);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::listing_def::parse_listing_toml;
    use crate::progress::{NullProgress, null_progress};

    #[derive(Default)]
    struct Recorder {
        cleared: AtomicBool,
        finished: Mutex<Vec<String>>,
    }

    impl ProgressCallback for Recorder {
        fn set_total(&self, _total: u64) {}
        fn inc(&self, _delta: u64) {}
        fn set_message(&self, _msg: String) {}
        fn finish(&self, msg: String) {
            self.finished.lock().unwrap().push(msg);
        }
        fn finish_and_clear(&self) {
            self.cleared.store(true, Ordering::SeqCst);
        }
    }

    const FIXTURE: &str = r#"
        <html><body>
          <table class="bids">
            <tr><th>Title</th><th>Document</th><th>Due</th></tr>
            <tr><td>Bridge painting</td><td><a href="/doc.pdf">Plans</a></td><td>01/02/2024</td></tr>
            <tr><td>Culvert repair</td><td><a href="/c.pdf">Plans</a></td></tr>
            <tr><td>Roof replacement</td><td><a href="/r.pdf">Plans</a></td><td>03/04/2024</td></tr>
            <tr><td>Signal upgrade</td><td>Pending</td><td>05/06/2024</td></tr>
          </table>
        </body></html>
    "#;

    fn listing(url: &str) -> ListingDefinition {
        listing_with_base(url, "https://example.org")
    }

    fn listing_with_base(url: &str, base_url: &str) -> ListingDefinition {
        parse_listing_toml(&format!(
            r#"
            id = "fixture"
            title = "Fixture Bids"
            url = "{url}"
            base_url = "{base_url}"

            [fetch]
            type = "direct"

            [locator]
            target = {{ tag = "table", class = "bids" }}

            [rows]
            header = {{ type = "selector", selector = "th" }}
            overrides = [{{ index = 1, rule = {{ type = "link" }} }}]

            [view]
            sort = {{ column = "Due", descending = true }}
            serial_column = "No."
            "#
        ))
        .unwrap()
    }

    #[test]
    fn extracts_three_of_four_rows() {
        let def = listing("https://example.org/bids");
        let (tables, warnings) =
            extract_pages(&def, &[FIXTURE.to_string()], &NullProgress).unwrap();

        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name(), "Fixture Bids");
        assert_eq!(tables[0].len(), 3);
        assert_eq!(warnings.len(), 1);

        let link = &tables[0].rows()[0].cells[1];
        assert_eq!(link.links[0].href, "https://example.org/doc.pdf");
    }

    #[test]
    fn merges_pages_into_one_table() {
        let def = listing("https://example.org/bids");
        let pages = vec![FIXTURE.to_string(), FIXTURE.to_string()];
        let (tables, _) = extract_pages(&def, &pages, &NullProgress).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].len(), 6);
    }

    #[test]
    fn later_pages_without_the_table_are_skipped() {
        let def = listing("https://example.org/bids");
        let pages = vec![FIXTURE.to_string(), "<html><body></body></html>".to_string()];
        let (tables, _) = extract_pages(&def, &pages, &NullProgress).unwrap();
        assert_eq!(tables[0].len(), 3);

        let pages = vec!["<html><body></body></html>".to_string()];
        assert!(matches!(
            extract_pages(&def, &pages, &NullProgress),
            Err(ListingError::TableNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn scrape_reports_complete_for_direct_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bids"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FIXTURE))
            .mount(&server)
            .await;

        let def = listing(&format!("{}/bids", server.uri()));
        let report = scrape_listing(
            &def,
            &FetchSettings::default(),
            ScrapeOptions::default(),
            &null_progress(),
        )
        .await;

        assert_eq!(report.outcome, ScrapeOutcome::Complete);
        assert_eq!(report.row_count(), 3);

        let viewed = report.view(&def.view, &FilterState::default());
        let dates: Vec<&str> = viewed[0]
            .rows()
            .iter()
            .map(|r| r.cells[3].text.as_str())
            .collect();
        assert_eq!(dates, vec!["05/06/2024", "03/04/2024", "01/02/2024"]);
        assert_eq!(viewed[0].rows()[2].cells[0].text, "3");
    }

    #[tokio::test]
    async fn missing_table_becomes_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let def = listing(&format!("{}/bids", server.uri()));
        let report = scrape_listing(
            &def,
            &FetchSettings::default(),
            ScrapeOptions::default(),
            &null_progress(),
        )
        .await;

        assert!(matches!(report.outcome, ScrapeOutcome::NoData { .. }));
        assert!(report.tables.is_empty());
        assert!(report.outcome.notice().unwrap().starts_with("No data found"));
    }

    #[tokio::test]
    async fn fetch_error_becomes_failed_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let def = listing(&format!("{}/bids", server.uri()));
        let recorder = Arc::new(Recorder::default());
        let progress: Arc<dyn ProgressCallback> = recorder.clone();
        let report = scrape_listing(
            &def,
            &FetchSettings::default(),
            ScrapeOptions::default(),
            &progress,
        )
        .await;

        assert!(matches!(report.outcome, ScrapeOutcome::Failed { .. }));
        assert!(!report.outcome.has_tables());
        assert!(recorder.cleared.load(Ordering::SeqCst));
        assert!(recorder.finished.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn bad_base_url_is_a_failure_not_no_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(FIXTURE))
            .mount(&server)
            .await;

        let def = listing_with_base(&format!("{}/bids", server.uri()), "not a url");
        let report = scrape_listing(
            &def,
            &FetchSettings::default(),
            ScrapeOptions::default(),
            &null_progress(),
        )
        .await;

        assert_eq!(report.outcome.kind(), "failed");
        assert!(report.tables.is_empty());
        let notice = report.outcome.notice().unwrap();
        assert!(notice.starts_with("Listing definition error"));
        assert!(notice.contains("not a url"));
    }
}
