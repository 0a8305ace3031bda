//! Per-server cache of the most recent scrape for each listing, plus the
//! gate that keeps scrapes from overlapping.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use bidboard_listing::ListingView;
use bidboard_listing::pipeline::ScrapeReport;
use bidboard_table::chain::FilterState;
use bidboard_table_models::Table;

/// Last [`ScrapeReport`] per listing id.
///
/// Reports are never modified after they are stored: every view is
/// computed from the raw tables, so narrowing and then clearing the
/// filters returns the original rows.
#[derive(Debug, Default)]
pub struct SessionCache {
    reports: BTreeMap<String, ScrapeReport>,
}

impl SessionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `report`, replacing any earlier report for the same listing.
    pub fn store(&mut self, report: ScrapeReport) {
        self.reports.insert(report.listing_id.clone(), report);
    }

    #[must_use]
    pub fn get(&self, listing_id: &str) -> Option<&ScrapeReport> {
        self.reports.get(listing_id)
    }

    /// Applies `view` with `state` to the cached report, if any.
    #[must_use]
    pub fn view(
        &self,
        listing_id: &str,
        view: &ListingView,
        state: &FilterState,
    ) -> Option<Vec<Table>> {
        self.get(listing_id).map(|report| report.view(view, state))
    }

    /// Distinct non-empty values of `column` across the cached tables, in
    /// first-seen order.
    #[must_use]
    pub fn column_values(&self, listing_id: &str, column: &str) -> Vec<String> {
        let mut values: Vec<String> = Vec::new();
        let Some(report) = self.get(listing_id) else {
            return values;
        };

        for table in &report.tables {
            let Some(idx) = table.column_index(column) else {
                continue;
            };
            for row in table.rows() {
                if let Some(cell) = row.cell(idx) {
                    let text = cell.text.trim();
                    if !text.is_empty() && !values.iter().any(|v| v == text) {
                        values.push(text.to_owned());
                    }
                }
            }
        }
        values
    }
}

/// Allows at most one scrape in flight.
#[derive(Debug, Default)]
pub struct ScrapeGate {
    busy: AtomicBool,
}

impl ScrapeGate {
    /// Claims the gate, or returns `None` if a scrape is already running.
    #[must_use]
    pub fn try_acquire(&self) -> Option<ScrapeGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| ScrapeGuard { gate: self })
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the [`ScrapeGate`] on drop.
#[derive(Debug)]
pub struct ScrapeGuard<'a> {
    gate: &'a ScrapeGate,
}

impl Drop for ScrapeGuard<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}
