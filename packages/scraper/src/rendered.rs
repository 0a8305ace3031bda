//! Headless-browser fetching over `WebDriver`.
//!
//! One browser session is opened per fetch and always closed before
//! returning, whether capture succeeded, failed, or timed out.
//!
//! After navigation the page is given a fixed settle duration before its
//! source is captured. There is no signal that client-side rendering has
//! actually finished, so results from this module are always marked
//! best-effort.
//!
//! Only the first page is required. Every later page is a separate step
//! with its own time limit, and any failure while paginating ends
//! pagination with the pages gathered so far.

use std::time::Duration;

use thirtyfour::ChromiumLikeCapabilities as _;
use thirtyfour::prelude::*;

use crate::{FetchError, FetchSettings, FetchedPages, Pagination};

/// Opens a headless browser session, captures up to `page_limit` pages,
/// and closes the session.
///
/// # Errors
///
/// Returns [`FetchError::WebDriver`] if the session cannot be created or the
/// first page cannot be captured, and [`FetchError::RenderTimeout`] if the
/// first page takes longer than [`FetchSettings::render_timeout`].
pub async fn fetch_rendered(
    url: &str,
    settings: &FetchSettings,
    settle: Duration,
    pagination: Option<&Pagination>,
    page_limit: u32,
) -> Result<FetchedPages, FetchError> {
    let mut caps = DesiredCapabilities::chrome();
    caps.set_headless()?;
    caps.add_arg("--disable-gpu")?;

    log::debug!("Opening browser session at {}", settings.webdriver_url);
    let driver = WebDriver::new(settings.webdriver_url.as_str(), caps).await?;

    let first = tokio::time::timeout(settings.render_timeout, first_page(&driver, url, settle))
        .await
        .unwrap_or_else(|_| {
            Err(FetchError::RenderTimeout {
                url: url.to_owned(),
                seconds: settings.render_timeout.as_secs(),
            })
        });

    let result = match (first, pagination) {
        (Err(e), _) => Err(e),
        (Ok(html), None) => Ok(collected(vec![html], None)),
        (Ok(html), Some(pagination)) => {
            let browser = BrowserPages {
                driver: &driver,
                pagination,
                settle,
            };
            let (pages, stopped_early) =
                paginate(&browser, html, page_limit, settings.render_timeout).await;
            if let Some(reason) = &stopped_early {
                log::info!("Stopped paginating {url}: {reason}");
            }
            Ok(collected(pages, stopped_early))
        }
    };

    if let Err(e) = driver.quit().await {
        log::warn!("Failed to close browser session for {url}: {e}");
    }

    result
}

const fn collected(pages: Vec<String>, stopped_early: Option<String>) -> FetchedPages {
    FetchedPages {
        pages,
        best_effort: true,
        stopped_early,
    }
}

async fn first_page(driver: &WebDriver, url: &str, settle: Duration) -> Result<String, FetchError> {
    driver.goto(url).await?;
    log::info!("Waiting {}s for {url} to render", settle.as_secs());
    tokio::time::sleep(settle).await;
    Ok(driver.source().await?)
}

/// Something that can move to the next page of a listing.
trait PageSource {
    /// Moves to the next page and returns its markup.
    ///
    /// The error is a human-readable reason to stop paginating.
    async fn advance(&self) -> Result<String, String>;
}

struct BrowserPages<'a> {
    driver: &'a WebDriver,
    pagination: &'a Pagination,
    settle: Duration,
}

impl PageSource for BrowserPages<'_> {
    async fn advance(&self) -> Result<String, String> {
        let next = self
            .driver
            .find(By::Css(self.pagination.next_selector.as_str()))
            .await
            .map_err(|e| format!("next-page control not found: {e}"))?;

        if !next.is_enabled().await.unwrap_or(false) {
            return Err("next-page control is disabled".to_owned());
        }

        next.click()
            .await
            .map_err(|e| format!("next-page control did not respond: {e}"))?;
        tokio::time::sleep(self.settle).await;

        self.driver
            .source()
            .await
            .map_err(|e| format!("failed to capture page source: {e}"))
    }
}

/// Collects pages after `first` until `page_limit` is reached or `source`
/// stops producing new pages.
///
/// Never fails: the second element says why pagination ended before the
/// limit, if it did.
async fn paginate(
    source: &impl PageSource,
    first: String,
    page_limit: u32,
    step_timeout: Duration,
) -> (Vec<String>, Option<String>) {
    let mut pages = vec![first];

    while pages.len() < page_limit as usize {
        let step = tokio::time::timeout(step_timeout, source.advance())
            .await
            .unwrap_or_else(|_| {
                Err(format!(
                    "next-page control did not respond within {}s",
                    step_timeout.as_secs()
                ))
            });

        match step {
            Ok(html) if pages.last() == Some(&html) => {
                let reason = format!(
                    "next-page control did not change the page after page {}",
                    pages.len()
                );
                return (pages, Some(reason));
            }
            Ok(html) => {
                pages.push(html);
                log::info!("Captured page {}", pages.len());
            }
            Err(reason) => return (pages, Some(reason)),
        }
    }

    (pages, None)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    enum Step {
        Page(&'static str),
        Fail(&'static str),
        Stall,
    }

    struct Scripted {
        steps: Mutex<VecDeque<Step>>,
    }

    impl Scripted {
        fn new(steps: impl IntoIterator<Item = Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into_iter().collect()),
            }
        }

        fn remaining(&self) -> usize {
            self.steps.lock().unwrap().len()
        }
    }

    impl PageSource for Scripted {
        async fn advance(&self) -> Result<String, String> {
            let step = self.steps.lock().unwrap().pop_front();
            match step {
                Some(Step::Page(html)) => Ok(html.to_string()),
                Some(Step::Fail(reason)) => Err(reason.to_string()),
                Some(Step::Stall) => std::future::pending().await,
                None => Err("next-page control not found".to_string()),
            }
        }
    }

    const STEP: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn stops_at_page_limit() {
        let source = Scripted::new([Step::Page("p2"), Step::Page("p3"), Step::Page("p4")]);
        let (pages, stopped) = paginate(&source, "p1".to_string(), 3, STEP).await;
        assert_eq!(pages, vec!["p1", "p2", "p3"]);
        assert!(stopped.is_none());
        assert_eq!(source.remaining(), 1);
    }

    #[tokio::test]
    async fn single_page_limit_never_advances() {
        let source = Scripted::new([Step::Page("p2")]);
        let (pages, stopped) = paginate(&source, "p1".to_string(), 1, STEP).await;
        assert_eq!(pages, vec!["p1"]);
        assert!(stopped.is_none());
        assert_eq!(source.remaining(), 1);
    }

    #[tokio::test]
    async fn unchanged_page_ends_pagination() {
        let source = Scripted::new([Step::Page("p2"), Step::Page("p2"), Step::Page("p3")]);
        let (pages, stopped) = paginate(&source, "p1".to_string(), 6, STEP).await;
        assert_eq!(pages, vec!["p1", "p2"]);
        assert!(stopped.unwrap().contains("did not change the page after page 2"));
    }

    #[tokio::test]
    async fn missing_or_disabled_control_keeps_gathered_pages() {
        let source = Scripted::new([Step::Page("p2")]);
        let (pages, stopped) = paginate(&source, "p1".to_string(), 6, STEP).await;
        assert_eq!(pages, vec!["p1", "p2"]);
        assert_eq!(stopped.as_deref(), Some("next-page control not found"));

        let source = Scripted::new([Step::Fail("next-page control is disabled")]);
        let (pages, stopped) = paginate(&source, "p1".to_string(), 6, STEP).await;
        assert_eq!(pages, vec!["p1"]);
        assert_eq!(stopped.as_deref(), Some("next-page control is disabled"));
    }

    #[tokio::test]
    async fn stalled_step_times_out_and_keeps_gathered_pages() {
        let source = Scripted::new([Step::Page("p2"), Step::Stall, Step::Page("p4")]);
        let (pages, stopped) = paginate(&source, "p1".to_string(), 6, STEP).await;
        assert_eq!(pages, vec!["p1", "p2"]);
        assert!(stopped.unwrap().contains("did not respond within"));
        assert_eq!(source.remaining(), 1);
    }
}
