#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Page fetching for procurement listings.
//!
//! A [`FetchStrategy`] says how a page's markup is obtained:
//!
//! * [`FetchStrategy::Direct`]: one plain HTTPS GET ([`direct`]).
//! * [`FetchStrategy::Rendered`]: a headless browser driven over `WebDriver`
//!   that waits a settle duration for client-side rendering, optionally
//!   clicking through a "next page" control ([`rendered`]).
//! * [`FetchStrategy::RenderProxy`]: a third-party rendering service that
//!   takes an API key and the target URL ([`render_proxy`]).
//!
//! The strategies are interchangeable: each returns the markup of one or
//! more pages, and nothing downstream cares which one produced it. Nothing
//! here retries; a failed fetch is reported once and the caller decides.

pub mod direct;
pub mod render_proxy;
pub mod rendered;

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use strum_macros::{AsRefStr, Display, EnumString};

/// Errors that can occur while fetching a page.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The HTTP request itself failed (DNS, TLS, connection reset, ...).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status code.
    #[error("{url} returned HTTP {status}")]
    Status {
        /// Requested URL.
        url: String,
        /// Status code received.
        status: u16,
    },

    /// The browser session failed.
    #[error("WebDriver error: {0}")]
    WebDriver(#[from] thirtyfour::error::WebDriverError),

    /// Rendering did not finish within the configured limit.
    #[error("rendering {url} timed out after {seconds}s")]
    RenderTimeout {
        /// Requested URL.
        url: String,
        /// Limit that was exceeded.
        seconds: u64,
    },

    /// The rendering proxy was selected but no API key is configured.
    #[error("rendering proxy requires the {0} environment variable")]
    MissingApiKey(&'static str),

    /// A configured HTTP header could not be encoded.
    #[error("invalid header: {0}")]
    InvalidHeader(String),
}

/// Environment variable holding the rendering-proxy API key.
pub const RENDER_API_KEY_VAR: &str = "BIDBOARD_RENDER_API_KEY";

/// "Next page" navigation for paginated, client-rendered listings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Pagination {
    /// CSS selector of the control that advances to the next page.
    pub next_selector: String,
    /// Default page limit (callers may lower it).
    pub max_pages: u32,
}

/// How to obtain a page's markup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FetchStrategy {
    /// Plain HTTPS GET.
    Direct,
    /// Headless browser with a fixed settle wait.
    Rendered {
        /// Settle duration override in seconds.
        #[serde(default)]
        settle_secs: Option<u64>,
        /// Optional next-page navigation.
        #[serde(default)]
        pagination: Option<Pagination>,
    },
    /// Third-party rendering service.
    RenderProxy {
        /// Milliseconds the service should wait before capturing.
        #[serde(default)]
        wait_ms: Option<u64>,
    },
}

/// The transport behind a [`FetchStrategy`], without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, AsRefStr)]
#[strum(serialize_all = "kebab-case")]
pub enum Transport {
    /// See [`FetchStrategy::Direct`].
    Direct,
    /// See [`FetchStrategy::Rendered`].
    Rendered,
    /// See [`FetchStrategy::RenderProxy`].
    RenderProxy,
}

impl FetchStrategy {
    /// The transport this strategy uses.
    #[must_use]
    pub const fn transport(&self) -> Transport {
        match self {
            Self::Direct => Transport::Direct,
            Self::Rendered { .. } => Transport::Rendered,
            Self::RenderProxy { .. } => Transport::RenderProxy,
        }
    }

    /// Returns an equivalent strategy over a different transport.
    ///
    /// Pagination only exists for the browser transport, so it is kept when
    /// switching to [`Transport::Rendered`] and lost otherwise.
    #[must_use]
    pub fn switched_to(&self, transport: Transport) -> Self {
        if self.transport() == transport {
            return self.clone();
        }
        match transport {
            Transport::Direct => Self::Direct,
            Transport::Rendered => Self::Rendered {
                settle_secs: None,
                pagination: None,
            },
            Transport::RenderProxy => Self::RenderProxy { wait_ms: None },
        }
    }

    /// Whether results from this strategy depend on a timing guess.
    #[must_use]
    pub const fn is_best_effort(&self) -> bool {
        !matches!(self, Self::Direct)
    }
}

/// Runtime fetch settings, normally read from the environment.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// `WebDriver` endpoint for the rendered strategy.
    pub webdriver_url: String,
    /// Rendering proxy API key.
    pub render_api_key: Option<String>,
    /// Rendering proxy endpoint.
    pub render_endpoint: String,
    /// Default settle duration after navigation.
    pub settle: Duration,
    /// Timeout for direct requests.
    pub http_timeout: Duration,
    /// Upper bound on capturing the first rendered page, and separately on
    /// each next-page step.
    pub render_timeout: Duration,
    /// Extra HTTP headers for direct and proxy requests.
    pub headers: BTreeMap<String, String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_owned(),
            render_api_key: None,
            render_endpoint: "https://app.scrapingbee.com/api/v1/".to_owned(),
            settle: Duration::from_secs(5),
            http_timeout: Duration::from_secs(30),
            render_timeout: Duration::from_secs(120),
            headers: BTreeMap::from([(
                "User-Agent".to_owned(),
                concat!("bidboard/", env!("CARGO_PKG_VERSION")).to_owned(),
            )]),
        }
    }
}

impl FetchSettings {
    /// Reads settings from `BIDBOARD_*` environment variables, falling
    /// back to [`Default`] for anything unset or unparseable.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |var: &str, fallback: Duration| {
            std::env::var(var)
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map_or(fallback, Duration::from_secs)
        };

        Self {
            webdriver_url: std::env::var("BIDBOARD_WEBDRIVER_URL")
                .unwrap_or(defaults.webdriver_url),
            render_api_key: std::env::var(RENDER_API_KEY_VAR)
                .ok()
                .filter(|k| !k.trim().is_empty()),
            render_endpoint: std::env::var("BIDBOARD_RENDER_ENDPOINT")
                .unwrap_or(defaults.render_endpoint),
            settle: secs("BIDBOARD_SETTLE_SECS", defaults.settle),
            http_timeout: secs("BIDBOARD_HTTP_TIMEOUT_SECS", defaults.http_timeout),
            render_timeout: secs("BIDBOARD_RENDER_TIMEOUT_SECS", defaults.render_timeout),
            headers: defaults.headers,
        }
    }

    /// Sets the rendering proxy API key.
    #[must_use]
    pub fn with_render_api_key(mut self, key: &str) -> Self {
        self.render_api_key = Some(key.to_owned());
        self
    }

    /// Sets the rendering proxy endpoint.
    #[must_use]
    pub fn with_render_endpoint(mut self, endpoint: &str) -> Self {
        endpoint.clone_into(&mut self.render_endpoint);
        self
    }

    /// Builds a [`reqwest::Client`] with the configured headers and
    /// `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::InvalidHeader`] for unencodable headers and
    /// [`FetchError::Http`] if the client cannot be built.
    pub fn build_client(&self, timeout: Duration) -> Result<reqwest::Client, FetchError> {
        let mut header_map = reqwest::header::HeaderMap::new();
        for (key, value) in &self.headers {
            let name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| FetchError::InvalidHeader(format!("'{key}': {e}")))?;
            let val = reqwest::header::HeaderValue::from_str(value)
                .map_err(|e| FetchError::InvalidHeader(format!("'{key}' = '{value}': {e}")))?;
            header_map.insert(name, val);
        }
        reqwest::Client::builder()
            .default_headers(header_map)
            .timeout(timeout)
            .build()
            .map_err(FetchError::Http)
    }
}

/// Markup captured by one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPages {
    /// One entry per page, in navigation order. Never empty.
    pub pages: Vec<String>,
    /// Whether completeness depends on a rendering wait.
    pub best_effort: bool,
    /// Why pagination stopped before the page limit, if it did.
    pub stopped_early: Option<String>,
}

impl FetchedPages {
    /// A single page from a deterministic fetch.
    #[must_use]
    pub fn single(html: String) -> Self {
        Self {
            pages: vec![html],
            best_effort: false,
            stopped_early: None,
        }
    }
}

/// Number of pages a rendered fetch may capture.
///
/// `max_pages` can only lower the pagination's own limit, and at least the
/// first page is always captured.
#[must_use]
pub fn page_limit(pagination: Option<&Pagination>, max_pages: Option<u32>) -> u32 {
    pagination
        .map_or(1, |p| max_pages.map_or(p.max_pages, |m| m.min(p.max_pages)))
        .max(1)
}

/// Fetches `url` with `strategy`.
///
/// `max_pages` lowers the strategy's own page limit; it has no effect on
/// strategies without pagination.
///
/// # Errors
///
/// Returns [`FetchError`] if the first page cannot be obtained. Failures
/// while paginating after the first page end pagination early instead.
pub async fn fetch_pages(
    url: &str,
    strategy: &FetchStrategy,
    settings: &FetchSettings,
    max_pages: Option<u32>,
) -> Result<FetchedPages, FetchError> {
    log::debug!("Fetching {url} via {}", strategy.transport());

    match strategy {
        FetchStrategy::Direct => {
            let client = settings.build_client(settings.http_timeout)?;
            let html = direct::fetch_direct(&client, url).await?;
            Ok(FetchedPages::single(html))
        }
        FetchStrategy::Rendered {
            settle_secs,
            pagination,
        } => {
            let settle = settle_secs.map_or(settings.settle, Duration::from_secs);
            let limit = page_limit(pagination.as_ref(), max_pages);
            rendered::fetch_rendered(url, settings, settle, pagination.as_ref(), limit).await
        }
        FetchStrategy::RenderProxy { wait_ms } => {
            let html = render_proxy::fetch_via_proxy(url, settings, *wait_ms).await?;
            Ok(FetchedPages {
                pages: vec![html],
                best_effort: true,
                stopped_early: None,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_strategies() {
        #[derive(Deserialize)]
        struct Wrapper {
            fetch: FetchStrategy,
        }

        let w: Wrapper = toml::from_str(
            r#"
            [fetch]
            type = "rendered"
            settle_secs = 3
            [fetch.pagination]
            next_selector = "button[aria-label='Next page']"
            max_pages = 6
            "#,
        )
        .unwrap();
        assert_eq!(
            w.fetch,
            FetchStrategy::Rendered {
                settle_secs: Some(3),
                pagination: Some(Pagination {
                    next_selector: "button[aria-label='Next page']".to_string(),
                    max_pages: 6,
                }),
            }
        );

        let w: Wrapper = toml::from_str("[fetch]\ntype = \"direct\"").unwrap();
        assert_eq!(w.fetch, FetchStrategy::Direct);
    }

    #[test]
    fn switching_transport_keeps_same_strategy() {
        let rendered = FetchStrategy::Rendered {
            settle_secs: Some(2),
            pagination: None,
        };
        assert_eq!(rendered.switched_to(Transport::Rendered), rendered);
        assert_eq!(rendered.switched_to(Transport::Direct), FetchStrategy::Direct);
        assert!(
            FetchStrategy::Direct
                .switched_to(Transport::RenderProxy)
                .is_best_effort()
        );
    }

    #[test]
    fn page_limit_is_clamped_by_pagination() {
        let pagination = Pagination {
            next_selector: "button.next".to_string(),
            max_pages: 6,
        };
        assert_eq!(page_limit(Some(&pagination), None), 6);
        assert_eq!(page_limit(Some(&pagination), Some(2)), 2);
        assert_eq!(page_limit(Some(&pagination), Some(10)), 6);
        assert_eq!(page_limit(Some(&pagination), Some(0)), 1);
        assert_eq!(page_limit(None, Some(4)), 1);
        assert_eq!(page_limit(None, None), 1);
    }

    #[test]
    fn transport_parses_kebab_case() {
        assert_eq!(
            "render-proxy".parse::<Transport>().unwrap(),
            Transport::RenderProxy
        );
        assert_eq!(Transport::Rendered.to_string(), "rendered");
    }
}
