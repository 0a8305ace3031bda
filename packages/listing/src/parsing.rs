//! Shared text, date, and URL helpers for cell extraction.

use chrono::NaiveDate;
use url::Url;

/// Joins text fragments and collapses every whitespace run (including
/// non-breaking spaces) to a single space.
#[must_use]
pub fn clean_text<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    let joined: String = parts.into_iter().collect();
    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Removes every occurrence of each boilerplate substring, then re-cleans
/// whitespace.
#[must_use]
pub fn strip_boilerplate(text: &str, strip: &[String]) -> String {
    if strip.iter().all(String::is_empty) {
        return text.to_owned();
    }
    let mut out = text.to_owned();
    for s in strip.iter().filter(|s| !s.is_empty()) {
        out = out.replace(s.as_str(), "");
    }
    clean_text([out.as_str()])
}

/// Reformats `text` from `input_format` to `output_format`.
///
/// Returns `None` when the text does not parse, so the caller can keep the
/// original and record a warning.
#[must_use]
pub fn reformat_date(text: &str, input_format: &str, output_format: &str) -> Option<String> {
    NaiveDate::parse_from_str(text.trim(), input_format)
        .ok()
        .map(|d| d.format(output_format).to_string())
}

/// Resolves `href` against `base`. Unresolvable hrefs are returned as-is.
#[must_use]
pub fn resolve_href(base: &Url, href: &str) -> String {
    let href = href.trim();
    base.join(href).map_or_else(
        |e| {
            log::debug!("Keeping unresolvable href '{href}': {e}");
            href.to_owned()
        },
        String::from,
    )
}

/// The first single-quoted argument of an inline JS handler, e.g.
/// `openPage('/page.aspx/en/rfp/123')` gives `/page.aspx/en/rfp/123`.
#[must_use]
pub fn first_quoted_argument(handler: &str) -> Option<&str> {
    let mut parts = handler.split('\'');
    parts.next()?;
    parts.next().filter(|s| !s.trim().is_empty())
}
