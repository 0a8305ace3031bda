//! Plain HTTPS GET.

use crate::FetchError;

/// Fetches `url` and returns the response body.
///
/// # Errors
///
/// Returns [`FetchError::Status`] for non-success responses and
/// [`FetchError::Http`] for transport failures.
pub async fn fetch_direct(client: &reqwest::Client, url: &str) -> Result<String, FetchError> {
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_owned(),
            status: status.as_u16(),
        });
    }

    let body = response.text().await?;
    log::debug!("Fetched {} bytes from {url}", body.len());
    Ok(body)
}
