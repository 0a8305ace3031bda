//! Rendering through a third-party proxy service.
//!
//! The service is called with `GET {endpoint}?api_key=..&url=..&render_js=true`
//! (plus `wait` when configured) and answers with the rendered markup.

use crate::{FetchError, FetchSettings, RENDER_API_KEY_VAR};

/// Fetches `url` through the configured rendering proxy.
///
/// # Errors
///
/// Returns [`FetchError::MissingApiKey`] before any network traffic if no
/// key is configured, [`FetchError::RenderTimeout`] if the service exceeds
/// the render timeout, and the usual HTTP errors otherwise.
pub async fn fetch_via_proxy(
    url: &str,
    settings: &FetchSettings,
    wait_ms: Option<u64>,
) -> Result<String, FetchError> {
    let api_key = settings
        .render_api_key
        .as_deref()
        .ok_or(FetchError::MissingApiKey(RENDER_API_KEY_VAR))?;

    let mut params: Vec<(&str, String)> = vec![
        ("api_key", api_key.to_owned()),
        ("url", url.to_owned()),
        ("render_js", "true".to_owned()),
    ];
    if let Some(ms) = wait_ms {
        params.push(("wait", ms.to_string()));
    }

    let client = settings.build_client(settings.render_timeout)?;
    let request = client.get(&settings.render_endpoint).query(&params);

    log::info!("Requesting {url} through rendering proxy");
    let response = match request.send().await {
        Ok(response) => response,
        Err(e) if e.is_timeout() => {
            return Err(FetchError::RenderTimeout {
                url: url.to_owned(),
                seconds: settings.render_timeout.as_secs(),
            });
        }
        Err(e) => return Err(e.into()),
    };

    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_owned(),
            status: status.as_u16(),
        });
    }
    Ok(response.text().await?)
}

