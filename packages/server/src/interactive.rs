//! Interactive mode for the dashboard.
//!
//! Prompts for the bind address, port and `WebDriver` endpoint before
//! starting the server.

use dialoguer::{Confirm, Input};

/// Runs the dashboard in interactive mode, prompting for configuration.
///
/// Sets `BIND_ADDR`, `PORT` and `BIDBOARD_WEBDRIVER_URL` from the answers
/// and delegates to [`super::run_server`].
///
/// # Errors
///
/// Returns an `std::io::Result` error if the underlying server fails to
/// start.
#[allow(clippy::future_not_send)]
pub async fn run() -> std::io::Result<()> {
    println!("Bidboard Dashboard");
    println!();

    let bind_addr = prompt("Bind address", "BIND_ADDR", "127.0.0.1");
    let port = prompt("Port", "PORT", "8080");
    let webdriver = prompt(
        "WebDriver URL (for rendered listings)",
        "BIDBOARD_WEBDRIVER_URL",
        "http://localhost:9515",
    );

    // SAFETY: We are single-threaded at this point (before server starts) and
    // these variables are only read once during server initialisation.
    unsafe {
        std::env::set_var("BIND_ADDR", &bind_addr);
        std::env::set_var("PORT", &port);
        std::env::set_var("BIDBOARD_WEBDRIVER_URL", &webdriver);
    }

    if !Confirm::new()
        .with_prompt(format!("Start dashboard on http://{bind_addr}:{port}?"))
        .default(true)
        .interact()
        .unwrap_or(true)
    {
        println!("Cancelled.");
        return Ok(());
    }

    super::run_server().await
}

/// Asks for a value, defaulting to the current `var` or `fallback`.
fn prompt(label: &str, var: &str, fallback: &str) -> String {
    let default = std::env::var(var).unwrap_or_else(|_| fallback.to_string());
    Input::new()
        .with_prompt(label)
        .default(default.clone())
        .interact_text()
        .unwrap_or(default)
}
