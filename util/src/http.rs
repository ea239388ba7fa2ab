//! Lightweight reachability probe for upstream HTTP dependencies.

use reqwest::Client;
use std::time::Duration;

/// Returns true if the host behind `url` answers HTTP at all.
///
/// Any response below 500 counts as reachable: routing services commonly
/// answer their bare base URL with 400/404, which still proves they are up.
/// Connection errors, timeouts and 5xx answers count as unreachable.
/// `timeout_secs` caps the whole request.
pub async fn is_url_alive(url: &str, timeout_secs: u64) -> bool {
    let client = match Client::builder()
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
    {
        Ok(c) => c,
        Err(_) => return false,
    };

    match client.get(url).send().await {
        Ok(resp) => !resp.status().is_server_error(),
        Err(_) => false,
    }
}
