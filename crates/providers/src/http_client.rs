use std::{sync::OnceLock, time::Duration};

use reqwest::Client;
use reqwest::header;

fn default_http_client_builder() -> reqwest::ClientBuilder {
    let mut headers = header::HeaderMap::new();
    headers.insert(header::CONNECTION, header::HeaderValue::from_static("keep-alive"));

    Client::builder()
        .timeout(Duration::from_secs(60))
        .pool_idle_timeout(Some(Duration::from_secs(5)))
        .tcp_nodelay(true)
        .tcp_keepalive(Some(Duration::from_secs(60)))
        .default_headers(headers)
}

/// Shared HTTP client, reused across adapters to keep connections warm.
pub fn http_client() -> reqwest::Client {
    static CLIENT: OnceLock<Client> = OnceLock::new();

    CLIENT
        .get_or_init(|| default_http_client_builder().build().expect("failed to build default HTTP client"))
        .clone()
}
