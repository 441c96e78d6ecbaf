//! HTTP downloads for remote playlists and EPG documents

use crate::error::FetchError;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Shared client for whole-document downloads. Unlike the prober it follows
/// redirects normally.
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
}

impl Fetcher {
    pub fn new(headers: &BTreeMap<String, String>) -> Result<Self, FetchError> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let key = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| FetchError::InvalidHeader(name.clone()))?;
            let value =
                HeaderValue::from_str(value).map_err(|_| FetchError::InvalidHeader(name.clone()))?;
            header_map.insert(key, value);
        }

        let client = Client::builder().default_headers(header_map).build()?;
        Ok(Self { client })
    }

    /// Download a document; non-success statuses are errors
    pub async fn fetch_bytes(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        debug!("Fetching {}", url);

        let response = self.client.get(url).timeout(timeout).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        debug!("Fetched {} bytes from {}", body.len(), url);
        Ok(body.to_vec())
    }

    /// Download a text document, replacing invalid UTF-8
    pub async fn fetch_text(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let bytes = self.fetch_bytes(url, timeout).await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use tokio::net::TcpListener;

    async fn start_test_server() -> String {
        let app = Router::new()
            .route("/list.txt", get(|| async { "CCTV1,http://a.example/1.m3u8" }))
            .route("/missing", get(|| async { StatusCode::NOT_FOUND }));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_fetch_text() {
        let server = start_test_server().await;
        let fetcher = Fetcher::new(&BTreeMap::new()).unwrap();

        let text = fetcher
            .fetch_text(&format!("{}/list.txt", server), Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(text, "CCTV1,http://a.example/1.m3u8");
    }

    #[tokio::test]
    async fn test_error_status_is_an_error() {
        let server = start_test_server().await;
        let fetcher = Fetcher::new(&BTreeMap::new()).unwrap();

        let result = fetcher
            .fetch_text(&format!("{}/missing", server), Duration::from_secs(5))
            .await;
        assert!(matches!(result, Err(FetchError::Status { status: 404, .. })));
    }
}
