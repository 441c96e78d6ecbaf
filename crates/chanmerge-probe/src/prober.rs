//! Single-URL liveness probe with one manual redirect hop

use crate::{Latency, ProbeError, ProbeOptions, ProbeResult};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, LOCATION, REFERER};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::{Duration, Instant};
use tracing::trace;
use url::Url;

const REDIRECT_STATUSES: [StatusCode; 4] = [
    StatusCode::MOVED_PERMANENTLY,
    StatusCode::FOUND,
    StatusCode::TEMPORARY_REDIRECT,
    StatusCode::PERMANENT_REDIRECT,
];

/// Probes URLs over a shared connection pool.
///
/// Cloning is cheap and every clone shares the same pool.
#[derive(Debug, Clone)]
pub struct Prober {
    client: Client,
    timeout: Duration,
    follow_up_timeout: Duration,
}

impl Prober {
    pub fn new(options: &ProbeOptions) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .redirect(Policy::none())
            .default_headers(header_map(options)?)
            .pool_max_idle_per_host(usize::MAX)
            .build()?;

        Ok(Self::with_client(client, options))
    }

    /// Use an existing client. It must not follow redirects on its own.
    pub fn with_client(client: Client, options: &ProbeOptions) -> Self {
        Self {
            client,
            timeout: options.timeout,
            follow_up_timeout: options.follow_up_timeout(),
        }
    }

    /// Probe a URL. Never fails: any error is reported as unreachable.
    pub async fn probe(&self, url: &str) -> ProbeResult {
        let latency = match self.measure(url).await {
            Ok(latency) => latency,
            Err(e) => {
                trace!("Probe failed for {}: {}", url, e);
                Latency::Unreachable
            }
        };

        ProbeResult {
            url: url.to_string(),
            latency,
        }
    }

    async fn measure(&self, url: &str) -> Result<Latency, reqwest::Error> {
        let start = Instant::now();

        let response = self.client.get(url).timeout(self.timeout).send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(Latency::Reachable(start.elapsed()));
        }

        if !REDIRECT_STATUSES.contains(&status) {
            trace!("{} answered {}", url, status);
            return Ok(Latency::Unreachable);
        }

        let target = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|location| resolve_location(url, location));
        drop(response);

        let Some(target) = target else {
            trace!("{} redirected without a usable Location", url);
            return Ok(Latency::Unreachable);
        };

        let follow_up = self
            .client
            .get(target.as_str())
            .timeout(self.follow_up_timeout)
            .header(REFERER, url)
            .send()
            .await?;

        // A second redirect is not followed.
        if follow_up.status().is_success() {
            Ok(Latency::Reachable(start.elapsed()))
        } else {
            trace!("{} -> {} answered {}", url, target, follow_up.status());
            Ok(Latency::Unreachable)
        }
    }
}

fn header_map(options: &ProbeOptions) -> Result<HeaderMap, ProbeError> {
    let mut headers = HeaderMap::new();
    for (name, value) in &options.headers {
        let key = HeaderName::from_bytes(name.as_bytes()).map_err(|e| ProbeError::InvalidHeader {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| ProbeError::InvalidHeader {
            name: name.clone(),
            reason: e.to_string(),
        })?;
        headers.insert(key, value);
    }
    Ok(headers)
}

/// Resolve a `Location` header against the URL that produced it
pub(crate) fn resolve_location(base: &str, location: &str) -> Option<Url> {
    let location = location.trim();
    if location.is_empty() {
        return None;
    }

    match Url::parse(location) {
        Ok(absolute) => Some(absolute),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(base).ok()?.join(location).ok(),
        Err(_) => None,
    }
}
