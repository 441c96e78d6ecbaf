//! Bounded fan-out over a URL set

use crate::{Latency, ProbeError, ProbeResult, Prober};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

/// Probe results keyed by URL
#[derive(Debug, Clone, Default)]
pub struct ProbeReport {
    latencies: HashMap<String, Latency>,
}

impl ProbeReport {
    /// Latency of `url`; URLs that were never probed count as unreachable
    pub fn latency(&self, url: &str) -> Latency {
        self.latencies.get(url).copied().unwrap_or(Latency::Unreachable)
    }

    pub fn is_reachable(&self, url: &str) -> bool {
        self.latency(url).is_reachable()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.latencies.contains_key(url)
    }

    pub fn insert(&mut self, result: ProbeResult) {
        self.latencies.insert(result.url, result.latency);
    }

    pub fn len(&self) -> usize {
        self.latencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latencies.is_empty()
    }

    pub fn reachable_count(&self) -> usize {
        self.latencies.values().filter(|l| l.is_reachable()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Latency)> {
        self.latencies.iter().map(|(url, latency)| (url.as_str(), *latency))
    }
}

impl FromIterator<ProbeResult> for ProbeReport {
    fn from_iter<T: IntoIterator<Item = ProbeResult>>(iter: T) -> Self {
        let mut report = ProbeReport::default();
        for result in iter {
            report.insert(result);
        }
        report
    }
}

/// Runs probes for a whole URL set with at most `limit` in flight.
///
/// Every URL gets a task up front; tasks wait on the semaphore for a slot.
/// `run` returns only after every task has finished, and the report holds
/// an entry for every submitted URL.
#[derive(Debug, Clone)]
pub struct Coordinator {
    prober: Prober,
    limit: usize,
}

impl Coordinator {
    pub fn new(prober: Prober, limit: usize) -> Result<Self, ProbeError> {
        if limit == 0 {
            return Err(ProbeError::ZeroConcurrency);
        }
        Ok(Self { prober, limit })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Probe every URL, calling `on_result` as each one completes
    pub async fn run<I, F>(&self, urls: I, mut on_result: F) -> ProbeReport
    where
        I: IntoIterator<Item = String>,
        F: FnMut(&ProbeResult),
    {
        let mut seen = HashSet::new();
        let urls: Vec<String> = urls.into_iter().filter(|u| seen.insert(u.clone())).collect();

        info!("Probing {} URLs with {} in flight", urls.len(), self.limit);

        let semaphore = Arc::new(Semaphore::new(self.limit));
        let mut tasks = JoinSet::new();

        for url in &urls {
            let sem = semaphore.clone();
            let prober = self.prober.clone();
            let url = url.clone();

            tasks.spawn(async move {
                let Ok(_permit) = sem.acquire_owned().await else {
                    return ProbeResult::unreachable(url);
                };
                prober.probe(&url).await
            });
        }

        let mut report = ProbeReport {
            latencies: HashMap::with_capacity(urls.len()),
        };

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => {
                    on_result(&result);
                    report.insert(result);
                }
                Err(e) => warn!("Probe task did not complete: {}", e),
            }
        }

        // Tasks that panicked still need an entry
        for url in urls {
            if !report.contains(&url) {
                let result = ProbeResult::unreachable(url);
                on_result(&result);
                report.insert(result);
            }
        }

        debug!(
            "Probe phase finished: {}/{} reachable",
            report.reachable_count(),
            report.len()
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ProbeOptions;
    use axum::{extract::State, http::StatusCode, routing::get, Router};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct Gauge {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    async fn counted(State(gauge): State<Arc<Gauge>>) -> &'static str {
        let now = gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
        gauge.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        gauge.current.fetch_sub(1, Ordering::SeqCst);
        "ok"
    }

    async fn start_test_server(gauge: Arc<Gauge>) -> String {
        let app = Router::new()
            .route("/ok", get(|| async { "ok" }))
            .route("/gone", get(|| async { StatusCode::GONE }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    "late"
                }),
            )
            .route("/counted", get(counted))
            .with_state(gauge);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }

    fn test_coordinator(limit: usize) -> Coordinator {
        let prober = Prober::new(&ProbeOptions {
            timeout: Duration::from_millis(500),
            redirect_margin: Duration::from_millis(100),
            ..ProbeOptions::default()
        })
        .unwrap();
        Coordinator::new(prober, limit).unwrap()
    }

    #[test]
    fn test_zero_limit_is_rejected() {
        let prober = Prober::new(&ProbeOptions::default()).unwrap();
        assert!(matches!(
            Coordinator::new(prober, 0),
            Err(ProbeError::ZeroConcurrency)
        ));
    }

    #[tokio::test]
    async fn test_timeout_does_not_affect_siblings() {
        let server = start_test_server(Arc::default()).await;
        let slow = format!("{}/slow", server);
        let ok = format!("{}/ok", server);
        let gone = format!("{}/gone", server);

        let report = test_coordinator(8)
            .run(vec![slow.clone(), ok.clone(), gone.clone()], |_| {})
            .await;

        assert_eq!(report.len(), 3);
        assert_eq!(report.latency(&slow), Latency::Unreachable);
        assert!(report.is_reachable(&ok));
        assert_eq!(report.latency(&gone), Latency::Unreachable);
    }

    #[tokio::test]
    async fn test_in_flight_probes_are_bounded() {
        let gauge = Arc::new(Gauge::default());
        let server = start_test_server(gauge.clone()).await;
        let urls: Vec<String> = (0..12).map(|i| format!("{}/counted?i={}", server, i)).collect();

        let mut completed = 0;
        let report = test_coordinator(3).run(urls, |_| completed += 1).await;

        assert_eq!(completed, 12);
        assert_eq!(report.reachable_count(), 12);
        let peak = gauge.peak.load(Ordering::SeqCst);
        assert!(peak <= 3, "peak in-flight was {}", peak);
        assert!(peak >= 1);
    }

    #[tokio::test]
    async fn test_duplicate_urls_are_probed_once() {
        let server = start_test_server(Arc::default()).await;
        let ok = format!("{}/ok", server);

        let mut calls = 0;
        let report = test_coordinator(2)
            .run(vec![ok.clone(), ok.clone(), ok.clone()], |_| calls += 1)
            .await;

        assert_eq!(calls, 1);
        assert_eq!(report.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_set_completes() {
        let report = test_coordinator(1).run(Vec::<String>::new(), |_| {}).await;
        assert!(report.is_empty());
        assert_eq!(report.latency("http://never.example/"), Latency::Unreachable);
    }

    #[test]
    fn test_report_from_results() {
        let report: ProbeReport = vec![
            ProbeResult {
                url: "http://a.example/x.m3u8".to_string(),
                latency: Latency::Reachable(Duration::from_millis(120)),
            },
            ProbeResult::unreachable("http://b.example/x.m3u8"),
        ]
        .into_iter()
        .collect();

        assert_eq!(report.len(), 2);
        assert_eq!(report.reachable_count(), 1);
        assert!(report.is_reachable("http://a.example/x.m3u8"));
        assert!(!report.is_reachable("http://b.example/x.m3u8"));
    }
}
