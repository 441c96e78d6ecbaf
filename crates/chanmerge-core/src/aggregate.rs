//! Merges hand-curated local files and auto-discovered remote playlists into
//! one channel pool

use crate::channel::{ChannelPool, Origin};
use crate::fetch::Fetcher;
use crate::lists::sorted_files;
use crate::parser::{Dialect, ParsedSource, SourceParser};
use futures::future::join_all;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Counts from one aggregation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub local_files: usize,
    pub remote_ok: usize,
    pub remote_failed: usize,
}

pub struct Aggregator<'a> {
    parser: SourceParser<'a>,
    fetcher: &'a Fetcher,
    timeout: Duration,
}

impl<'a> Aggregator<'a> {
    pub fn new(parser: SourceParser<'a>, fetcher: &'a Fetcher, timeout: Duration) -> Self {
        Self {
            parser,
            fetcher,
            timeout,
        }
    }

    /// Local files first (hand-curated), then remote sources (auto-discovered)
    pub async fn aggregate(
        &self,
        manual_dir: &Path,
        remote_urls: &[String],
    ) -> (ChannelPool, AggregateStats) {
        let mut pool = ChannelPool::new();
        let mut stats = AggregateStats::default();

        for source in self.load_local(manual_dir).await {
            pool.merge(&source, Origin::HandCurated);
            stats.local_files += 1;
        }

        // All fetches run concurrently; results merge in list order
        let fetched = join_all(remote_urls.iter().map(|url| self.fetch_remote(url))).await;
        for source in fetched {
            match source {
                Some(source) => {
                    pool.merge(&source, Origin::AutoDiscovered);
                    stats.remote_ok += 1;
                }
                None => stats.remote_failed += 1,
            }
        }

        info!(
            "Merged {} channels ({} URLs) from {} local files and {}/{} remote sources",
            pool.len(),
            pool.url_count(),
            stats.local_files,
            stats.remote_ok,
            remote_urls.len()
        );

        (pool, stats)
    }

    /// Parse every regular file in `dir`, in file-name order
    pub async fn load_local(&self, dir: &Path) -> Vec<ParsedSource> {
        let files = match sorted_files(dir).await {
            Ok(files) => files,
            Err(e) => {
                warn!("Manual sources directory {} unavailable: {}", dir.display(), e);
                return Vec::new();
            }
        };

        let mut sources = Vec::with_capacity(files.len());
        for path in files {
            let content = match tokio::fs::read(&path).await {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    warn!("Failed to read {}: {}", path.display(), e);
                    continue;
                }
            };

            let file_name = path.to_string_lossy();
            let source = self.parser.parse(&content, Dialect::detect(&file_name, &content));
            debug!("{}: {} channels", path.display(), source.len());
            sources.push(source);
        }

        sources
    }

    /// Fetch and parse one remote playlist. Failures contribute nothing.
    pub async fn fetch_remote(&self, url: &str) -> Option<ParsedSource> {
        match self.fetcher.fetch_text(url, self.timeout).await {
            Ok(content) => {
                let source = self.parser.parse(&content, Dialect::detect(url, &content));
                debug!("{}: {} channels", url, source.len());
                Some(source)
            }
            Err(e) => {
                warn!("Remote source {} failed: {}", url, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use std::collections::BTreeMap;
    use tokio::net::TcpListener;

    async fn start_test_server() -> String {
        let app = Router::new()
            .route(
                "/remote.m3u",
                get(|| async {
                    "#EXTM3U\n#EXTINF:-1 tvg-name=\"CCTV1\",CCTV1\nhttp://remote.example/cctv1.m3u8\n#EXTINF:-1,Remote Only\nhttp://remote.example/only.m3u8\n"
                }),
            )
            .route(
                "/remote.txt",
                get(|| async { "Shopping AD,http://remote.example/ad.m3u8\nNews,http://remote.example/news.m3u8" }),
            )
            .route("/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .route(
                "/slow.txt",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(3)).await;
                    "Late,http://remote.example/late.m3u8"
                }),
            );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_local_then_remote_with_failure_isolation() {
        let server = start_test_server().await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a.txt"),
            "CCTV1,http://local.example/cctv1.m3u8\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("b.m3u"),
            "#EXTINF:-1,Local M3U\nhttp://local.example/m3u.m3u8\n",
        )
        .unwrap();

        let ads = vec!["AD".to_string()];
        let fetcher = Fetcher::new(&BTreeMap::new()).unwrap();
        let aggregator = Aggregator::new(SourceParser::new(&ads), &fetcher, Duration::from_millis(500));

        let remote = vec![
            format!("{}/remote.m3u", server),
            format!("{}/broken", server),
            format!("{}/slow.txt", server),
            format!("{}/remote.txt", server),
        ];
        let (pool, stats) = aggregator.aggregate(dir.path(), &remote).await;

        assert_eq!(
            stats,
            AggregateStats {
                local_files: 2,
                remote_ok: 2,
                remote_failed: 2,
            }
        );

        let cctv1 = pool.get("CCTV1").unwrap();
        assert_eq!(cctv1.origin, Origin::HandCurated);
        assert_eq!(cctv1.urls().len(), 2);
        assert_eq!(pool.get("Local M3U").unwrap().origin, Origin::HandCurated);
        assert_eq!(pool.get("Remote Only").unwrap().origin, Origin::AutoDiscovered);
        assert_eq!(pool.get("News").unwrap().origin, Origin::AutoDiscovered);
        assert!(pool.get("Shopping AD").is_none());
        assert!(pool.get("Late").is_none());
    }

    #[tokio::test]
    async fn test_missing_manual_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Fetcher::new(&BTreeMap::new()).unwrap();
        let aggregator = Aggregator::new(SourceParser::new(&[]), &fetcher, Duration::from_secs(1));

        let (pool, stats) = aggregator.aggregate(&dir.path().join("missing"), &[]).await;
        assert!(pool.is_empty());
        assert_eq!(stats, AggregateStats::default());
    }
}
