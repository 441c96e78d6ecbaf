//! Daily picks: one-file-per-channel lists from which a single reachable URL
//! is drawn at random on every run

use crate::channel::{safe_name, Origin, RankedChannel, RankedUrl};
use crate::lists::sorted_files;
use crate::parser::{Dialect, SourceParser};
use chanmerge_probe::ProbeReport;
use rand::seq::IndexedRandom;
use rand::Rng;
use std::path::Path;
use tracing::{debug, info, warn};

/// One picks file: the channel name and its candidate URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pick {
    pub name: String,
    pub urls: Vec<String>,
}

/// Load every `*.txt` file in `dir`. The file stem names the channel.
pub async fn load_picks(dir: &Path, parser: SourceParser<'_>) -> Vec<Pick> {
    let files = match sorted_files(dir).await {
        Ok(files) => files,
        Err(e) => {
            debug!("Picks directory {} unavailable: {}", dir.display(), e);
            return Vec::new();
        }
    };

    let mut picks = Vec::new();
    for path in files {
        if !path.extension().is_some_and(|ext| ext == "txt") {
            continue;
        }
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };

        let content = match tokio::fs::read(&path).await {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                continue;
            }
        };

        let urls: Vec<String> = parser
            .parse(&content, Dialect::Txt)
            .all_urls()
            .map(String::from)
            .collect();
        if urls.is_empty() {
            debug!("Picks file {} has no usable URLs", path.display());
            continue;
        }

        picks.push(Pick {
            name: safe_name(stem.trim()),
            urls,
        });
    }

    picks
}

/// Draw one reachable URL per pick. Picks with nothing reachable are dropped.
pub fn choose_picks<R: Rng + ?Sized>(
    picks: &[Pick],
    report: &ProbeReport,
    rng: &mut R,
) -> Vec<RankedChannel> {
    picks
        .iter()
        .filter_map(|pick| {
            let reachable: Vec<RankedUrl> = pick
                .urls
                .iter()
                .filter_map(|url| {
                    report.latency(url).as_duration().map(|latency| RankedUrl {
                        url: url.clone(),
                        latency,
                    })
                })
                .collect();

            let Some(chosen) = reachable.choose(rng).cloned() else {
                info!("No reachable URL for pick {}", pick.name);
                return None;
            };
            Some(RankedChannel {
                name: pick.name.clone(),
                origin: Origin::HandCurated,
                urls: vec![chosen],
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chanmerge_probe::{Latency, ProbeResult};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;

    #[tokio::test]
    async fn test_load_picks() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Movie Night.txt"),
            "A,http://p.example/1.m3u8\nB,http://p.example/2.m3u8\nShop AD,http://p.example/ad.m3u8\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("Empty.txt"), "nothing useful\n").unwrap();
        std::fs::write(dir.path().join("readme.md"), "A,http://p.example/x.m3u8").unwrap();

        let ads = vec!["AD".to_string()];
        let picks = load_picks(dir.path(), SourceParser::new(&ads)).await;
        assert_eq!(
            picks,
            vec![Pick {
                name: "Movie-Night".to_string(),
                urls: vec![
                    "http://p.example/1.m3u8".to_string(),
                    "http://p.example/2.m3u8".to_string()
                ],
            }]
        );
    }

    #[test]
    fn test_choose_only_reachable() {
        let picks = vec![
            Pick {
                name: "Movies".to_string(),
                urls: vec!["http://p.example/dead".to_string(), "http://p.example/live".to_string()],
            },
            Pick {
                name: "Gone".to_string(),
                urls: vec!["http://p.example/gone".to_string()],
            },
        ];
        let mut report = ProbeReport::default();
        report.insert(ProbeResult::unreachable("http://p.example/dead"));
        report.insert(ProbeResult {
            url: "http://p.example/live".to_string(),
            latency: Latency::Reachable(Duration::from_millis(40)),
        });

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..10 {
            let chosen = choose_picks(&picks, &report, &mut rng);
            assert_eq!(chosen.len(), 1);
            assert_eq!(chosen[0].name, "Movies");
            assert_eq!(chosen[0].url_strs().collect::<Vec<_>>(), vec!["http://p.example/live"]);
        }
    }
}
