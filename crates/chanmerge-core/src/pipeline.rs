//! Pipeline orchestration: aggregate, probe, classify and write playlists

use crate::aggregate::Aggregator;
use crate::classify::Classifier;
use crate::epg::load_epg;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::lists::{load_list, load_rules_dir};
use crate::output::{write_outputs, Composer, UpdateStamp};
use crate::parser::SourceParser;
use crate::picks::{choose_picks, load_picks};
use crate::Config;

use chanmerge_probe::{Coordinator, Prober};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Pipeline progress stages
#[derive(Debug, Clone)]
pub enum PipelineStage {
    LoadingLists,
    LoadingEpg { sources: usize },
    Aggregating,
    Aggregated { channels: usize, urls: usize },
    Probing { done: usize, total: usize },
    Probed { reachable: usize, total: usize },
    Classifying,
    Writing,
    Complete { summary: RunSummary, duration: Duration },
    Failed { stage: String, error: String },
}

/// Counts and paths from a finished run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub channels_pooled: usize,
    pub urls_probed: usize,
    pub urls_reachable: usize,
    pub channels_emitted: usize,
    pub categories: usize,
    pub m3u_path: PathBuf,
    pub txt_path: PathBuf,
}

/// One full aggregation run
pub struct Pipeline {
    config: Config,
    progress_tx: mpsc::Sender<PipelineStage>,
}

impl Pipeline {
    pub fn new(config: Config, progress_tx: mpsc::Sender<PipelineStage>) -> Self {
        Self {
            config,
            progress_tx,
        }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let start_time = Instant::now();
        let config = &self.config;
        let paths = &config.paths;

        // 1. Lists
        let _ = self.progress_tx.send(PipelineStage::LoadingLists).await;

        let ad_keywords = load_list(&paths.blacklist).await;
        let favorites = load_list(&paths.favorites).await;
        let remote_sources = load_list(&paths.remote_sources_file).await;
        let rules = if config.categories.rules.is_empty() {
            load_rules_dir(&paths.rules_dir).await
        } else {
            config.categories.rules.clone()
        };
        debug!(
            "{} ad keywords, {} favourites, {} remote sources, {} category rules",
            ad_keywords.len(),
            favorites.len(),
            remote_sources.len(),
            rules.len()
        );

        let fetcher = Fetcher::new(&config.probe.headers).map_err(|e| self.fail("setup", e))?;
        let prober = Prober::new(&config.probe_options()).map_err(|e| self.fail("setup", e))?;
        let coordinator =
            Coordinator::new(prober, config.probe.concurrency).map_err(|e| self.fail("setup", e))?;

        // 2. EPG
        let epg_urls = config.epg_sources();
        let _ = self
            .progress_tx
            .send(PipelineStage::LoadingEpg {
                sources: epg_urls.len(),
            })
            .await;
        let epg = load_epg(&fetcher, &epg_urls, config.epg_timeout()).await;

        // 3. Aggregate
        let _ = self.progress_tx.send(PipelineStage::Aggregating).await;

        let parser = SourceParser::new(&ad_keywords);
        let aggregator = Aggregator::new(parser, &fetcher, config.source_timeout());
        let (pool, _) = aggregator
            .aggregate(&paths.manual_sources_dir, &remote_sources)
            .await;
        let picks = load_picks(&paths.picks_dir, parser).await;

        let mut urls = pool.unique_urls();
        urls.extend(picks.iter().flat_map(|p| p.urls.iter().cloned()));

        let _ = self
            .progress_tx
            .send(PipelineStage::Aggregated {
                channels: pool.len(),
                urls: urls.len(),
            })
            .await;

        // 4. Probe
        let total = urls.len();
        let _ = self
            .progress_tx
            .send(PipelineStage::Probing { done: 0, total })
            .await;

        let mut done = 0;
        let report = coordinator
            .run(urls, |_| {
                done += 1;
                let _ = self
                    .progress_tx
                    .try_send(PipelineStage::Probing { done, total });
            })
            .await;

        info!(
            "{} of {} URLs reachable",
            report.reachable_count(),
            report.len()
        );
        let _ = self
            .progress_tx
            .send(PipelineStage::Probed {
                reachable: report.reachable_count(),
                total: report.len(),
            })
            .await;

        // 5. Classify and rank
        let _ = self.progress_tx.send(PipelineStage::Classifying).await;

        let categories = &config.categories;
        let classifier = Classifier::new(&rules, &categories.fallback)
            .with_favorites(&favorites, &categories.favorites)
            .with_auto_discovered_limit(config.ranking.auto_discovered_limit);
        let mut catalog = classifier.classify(&pool, &report);

        let chosen = choose_picks(&picks, &report, &mut rand::rng());
        for pick in chosen {
            catalog.insert(&categories.picks, pick);
        }

        let channels_emitted = catalog.channel_count();
        let groups = catalog.into_groups(&config.category_prefix(), &categories.fallback);

        // 6. Compose and write
        let _ = self.progress_tx.send(PipelineStage::Writing).await;

        let mut composer = Composer::new(&epg, &epg_urls);
        let clock_url = config.playlist.clock_url.as_deref().map(str::trim);
        if let Some(clock_url) = clock_url.filter(|u| !u.is_empty()) {
            composer = composer.with_update_stamp(UpdateStamp::new(
                &categories.updated,
                clock_url,
                chrono::Utc::now(),
                config.playlist.utc_offset_hours,
            ));
        }

        let (m3u_path, txt_path) = config.output_paths();
        write_outputs(
            &m3u_path,
            &composer.render_m3u(&groups),
            &txt_path,
            &composer.render_txt(&groups),
        )
        .await
        .map_err(|e| self.fail("write", e))?;

        let summary = RunSummary {
            channels_pooled: pool.len(),
            urls_probed: report.len(),
            urls_reachable: report.reachable_count(),
            channels_emitted,
            categories: groups.len(),
            m3u_path,
            txt_path,
        };

        let duration = start_time.elapsed();
        info!(
            "Emitted {} channels in {} categories in {:.1}s",
            summary.channels_emitted,
            summary.categories,
            duration.as_secs_f64()
        );

        let _ = self
            .progress_tx
            .send(PipelineStage::Complete {
                summary: summary.clone(),
                duration,
            })
            .await;

        Ok(summary)
    }

    fn fail<E: std::fmt::Display>(&self, stage: &str, error: E) -> E {
        let _ = self.progress_tx.try_send(PipelineStage::Failed {
            stage: stage.to_string(),
            error: error.to_string(),
        });
        error
    }
}
