use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use tokio::sync::mpsc;
use tracing::debug;

use crate::args::RunOptions;
use chanmerge_core::{Config, Pipeline, PipelineStage};

pub async fn run(options: &RunOptions, config_path: Option<&Path>) -> Result<()> {
    let mut config = Config::load(config_path).context("Failed to load configuration")?;
    options.apply(&mut config);
    config
        .validate()
        .context("Invalid command-line override")?;
    debug!(
        "Probing with {} in flight, {:.1}s timeout",
        config.probe.concurrency, config.probe.timeout_secs
    );

    // Create progress channel
    let (tx, mut rx) = mpsc::channel(64);

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.cyan} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}",
        )?
        .progress_chars("=>-"),
    );

    // Spawn progress handler
    let progress_handle = tokio::spawn(async move {
        while let Some(stage) = rx.recv().await {
            match stage {
                PipelineStage::LoadingLists => pb.set_message("Loading lists..."),
                PipelineStage::LoadingEpg { sources } => {
                    pb.set_message(format!("Loading EPG ({} sources)...", sources))
                }
                PipelineStage::Aggregating => pb.set_message("Aggregating sources..."),
                PipelineStage::Aggregated { channels, urls } => {
                    pb.set_message(format!("{} channels, {} URLs", channels, urls))
                }
                PipelineStage::Probing { done, total } => {
                    pb.set_length(total as u64);
                    pb.set_position(done as u64);
                    pb.set_message("Probing streams...");
                }
                PipelineStage::Probed { reachable, total } => {
                    pb.set_message(format!("{} of {} URLs reachable", reachable, total))
                }
                PipelineStage::Classifying => pb.set_message("Classifying channels..."),
                PipelineStage::Writing => pb.set_message("Writing playlists..."),
                PipelineStage::Complete { summary, duration } => {
                    pb.finish_with_message(format!(
                        "Done: {} channels ({:.1}s)",
                        summary.channels_emitted,
                        duration.as_secs_f32()
                    ));
                }
                PipelineStage::Failed { stage, error } => {
                    pb.abandon_with_message(format!("Failed at {}: {}", stage, error));
                }
            }
        }
    });

    // Run pipeline
    let pipeline = Pipeline::new(config, tx);
    let result = pipeline.run().await;

    // Dropping the pipeline closes the channel so the handler can finish
    drop(pipeline);
    progress_handle.await?;

    match result {
        Ok(summary) => {
            println!();
            println!("Channels pooled:  {}", summary.channels_pooled);
            println!(
                "URLs reachable:   {}/{}",
                summary.urls_reachable, summary.urls_probed
            );
            println!(
                "Channels emitted: {} in {} categories",
                summary.channels_emitted, summary.categories
            );
            println!("Output:           {}", summary.m3u_path.display());
            println!("                  {}", summary.txt_path.display());
            Ok(())
        }
        Err(e) => {
            eprintln!("\nError: {}", e);
            Err(e.into())
        }
    }
}
