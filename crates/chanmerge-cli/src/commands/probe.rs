use anyhow::{Context, Result};
use std::path::Path;

use chanmerge_core::Config;
use chanmerge_probe::{Coordinator, Prober};

pub async fn run(
    urls: &[String],
    timeout: Option<f64>,
    concurrency: Option<usize>,
    config_path: Option<&Path>,
) -> Result<()> {
    let mut config = Config::load(config_path).context("Failed to load configuration")?;
    if let Some(timeout) = timeout {
        config.probe.timeout_secs = timeout;
    }
    if let Some(concurrency) = concurrency {
        config.probe.concurrency = concurrency;
    }
    config.validate()?;

    let prober = Prober::new(&config.probe_options()).context("Failed to build HTTP client")?;
    let coordinator = Coordinator::new(prober, config.probe.concurrency)?;
    let report = coordinator.run(urls.iter().cloned(), |_| {}).await;

    let mut results: Vec<_> = report.iter().collect();
    results.sort_by_key(|(url, latency)| (*latency, *url));

    for (url, latency) in &results {
        println!("{:>12}  {}", latency.to_string(), url);
    }
    println!(
        "\n{} of {} reachable",
        report.reachable_count(),
        report.len()
    );

    Ok(())
}
