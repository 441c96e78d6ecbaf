use chanmerge_core::Config;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chanmerge")]
#[command(author, version, about = "IPTV playlist aggregation with stream liveness ranking")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Options for a bare invocation (same as `run`)
    #[command(flatten)]
    pub run: RunOptions,

    /// Verbose output (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file path (TOML, or JSON by extension)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Aggregate, probe and write the playlists
    Run {
        #[command(flatten)]
        options: RunOptions,
    },

    /// Probe stream URLs and print their latency
    Probe {
        /// Stream URLs
        #[arg(required = true, value_name = "URL")]
        urls: Vec<String>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<f64>,

        /// Maximum probes in flight
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Show the effective configuration
    Config,
}

#[derive(clap::Args, Clone, Debug, Default)]
pub struct RunOptions {
    /// Directory of `<category>.txt` keyword files
    #[arg(long, value_name = "DIR")]
    pub rules_dir: Option<PathBuf>,

    /// Directory of hand-curated playlist files
    #[arg(long, value_name = "DIR")]
    pub manual_sources_dir: Option<PathBuf>,

    /// File listing remote playlist URLs
    #[arg(long, value_name = "FILE")]
    pub remote_sources_file: Option<PathBuf>,

    /// Directory of daily pick files
    #[arg(long, value_name = "DIR")]
    pub picks_dir: Option<PathBuf>,

    /// EPG source URLs, in order of preference
    #[arg(long = "epg-url", value_name = "URL", num_args = 1..)]
    pub epg_urls: Vec<String>,

    /// Ad keyword list
    #[arg(short, long, value_name = "FILE")]
    pub blacklist: Option<PathBuf>,

    /// Favourite channel list
    #[arg(short, long, value_name = "FILE")]
    pub favorites: Option<PathBuf>,

    /// Output basename; `.m3u` and `.txt` are appended
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Maximum probes in flight
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Per-request probe timeout in seconds
    #[arg(long)]
    pub timeout: Option<f64>,
}

impl RunOptions {
    /// Command-line values take precedence over the config file
    pub fn apply(&self, config: &mut Config) {
        let paths = &mut config.paths;
        if let Some(dir) = &self.rules_dir {
            paths.rules_dir = dir.clone();
        }
        if let Some(dir) = &self.manual_sources_dir {
            paths.manual_sources_dir = dir.clone();
        }
        if let Some(file) = &self.remote_sources_file {
            paths.remote_sources_file = file.clone();
        }
        if let Some(dir) = &self.picks_dir {
            paths.picks_dir = dir.clone();
        }
        if let Some(file) = &self.blacklist {
            paths.blacklist = file.clone();
        }
        if let Some(file) = &self.favorites {
            paths.favorites = file.clone();
        }
        if let Some(output) = &self.output {
            paths.output = output.clone();
        }
        if !self.epg_urls.is_empty() {
            config.epg.urls = self.epg_urls.clone();
        }
        if let Some(concurrency) = self.concurrency {
            config.probe.concurrency = concurrency;
        }
        if let Some(timeout) = self.timeout {
            config.probe.timeout_secs = timeout;
        }
    }
}
