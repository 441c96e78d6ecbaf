//! chanmerge-core: IPTV playlist aggregation, liveness ranking and output

pub mod aggregate;
pub mod channel;
pub mod classify;
pub mod config;
pub mod epg;
pub mod error;
pub mod fetch;
pub mod lists;
pub mod output;
pub mod parser;
pub mod picks;
pub mod pipeline;

pub use config::Config;
pub use error::{ChanmergeError, Result};
pub use pipeline::{Pipeline, PipelineStage, RunSummary};
