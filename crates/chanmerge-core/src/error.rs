//! Error types for chanmerge-core

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ChanmergeError>;

#[derive(Error, Debug)]
pub enum ChanmergeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Probe setup failed: {0}")]
    Probe(#[from] chanmerge_probe::ProbeError),

    #[error("Fetch setup failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Output failed: {0}")]
    Output(#[from] OutputError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    LoadError(String),

    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Server answered {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Invalid request header {0:?}")]
    InvalidHeader(String),
}

#[derive(Error, Debug)]
pub enum EpgError {
    #[error("EPG download failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Failed to decompress EPG data: {0}")]
    Decompress(std::io::Error),

    #[error("EPG data is not valid UTF-8")]
    Encoding,

    #[error("Malformed XMLTV document: {0}")]
    Xml(String),
}

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}
