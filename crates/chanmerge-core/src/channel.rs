//! Channel records shared by the aggregation and ranking stages

use crate::parser::ParsedSource;
use std::collections::HashMap;
use std::time::Duration;

/// Where a channel was first seen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    /// From a trusted local file; every reachable URL is kept
    HandCurated,
    /// From a remote aggregated list; only the fastest URLs are kept
    AutoDiscovered,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::HandCurated => write!(f, "hand-curated"),
            Origin::AutoDiscovered => write!(f, "auto-discovered"),
        }
    }
}

/// A named stream with its candidate URLs in first-seen order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub name: String,
    pub origin: Origin,
    urls: Vec<String>,
}

impl Channel {
    pub fn new(name: impl Into<String>, origin: Origin) -> Self {
        Self {
            name: name.into(),
            origin,
            urls: Vec::new(),
        }
    }

    /// Add a URL unless it is already present. Returns whether it was added.
    pub fn add_url(&mut self, url: &str) -> bool {
        if self.urls.iter().any(|u| u == url) {
            return false;
        }
        self.urls.push(url.to_string());
        true
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }
}

/// Every channel from every source, keyed by name
#[derive(Debug, Clone, Default)]
pub struct ChannelPool {
    channels: HashMap<String, Channel>,
}

impl ChannelPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge one parsed source.
    ///
    /// The origin of an existing channel is never changed; its URL set grows.
    pub fn merge(&mut self, source: &ParsedSource, origin: Origin) {
        for (name, urls) in source.iter() {
            let channel = self
                .channels
                .entry(name.to_string())
                .or_insert_with(|| Channel::new(name, origin));
            for url in urls {
                channel.add_url(url);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    /// Number of (channel, URL) pairs
    pub fn url_count(&self) -> usize {
        self.channels.values().map(|c| c.urls.len()).sum()
    }

    /// Every URL in the pool, each once
    pub fn unique_urls(&self) -> Vec<String> {
        let mut seen = std::collections::HashSet::new();
        self.channels
            .values()
            .flat_map(|c| c.urls.iter())
            .filter(|u| seen.insert(u.as_str()))
            .cloned()
            .collect()
    }
}

/// A reachable URL with its measured latency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedUrl {
    pub url: String,
    pub latency: Duration,
}

/// A surviving channel with its URLs sorted fastest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankedChannel {
    pub name: String,
    pub origin: Origin,
    pub urls: Vec<RankedUrl>,
}

impl RankedChannel {
    pub fn url_strs(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(|u| u.url.as_str())
    }
}

/// Channel name as written to playlists: spaces become dashes
pub fn safe_name(name: &str) -> String {
    name.replace(' ', "-")
}
