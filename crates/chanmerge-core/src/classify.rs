//! Category assignment, latency ranking and category ordering

use crate::channel::{Channel, ChannelPool, Origin, RankedChannel, RankedUrl};
use crate::config::CategoryRule;
use chanmerge_probe::ProbeReport;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Assigns categories by keyword and ranks each channel's URLs by latency
#[derive(Debug, Clone)]
pub struct Classifier<'a> {
    rules: &'a [CategoryRule],
    fallback: &'a str,
    favorites: HashSet<&'a str>,
    favorites_category: &'a str,
    auto_discovered_limit: usize,
}

impl<'a> Classifier<'a> {
    pub fn new(rules: &'a [CategoryRule], fallback: &'a str) -> Self {
        Self {
            rules,
            fallback,
            favorites: HashSet::new(),
            favorites_category: "",
            auto_discovered_limit: 5,
        }
    }

    /// Channels named in `names` go to `category` instead of their rule match
    pub fn with_favorites(mut self, names: &'a [String], category: &'a str) -> Self {
        self.favorites = names.iter().map(String::as_str).collect();
        self.favorites_category = category;
        self
    }

    pub fn with_auto_discovered_limit(mut self, limit: usize) -> Self {
        self.auto_discovered_limit = limit;
        self
    }

    /// First rule with a keyword contained in `name`, else the fallback
    pub fn category_for(&self, name: &str) -> &'a str {
        if self.favorites.contains(name) {
            return self.favorites_category;
        }

        self.rules
            .iter()
            .find(|rule| {
                rule.keywords
                    .iter()
                    .any(|k| !k.is_empty() && name.contains(k.as_str()))
            })
            .map(|rule| rule.name.as_str())
            .unwrap_or(self.fallback)
    }

    /// Keep reachable URLs sorted fastest first. Auto-discovered channels keep
    /// only the fastest few. Returns `None` when nothing is reachable.
    pub fn rank(&self, channel: &Channel, report: &ProbeReport) -> Option<RankedChannel> {
        let mut urls: Vec<RankedUrl> = channel
            .urls()
            .iter()
            .filter_map(|url| {
                report.latency(url).as_duration().map(|latency| RankedUrl {
                    url: url.clone(),
                    latency,
                })
            })
            .collect();

        if urls.is_empty() {
            return None;
        }

        // Stable: equal latencies keep first-seen order
        urls.sort_by_key(|u| u.latency);
        if channel.origin == Origin::AutoDiscovered {
            urls.truncate(self.auto_discovered_limit);
        }

        Some(RankedChannel {
            name: channel.name.clone(),
            origin: channel.origin,
            urls,
        })
    }

    /// Rank every channel in the pool and file it under its category
    pub fn classify(&self, pool: &ChannelPool, report: &ProbeReport) -> Catalog {
        let mut catalog = Catalog::default();
        let mut dropped = 0usize;

        for channel in pool.channels() {
            match self.rank(channel, report) {
                Some(ranked) => catalog.insert(self.category_for(&channel.name), ranked),
                None => dropped += 1,
            }
        }

        debug!(
            "Classified {} channels into {} categories, dropped {} with no reachable URL",
            catalog.channel_count(),
            catalog.len(),
            dropped
        );
        catalog
    }
}

/// A category and its channels in name order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryGroup {
    pub name: String,
    pub channels: Vec<RankedChannel>,
}

/// Surviving channels grouped by category
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    categories: HashMap<String, BTreeMap<String, RankedChannel>>,
}

impl Catalog {
    /// Add a channel. A second channel with the same name in the same
    /// category contributes its URLs to the first.
    pub fn insert(&mut self, category: &str, channel: RankedChannel) {
        let channels = self.categories.entry(category.to_string()).or_default();
        match channels.get_mut(&channel.name) {
            Some(existing) => {
                for url in channel.urls {
                    if !existing.urls.iter().any(|u| u.url == url.url) {
                        existing.urls.push(url);
                    }
                }
            }
            None => {
                channels.insert(channel.name.clone(), channel);
            }
        }
    }

    pub fn get(&self, category: &str) -> Option<&BTreeMap<String, RankedChannel>> {
        self.categories.get(category)
    }

    /// Number of non-empty categories
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    pub fn channel_count(&self) -> usize {
        self.categories.values().map(BTreeMap::len).sum()
    }

    pub fn url_count(&self) -> usize {
        self.categories
            .values()
            .flat_map(BTreeMap::values)
            .map(|c| c.urls.len())
            .sum()
    }

    /// Consume into emission order; see [`order_categories`]
    pub fn into_groups(mut self, prefix: &[String], fallback: &str) -> Vec<CategoryGroup> {
        let names: Vec<String> = self.categories.keys().cloned().collect();
        order_categories(&names, prefix, fallback)
            .into_iter()
            .filter_map(|name| {
                let channels = self.categories.remove(&name)?;
                Some(CategoryGroup {
                    name,
                    channels: channels.into_values().collect(),
                })
            })
            .collect()
    }
}

/// Order category names for output: the prefix categories that exist, in
/// prefix order, then the rest lexicographically, with the fallback last.
pub fn order_categories(existing: &[String], prefix: &[String], fallback: &str) -> Vec<String> {
    let present: HashSet<&str> = existing.iter().map(String::as_str).collect();
    let mut ordered: Vec<String> = Vec::with_capacity(existing.len());

    for name in prefix {
        if name != fallback && present.contains(name.as_str()) && !ordered.contains(name) {
            ordered.push(name.clone());
        }
    }

    let mut rest: Vec<&String> = existing
        .iter()
        .filter(|name| name.as_str() != fallback && !ordered.contains(name))
        .collect();
    rest.sort();
    rest.dedup();
    ordered.extend(rest.into_iter().cloned());

    if present.contains(fallback) {
        ordered.push(fallback.to_string());
    }

    ordered
}
