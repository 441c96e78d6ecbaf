//! Configuration management for chanmerge

use crate::error::ConfigError;
use chanmerge_probe::ProbeOptions;
use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Used when neither the command line nor the config file names an EPG source
pub const DEFAULT_EPG_URL: &str = "https://live.fanmingming.com/e.xml";

/// Longest timeout or margin accepted, one day
const MAX_TIMEOUT_SECS: f64 = 86_400.0;

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/117.0.0.0 Safari/537.36";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub probe: ProbeConfig,
    pub fetch: FetchConfig,
    pub paths: PathsConfig,
    pub epg: EpgConfig,
    pub playlist: PlaylistConfig,
    pub categories: CategoriesConfig,
    pub ranking: RankingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Per-request probe timeout in seconds
    pub timeout_secs: f64,
    /// Subtracted from the timeout for the redirect follow-up
    pub redirect_margin_secs: f64,
    /// Maximum probes in flight
    pub concurrency: usize,
    /// Headers sent with every probe and fetch
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Timeout for downloading one remote playlist
    pub source_timeout_secs: f64,
    /// Timeout for downloading one EPG document
    pub epg_timeout_secs: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory of `<category>.txt` keyword files, used when no rules are configured
    pub rules_dir: PathBuf,
    /// Hand-curated playlist files
    pub manual_sources_dir: PathBuf,
    /// List of remote playlist URLs, one per line
    pub remote_sources_file: PathBuf,
    /// Daily pick files
    pub picks_dir: PathBuf,
    /// Ad keywords, one per line
    pub blacklist: PathBuf,
    /// Favourite channel names, one per line
    pub favorites: PathBuf,
    /// Output basename; `.m3u` and `.txt` are appended
    pub output: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpgConfig {
    /// EPG sources in order of preference
    pub urls: Vec<String>,
    /// How many of `urls` are tried and advertised in the playlist header
    pub max_sources: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistConfig {
    /// Stream shown as the "last updated" entry
    pub clock_url: Option<String>,
    /// Offset from UTC used for the update timestamp
    pub utc_offset_hours: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoriesConfig {
    /// Category for channels no rule matches; always emitted last
    pub fallback: String,
    /// Category that favourite channels are moved into
    pub favorites: String,
    /// Category holding the daily picks
    pub picks: String,
    /// Group title of the "last updated" entry
    pub updated: String,
    /// Emitted right after picks and favourites, in this order
    pub preferred: Vec<String>,
    /// Keyword rules; first match wins
    pub rules: Vec<CategoryRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub name: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingConfig {
    /// URLs kept per auto-discovered channel
    pub auto_discovered_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            probe: ProbeConfig {
                timeout_secs: 15.0,
                redirect_margin_secs: 3.0,
                concurrency: 600,
                headers: BTreeMap::from([(
                    "User-Agent".to_string(),
                    DEFAULT_USER_AGENT.to_string(),
                )]),
            },
            fetch: FetchConfig {
                source_timeout_secs: 20.0,
                epg_timeout_secs: 30.0,
            },
            paths: PathsConfig {
                rules_dir: PathBuf::from("rules"),
                manual_sources_dir: PathBuf::from("sources_manual"),
                remote_sources_file: PathBuf::from("sources.txt"),
                picks_dir: PathBuf::from("picks"),
                blacklist: PathBuf::from("config/blacklist.txt"),
                favorites: PathBuf::from("config/favorites.txt"),
                output: PathBuf::from("dist/live"),
            },
            epg: EpgConfig {
                urls: Vec::new(),
                max_sources: 3,
            },
            playlist: PlaylistConfig {
                clock_url: Some("http://epg.pw/zdy/clock.m3u8".to_string()),
                utc_offset_hours: 8,
            },
            categories: CategoriesConfig {
                fallback: "Other".to_string(),
                favorites: "Favorites".to_string(),
                picks: "Daily Picks".to_string(),
                updated: "Last Updated".to_string(),
                preferred: vec![
                    "CCTV".to_string(),
                    "Satellite".to_string(),
                    "Local".to_string(),
                    "HK-Macao-Taiwan".to_string(),
                ],
                rules: Vec::new(),
            },
            ranking: RankingConfig {
                auto_discovered_limit: 5,
            },
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        // Load from default config directory
        if let Some(path) = Self::default_config_path() {
            if path.exists() {
                figment = figment.merge(Toml::file(&path));
            }
        }

        // Load from specified config file
        if let Some(path) = config_file {
            if !path.exists() {
                return Err(ConfigError::LoadError(format!(
                    "{} does not exist",
                    path.display()
                )));
            }
            let is_json = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            figment = if is_json {
                figment.merge(Json::file(path))
            } else {
                figment.merge(Toml::file(path))
            };
        }

        // Load from environment
        figment = figment.merge(Env::prefixed("CHANMERGE_").split("__"));

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::LoadError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/chanmerge/config.toml`
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chanmerge/config.toml"))
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probe.concurrency == 0 {
            return Err(ConfigError::InvalidValue(
                "probe.concurrency must be at least 1".to_string(),
            ));
        }
        for (name, secs) in [
            ("probe.timeout_secs", self.probe.timeout_secs),
            ("fetch.source_timeout_secs", self.fetch.source_timeout_secs),
            ("fetch.epg_timeout_secs", self.fetch.epg_timeout_secs),
        ] {
            if !(secs > 0.0 && secs <= MAX_TIMEOUT_SECS) {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be between 0 and {} seconds, got {}",
                    name, MAX_TIMEOUT_SECS, secs
                )));
            }
        }
        let margin = self.probe.redirect_margin_secs;
        if !(0.0..=MAX_TIMEOUT_SECS).contains(&margin) {
            return Err(ConfigError::InvalidValue(format!(
                "probe.redirect_margin_secs must be between 0 and {} seconds, got {}",
                MAX_TIMEOUT_SECS, margin
            )));
        }
        if !(-23..=23).contains(&self.playlist.utc_offset_hours) {
            return Err(ConfigError::InvalidValue(
                "playlist.utc_offset_hours must be between -23 and 23".to_string(),
            ));
        }
        if self.categories.fallback.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "categories.fallback must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn probe_options(&self) -> ProbeOptions {
        ProbeOptions {
            timeout: seconds(self.probe.timeout_secs),
            redirect_margin: seconds(self.probe.redirect_margin_secs),
            headers: self.probe.headers.clone().into_iter().collect(),
        }
    }

    pub fn source_timeout(&self) -> Duration {
        seconds(self.fetch.source_timeout_secs)
    }

    pub fn epg_timeout(&self) -> Duration {
        seconds(self.fetch.epg_timeout_secs)
    }

    /// EPG sources to try, falling back to the built-in default
    pub fn epg_sources(&self) -> Vec<String> {
        let urls: Vec<String> = self
            .epg
            .urls
            .iter()
            .map(|u| u.trim())
            .filter(|u| !u.is_empty())
            .map(String::from)
            .collect();

        if urls.is_empty() {
            vec![DEFAULT_EPG_URL.to_string()]
        } else {
            urls.into_iter().take(self.epg.max_sources.max(1)).collect()
        }
    }

    /// Categories emitted before everything else, in order
    pub fn category_prefix(&self) -> Vec<String> {
        let mut prefix = vec![
            self.categories.picks.clone(),
            self.categories.favorites.clone(),
        ];
        prefix.extend(self.categories.preferred.iter().cloned());
        prefix
    }

    /// `<output>.m3u` and `<output>.txt`
    pub fn output_paths(&self) -> (PathBuf, PathBuf) {
        let base = self.paths.output.as_os_str().to_owned();
        let mut m3u = base.clone();
        m3u.push(".m3u");
        let mut txt = base;
        txt.push(".txt");
        (PathBuf::from(m3u), PathBuf::from(txt))
    }
}

/// Seconds to a `Duration`, capped at `MAX_TIMEOUT_SECS` (NaN included).
/// Negative values become zero.
fn seconds(secs: f64) -> Duration {
    Duration::try_from_secs_f64(secs.min(MAX_TIMEOUT_SECS)).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.ranking.auto_discovered_limit, 5);
        assert_eq!(config.probe_options().follow_up_timeout(), Duration::from_secs(12));
    }

    #[test]
    fn test_epg_sources_fallback_chain() {
        let mut config = Config::default();
        assert_eq!(config.epg_sources(), vec![DEFAULT_EPG_URL.to_string()]);

        config.epg.urls = (1..=5).map(|i| format!("http://epg{}.example/e.xml", i)).collect();
        let sources = config.epg_sources();
        assert_eq!(sources.len(), 3);
        assert_eq!(sources[0], "http://epg1.example/e.xml");
    }

    #[test]
    fn test_output_paths() {
        let mut config = Config::default();
        config.paths.output = PathBuf::from("dist/live");
        let (m3u, txt) = config.output_paths();
        assert_eq!(m3u, PathBuf::from("dist/live.m3u"));
        assert_eq!(txt, PathBuf::from("dist/live.txt"));
    }

    #[test]
    fn test_load_toml_file_preserves_rule_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chanmerge.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            r#"
[probe]
concurrency = 50

[[categories.rules]]
name = "Sports"
keywords = ["ESPN"]

[[categories.rules]]
name = "News"
keywords = ["CNN", "BBC"]
"#
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.probe.concurrency, 50);
        assert_eq!(config.probe.timeout_secs, 15.0);
        let names: Vec<_> = config.categories.rules.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Sports", "News"]);
    }

    #[test]
    fn test_load_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"probe": {"timeout_secs": 5}, "epg": {"urls": ["http://epg.example/e.xml.gz"]}}"#,
        )
        .unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.probe.timeout_secs, 5.0);
        assert_eq!(config.epg_sources(), vec!["http://epg.example/e.xml.gz".to_string()]);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut config = Config::default();
        config.probe.concurrency = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));

        let mut config = Config::default();
        config.probe.timeout_secs = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_timeouts_are_rejected() {
        let mut config = Config::default();
        config.probe.timeout_secs = 1e20;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
        assert_eq!(config.probe_options().timeout, Duration::from_secs(86_400));

        let mut config = Config::default();
        config.fetch.epg_timeout_secs = f64::NAN;
        assert!(config.validate().is_err());
        assert_eq!(config.epg_timeout(), Duration::from_secs(86_400));

        let mut config = Config::default();
        config.probe.redirect_margin_secs = 1e20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = Config::load(Some(Path::new("/nonexistent/chanmerge.toml")));
        assert!(matches!(result, Err(ConfigError::LoadError(_))));
    }
}
