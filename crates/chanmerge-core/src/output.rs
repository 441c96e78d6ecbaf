//! Playlist rendering in the M3U and `name,url` dialects

use crate::channel::safe_name;
use crate::classify::CategoryGroup;
use crate::epg::EpgTable;
use crate::error::OutputError;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use std::path::Path;
use tracing::info;

const PLAYSEEK: &str = "playseek=${(b)yyyyMMddHHmmss}-${(e)yyyyMMddHHmmss}";
const START_END: &str = "starttime=${(b)yyyyMMddHHmmss}&endtime=${(e)yyyyMMddHHmmss}";

/// Catch-up (time-shift) convention a stream URL follows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Catchup {
    /// IPTV head-end paths (`PLTV`, `TVOD`, `/liveplay/`, `/replay/`)
    Playseek,
    /// HLS playback/replay endpoints
    StartEnd,
    /// PHP relays addressed by `id=`
    PhpPlayseek,
}

impl Catchup {
    /// First matching family for `url`
    pub fn detect(url: &str) -> Option<Self> {
        if ["PLTV", "TVOD", "/liveplay/", "/replay/"]
            .iter()
            .any(|p| url.contains(p))
        {
            Some(Catchup::Playseek)
        } else if url.contains(".m3u8") && (url.contains("playback") || url.contains("replay")) {
            Some(Catchup::StartEnd)
        } else if url.contains(".php") && url.contains("id=") {
            Some(Catchup::PhpPlayseek)
        } else {
            None
        }
    }

    /// Attributes appended to the `#EXTINF` line, leading space included
    pub fn attributes(&self) -> String {
        let source = match self {
            Catchup::Playseek => format!("?{}", PLAYSEEK),
            Catchup::StartEnd => format!("?{}", START_END),
            Catchup::PhpPlayseek => format!("&{}", PLAYSEEK),
        };
        format!(" catchup=\"append\" catchup-source=\"{}\"", source)
    }
}

/// The synthetic "last updated" entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateStamp {
    pub group: String,
    pub timestamp: String,
    pub clock_url: String,
}

impl UpdateStamp {
    pub fn new(group: &str, clock_url: &str, now: DateTime<Utc>, utc_offset_hours: i32) -> Self {
        Self {
            group: group.to_string(),
            timestamp: format_timestamp(now, utc_offset_hours),
            clock_url: clock_url.to_string(),
        }
    }
}

/// `YYYY-MM-DD HH:MM:SS` at a fixed UTC offset
pub fn format_timestamp(now: DateTime<Utc>, utc_offset_hours: i32) -> String {
    let offset = FixedOffset::east_opt(utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix());
    now.with_timezone(&offset)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Renders ordered category groups into both playlist dialects
pub struct Composer<'a> {
    epg: &'a EpgTable,
    epg_urls: &'a [String],
    stamp: Option<UpdateStamp>,
}

impl<'a> Composer<'a> {
    pub fn new(epg: &'a EpgTable, epg_urls: &'a [String]) -> Self {
        Self {
            epg,
            epg_urls,
            stamp: None,
        }
    }

    pub fn with_update_stamp(mut self, stamp: UpdateStamp) -> Self {
        self.stamp = Some(stamp);
        self
    }

    pub fn render_m3u(&self, groups: &[CategoryGroup]) -> String {
        let mut out = String::new();

        if self.epg_urls.is_empty() {
            out.push_str("#EXTM3U\n");
        } else {
            out.push_str(&format!(
                "#EXTM3U x-tvg-url=\"{}\" catchup=\"append\" catchup-source=\"?{}\"\n",
                self.epg_urls.join(","),
                PLAYSEEK
            ));
        }

        if let Some(stamp) = &self.stamp {
            out.push_str(&format!(
                "#EXTINF:-1 group-title=\"{}\",{}\n{}\n",
                stamp.group, stamp.timestamp, stamp.clock_url
            ));
        }

        for group in groups {
            for channel in &group.channels {
                let name = safe_name(&channel.name);
                let entry = self.epg.lookup(&channel.name);
                for url in channel.url_strs() {
                    let catchup = Catchup::detect(url)
                        .map(|c| c.attributes())
                        .unwrap_or_default();
                    out.push_str(&format!(
                        "#EXTINF:-1 tvg-id=\"{}\" tvg-name=\"{}\" tvg-logo=\"{}\" group-title=\"{}\"{},{}\n{}\n",
                        entry.id, name, entry.logo, group.name, catchup, name, url
                    ));
                }
            }
        }

        out
    }

    pub fn render_txt(&self, groups: &[CategoryGroup]) -> String {
        let mut out = String::new();

        if let Some(stamp) = &self.stamp {
            out.push_str(&format!(
                "{},#genre#\n{},{}\n\n",
                stamp.group, stamp.timestamp, stamp.clock_url
            ));
        }

        for group in groups {
            out.push_str(&format!("{},#genre#\n", group.name));
            for channel in &group.channels {
                let name = safe_name(&channel.name);
                for url in channel.url_strs() {
                    out.push_str(&format!("{},{}\n", name, url));
                }
            }
            out.push('\n');
        }

        out
    }
}

/// Write both documents, creating the output directory first
pub async fn write_outputs(
    m3u_path: &Path,
    m3u: &str,
    txt_path: &Path,
    txt: &str,
) -> Result<(), OutputError> {
    for path in [m3u_path, txt_path] {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| OutputError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
        }
    }

    for (path, content) in [(m3u_path, m3u), (txt_path, txt)] {
        tokio::fs::write(path, content)
            .await
            .map_err(|source| OutputError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        info!("Wrote {}", path.display());
    }

    Ok(())
}
