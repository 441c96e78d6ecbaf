//! XMLTV guide lookup: channel display name → guide id and logo

use crate::channel::safe_name;
use crate::error::EpgError;
use crate::fetch::Fetcher;
use flate2::read::GzDecoder;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;
use tracing::{debug, info, warn};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Guide metadata for one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpgEntry {
    pub id: String,
    pub logo: String,
}

#[derive(Debug, Clone, Default)]
pub struct EpgTable {
    entries: HashMap<String, EpgEntry>,
}

impl EpgTable {
    pub fn insert(&mut self, display_name: impl Into<String>, entry: EpgEntry) {
        self.entries.insert(display_name.into(), entry);
    }

    /// Look up by the raw name, then by its dashed form. Unknown channels get
    /// the dashed name as id and no logo.
    pub fn lookup(&self, name: &str) -> EpgEntry {
        let safe = safe_name(name);
        self.entries
            .get(name)
            .or_else(|| self.entries.get(&safe))
            .cloned()
            .unwrap_or(EpgEntry {
                id: safe,
                logo: String::new(),
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fetch guide sources in order and keep the first that yields any channel.
/// Every failure degrades to an empty table.
pub async fn load_epg(fetcher: &Fetcher, urls: &[String], timeout: Duration) -> EpgTable {
    for url in urls {
        match fetch_table(fetcher, url, timeout).await {
            Ok(table) if !table.is_empty() => {
                info!("Loaded {} EPG channels from {}", table.len(), url);
                return table;
            }
            Ok(_) => debug!("EPG source {} had no channels", url),
            Err(e) => warn!("EPG source {} failed: {}", url, e),
        }
    }

    warn!("No EPG source produced any channels; using defaults");
    EpgTable::default()
}

async fn fetch_table(fetcher: &Fetcher, url: &str, timeout: Duration) -> Result<EpgTable, EpgError> {
    let bytes = fetcher.fetch_bytes(url, timeout).await?;
    let xml = decode_payload(&bytes)?;
    parse_xmltv(&xml)
}

/// Gunzip when the payload starts with the gzip magic bytes
pub fn decode_payload(bytes: &[u8]) -> Result<String, EpgError> {
    let raw = if bytes.starts_with(&GZIP_MAGIC) {
        let mut decoded = Vec::new();
        GzDecoder::new(bytes)
            .read_to_end(&mut decoded)
            .map_err(EpgError::Decompress)?;
        decoded
    } else {
        bytes.to_vec()
    };

    String::from_utf8(raw).map_err(|_| EpgError::Encoding)
}

#[derive(Default)]
struct PendingChannel {
    id: Option<String>,
    display_name: Option<String>,
    logo: Option<String>,
}

/// Extract `<channel>` elements. Channels without a display name are ignored
/// and a missing id falls back to the display name. A later channel with the
/// same display name replaces an earlier one.
pub fn parse_xmltv(xml: &str) -> Result<EpgTable, EpgError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut table = EpgTable::default();
    let mut current: Option<PendingChannel> = None;
    let mut in_display_name = false;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"channel" => {
                    current = Some(PendingChannel {
                        id: attribute(&e, b"id"),
                        ..Default::default()
                    })
                }
                b"display-name" if current.is_some() => {
                    in_display_name = true;
                    text.clear();
                }
                b"icon" => set_logo(&mut current, &e),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"icon" => set_logo(&mut current, &e),
                // <channel id="x"/> carries no display name
                b"channel" => current = None,
                _ => {}
            },
            Ok(Event::Text(e)) if in_display_name => {
                let unescaped = e
                    .unescape()
                    .map_err(|err| EpgError::Xml(err.to_string()))?;
                text.push_str(&unescaped);
            }
            Ok(Event::CData(e)) if in_display_name => {
                text.push_str(&String::from_utf8_lossy(&e));
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"display-name" => {
                    in_display_name = false;
                    if let Some(channel) = current.as_mut() {
                        let name = text.trim();
                        if channel.display_name.is_none() && !name.is_empty() {
                            channel.display_name = Some(name.to_string());
                        }
                    }
                }
                b"channel" => {
                    if let Some(PendingChannel {
                        id,
                        display_name: Some(name),
                        logo,
                    }) = current.take()
                    {
                        let entry = EpgEntry {
                            id: id.unwrap_or_else(|| name.clone()),
                            logo: logo.unwrap_or_default(),
                        };
                        table.insert(name, entry);
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(EpgError::Xml(format!(
                    "at position {}: {}",
                    reader.buffer_position(),
                    e
                )))
            }
            _ => {}
        }
    }

    Ok(table)
}

fn set_logo(current: &mut Option<PendingChannel>, element: &BytesStart<'_>) {
    if let Some(channel) = current.as_mut() {
        if channel.logo.is_none() {
            channel.logo = attribute(element, b"src");
        }
    }
}

fn attribute(element: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    element
        .attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}
