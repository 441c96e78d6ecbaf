//! Playlist text parsing for the M3U and `name,url` dialects
//!
//! Sources are untrusted and often malformed. A bad line is skipped and
//! logged; it never aborts the parse.

use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use tracing::trace;

static TVG_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"tvg-name="([^"]*)""#).unwrap());

const EXTINF: &str = "#EXTINF:";
const GENRE_MARKER: &str = "#genre#";
const URL_SCHEMES: [&str; 2] = ["http://", "https://"];

/// Line-oriented playlist dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `#EXTINF:` directive followed by the stream URL on the next line
    M3u,
    /// `name,url` per line
    Txt,
}

impl Dialect {
    /// Pick a dialect from the source name, falling back to a content sniff
    pub fn detect(source_name: &str, content: &str) -> Self {
        let lower = source_name.to_ascii_lowercase();
        let path = lower.split(['?', '#']).next().unwrap_or_default();
        if path.ends_with(".m3u") || path.ends_with(".m3u8") {
            return Dialect::M3u;
        }

        let first_line = content.trim_start_matches('\u{feff}').trim_start();
        if first_line.starts_with("#EXTM3U") {
            Dialect::M3u
        } else {
            Dialect::Txt
        }
    }
}

/// Why a candidate line produced no channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyName,
    EmptyUrl,
    DuplicateUrl,
    AdKeyword,
    Malformed,
}

/// What happened to one candidate line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Accepted { name: String, url: String },
    Skipped(SkipReason),
}

/// Channel name → URLs from a single source, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedSource {
    order: Vec<String>,
    urls: HashMap<String, Vec<String>>,
}

impl ParsedSource {
    fn push(&mut self, name: String, url: String) {
        match self.urls.get_mut(&name) {
            Some(urls) => urls.push(url),
            None => {
                self.order.push(name.clone());
                self.urls.insert(name, vec![url]);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.urls.get(name).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.order
            .iter()
            .filter_map(|name| self.urls.get(name).map(|urls| (name.as_str(), urls.as_slice())))
    }

    /// Every URL of every channel
    pub fn all_urls(&self) -> impl Iterator<Item = &str> {
        self.iter().flat_map(|(_, urls)| urls.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn url_count(&self) -> usize {
        self.urls.values().map(Vec::len).sum()
    }
}

/// Parses playlist text, dropping channels whose name contains an ad keyword
#[derive(Debug, Clone, Copy)]
pub struct SourceParser<'a> {
    ad_keywords: &'a [String],
}

impl<'a> SourceParser<'a> {
    pub fn new(ad_keywords: &'a [String]) -> Self {
        Self { ad_keywords }
    }

    pub fn parse(&self, content: &str, dialect: Dialect) -> ParsedSource {
        let mut parsed = ParsedSource::default();
        let mut seen_urls = HashSet::new();
        let content = content.trim_start_matches('\u{feff}');

        let candidates = match dialect {
            Dialect::M3u => m3u_candidates(content),
            Dialect::Txt => txt_candidates(content),
        };

        for candidate in candidates {
            let outcome = match candidate {
                Ok((name, url)) => self.admit(name, url, &seen_urls),
                Err(reason) => LineOutcome::Skipped(reason),
            };

            match outcome {
                LineOutcome::Accepted { name, url } => {
                    seen_urls.insert(url.clone());
                    parsed.push(name, url);
                }
                LineOutcome::Skipped(reason) => trace!("Skipped playlist line: {:?}", reason),
            }
        }

        parsed
    }

    fn admit(&self, name: &str, url: &str, seen_urls: &HashSet<String>) -> LineOutcome {
        let name = name.trim();
        let url = url.trim();

        if name.is_empty() {
            return LineOutcome::Skipped(SkipReason::EmptyName);
        }
        if url.is_empty() {
            return LineOutcome::Skipped(SkipReason::EmptyUrl);
        }
        if seen_urls.contains(url) {
            return LineOutcome::Skipped(SkipReason::DuplicateUrl);
        }
        if self
            .ad_keywords
            .iter()
            .any(|k| !k.is_empty() && name.contains(k.as_str()))
        {
            return LineOutcome::Skipped(SkipReason::AdKeyword);
        }

        LineOutcome::Accepted {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

/// A candidate `(name, url)` pair, or the reason the line was unusable
type Candidate<'c> = Result<(&'c str, &'c str), SkipReason>;

fn m3u_candidates(content: &str) -> Vec<Candidate<'_>> {
    let lines: Vec<&str> = content.lines().collect();
    let mut candidates = Vec::new();

    for (i, raw) in lines.iter().enumerate() {
        let line = raw.trim();
        if !line.starts_with(EXTINF) {
            continue;
        }

        let url = match lines.get(i + 1).map(|l| l.trim()) {
            Some(next) if !next.starts_with('#') => next,
            _ => {
                candidates.push(Err(SkipReason::Malformed));
                continue;
            }
        };

        // Without tvg-name the name is the field after the last comma
        let name = match TVG_NAME.captures(line).and_then(|c| c.get(1)) {
            Some(m) => m.as_str(),
            None => match line.rsplit_once(',') {
                Some((_, trailing)) => trailing,
                None => {
                    candidates.push(Err(SkipReason::Malformed));
                    continue;
                }
            },
        };

        candidates.push(Ok((name, url)));
    }

    candidates
}

fn txt_candidates(content: &str) -> Vec<Candidate<'_>> {
    let mut candidates = Vec::new();

    for raw in content.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.contains(GENRE_MARKER) {
            continue;
        }

        // Split on the last comma so names containing commas survive
        let Some((name, url)) = line.rsplit_once(',') else {
            candidates.push(Err(SkipReason::Malformed));
            continue;
        };

        let url = url.trim();
        if !URL_SCHEMES.iter().any(|scheme| url.starts_with(scheme)) {
            candidates.push(Err(SkipReason::Malformed));
            continue;
        }

        candidates.push(Ok((name, url)));
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keywords(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_m3u_uses_tvg_name() {
        let text = "#EXTM3U\n#EXTINF:-1 tvg-name=\"CCTV1\" group-title=\"News\",CCTV-1 Comprehensive\nhttp://a.example/x.m3u8\n";
        let parsed = SourceParser::new(&[]).parse(text, Dialect::M3u);
        assert_eq!(parsed.get("CCTV1").unwrap(), &["http://a.example/x.m3u8".to_string()]);
    }

    #[test]
    fn test_m3u_falls_back_to_trailing_field() {
        let text = "#EXTINF:-1 group-title=\"Movies\",Movie Channel\nhttp://a.example/m.m3u8";
        let parsed = SourceParser::new(&[]).parse(text, Dialect::M3u);
        assert_eq!(parsed.len(), 1);
        assert!(parsed.get("Movie Channel").is_some());
    }

    #[test]
    fn test_m3u_directive_without_url_is_skipped() {
        let text = "#EXTINF:-1,First\n#EXTVLCOPT:http-user-agent=x\nhttp://a.example/1.m3u8\n#EXTINF:-1,Second\nhttp://a.example/2.m3u8\n#EXTINF:-1,Dangling";
        let parsed = SourceParser::new(&[]).parse(text, Dialect::M3u);
        assert_eq!(parsed.len(), 1);
        assert!(parsed.get("Second").is_some());
    }

    #[test]
    fn test_m3u_empty_tvg_name_is_rejected() {
        let text = "#EXTINF:-1 tvg-name=\"\",Fallback\nhttp://a.example/x.m3u8";
        let parsed = SourceParser::new(&[]).parse(text, Dialect::M3u);
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_m3u_directive_without_name_is_skipped() {
        let text = "#EXTINF:-1 tvg-id=\"x\"\nhttp://a.example/x.m3u8\n#EXTINF:-1 tvg-id=\"y\",Named\nhttp://a.example/y.m3u8";
        let parsed = SourceParser::new(&[]).parse(text, Dialect::M3u);
        let names: Vec<_> = parsed.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Named"]);
    }

    #[test]
    fn test_leading_bom_is_not_part_of_the_name() {
        let text = "\u{feff}CCTV1,http://a.example/1.m3u8\nCCTV1,http://a.example/2.m3u8";
        let parsed = SourceParser::new(&[]).parse(text, Dialect::Txt);
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed.get("CCTV1").unwrap().len(), 2);

        let text = "\u{feff}#EXTM3U\n#EXTINF:-1,CCTV1\nhttp://a.example/1.m3u8";
        let parsed = SourceParser::new(&[]).parse(text, Dialect::M3u);
        assert!(parsed.get("CCTV1").is_some());
    }

    #[test]
    fn test_txt_splits_on_last_comma() {
        let text = "News, Weather, Sports,http://a.example/x.m3u8";
        let parsed = SourceParser::new(&[]).parse(text, Dialect::Txt);
        assert_eq!(
            parsed.get("News, Weather, Sports").unwrap(),
            &["http://a.example/x.m3u8".to_string()]
        );
    }

    #[test]
    fn test_txt_skips_headers_comments_and_bad_schemes() {
        let text = "Central,#genre#\n# comment\n\nCCTV1,http://a.example/1.m3u8\nCCTV2,rtmp://a.example/2\nno comma here http://x\nCCTV3,https://a.example/3.m3u8";
        let parsed = SourceParser::new(&[]).parse(text, Dialect::Txt);
        let names: Vec<_> = parsed.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["CCTV1", "CCTV3"]);
    }

    #[test]
    fn test_duplicate_url_kept_once() {
        let text = "A,http://a.example/x.m3u8\nA,http://a.example/x.m3u8\nB,http://a.example/x.m3u8";
        let parsed = SourceParser::new(&[]).parse(text, Dialect::Txt);
        assert_eq!(parsed.url_count(), 1);
        assert_eq!(parsed.get("A").unwrap().len(), 1);
        assert!(parsed.get("B").is_none());

        let text = "#EXTINF:-1,A\nhttp://a.example/x.m3u8\n#EXTINF:-1,A\nhttp://a.example/x.m3u8";
        let parsed = SourceParser::new(&[]).parse(text, Dialect::M3u);
        assert_eq!(parsed.get("A").unwrap().len(), 1);
    }

    #[test]
    fn test_ad_keyword_filters_both_dialects() {
        let ads = keywords(&["AD"]);
        let parser = SourceParser::new(&ads);

        let txt = parser.parse("AD频道,http://ads.example/s.m3u8", Dialect::Txt);
        assert!(txt.is_empty());

        let m3u = parser.parse(
            "#EXTINF:-1 tvg-name=\"Free AD Zone\",x\nhttp://ads.example/s.m3u8\n#EXTINF:-1,CCTV1\nhttp://a.example/1.m3u8",
            Dialect::M3u,
        );
        assert_eq!(m3u.len(), 1);
        assert!(m3u.get("CCTV1").is_some());
    }

    #[test]
    fn test_names_are_trimmed_and_url_order_preserved() {
        let text = "  CCTV1  ,http://a.example/2.m3u8\nCCTV1,http://a.example/1.m3u8\n   ,http://a.example/3.m3u8";
        let parsed = SourceParser::new(&[]).parse(text, Dialect::Txt);
        assert_eq!(
            parsed.get("CCTV1").unwrap(),
            &["http://a.example/2.m3u8".to_string(), "http://a.example/1.m3u8".to_string()]
        );
        assert_eq!(parsed.len(), 1);
    }

    #[test]
    fn test_dialect_detection() {
        assert_eq!(Dialect::detect("list.m3u", ""), Dialect::M3u);
        assert_eq!(Dialect::detect("http://x.example/iptv.M3U8?token=1", ""), Dialect::M3u);
        assert_eq!(Dialect::detect("list.txt", "#EXTM3U\n"), Dialect::M3u);
        assert_eq!(Dialect::detect("list.txt", "CCTV1,http://a"), Dialect::Txt);
    }
}
