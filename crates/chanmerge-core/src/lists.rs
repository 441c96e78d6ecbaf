//! Plain-text list files: ad keywords, favourites, remote sources and
//! category keyword rules

use crate::config::CategoryRule;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

/// Read one entry per non-blank line, ignoring `#` comments.
///
/// A missing or unreadable file is logged and treated as empty.
pub async fn load_list(path: &Path) -> Vec<String> {
    match fs::read(path).await {
        Ok(bytes) => {
            let entries = parse_list(&String::from_utf8_lossy(&bytes));
            debug!("Loaded {} entries from {}", entries.len(), path.display());
            entries
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("List file {} not found, treating as empty", path.display());
            Vec::new()
        }
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

fn parse_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(String::from)
        .collect()
}

/// Build category rules from a directory of `<category>.txt` keyword files,
/// in file-name order. Files without keywords are ignored.
pub async fn load_rules_dir(dir: &Path) -> Vec<CategoryRule> {
    let mut files = match sorted_files(dir).await {
        Ok(files) => files,
        Err(e) => {
            warn!("Rules directory {} unavailable: {}", dir.display(), e);
            return Vec::new();
        }
    };
    files.retain(|p| p.extension().is_some_and(|ext| ext == "txt"));

    let mut rules = Vec::new();
    for path in files {
        let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        let keywords = load_list(&path).await;
        if !keywords.is_empty() {
            rules.push(CategoryRule { name, keywords });
        }
    }

    debug!("Loaded {} category rules from {}", rules.len(), dir.display());
    rules
}

/// Regular files directly inside `dir`, sorted by file name
pub async fn sorted_files(dir: &Path) -> std::io::Result<Vec<std::path::PathBuf>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            files.push(entry.path());
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}
