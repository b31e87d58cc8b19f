use std::{collections::HashMap, sync::LazyLock};

use regex::Regex;

pub const FALLBACK_CATEGORY: &str = "Без группы";

static ATTR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\w+(?:-\w+)*)="([^"]*)""#).expect("attribute pattern is valid")
});

/// One playable entry of an extended M3U playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct M3uEntry {
    pub name: String,
    pub category: String,
    pub logo_url: Option<String>,
    pub tvg_id: Option<String>,
    pub stream_url: String,
}

#[derive(Debug, Default)]
struct PendingEntry {
    name: String,
    category: String,
    logo_url: Option<String>,
    tvg_id: Option<String>,
}

/// Parses `#EXTINF` blocks. A block is kept only once a following `http...`
/// line supplies its URL; an `#EXTINF` without one is discarded when the next
/// block starts or the input ends.
pub fn parse_m3u(content: &str) -> Vec<M3uEntry> {
    let mut entries = Vec::new();
    let mut pending: Option<PendingEntry> = None;

    for line in content.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }

        if let Some(extinf) = line.strip_prefix("#EXTINF:") {
            pending = Some(parse_extinf(extinf));
            continue;
        }

        if line.starts_with('#') {
            continue;
        }

        if line.starts_with("http") {
            if let Some(entry) = pending.take() {
                if entry.name.is_empty() {
                    continue;
                }
                entries.push(M3uEntry {
                    name: entry.name,
                    category: entry.category,
                    logo_url: entry.logo_url,
                    tvg_id: entry.tvg_id,
                    stream_url: line.to_string(),
                });
            }
        }
    }

    entries
}

fn parse_extinf(extinf: &str) -> PendingEntry {
    let (header, title) = match find_title_separator(extinf) {
        Some(idx) => (&extinf[..idx], extinf[idx + 1..].trim()),
        None => (extinf, ""),
    };

    let mut attributes: HashMap<&str, &str> = HashMap::new();
    for caps in ATTR_REGEX.captures_iter(header) {
        if let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) {
            attributes.insert(key.as_str(), value.as_str());
        }
    }

    let non_empty = |key: &str| {
        attributes
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };

    PendingEntry {
        name: title.to_string(),
        category: non_empty("group-title").unwrap_or_else(|| FALLBACK_CATEGORY.to_string()),
        logo_url: non_empty("tvg-logo"),
        tvg_id: non_empty("tvg-id"),
    }
}

// First comma outside a quoted attribute value.
fn find_title_separator(extinf: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (idx, ch) in extinf.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => return Some(idx),
            _ => {}
        }
    }
    None
}
