//! Record cleanup and duplicate removal.

use std::collections::{BTreeSet, HashSet};
use std::sync::LazyLock;

use regex::Regex;

use crate::extract::RawRecord;

/// Substitute for missing scalar fields. Tags are a list, not a scalar, so
/// an empty tag list stays empty rather than becoming this.
pub const PLACEHOLDER: &str = "N/A";

static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// A cleaned profile: scalars never empty, tags trimmed and unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanRecord {
    pub position: usize,
    pub name: String,
    pub tags: Vec<String>,
    pub biography: String,
}

/// Clean every record, drop duplicates, keep page order.
///
/// Two records are duplicates when their name and tag set match (tags
/// compared case-insensitively as an unordered set, biography ignored);
/// the earliest one survives. Survivors keep their relative order and are
/// reindexed to positions 0..n.
pub fn normalize(raw: Vec<RawRecord>) -> Vec<CleanRecord> {
    let mut seen: HashSet<(String, BTreeSet<String>)> = HashSet::new();
    let mut out = Vec::with_capacity(raw.len());

    for record in raw {
        let clean = clean_record(record);
        if seen.insert(dedup_key(&clean)) {
            out.push(clean);
        }
    }

    for (position, record) in out.iter_mut().enumerate() {
        record.position = position;
    }
    out
}

fn clean_record(record: RawRecord) -> CleanRecord {
    CleanRecord {
        position: record.position,
        name: scalar_or_placeholder(record.name),
        tags: clean_tags(record.tags),
        biography: scalar_or_placeholder(record.biography),
    }
}

/// Collapse whitespace runs to single spaces and trim.
fn clean_text(s: &str) -> String {
    WS_RE.replace_all(s.trim(), " ").into_owned()
}

fn scalar_or_placeholder(value: Option<String>) -> String {
    match value.as_deref().map(clean_text) {
        Some(v) if !v.is_empty() => v,
        _ => PLACEHOLDER.to_string(),
    }
}

/// Trim tags, drop empties, fold case-insensitive repeats within the
/// record. The first spelling wins; order is otherwise preserved.
fn clean_tags(tags: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .map(|t| clean_text(t))
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .collect()
}

/// Tags compare as an unordered case-insensitive set; their order in the
/// surviving record is display-only.
fn dedup_key(record: &CleanRecord) -> (String, BTreeSet<String>) {
    (
        record.name.clone(),
        record.tags.iter().map(|t| t.to_lowercase()).collect(),
    )
}
