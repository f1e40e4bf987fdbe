//! File to citation-id catalog.
//!
//! The catalog is derived from the metadata store in a single pass. The first
//! chunk seen for a file decides that file's citation id; later chunks of the
//! same file never change it, even if they carry a different id.

use crate::storage::MetadataStore;
use itertools::Itertools;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Citation id shown for records that carry none.
pub const UNKNOWN_CITATION: &str = "S?";

/// One `(citation id, file)` pair of the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub citation_id: String,
    pub source_file: String,
}

/// Deduplicated mapping from source file to citation id, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Builds the catalog from `store`, first-seen-wins per source file.
    pub fn build(store: &MetadataStore) -> Self {
        let mut seen = HashSet::new();
        let entries = store
            .iter()
            .filter(|chunk| seen.insert(chunk.source_file.as_str()))
            .map(|chunk| CatalogEntry {
                citation_id: citation_or_unknown(&chunk.citation_id).to_string(),
                source_file: chunk.source_file.clone(),
            })
            .collect();
        Self { entries }
    }

    /// Citation id of `source_file`, if it is in the catalog.
    pub fn get(&self, source_file: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.source_file == source_file)
            .map(|entry| entry.citation_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in first-seen order.
    pub fn iter(&self) -> std::slice::Iter<'_, CatalogEntry> {
        self.entries.iter()
    }

    /// Entries sorted for display: natural citation-id order, then file name.
    pub fn sorted(&self) -> Vec<&CatalogEntry> {
        self.entries
            .iter()
            .sorted_by(|a, b| {
                natural_cmp(&a.citation_id, &b.citation_id)
                    .then_with(|| a.source_file.cmp(&b.source_file))
            })
            .collect()
    }

    /// `"<citationId>: <sourceFile>"` lines in display order, newline-joined.
    pub fn render(&self) -> String {
        self.sorted()
            .iter()
            .map(|entry| format!("{}: {}", entry.citation_id, entry.source_file))
            .join("\n")
    }
}

pub(crate) fn citation_or_unknown(citation_id: &str) -> &str {
    if citation_id.is_empty() {
        UNKNOWN_CITATION
    } else {
        citation_id
    }
}

/// Compares strings so that embedded numbers order by value: `S2 < S10`.
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();
    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let l_digits: String = left.peeking_take_while(|c| c.is_ascii_digit()).collect();
                let r_digits: String = right.peeking_take_while(|c| c.is_ascii_digit()).collect();
                let l_trimmed = l_digits.trim_start_matches('0');
                let r_trimmed = r_digits.trim_start_matches('0');
                let ordering = l_trimmed
                    .len()
                    .cmp(&r_trimmed.len())
                    .then_with(|| l_trimmed.cmp(r_trimmed))
                    .then_with(|| l_digits.len().cmp(&r_digits.len()));
                if ordering != Ordering::Equal {
                    return ordering;
                }
            }
            (Some(l), Some(r)) => {
                if l != r {
                    return l.cmp(&r);
                }
                left.next();
                right.next();
            }
        }
    }
}
