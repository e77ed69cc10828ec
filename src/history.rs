// 📜 Scan History - Presentational record of first-sight verifications
// Newest first, bounded, never read back by the verifier

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::verifier::Outcome;

// ============================================================================
// HISTORY ENTRY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Valid,
    Invalid,
}

impl EntryStatus {
    /// Status for an outcome that records history
    pub fn from_outcome(outcome: Outcome) -> Option<Self> {
        match outcome {
            Outcome::Valid => Some(EntryStatus::Valid),
            Outcome::Invalid => Some(EntryStatus::Invalid),
            _ => None,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            EntryStatus::Valid => "valid",
            EntryStatus::Invalid => "invalid",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub code: String,
    pub status: EntryStatus,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(code: impl Into<String>, status: EntryStatus) -> Self {
        Self::at(code, status, Utc::now())
    }

    pub fn at(code: impl Into<String>, status: EntryStatus, timestamp: DateTime<Utc>) -> Self {
        HistoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            code: code.into(),
            status,
            timestamp,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.status == EntryStatus::Valid
    }

    /// Local wall-clock time, e.g. "14:05:09"
    pub fn time_string(&self) -> String {
        self.timestamp.with_timezone(&Local).format("%H:%M:%S").to_string()
    }
}

// ============================================================================
// SEARCH FILTER
// ============================================================================

/// Case-insensitive substring match against an entry's code
///
/// An empty query matches every entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilter {
    needle: String,
}

impl SearchFilter {
    pub fn new(query: &str) -> Self {
        SearchFilter {
            needle: query.to_lowercase(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    pub fn matches(&self, entry: &HistoryEntry) -> bool {
        self.needle.is_empty() || entry.code.to_lowercase().contains(&self.needle)
    }
}

/// Predicate form of [`SearchFilter`]
pub fn filter(query: &str) -> impl Fn(&HistoryEntry) -> bool {
    let filter = SearchFilter::new(query);
    move |entry| filter.matches(entry)
}

// ============================================================================
// HISTORY
// ============================================================================

pub struct History {
    entries: VecDeque<HistoryEntry>,
    limit: usize,
}

impl History {
    pub fn new(limit: usize) -> Self {
        History {
            entries: VecDeque::new(),
            limit: limit.max(1),
        }
    }

    /// Prepend an entry, dropping the oldest beyond the limit
    pub fn record(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(self.limit);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries newest first
    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn filtered<'a>(&'a self, filter: &'a SearchFilter) -> impl Iterator<Item = &'a HistoryEntry> {
        self.entries.iter().filter(move |entry| filter.matches(entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn valid(code: &str) -> HistoryEntry {
        HistoryEntry::new(code, EntryStatus::Valid)
    }

    #[test]
    fn test_record_prepends() {
        let mut history = History::new(10);
        history.record(valid("00001"));
        history.record(valid("00042"));

        let codes: Vec<&str> = history.entries().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["00042", "00001"]);
    }

    #[test]
    fn test_limit_drops_oldest() {
        let mut history = History::new(2);
        history.record(valid("00001"));
        history.record(valid("00002"));
        history.record(valid("00003"));

        let codes: Vec<&str> = history.entries().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["00003", "00002"]);
    }

    #[test]
    fn test_filter_substring() {
        let mut history = History::new(10);
        history.record(valid("00001"));
        history.record(valid("00042"));

        let filter = SearchFilter::new("004");
        let shown: Vec<&str> = history.filtered(&filter).map(|e| e.code.as_str()).collect();
        assert_eq!(shown, vec!["00042"]);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_filter_case_insensitive() {
        let entry = HistoryEntry::new("AbC-77", EntryStatus::Invalid);

        assert!(filter("abc")(&entry));
        assert!(filter("C-7")(&entry));
        assert!(!filter("abd")(&entry));
    }

    #[test]
    fn test_empty_filter_matches_all() {
        let filter = SearchFilter::new("");
        assert!(filter.is_empty());
        assert!(filter.matches(&valid("00001")));
    }

    #[test]
    fn test_entry_ids_are_unique() {
        let a = valid("00001");
        let b = valid("00001");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_status_from_outcome() {
        assert_eq!(EntryStatus::from_outcome(Outcome::Valid), Some(EntryStatus::Valid));
        assert_eq!(EntryStatus::from_outcome(Outcome::Invalid), Some(EntryStatus::Invalid));
        assert_eq!(EntryStatus::from_outcome(Outcome::Duplicate), None);
    }
}
