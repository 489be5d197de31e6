//! Core data models for the phrase catalog.
//!
//! This module contains the record shapes that flow through the pipeline:
//! catalog books, parsed phrases, resolution results, enrichment records,
//! the aggregate snapshot and the run statistics.

use rustc_hash::FxHashMap;
use serde::Serialize;

use crate::identifier::ParseStatus;

// ============================================================================
// Type Aliases
// ============================================================================

/// Enrichment records keyed by collection key
pub type EnrichmentMap = FxHashMap<String, EnrichmentRecord>;

// ============================================================================
// Catalog Models
// ============================================================================

/// Catalog entry loaded from the book source.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Book {
    pub collection_key: String,
    pub title: String,
    pub author: String,
    pub category: String,
    pub topic: String,
    /// Free-form marker recording whether phrases were generated for the book
    pub generated_phrase_marker: String,
}

/// Denormalized copy of the book fields a resolved phrase carries for display.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BookRef {
    pub collection_key: String,
    pub title: String,
    pub author: String,
    pub category: String,
    pub topic: String,
}

impl From<&Book> for BookRef {
    fn from(book: &Book) -> Self {
        Self {
            collection_key: book.collection_key.clone(),
            title: book.title.clone(),
            author: book.author.clone(),
            category: book.category.clone(),
            topic: book.topic.clone(),
        }
    }
}

// ============================================================================
// Phrase Models
// ============================================================================

/// Identifier as it arrives from the phrase source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawIdentifier {
    /// New format: key and sequence already in their own columns
    Separate { key: String, sequence: String },
    /// Legacy format: a single `KEY-NUM` column
    Combined(String),
}

/// Phrase row before identifier parsing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhraseRecord {
    pub identifier: RawIdentifier,
    pub text: String,
    pub attributed_author: String,
    pub source_label: String,
}

/// Phrase with its identifier parsed into key and sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Phrase {
    pub raw_identifier: String,
    pub collection_key: String,
    pub sequence_number: String,
    pub text: String,
    pub attributed_author: String,
    pub source_label: String,
    pub parse_status: ParseStatus,
}

impl Phrase {
    /// `key-seq` when both parts exist, otherwise whichever part is non-empty.
    pub fn composite_id(&self) -> String {
        crate::identifier::composite_id(&self.collection_key, &self.sequence_number)
    }
}

// ============================================================================
// Resolution Models
// ============================================================================

/// Which tier of the resolver produced the match.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPath {
    /// Exact collection key match
    Key,
    /// Normalized source label matched a normalized book title
    Title,
}

/// Outcome of resolving one phrase against the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Resolution {
    Resolved { book: BookRef, via: MatchPath },
    Unresolved,
}

impl Resolution {
    pub fn book(&self) -> Option<&BookRef> {
        match self {
            Resolution::Resolved { book, .. } => Some(book),
            Resolution::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved { .. })
    }
}

/// Phrase plus its resolution. Source fields are never altered.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ResolvedPhrase {
    #[serde(flatten)]
    pub phrase: Phrase,
    pub composite_id: String,
    pub resolution: Resolution,
}

impl ResolvedPhrase {
    pub fn new(phrase: Phrase, resolution: Resolution) -> Self {
        let composite_id = phrase.composite_id();
        Self {
            phrase,
            composite_id,
            resolution,
        }
    }

    pub fn book(&self) -> Option<&BookRef> {
        self.resolution.book()
    }
}

// ============================================================================
// Enrichment Models
// ============================================================================

/// Externally fetched book metadata, merged by collection key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentRecord {
    pub collection_key: String,
    pub cover_url: Option<String>,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub first_publish_year: Option<i32>,
}

// ============================================================================
// Output Models
// ============================================================================

/// Per-book view with phrase count and merged enrichment.
///
/// Enrichment fields are `None` when no record exists for the key; a missing
/// record is never an error.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BookSummary {
    pub collection_key: String,
    pub title: String,
    pub author: String,
    pub category: String,
    pub topic: String,
    pub phrase_count: usize,
    pub cover_url: Option<String>,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub first_publish_year: Option<i32>,
}

/// Category or author view.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub name: String,
    pub book_count: usize,
    pub phrase_count: usize,
}

pub type CategorySummary = GroupSummary;
pub type AuthorSummary = GroupSummary;

/// Phrase positions grouped by book key, category and author.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct PhraseGroups {
    pub(crate) by_book: FxHashMap<String, Vec<usize>>,
    pub(crate) by_category: FxHashMap<String, Vec<usize>>,
    pub(crate) by_author: FxHashMap<String, Vec<usize>>,
}

/// Immutable result of one aggregation run, handed to the exporter.
///
/// `phrases` holds every phrase in input order (resolved and unresolved);
/// `unresolved` holds the ones with no book. The group maps index into
/// `phrases`, so fields are read-only and the groups are not serialized.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CatalogSnapshot {
    books: Vec<BookSummary>,
    categories: Vec<CategorySummary>,
    authors: Vec<AuthorSummary>,
    phrases: Vec<ResolvedPhrase>,
    unresolved: Vec<ResolvedPhrase>,
    #[serde(skip)]
    groups: PhraseGroups,
}

impl CatalogSnapshot {
    pub(crate) fn new(
        books: Vec<BookSummary>,
        categories: Vec<CategorySummary>,
        authors: Vec<AuthorSummary>,
        phrases: Vec<ResolvedPhrase>,
        groups: PhraseGroups,
    ) -> Self {
        let unresolved = phrases
            .iter()
            .filter(|rp| !rp.resolution.is_resolved())
            .cloned()
            .collect();
        Self {
            books,
            categories,
            authors,
            phrases,
            unresolved,
            groups,
        }
    }

    pub fn books(&self) -> &[BookSummary] {
        &self.books
    }

    pub fn categories(&self) -> &[CategorySummary] {
        &self.categories
    }

    pub fn authors(&self) -> &[AuthorSummary] {
        &self.authors
    }

    /// Every phrase in input order
    pub fn phrases(&self) -> &[ResolvedPhrase] {
        &self.phrases
    }

    pub fn unresolved(&self) -> &[ResolvedPhrase] {
        &self.unresolved
    }

    fn group<'a>(
        &'a self,
        groups: &'a FxHashMap<String, Vec<usize>>,
        name: &str,
    ) -> impl Iterator<Item = &'a ResolvedPhrase> + 'a {
        groups
            .get(name)
            .into_iter()
            .flatten()
            .map(move |&idx| &self.phrases[idx])
    }

    pub fn phrases_for_book<'a>(
        &'a self,
        collection_key: &str,
    ) -> impl Iterator<Item = &'a ResolvedPhrase> + 'a {
        self.group(&self.groups.by_book, collection_key)
    }

    pub fn phrases_for_category<'a>(
        &'a self,
        category: &str,
    ) -> impl Iterator<Item = &'a ResolvedPhrase> + 'a {
        self.group(&self.groups.by_category, category)
    }

    pub fn phrases_for_author<'a>(
        &'a self,
        author: &str,
    ) -> impl Iterator<Item = &'a ResolvedPhrase> + 'a {
        self.group(&self.groups.by_author, author)
    }

    pub fn book(&self, collection_key: &str) -> Option<&BookSummary> {
        self.books
            .iter()
            .find(|b| b.collection_key == collection_key)
    }

    /// Sum of per-book phrase counts (equals resolved phrase count)
    pub fn resolved_count(&self) -> usize {
        self.books.iter().map(|b| b.phrase_count).sum()
    }
}

// ============================================================================
// Statistics (Instrumentation)
// ============================================================================

/// Per-run counters for every recoverable anomaly the pipeline absorbs.
#[derive(Default, Debug, Clone, Serialize)]
pub struct RunStats {
    // Book source
    pub book_rows_read: usize,
    pub book_header_rows_discarded: usize,
    pub books_without_key: usize,
    pub duplicate_keys: usize,
    pub duplicate_titles: usize,
    pub books_indexed: usize,

    // Phrase source
    pub phrase_rows_read: usize,
    pub header_rows_discarded: usize,
    pub phrases_loaded: usize,
    pub identifier_anomalies: usize,

    // Resolution
    pub resolved_by_key: usize,
    pub resolved_by_title: usize,
    pub unresolved: usize,

    // Enrichment
    pub enrichment_records: usize,
    pub books_enriched: usize,

    // Timing
    pub elapsed_seconds: f64,
}

impl RunStats {
    /// Resolution rate as a percentage of loaded phrases
    pub fn resolution_rate(&self) -> f64 {
        if self.phrases_loaded == 0 {
            0.0
        } else {
            100.0 * (self.resolved_by_key + self.resolved_by_title) as f64
                / self.phrases_loaded as f64
        }
    }

    /// Tally resolution outcomes for a batch of resolved phrases
    pub fn record_resolutions(&mut self, phrases: &[ResolvedPhrase]) {
        for rp in phrases {
            match &rp.resolution {
                Resolution::Resolved {
                    via: MatchPath::Key,
                    ..
                } => self.resolved_by_key += 1,
                Resolution::Resolved {
                    via: MatchPath::Title,
                    ..
                } => self.resolved_by_title += 1,
                Resolution::Unresolved => self.unresolved += 1,
            }
        }
    }

    /// Log stats to stderr in JSON format
    pub fn log_phase(&self, phase: &str) {
        if let Ok(json) = serde_json::to_string_pretty(self) {
            eprintln!("[STATS:{}]\n{}", phase, json);
        }
    }

    /// Write stats to a JSON file
    pub fn write_to_file(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn phrase(key: &str, seq: &str) -> Phrase {
        Phrase {
            raw_identifier: format!("{}-{}", key, seq),
            collection_key: key.to_string(),
            sequence_number: seq.to_string(),
            text: "t".to_string(),
            attributed_author: String::new(),
            source_label: String::new(),
            parse_status: ParseStatus::Split,
        }
    }

    fn book_ref(key: &str) -> BookRef {
        BookRef {
            collection_key: key.to_string(),
            title: String::new(),
            author: String::new(),
            category: String::new(),
            topic: String::new(),
        }
    }

    #[test]
    fn test_resolution_rate_empty() {
        let stats = RunStats::default();
        assert_eq!(stats.resolution_rate(), 0.0);
    }

    #[test]
    fn test_record_resolutions() {
        let phrases = vec![
            ResolvedPhrase::new(
                phrase("PDS", "001"),
                Resolution::Resolved {
                    book: book_ref("PDS"),
                    via: MatchPath::Key,
                },
            ),
            ResolvedPhrase::new(
                phrase("XXX", "002"),
                Resolution::Resolved {
                    book: book_ref("PDS"),
                    via: MatchPath::Title,
                },
            ),
            ResolvedPhrase::new(phrase("ZZZ", "003"), Resolution::Unresolved),
        ];
        let mut stats = RunStats {
            phrases_loaded: 3,
            ..Default::default()
        };
        stats.record_resolutions(&phrases);
        assert_eq!(stats.resolved_by_key, 1);
        assert_eq!(stats.resolved_by_title, 1);
        assert_eq!(stats.unresolved, 1);
        assert!((stats.resolution_rate() - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_resolved_phrase_composite_id() {
        let rp = ResolvedPhrase::new(phrase("PDS", "096"), Resolution::Unresolved);
        assert_eq!(rp.composite_id, "PDS-096");
        assert!(rp.book().is_none());
    }

    #[test]
    fn test_resolution_serializes_tagged() {
        let json = serde_json::to_value(Resolution::Unresolved).unwrap();
        assert_eq!(json["status"], "unresolved");
        let json = serde_json::to_value(Resolution::Resolved {
            book: book_ref("PDS"),
            via: MatchPath::Title,
        })
        .unwrap();
        assert_eq!(json["status"], "resolved");
        assert_eq!(json["via"], "title");
        assert_eq!(json["book"]["collection_key"], "PDS");
    }
}
