//! Catalog index and phrase-to-book resolution.
//!
//! The index is built once per run from the full book list and passed
//! explicitly to every resolution call. Resolution is two-tier:
//!
//! 1. exact collection key match,
//! 2. normalized source label against normalized book title.
//!
//! Keys are unambiguous, so the title fallback is only consulted when the
//! key is empty or unknown. Both tiers are last-write-wins on duplicates.

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::models::{Book, BookRef, MatchPath, Phrase, Resolution, ResolvedPhrase};
use crate::normalize::normalize_text;

/// A later book replaced an earlier one under the same key or title.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Overwrite {
    /// Collection key or normalized title that collided
    pub key: String,
    pub replaced: String,
    pub replaced_by: String,
}

#[derive(Debug, Default)]
pub struct CatalogIndex {
    /// Books in first-seen order, holding the last-written fields per key
    books: Vec<Book>,
    by_key: FxHashMap<String, usize>,
    /// normalized title -> collection key
    by_title: FxHashMap<String, String>,
    duplicate_keys: Vec<Overwrite>,
    duplicate_titles: Vec<Overwrite>,
}

impl CatalogIndex {
    pub fn build(books: impl IntoIterator<Item = Book>) -> Self {
        let mut index = Self::default();
        for book in books {
            index.insert(book);
        }
        index
    }

    fn insert(&mut self, book: Book) {
        let title_norm = normalize_text(&book.title);
        let key = book.collection_key.clone();

        if !title_norm.is_empty() {
            if let Some(previous) = self.by_title.insert(title_norm.clone(), key.clone()) {
                if previous != key {
                    self.duplicate_titles.push(Overwrite {
                        key: title_norm,
                        replaced: previous,
                        replaced_by: key.clone(),
                    });
                }
            }
        }

        match self.by_key.get(&key) {
            Some(&idx) => {
                self.duplicate_keys.push(Overwrite {
                    key: key.clone(),
                    replaced: self.books[idx].title.clone(),
                    replaced_by: book.title.clone(),
                });
                self.books[idx] = book;
            }
            None => {
                self.by_key.insert(key, self.books.len());
                self.books.push(book);
            }
        }
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn get(&self, collection_key: &str) -> Option<&Book> {
        self.by_key.get(collection_key).map(|&idx| &self.books[idx])
    }

    pub fn get_by_title(&self, label: &str) -> Option<&Book> {
        let norm = normalize_text(label);
        if norm.is_empty() {
            return None;
        }
        self.by_title.get(&norm).and_then(|key| self.get(key))
    }

    pub fn duplicate_keys(&self) -> &[Overwrite] {
        &self.duplicate_keys
    }

    pub fn duplicate_titles(&self) -> &[Overwrite] {
        &self.duplicate_titles
    }

    /// Find the book for a (key, source label) pair in strict priority order.
    pub fn lookup(&self, collection_key: &str, source_label: &str) -> Option<(&Book, MatchPath)> {
        if !collection_key.is_empty() {
            if let Some(book) = self.get(collection_key) {
                return Some((book, MatchPath::Key));
            }
        }
        self.get_by_title(source_label)
            .map(|book| (book, MatchPath::Title))
    }

    pub fn resolution_for(&self, phrase: &Phrase) -> Resolution {
        match self.lookup(&phrase.collection_key, &phrase.source_label) {
            Some((book, via)) => Resolution::Resolved {
                book: BookRef::from(book),
                via,
            },
            None => Resolution::Unresolved,
        }
    }

    pub fn resolve(&self, phrase: Phrase) -> ResolvedPhrase {
        let resolution = self.resolution_for(&phrase);
        ResolvedPhrase::new(phrase, resolution)
    }

    /// Resolve a batch in parallel. Output order matches input order.
    pub fn resolve_all(&self, phrases: Vec<Phrase>) -> Vec<ResolvedPhrase> {
        phrases
            .into_par_iter()
            .map(|phrase| self.resolve(phrase))
            .collect()
    }

    /// Most similar catalog title for a label, for diagnostics only.
    /// Never used by [`CatalogIndex::resolve`].
    pub fn closest_title(&self, label: &str, min_similarity: f64) -> Option<(&Book, f64)> {
        let norm = normalize_text(label);
        if norm.is_empty() {
            return None;
        }
        self.books
            .iter()
            .map(|book| {
                let score = strsim::normalized_levenshtein(&norm, &normalize_text(&book.title));
                (book, score)
            })
            .filter(|(_, score)| *score >= min_similarity)
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Log duplicate keys and titles (last write wins for both)
    pub fn log_duplicates(&self) {
        for dup in &self.duplicate_keys {
            eprintln!(
                "[WARN] Duplicate collection key '{}': '{}' replaced by '{}'",
                dup.key, dup.replaced, dup.replaced_by
            );
        }
        for dup in &self.duplicate_titles {
            eprintln!(
                "[WARN] Duplicate normalized title '{}': {} replaced by {}",
                dup.key, dup.replaced, dup.replaced_by
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::ParseStatus;

    fn book(key: &str, title: &str) -> Book {
        Book {
            collection_key: key.to_string(),
            title: title.to_string(),
            author: "A".to_string(),
            category: "Tech".to_string(),
            topic: String::new(),
            generated_phrase_marker: String::new(),
        }
    }

    fn phrase(key: &str, label: &str) -> Phrase {
        Phrase {
            raw_identifier: key.to_string(),
            collection_key: key.to_string(),
            sequence_number: String::new(),
            text: "t".to_string(),
            attributed_author: String::new(),
            source_label: label.to_string(),
            parse_status: ParseStatus::Separate,
        }
    }

    fn resolved_key(rp: &ResolvedPhrase) -> Option<(&str, MatchPath)> {
        match &rp.resolution {
            Resolution::Resolved { book, via } => Some((book.collection_key.as_str(), *via)),
            Resolution::Unresolved => None,
        }
    }

    #[test]
    fn test_key_match_takes_precedence() {
        let index = CatalogIndex::build(vec![
            book("PDS", "Pro Dev Skills"),
            book("UNR", "Unrelated Title"),
        ]);
        let rp = index.resolve(phrase("PDS", "Unrelated Title"));
        assert_eq!(resolved_key(&rp), Some(("PDS", MatchPath::Key)));
    }

    #[test]
    fn test_title_fallback() {
        let index = CatalogIndex::build(vec![book("DDD", "Domain-Driven Design")]);
        let rp = index.resolve(phrase("", "  domain-driven design  "));
        assert_eq!(resolved_key(&rp), Some(("DDD", MatchPath::Title)));
    }

    #[test]
    fn test_unknown_key_falls_back_to_title() {
        let index = CatalogIndex::build(vec![book("PDS", "Pro Dev Skills")]);
        let rp = index.resolve(phrase("XXX", "Pro Dev Skills"));
        assert_eq!(resolved_key(&rp), Some(("PDS", MatchPath::Title)));
    }

    #[test]
    fn test_unresolved() {
        let index = CatalogIndex::build(vec![book("PDS", "Pro Dev Skills")]);
        let rp = index.resolve(phrase("XXX", "Nothing Like It"));
        assert_eq!(rp.resolution, Resolution::Unresolved);
    }

    #[test]
    fn test_blank_label_never_matches() {
        // A book with an empty title must not catch phrases with empty labels
        let index = CatalogIndex::build(vec![book("EMPTY", "   ")]);
        let rp = index.resolve(phrase("", ""));
        assert_eq!(rp.resolution, Resolution::Unresolved);
        assert!(index.get_by_title("").is_none());
    }

    #[test]
    fn test_duplicate_key_last_write_wins() {
        let index = CatalogIndex::build(vec![
            book("PDS", "First Title"),
            book("DDD", "Domain-Driven Design"),
            book("PDS", "Second Title"),
        ]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("PDS").unwrap().title, "Second Title");
        // First-seen position is kept
        assert_eq!(index.books()[0].collection_key, "PDS");
        assert_eq!(
            index.duplicate_keys(),
            &[Overwrite {
                key: "PDS".to_string(),
                replaced: "First Title".to_string(),
                replaced_by: "Second Title".to_string(),
            }]
        );
    }

    #[test]
    fn test_duplicate_title_last_write_wins() {
        let index = CatalogIndex::build(vec![
            book("AAA", "Same Title"),
            book("BBB", " same title "),
        ]);
        let rp = index.resolve(phrase("", "SAME TITLE"));
        assert_eq!(resolved_key(&rp), Some(("BBB", MatchPath::Title)));
        assert_eq!(index.duplicate_titles().len(), 1);
        assert_eq!(index.duplicate_titles()[0].replaced, "AAA");
    }

    #[test]
    fn test_resolve_all_preserves_order() {
        let index = CatalogIndex::build(vec![book("PDS", "Pro Dev Skills")]);
        let phrases: Vec<Phrase> = (0..200)
            .map(|i| {
                let mut p = phrase(if i % 2 == 0 { "PDS" } else { "NOPE" }, "");
                p.sequence_number = i.to_string();
                p
            })
            .collect();
        let resolved = index.resolve_all(phrases);
        assert_eq!(resolved.len(), 200);
        for (i, rp) in resolved.iter().enumerate() {
            assert_eq!(rp.phrase.sequence_number, i.to_string());
            assert_eq!(rp.resolution.is_resolved(), i % 2 == 0);
        }
    }

    #[test]
    fn test_closest_title() {
        let index = CatalogIndex::build(vec![
            book("PDS", "Pro Dev Skills"),
            book("DDD", "Domain-Driven Design"),
        ]);
        let (b, score) = index.closest_title("Domain Driven Desing", 0.7).unwrap();
        assert_eq!(b.collection_key, "DDD");
        assert!(score < 1.0);
        assert!(index.closest_title("zzzzzzzz", 0.7).is_none());
        assert!(index.closest_title("", 0.0).is_none());
    }
}
