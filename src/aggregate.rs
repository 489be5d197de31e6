//! Grouped views over resolved phrases.
//!
//! One pass over the phrases builds the book/category/author groups; the
//! summaries are then derived from the catalog. Aggregation is a pure
//! function of its inputs, so running it twice gives the same snapshot.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::models::{
    BookSummary, CatalogSnapshot, EnrichmentMap, GroupSummary, PhraseGroups, ResolvedPhrase,
};
use crate::resolver::CatalogIndex;

#[derive(Default)]
struct GroupTally {
    books: usize,
    phrases: usize,
}

/// Build the snapshot for the renderer/exporter.
///
/// Every catalog book gets a summary (zero-phrase books included), in catalog
/// order. Categories and authors come from the catalog too, sorted by name;
/// `book_count` is the number of distinct catalog books in the group.
/// Unresolved phrases appear in `phrases` and `unresolved` only.
pub fn aggregate(
    index: &CatalogIndex,
    phrases: Vec<ResolvedPhrase>,
    enrichment: &EnrichmentMap,
) -> CatalogSnapshot {
    let mut by_book: FxHashMap<String, Vec<usize>> = FxHashMap::default();
    let mut by_category: FxHashMap<String, Vec<usize>> = FxHashMap::default();
    let mut by_author: FxHashMap<String, Vec<usize>> = FxHashMap::default();

    for (idx, rp) in phrases.iter().enumerate() {
        if let Some(book) = rp.book() {
            by_book
                .entry(book.collection_key.clone())
                .or_default()
                .push(idx);
            by_category
                .entry(book.category.clone())
                .or_default()
                .push(idx);
            by_author.entry(book.author.clone()).or_default().push(idx);
        }
    }

    let books: Vec<BookSummary> = index
        .books()
        .iter()
        .map(|book| {
            let extra = enrichment.get(&book.collection_key);
            BookSummary {
                collection_key: book.collection_key.clone(),
                title: book.title.clone(),
                author: book.author.clone(),
                category: book.category.clone(),
                topic: book.topic.clone(),
                phrase_count: by_book.get(&book.collection_key).map_or(0, Vec::len),
                cover_url: extra.and_then(|e| e.cover_url.clone()),
                isbn: extra.and_then(|e| e.isbn.clone()),
                description: extra.and_then(|e| e.description.clone()),
                first_publish_year: extra.and_then(|e| e.first_publish_year),
            }
        })
        .collect();

    let categories = summarize(index, &by_category, |b| b.category.as_str());
    let authors = summarize(index, &by_author, |b| b.author.as_str());

    let groups = PhraseGroups {
        by_book,
        by_category,
        by_author,
    };
    CatalogSnapshot::new(books, categories, authors, phrases, groups)
}

fn summarize(
    index: &CatalogIndex,
    groups: &FxHashMap<String, Vec<usize>>,
    field: impl Fn(&crate::models::Book) -> &str,
) -> Vec<GroupSummary> {
    let mut tallies: BTreeMap<&str, GroupTally> = BTreeMap::new();
    for book in index.books() {
        tallies.entry(field(book)).or_default().books += 1;
    }
    for (name, tally) in tallies.iter_mut() {
        tally.phrases = groups.get(*name).map_or(0, Vec::len);
    }

    tallies
        .into_iter()
        .map(|(name, tally)| GroupSummary {
            name: name.to_string(),
            book_count: tally.books,
            phrase_count: tally.phrases,
        })
        .collect()
}

/// Count books that received at least one enrichment field
pub fn enriched_book_count(snapshot: &CatalogSnapshot) -> usize {
    snapshot
        .books()
        .iter()
        .filter(|b| {
            b.cover_url.is_some()
                || b.isbn.is_some()
                || b.description.is_some()
                || b.first_publish_year.is_some()
        })
        .count()
}
