//! List phrases that resolve to no book and suggest the closest catalog title
//!
//! Usage: audit-unresolved [--books libros.csv] [--phrases frases.csv] [--min-similarity 0.75]

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use phrase_catalog::identifier::IdentifierParser;
use phrase_catalog::loader::{load_books, load_phrases};
use phrase_catalog::resolver::CatalogIndex;

#[derive(Parser)]
#[command(name = "audit-unresolved")]
#[command(about = "Report unresolved phrases with near-miss title suggestions")]
struct Args {
    #[arg(long, default_value = "libros.csv")]
    books: PathBuf,

    #[arg(long, default_value = "frases.csv")]
    phrases: PathBuf,

    /// Minimum normalized Levenshtein similarity for a suggestion (0.0-1.0)
    #[arg(long, default_value = "0.75")]
    min_similarity: f64,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let (books, _) = load_books(&args.books)?;
    let index = CatalogIndex::build(books);
    index.log_duplicates();

    let mut parser = IdentifierParser::new();
    let (phrases, _) = load_phrases(&args.phrases, &mut parser)?;
    let total = phrases.len();
    let resolved = index.resolve_all(phrases);

    let mut unresolved = 0usize;
    let mut with_suggestion = 0usize;

    println!("{:-<80}", "");
    for rp in resolved.iter().filter(|rp| !rp.resolution.is_resolved()) {
        unresolved += 1;
        let phrase = &rp.phrase;
        let id = if rp.composite_id.is_empty() {
            "<no id>"
        } else {
            rp.composite_id.as_str()
        };
        println!("[{}] source: {:?}", id, phrase.source_label);

        match index.closest_title(&phrase.source_label, args.min_similarity) {
            Some((book, score)) => {
                with_suggestion += 1;
                println!(
                    "    did you mean {} \"{}\" (similarity {:.2})",
                    book.collection_key, book.title, score
                );
            }
            None if !phrase.collection_key.is_empty() => {
                println!("    unknown key {:?}", phrase.collection_key);
            }
            None => {}
        }
    }
    println!("{:-<80}", "");

    println!("Phrases: {}", total);
    println!("Unresolved: {}", unresolved);
    println!("  with title suggestion: {}", with_suggestion);
    if parser.anomalies() > 0 {
        println!("Identifiers without separator: {}", parser.anomalies());
    }

    Ok(())
}
