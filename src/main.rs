use anyhow::{Context, Result};
use clap::Parser;
use rayon::prelude::*;
use std::path::PathBuf;
use std::time::Instant;

use phrase_catalog::aggregate::{aggregate, enriched_book_count};
use phrase_catalog::export::{write_book_split, write_json};
use phrase_catalog::identifier::IdentifierParser;
use phrase_catalog::loader::{load_books, load_enrichment, load_phrases};
use phrase_catalog::models::{ResolvedPhrase, RunStats};
use phrase_catalog::progress::{
    create_progress_bar, create_spinner, finish, format_duration, log, set_log_only,
};
use phrase_catalog::resolver::CatalogIndex;
use phrase_catalog::safety::validate_output_path;

#[derive(Parser)]
#[command(name = "phrase-catalog")]
#[command(about = "Link phrases to their source books and build the catalog snapshot")]
struct Args {
    /// Book catalog CSV
    #[arg(long, default_value = "libros.csv")]
    books: PathBuf,

    /// Phrase CSV (split `clave,id,...` or legacy `id,...` layout)
    #[arg(long, default_value = "frases.csv")]
    phrases: PathBuf,

    /// Optional enrichment JSON (cover, ISBN, description, year)
    #[arg(long, default_value = "public/data/libros_enriched.json")]
    enrichment: PathBuf,

    /// Snapshot JSON output
    #[arg(long, default_value = "public/data/catalog.json")]
    output: PathBuf,

    /// Also write one CSV per book into this directory
    #[arg(long)]
    split_dir: Option<PathBuf>,

    #[arg(long, default_value = "0")]
    workers: usize,

    /// Hide progress bars and print plain log lines
    #[arg(long)]
    log_only: bool,

    /// Write run statistics JSON to this path
    #[arg(long)]
    stats: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    set_log_only(args.log_only);

    if args.workers > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(args.workers)
            .build_global()
            .context("Failed to set thread pool size")?;
    }

    let sources = [
        args.books.as_path(),
        args.phrases.as_path(),
        args.enrichment.as_path(),
    ];
    validate_output_path(&args.output, "json", &sources)?;
    if let Some(ref stats_path) = args.stats {
        validate_output_path(stats_path, "json", &sources)?;
    }

    let start = Instant::now();
    let mut stats = RunStats::default();

    // Phase 1: book catalog
    let spinner = create_spinner("Phase 1: Loading books");
    let (books, book_report) = load_books(&args.books)?;
    stats.book_rows_read = book_report.rows_read;
    stats.book_header_rows_discarded = book_report.header_rows_discarded;
    stats.books_without_key = book_report.rows_without_key;

    let index = CatalogIndex::build(books);
    stats.books_indexed = index.len();
    stats.duplicate_keys = index.duplicate_keys().len();
    stats.duplicate_titles = index.duplicate_titles().len();
    finish(
        &spinner,
        "LOAD",
        format!("Phase 1: Indexed {} books from {:?}", index.len(), args.books),
    );
    index.log_duplicates();

    // Phase 2: phrases and enrichment
    let spinner = create_spinner("Phase 2: Loading phrases");
    let mut parser = IdentifierParser::new();
    let (phrases, phrase_report) = load_phrases(&args.phrases, &mut parser)?;
    stats.phrase_rows_read = phrase_report.rows_read;
    stats.header_rows_discarded = phrase_report.header_rows_discarded;
    stats.phrases_loaded = phrases.len();
    stats.identifier_anomalies = parser.anomalies();
    finish(
        &spinner,
        "LOAD",
        format!("Phase 2: Loaded {} phrases from {:?}", phrases.len(), args.phrases),
    );
    parser.log_summary();

    let enrichment = load_enrichment(&args.enrichment);
    stats.enrichment_records = enrichment.len();

    // Phase 3: resolution
    let pb = create_progress_bar(phrases.len() as u64, "Phase 3: Resolving phrases");
    let resolved: Vec<ResolvedPhrase> = phrases
        .into_par_iter()
        .map(|phrase| {
            let rp = index.resolve(phrase);
            pb.inc(1);
            rp
        })
        .collect();
    stats.record_resolutions(&resolved);
    finish(
        &pb,
        "RESOLVE",
        format!(
            "Phase 3: {} by key, {} by title, {} unresolved",
            stats.resolved_by_key, stats.resolved_by_title, stats.unresolved
        ),
    );

    // Phase 4: aggregation
    let snapshot = aggregate(&index, resolved, &enrichment);
    stats.books_enriched = enriched_book_count(&snapshot);
    log(
        "AGGREGATE",
        &format!(
            "Phase 4: {} books, {} categories, {} authors",
            snapshot.books().len(),
            snapshot.categories().len(),
            snapshot.authors().len()
        ),
    );

    // Phase 5: outputs
    write_json(&snapshot, &args.output)?;
    log("EXPORT", &format!("Wrote snapshot to {:?}", args.output));

    if let Some(ref dir) = args.split_dir {
        let summary = write_book_split(&snapshot, dir)?;
        if summary.stale_removed > 0 {
            log(
                "EXPORT",
                &format!("Removed {} files from a previous split", summary.stale_removed),
            );
        }
        log(
            "EXPORT",
            &format!("Wrote {} book files to {:?}", summary.files.len(), dir),
        );
        if let Some((path, count)) = summary.unresolved_file {
            log(
                "WARN",
                &format!("{} phrases without a book, see {:?}", count, path),
            );
        }
    }

    stats.elapsed_seconds = start.elapsed().as_secs_f64();
    stats.log_phase("final");
    if let Some(ref stats_path) = args.stats {
        stats.write_to_file(stats_path)?;
    }

    println!("\n{:=<60}", "");
    println!("Catalog build complete!");
    println!("  Books: {}", snapshot.books().len());
    println!("  Phrases: {}", snapshot.phrases().len());
    println!("  Resolved: {:.1}%", stats.resolution_rate());
    println!("  Unresolved: {}", snapshot.unresolved().len());
    println!("  Elapsed: {}", format_duration(start.elapsed()));
    println!("{:=<60}", "");

    Ok(())
}
