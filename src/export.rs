//! Writers for the snapshot: JSON documents and per-book CSV files.
//!
//! Every output is rewritten from scratch on each run.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::models::{CatalogSnapshot, Phrase};
use crate::normalize::sanitize_file_stem;

/// Column layout of the split phrase format
pub const PHRASE_COLUMNS: [&str; 5] = ["clave", "id", "frase", "autor", "fuente"];

/// File that collects phrases with no book
pub const UNRESOLVED_FILE: &str = "unresolved.csv";

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Write any serializable value as pretty JSON.
pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    ensure_parent(path)?;
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Write phrases in the split `clave,id,frase,autor,fuente` format.
pub fn write_phrase_csv<'a>(
    phrases: impl IntoIterator<Item = &'a Phrase>,
    path: &Path,
) -> Result<usize> {
    ensure_parent(path)?;
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    writer.write_record(PHRASE_COLUMNS)?;

    let mut count = 0;
    for phrase in phrases {
        writer.write_record([
            phrase.collection_key.as_str(),
            phrase.sequence_number.as_str(),
            phrase.text.as_str(),
            phrase.attributed_author.as_str(),
            phrase.source_label.as_str(),
        ])?;
        count += 1;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", path.display()))?;
    Ok(count)
}

/// File name for a book's phrase file: `<sanitized key>_<sanitized title>.csv`
///
/// Both parts go through the sanitizer, so the name never carries a path
/// separator or a `..` component.
pub fn book_file_name(collection_key: &str, title: &str) -> String {
    format!(
        "{}_{}.csv",
        sanitize_file_stem(collection_key),
        sanitize_file_stem(title)
    )
}

/// Remove split files a previous run may have left behind: `unresolved.csv`
/// and any `<key>_*.csv` for a catalog key. Other files are left alone.
fn clear_previous_split(snapshot: &CatalogSnapshot, dir: &Path) -> Result<usize> {
    let prefixes: Vec<String> = snapshot
        .books()
        .iter()
        .map(|b| format!("{}_", sanitize_file_stem(&b.collection_key)))
        .collect();

    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list directory {}", dir.display()))?;
    let mut removed = 0;
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list directory {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let stale = name == UNRESOLVED_FILE
            || (name.ends_with(".csv") && prefixes.iter().any(|p| name.starts_with(p.as_str())));
        if stale {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SplitSummary {
    pub files: Vec<(PathBuf, usize)>,
    pub unresolved_file: Option<(PathBuf, usize)>,
    /// Files from an earlier run that were removed first
    pub stale_removed: usize,
}

/// Write one CSV per book that has phrases, plus `unresolved.csv` when any
/// phrase has no book.
///
/// Split files from an earlier run are removed first, so the directory
/// reflects this snapshot only.
pub fn write_book_split(snapshot: &CatalogSnapshot, dir: &Path) -> Result<SplitSummary> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {}", dir.display()))?;

    let mut summary = SplitSummary {
        stale_removed: clear_previous_split(snapshot, dir)?,
        ..SplitSummary::default()
    };
    for book in snapshot.books().iter().filter(|b| b.phrase_count > 0) {
        let path = dir.join(book_file_name(&book.collection_key, &book.title));
        let count = write_phrase_csv(
            snapshot
                .phrases_for_book(&book.collection_key)
                .map(|rp| &rp.phrase),
            &path,
        )?;
        summary.files.push((path, count));
    }

    if !snapshot.unresolved().is_empty() {
        let path = dir.join(UNRESOLVED_FILE);
        let count = write_phrase_csv(snapshot.unresolved().iter().map(|rp| &rp.phrase), &path)?;
        summary.unresolved_file = Some((path, count));
    }
    Ok(summary)
}
