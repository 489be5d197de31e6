//! Flat-file sources: book CSV, phrase CSV and the optional enrichment JSON.
//!
//! The loader owns every fatal condition (missing files, unreadable CSV).
//! Recoverable problems are skipped and counted in a [`LoadReport`].

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

use crate::identifier::IdentifierParser;
use crate::models::{Book, EnrichmentMap, EnrichmentRecord, Phrase, PhraseRecord, RawIdentifier};

/// Header names that mark the new split identifier format
const KEY_COLUMNS: [&str; 2] = ["clave", "collection_key"];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub rows_read: usize,
    pub header_rows_discarded: usize,
    /// Book rows skipped because the collection key was blank
    pub rows_without_key: usize,
}

// ============================================================================
// Row shapes
// ============================================================================

#[derive(Debug, Deserialize)]
struct BookRow {
    #[serde(default, rename = "frases_generadas", alias = "generated_phrases")]
    generated_phrase_marker: String,
    #[serde(default, rename = "clave", alias = "collection_key")]
    collection_key: String,
    #[serde(default, rename = "titulo", alias = "title")]
    title: String,
    #[serde(default, rename = "autor", alias = "author")]
    author: String,
    #[serde(default, rename = "categoria", alias = "category")]
    category: String,
    #[serde(default, rename = "tema", alias = "topic")]
    topic: String,
}

#[derive(Debug, Deserialize)]
struct PhraseRow {
    #[serde(default, rename = "clave", alias = "collection_key")]
    collection_key: String,
    #[serde(default, rename = "id", alias = "sequence_number")]
    id: String,
    #[serde(default, rename = "frase", alias = "text")]
    text: String,
    #[serde(default, rename = "autor", alias = "author")]
    attributed_author: String,
    #[serde(default, rename = "fuente", alias = "source")]
    source_label: String,
}

/// Accepted names for each enrichment field, first match wins
const ENRICH_KEY: [&str; 2] = ["clave", "collection_key"];
const ENRICH_COVER: [&str; 2] = ["portada", "cover_url"];
const ENRICH_ISBN: [&str; 1] = ["isbn"];
const ENRICH_DESCRIPTION: [&str; 2] = ["descripcion", "description"];
const ENRICH_YEAR: [&str; 2] = ["fecha_publicacion", "first_publish_year"];

// ============================================================================
// CSV helpers
// ============================================================================

fn clean_headers(raw: &StringRecord) -> StringRecord {
    raw.iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim())
        .collect()
}

/// A data row that repeats the header names (a header re-ingested as data).
///
/// Every non-empty cell must equal its own column header (trimmed,
/// case-insensitive) and at least one cell must be non-empty. A single cell
/// that happens to match its header, like a topic of "Tema", is data.
pub fn is_header_row(headers: &StringRecord, record: &StringRecord) -> bool {
    let mut matched = false;
    for (idx, value) in record.iter().enumerate() {
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match headers.get(idx) {
            Some(header) if !header.is_empty() && value.to_lowercase() == header.to_lowercase() => {
                matched = true;
            }
            _ => return false,
        }
    }
    matched
}

/// Iterate data rows, dropping header-as-data rows and counting them.
fn read_rows<R: Read>(
    reader: R,
    source: &str,
    report: &mut LoadReport,
) -> Result<(StringRecord, Vec<StringRecord>)> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = clean_headers(
        rdr.headers()
            .with_context(|| format!("Failed to read header of {}", source))?,
    );

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.with_context(|| format!("Failed to read row of {}", source))?;
        report.rows_read += 1;
        if is_header_row(&headers, &record) {
            report.header_rows_discarded += 1;
            let line = record.position().map_or(0, |p| p.line());
            eprintln!("[WARN] {}: line {} repeats the header, discarded", source, line);
            continue;
        }
        rows.push(record);
    }
    Ok((headers, rows))
}

// ============================================================================
// Books
// ============================================================================

pub fn read_books<R: Read>(reader: R, source: &str) -> Result<(Vec<Book>, LoadReport)> {
    let mut report = LoadReport::default();
    let (headers, rows) = read_rows(reader, source, &mut report)?;

    let mut books = Vec::with_capacity(rows.len());
    for record in rows {
        let row: BookRow = record
            .deserialize(Some(&headers))
            .with_context(|| format!("Malformed book row in {}", source))?;
        let collection_key = row.collection_key.trim().to_string();
        if collection_key.is_empty() {
            report.rows_without_key += 1;
            continue;
        }
        books.push(Book {
            collection_key,
            title: row.title.trim().to_string(),
            author: row.author.trim().to_string(),
            category: row.category.trim().to_string(),
            topic: row.topic.trim().to_string(),
            generated_phrase_marker: row.generated_phrase_marker.trim().to_string(),
        });
    }
    Ok((books, report))
}

pub fn load_books(path: &Path) -> Result<(Vec<Book>, LoadReport)> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open book source {}", path.display()))?;
    read_books(file, &path.display().to_string())
}

// ============================================================================
// Phrases
// ============================================================================

/// Read phrase records, accepting both the split (`clave,id,...`) and the
/// legacy (`id,...`) column layouts.
pub fn read_phrase_records<R: Read>(
    reader: R,
    source: &str,
) -> Result<(Vec<PhraseRecord>, LoadReport)> {
    let mut report = LoadReport::default();
    let (headers, rows) = read_rows(reader, source, &mut report)?;
    let split_format = headers.iter().any(|h| KEY_COLUMNS.contains(&h));

    let mut records = Vec::with_capacity(rows.len());
    for record in rows {
        let row: PhraseRow = record
            .deserialize(Some(&headers))
            .with_context(|| format!("Malformed phrase row in {}", source))?;
        let identifier = if split_format {
            RawIdentifier::Separate {
                key: row.collection_key,
                sequence: row.id,
            }
        } else {
            RawIdentifier::Combined(row.id)
        };
        records.push(PhraseRecord {
            identifier,
            text: row.text,
            attributed_author: row.attributed_author,
            source_label: row.source_label,
        });
    }
    Ok((records, report))
}

pub fn load_phrases(
    path: &Path,
    parser: &mut IdentifierParser,
) -> Result<(Vec<Phrase>, LoadReport)> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open phrase source {}", path.display()))?;
    let (records, report) = read_phrase_records(file, &path.display().to_string())?;
    let phrases = records
        .into_iter()
        .map(|r| parser.parse_record(r))
        .collect();
    Ok((phrases, report))
}

// ============================================================================
// Enrichment
// ============================================================================

fn field<'a>(
    entry: &'a serde_json::Map<String, serde_json::Value>,
    names: &[&str],
) -> Option<&'a serde_json::Value> {
    names
        .iter()
        .find_map(|name| entry.get(*name))
        .filter(|v| !v.is_null())
}

fn text_field(entry: &serde_json::Map<String, serde_json::Value>, names: &[&str]) -> Option<String> {
    field(entry, names)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// ISBNs sometimes arrive as bare numbers.
fn isbn_field(entry: &serde_json::Map<String, serde_json::Value>) -> Option<String> {
    match field(entry, &ENRICH_ISBN)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Year as an integer, a whole float (`2003.0`) or a numeric string.
fn year_field(entry: &serde_json::Map<String, serde_json::Value>) -> Option<i32> {
    let value = field(entry, &ENRICH_YEAR)?;
    if let Some(n) = value.as_i64() {
        return i32::try_from(n).ok();
    }
    if let Some(f) = value.as_f64() {
        if f.fract() == 0.0 && f >= f64::from(i32::MIN) && f <= f64::from(i32::MAX) {
            return Some(f as i32);
        }
        return None;
    }
    value.as_str().and_then(|s| s.trim().parse().ok())
}

/// Parse enrichment records from a JSON array.
///
/// Fields are read one at a time: a field with an unexpected type is dropped
/// and the rest of the entry is kept. Entries that are not objects or carry
/// no key are skipped; later entries win on duplicate keys.
pub fn parse_enrichment(json: &str) -> Result<EnrichmentMap> {
    let values: Vec<serde_json::Value> = serde_json::from_str(json)?;
    let mut map = EnrichmentMap::default();
    for (i, value) in values.into_iter().enumerate() {
        let Some(entry) = value.as_object() else {
            eprintln!("[WARN] Enrichment entry {} skipped: not an object", i);
            continue;
        };
        let Some(key) = text_field(entry, &ENRICH_KEY).map(|k| k.trim().to_string()) else {
            continue;
        };
        if key.is_empty() {
            continue;
        }
        map.insert(
            key.clone(),
            EnrichmentRecord {
                collection_key: key,
                cover_url: text_field(entry, &ENRICH_COVER),
                isbn: isbn_field(entry),
                description: text_field(entry, &ENRICH_DESCRIPTION),
                first_publish_year: year_field(entry),
            },
        );
    }
    Ok(map)
}

/// Load the enrichment file. Missing or unreadable files give an empty map.
pub fn load_enrichment(path: &Path) -> EnrichmentMap {
    if !path.exists() {
        return EnrichmentMap::default();
    }
    let parsed = std::fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|json| parse_enrichment(&json));
    match parsed {
        Ok(map) => {
            eprintln!("[LOAD] {} enrichment records from {}", map.len(), path.display());
            map
        }
        Err(e) => {
            eprintln!("[WARN] Could not load enrichment from {}: {}", path.display(), e);
            EnrichmentMap::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::ParseStatus;
    use std::io::Write;

    const BOOKS_CSV: &str = "\
frases_generadas,clave,titulo,autor,categoria,tema
si,PDS,Pro Dev Skills,A,Tech,Craft
no,DDD, Domain-Driven Design ,Evans,Tech,Design
";

    #[test]
    fn test_read_books() {
        let (books, report) = read_books(BOOKS_CSV.as_bytes(), "books").unwrap();
        assert_eq!(report.rows_read, 2);
        assert_eq!(books.len(), 2);
        assert_eq!(books[1].collection_key, "DDD");
        assert_eq!(books[1].title, "Domain-Driven Design");
        assert_eq!(books[0].generated_phrase_marker, "si");
        assert_eq!(books[0].topic, "Craft");
    }

    #[test]
    fn test_read_books_skips_header_and_blank_keys() {
        let csv = "\
clave,titulo,autor,categoria,tema
PDS,Pro Dev Skills,A,Tech,Craft
CLAVE,TITULO,AUTOR,CATEGORIA,TEMA
,Orphan,B,Misc,
";
        let (books, report) = read_books(csv.as_bytes(), "books").unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(report.rows_read, 3);
        assert_eq!(report.header_rows_discarded, 1);
        assert_eq!(report.rows_without_key, 1);
        // Missing column defaults to empty
        assert_eq!(books[0].generated_phrase_marker, "");
    }

    #[test]
    fn test_read_phrases_legacy_format() {
        let csv = "\
id,frase,autor,fuente
PDS-096,\"Ship it, then iterate\",Someone,
id,frase,autor,fuente
NODASH,text,,Pro Dev Skills
";
        let (records, report) = read_phrase_records(csv.as_bytes(), "phrases").unwrap();
        assert_eq!(report.rows_read, 3);
        assert_eq!(report.header_rows_discarded, 1);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].identifier, RawIdentifier::Combined("PDS-096".to_string()));
        assert_eq!(records[0].text, "Ship it, then iterate");

        let mut parser = IdentifierParser::new();
        let phrases: Vec<Phrase> = records.into_iter().map(|r| parser.parse_record(r)).collect();
        assert_eq!(phrases[0].collection_key, "PDS");
        assert_eq!(phrases[0].sequence_number, "096");
        assert_eq!(phrases[1].parse_status, ParseStatus::Anomalous);
        assert_eq!(parser.anomalies(), 1);
    }

    #[test]
    fn test_read_phrases_split_format() {
        let csv = "\
clave,id,frase,autor,fuente
PDS,096,t1,,
,DDD-004,t2,,
";
        let (records, _) = read_phrase_records(csv.as_bytes(), "phrases").unwrap();
        assert_eq!(
            records[0].identifier,
            RawIdentifier::Separate {
                key: "PDS".to_string(),
                sequence: "096".to_string()
            }
        );
        let mut parser = IdentifierParser::new();
        let phrases: Vec<Phrase> = records.into_iter().map(|r| parser.parse_record(r)).collect();
        assert_eq!(phrases[0].parse_status, ParseStatus::Separate);
        assert_eq!(phrases[1].collection_key, "DDD");
        assert_eq!(phrases[1].sequence_number, "004");
        assert_eq!(phrases[1].parse_status, ParseStatus::Split);
    }

    #[test]
    fn test_header_row_detection_is_case_insensitive() {
        let headers = StringRecord::from(vec!["id", "frase", "autor", "fuente"]);
        assert!(is_header_row(
            &headers,
            &StringRecord::from(vec![" ID ", "Frase", "AUTOR", "fuente"])
        ));
        assert!(is_header_row(&headers, &StringRecord::from(vec!["id", "frase", "", ""])));
        assert!(!is_header_row(&headers, &StringRecord::from(vec!["A-1", "x", "y", "z"])));
        assert!(!is_header_row(&headers, &StringRecord::from(vec!["", "", "", ""])));
    }

    #[test]
    fn test_single_cell_matching_header_is_data() {
        let headers = StringRecord::from(vec!["id", "frase", "autor", "fuente"]);
        assert!(!is_header_row(&headers, &StringRecord::from(vec!["A-1", "x", "Autor", "z"])));
        // Value matching a different column's header is data too
        assert!(!is_header_row(&headers, &StringRecord::from(vec!["frase", "id", "", ""])));
    }

    #[test]
    fn test_rows_with_header_words_as_values_are_kept() {
        let books = "\
clave,titulo,autor,categoria,tema
PDS,Pro Dev Skills,A,Tech,Tema
clave,titulo,autor,categoria,tema
";
        let (books, report) = read_books(books.as_bytes(), "books").unwrap();
        assert_eq!(books.len(), 1);
        assert_eq!(books[0].topic, "Tema");
        assert_eq!(report.header_rows_discarded, 1);

        let phrases = "\
id,frase,autor,fuente
PDS-001,Frase,,
";
        let (records, report) = read_phrase_records(phrases.as_bytes(), "phrases").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].text, "Frase");
        assert_eq!(report.header_rows_discarded, 0);
    }

    #[test]
    fn test_load_books_missing_file_is_error() {
        let err = load_books(Path::new("/nonexistent/libros.csv")).unwrap_err();
        assert!(err.to_string().contains("Failed to open book source"));
    }

    #[test]
    fn test_load_phrases_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "id,frase,autor,fuente").unwrap();
        writeln!(file, "PDS-001,one,,").unwrap();
        writeln!(file, "PDS-002,two,,").unwrap();
        file.flush().unwrap();

        let mut parser = IdentifierParser::new();
        let (phrases, report) = load_phrases(file.path(), &mut parser).unwrap();
        assert_eq!(phrases.len(), 2);
        assert_eq!(report.header_rows_discarded, 0);
        assert_eq!(phrases[1].composite_id(), "PDS-002");
    }

    #[test]
    fn test_parse_enrichment() {
        let json = r#"[
            {"clave": "PDS", "titulo": "Pro Dev Skills", "portada": "https://c/1.jpg",
             "isbn": "123", "descripcion": null, "fecha_publicacion": 2004},
            {"collection_key": "DDD", "first_publish_year": "2003"},
            {"titulo": "No key"},
            "not an object"
        ]"#;
        let map = parse_enrichment(json).unwrap();
        assert_eq!(map.len(), 2);
        let pds = &map["PDS"];
        assert_eq!(pds.cover_url.as_deref(), Some("https://c/1.jpg"));
        assert_eq!(pds.isbn.as_deref(), Some("123"));
        assert_eq!(pds.description, None);
        assert_eq!(pds.first_publish_year, Some(2004));
        assert_eq!(map["DDD"].first_publish_year, Some(2003));
    }

    #[test]
    fn test_parse_enrichment_keeps_entry_with_odd_field_types() {
        let json = r#"[
            {"clave": "DDD", "isbn": 9780321125217, "fecha_publicacion": 2003.0,
             "portada": "https://c/2.jpg"},
            {"clave": "STO", "fecha_publicacion": 180.5, "descripcion": ["not", "text"],
             "portada": "https://c/3.jpg"}
        ]"#;
        let map = parse_enrichment(json).unwrap();
        assert_eq!(map.len(), 2);

        let ddd = &map["DDD"];
        assert_eq!(ddd.isbn.as_deref(), Some("9780321125217"));
        assert_eq!(ddd.first_publish_year, Some(2003));
        assert_eq!(ddd.cover_url.as_deref(), Some("https://c/2.jpg"));

        let sto = &map["STO"];
        assert_eq!(sto.first_publish_year, None);
        assert_eq!(sto.description, None);
        assert_eq!(sto.cover_url.as_deref(), Some("https://c/3.jpg"));
    }

    #[test]
    fn test_load_enrichment_missing_or_malformed() {
        assert!(load_enrichment(Path::new("/nonexistent/enriched.json")).is_empty());

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        file.flush().unwrap();
        assert!(load_enrichment(file.path()).is_empty());
    }
}
