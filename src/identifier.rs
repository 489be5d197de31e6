//! Phrase identifier parsing.
//!
//! Identifiers arrive either already split into key and sequence columns or
//! in the legacy combined `KEY-NUM` form. Malformed identifiers never abort a
//! run: they degrade to "key = whole string" and are counted.

use serde::Serialize;

use crate::models::{Phrase, PhraseRecord, RawIdentifier};

/// Max number of anomalous identifiers kept for the warning summary
const MAX_ANOMALY_SAMPLES: usize = 20;

/// How an identifier was turned into (key, sequence).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseStatus {
    /// Key and sequence arrived in separate columns
    Separate,
    /// Legacy `KEY-NUM` split on the first `-`
    Split,
    /// No separator: the whole string became the key
    Anomalous,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedId {
    pub collection_key: String,
    pub sequence_number: String,
    pub status: ParseStatus,
}

/// Split a legacy combined identifier on the first `-`.
///
/// Sequence numbers are opaque: "PDS-096" gives ("PDS", "096") and
/// "A-1-2" gives ("A", "1-2").
pub fn split_identifier(raw: &str) -> ParsedId {
    let raw = raw.trim();
    match raw.split_once('-') {
        Some((key, seq)) => ParsedId {
            collection_key: key.trim().to_string(),
            sequence_number: seq.trim().to_string(),
            status: ParseStatus::Split,
        },
        None => ParsedId {
            collection_key: raw.to_string(),
            sequence_number: String::new(),
            status: ParseStatus::Anomalous,
        },
    }
}

/// `key-seq` when both parts are non-empty, else whichever part is non-empty.
pub fn composite_id(key: &str, seq: &str) -> String {
    match (key.is_empty(), seq.is_empty()) {
        (false, false) => format!("{}-{}", key, seq),
        (false, true) => key.to_string(),
        (true, false) => seq.to_string(),
        (true, true) => String::new(),
    }
}

/// Identifier parser that counts anomalies across a run.
#[derive(Debug, Default)]
pub struct IdentifierParser {
    anomalies: usize,
    samples: Vec<String>,
}

impl IdentifierParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(&mut self, raw: &RawIdentifier) -> ParsedId {
        let parsed = match raw {
            RawIdentifier::Separate { key, sequence } if !key.trim().is_empty() => ParsedId {
                collection_key: key.trim().to_string(),
                sequence_number: sequence.trim().to_string(),
                status: ParseStatus::Separate,
            },
            // Blank key column: fall back to the legacy rule on the id column
            RawIdentifier::Separate { sequence, .. } => split_identifier(sequence),
            RawIdentifier::Combined(id) => split_identifier(id),
        };

        if parsed.status == ParseStatus::Anomalous {
            self.anomalies += 1;
            if self.samples.len() < MAX_ANOMALY_SAMPLES {
                self.samples.push(parsed.collection_key.clone());
            }
        }
        parsed
    }

    /// Parse a loaded record into a phrase.
    pub fn parse_record(&mut self, record: PhraseRecord) -> Phrase {
        let raw_identifier = match &record.identifier {
            RawIdentifier::Separate { key, sequence } => {
                composite_id(key.trim(), sequence.trim())
            }
            RawIdentifier::Combined(id) => id.trim().to_string(),
        };
        let parsed = self.parse(&record.identifier);
        Phrase {
            raw_identifier,
            collection_key: parsed.collection_key,
            sequence_number: parsed.sequence_number,
            text: record.text.trim().to_string(),
            attributed_author: record.attributed_author.trim().to_string(),
            source_label: record.source_label.trim().to_string(),
            parse_status: parsed.status,
        }
    }

    pub fn anomalies(&self) -> usize {
        self.anomalies
    }

    /// First few identifiers that had no separator
    pub fn samples(&self) -> &[String] {
        &self.samples
    }

    /// Log a warning summary if any identifier was malformed
    pub fn log_summary(&self) {
        if self.anomalies > 0 {
            eprintln!(
                "[WARN] {} identifier(s) without the expected KEY-NUM format (e.g. {:?})",
                self.anomalies, self.samples
            );
        }
    }
}
