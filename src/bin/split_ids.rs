//! Migrate a legacy phrase CSV (`id,frase,autor,fuente`) to the split
//! `clave,id,frase,autor,fuente` layout.
//!
//! Usage: split-ids [--input frases.csv] [--output out.csv] [--no-backup]

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use phrase_catalog::export::write_phrase_csv;
use phrase_catalog::identifier::IdentifierParser;
use phrase_catalog::loader::load_phrases;
use phrase_catalog::safety::validate_output_path;

#[derive(Parser)]
#[command(name = "split-ids")]
#[command(about = "Split legacy KEY-NUM phrase identifiers into key and sequence columns")]
struct Args {
    #[arg(long, default_value = "frases.csv")]
    input: PathBuf,

    /// Write here instead of rewriting the input in place
    #[arg(long)]
    output: Option<PathBuf>,

    /// Skip the `.backup` copy made before an in-place rewrite
    #[arg(long)]
    no_backup: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let output = match args.output {
        Some(ref path) => {
            validate_output_path(path, "csv", &[args.input.as_path()])?;
            path.clone()
        }
        None => args.input.clone(),
    };

    eprintln!("Reading {:?}", args.input);
    let mut parser = IdentifierParser::new();
    let (phrases, report) = load_phrases(&args.input, &mut parser)?;

    let mut backup = None;
    if args.output.is_none() && !args.no_backup {
        let mut name = args.input.clone().into_os_string();
        name.push(".backup");
        let backup_path = PathBuf::from(name);
        std::fs::copy(&args.input, &backup_path)
            .with_context(|| format!("Failed to create backup {:?}", backup_path))?;
        backup = Some(backup_path);
    }

    let written = write_phrase_csv(&phrases, &output)?;

    println!("Split complete: {:?}", output);
    println!("  Rows read: {}", report.rows_read);
    println!("  Header rows discarded: {}", report.header_rows_discarded);
    println!("  Phrases written: {}", written);
    if parser.anomalies() > 0 {
        println!("  Identifiers without separator: {}", parser.anomalies());
        for sample in parser.samples() {
            println!("    - {}", sample);
        }
    }
    if let Some(path) = backup {
        println!("  Backup: {:?}", path);
    }

    Ok(())
}
