//! Safety utilities to prevent overwriting source files.
//!
//! Outputs are fully rewritten on every run, so an output path that points
//! at a source file would silently destroy the catalog.

use anyhow::{bail, Result};
use std::path::{Path, PathBuf};

/// Conventional source file names that must never be written as outputs
const SOURCE_FILE_NAMES: [&str; 3] = ["libros.csv", "frases.csv", "libros_enriched.json"];

fn resolved(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Validates that an output path is safe to overwrite.
///
/// Checks:
/// - Output file must have the required extension (e.g., "json", "csv")
/// - Output cannot be the same file as any of the provided source paths
/// - Output cannot use a conventional source file name
///
/// # Arguments
/// * `output` - The output path that will be created/overwritten
/// * `required_extension` - Extension the output must carry, without the dot
/// * `source_paths` - Slice of source paths that must not match the output
pub fn validate_output_path(
    output: &Path,
    required_extension: &str,
    source_paths: &[&Path],
) -> Result<()> {
    let output_name = output.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let extension = output.extension().and_then(|e| e.to_str()).unwrap_or("");

    if !extension.eq_ignore_ascii_case(required_extension) {
        bail!(
            "Safety check failed: output file '{}' must have a .{} extension",
            output.display(),
            required_extension
        );
    }

    let output_resolved = resolved(output);
    for source in source_paths {
        if output == *source || output_resolved == resolved(source) {
            bail!(
                "Safety check failed: output '{}' cannot be the same as source '{}'",
                output.display(),
                source.display()
            );
        }
    }

    if SOURCE_FILE_NAMES
        .iter()
        .any(|name| output_name.eq_ignore_ascii_case(name))
    {
        bail!(
            "Safety check failed: output '{}' uses a source file name",
            output.display()
        );
    }

    Ok(())
}
