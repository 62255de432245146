//! Output path checks for catalog index builds.
//!
//! Building an index replaces the output file, so the output must be
//! clearly named as a catalog and must never be one of the inputs.

use anyhow::{bail, Result};
use std::path::Path;

/// Substring every catalog index file name must carry.
pub const CATALOG_PATTERN: &str = "catalog";

/// Input file names that must never be overwritten.
const SOURCE_PATTERNS: [&str; 3] = ["observations", "candidates", ".json"];

/// Validates that an output path is safe to overwrite.
///
/// Checks:
/// - Output filename must contain `required_pattern`
/// - Output cannot be the same as any of the provided source paths
/// - Output must not look like a source file (JSON input dumps)
pub fn validate_output_path(
    output: &Path,
    required_pattern: &str,
    source_paths: &[&Path],
) -> Result<()> {
    let output_name = output.file_name().and_then(|n| n.to_str()).unwrap_or("");

    if !output_name.contains(required_pattern) {
        bail!(
            "Safety check failed: output file '{}' must contain '{}' in the name",
            output.display(),
            required_pattern
        );
    }

    for source in source_paths {
        if output == *source {
            bail!(
                "Safety check failed: output '{}' cannot be the same as source '{}'",
                output.display(),
                source.display()
            );
        }
    }

    for pattern in SOURCE_PATTERNS {
        if output_name.contains(pattern) {
            bail!(
                "Safety check failed: output '{}' matches source file pattern '{}'",
                output.display(),
                pattern
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_valid_catalog_output() {
        let output = PathBuf::from("/tmp/station_catalog.sqlite3");
        let source = PathBuf::from("/data/spotify_candidates.json");
        assert!(validate_output_path(&output, CATALOG_PATTERN, &[&source]).is_ok());
    }

    #[test]
    fn test_missing_pattern() {
        let output = PathBuf::from("/tmp/output.sqlite3");
        let source = PathBuf::from("/data/source.json");
        let result = validate_output_path(&output, CATALOG_PATTERN, &[&source]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("must contain 'catalog'"));
    }

    #[test]
    fn test_output_equals_source() {
        let path = PathBuf::from("/data/catalog.sqlite3");
        let result = validate_output_path(&path, CATALOG_PATTERN, &[&path]);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot be the same as source"));
    }

    #[test]
    fn test_json_output_blocked() {
        let output = PathBuf::from("/tmp/catalog_candidates.json");
        let source = PathBuf::from("/data/other.json");
        assert!(validate_output_path(&output, CATALOG_PATTERN, &[&source]).is_err());
    }
}
