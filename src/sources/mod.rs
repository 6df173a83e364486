//! Identifier lists: one identifier per line, surrounding whitespace ignored.

use std::path::Path;

use crate::SetupError;

/// Trimmed, non-blank lines of a source file, in file order
pub fn read_source_file(source_path: &Path) -> Result<Vec<String>, SetupError> {
    let content = fs_err::read_to_string(source_path).map_err(|source| SetupError::Io {
        path: source_path.to_path_buf(),
        source,
    })?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Read the source list, refusing a missing file or an empty list
pub fn validate_source(source_path: &Path) -> Result<Vec<String>, SetupError> {
    if !source_path.exists() {
        return Err(SetupError::SourceNotFound(source_path.to_path_buf()));
    }

    let identifiers = read_source_file(source_path)?;
    if identifiers.is_empty() {
        return Err(SetupError::EmptySource(source_path.to_path_buf()));
    }

    tracing::debug!(count = identifiers.len(), source = %source_path.display(), "loaded identifiers");
    Ok(identifiers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_reads_trimmed_lines_in_order() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("source.csv");
        std::fs::write(&path, "  https://example.com/b \n\n\t\nhttps://example.com/a\r\nhttps://example.com/b\n").unwrap();

        let identifiers = validate_source(&path).unwrap();
        assert_eq!(
            identifiers,
            vec!["https://example.com/b", "https://example.com/a", "https://example.com/b"]
        );
    }

    #[test]
    fn test_missing_file_is_setup_error() {
        let dir = TempDir::new().unwrap();
        let result = validate_source(&dir.path().join("missing.csv"));
        assert!(matches!(result, Err(SetupError::SourceNotFound(_))));
    }

    #[test]
    fn test_blank_file_is_setup_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("source.csv");
        std::fs::write(&path, "\n   \n\n").unwrap();

        assert!(matches!(validate_source(&path), Err(SetupError::EmptySource(_))));
    }
}
