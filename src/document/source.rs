//! Page extraction boundary
//!
//! Byte-level extraction (PDF and friends) happens outside this crate. The
//! structuring pipeline only needs per-page text.

use std::fs;
use std::path::Path;

use crate::errors::{RagError, Result};

/// Form feed separates pages in extracted text dumps
const PAGE_BREAK: char = '\x0c';

/// Produces the ordered page texts of a source document
pub trait PageSource {
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>>;
}

/// Reads pre-extracted UTF-8 text, one page per form-feed separated block
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextSource;

impl PageSource for PlainTextSource {
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>> {
        if !path.exists() {
            return Err(RagError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let contents = fs::read_to_string(path)?;
        Ok(contents.split(PAGE_BREAK).map(str::to_string).collect())
    }
}

/// Join pages with a blank line, the way the builder consumes them
pub fn join_pages(pages: &[String]) -> String {
    pages.join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_source_is_not_found() {
        let err = PlainTextSource
            .extract_pages(Path::new("/definitely/missing.txt"))
            .unwrap_err();
        assert!(matches!(err, RagError::NotFound { .. }));
    }

    #[test]
    fn test_splits_on_form_feed() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "page one\x0cpage two\x0cpage three").unwrap();

        let pages = PlainTextSource.extract_pages(file.path()).unwrap();
        assert_eq!(pages, vec!["page one", "page two", "page three"]);
        assert_eq!(join_pages(&pages), "page one\n\npage two\n\npage three");
    }
}
