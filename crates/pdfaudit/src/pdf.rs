use std::path::Path;

use crate::error::ProcessError;

/// Number of pages in the PDF at `path`.
pub fn page_count(path: &Path) -> Result<u32, ProcessError> {
    let doc = lopdf::Document::load(path).map_err(|e| ProcessError::PageCount {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let count = doc.get_pages().len();
    u32::try_from(count).map_err(|_| ProcessError::PageCount {
        path: path.to_path_buf(),
        reason: format!("{} pages exceeds the supported maximum", count),
    })
}
