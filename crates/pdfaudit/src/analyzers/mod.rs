//! Built-in analyzers.

mod filename;
mod heading;
mod rule_status;

use std::sync::Arc;

use crate::pipeline::Analyzer;

pub use filename::{
    suggest_filename, validate_filename, FilenameCheck, FilenameFromHeading, FILENAME_MISMATCH_CODE,
};
pub use heading::{HeadingPresence, MISSING_H1_CODE};
pub use rule_status::RuleStatusAnalyzer;

/// Section used for findings about the document as a whole.
pub const DOCUMENT_SECTION: &str = "Document";

/// Fresh instances of every built-in analyzer.
pub fn builtin_analyzers() -> Vec<Arc<dyn Analyzer>> {
    vec![
        Arc::new(RuleStatusAnalyzer::failed_rules()),
        Arc::new(RuleStatusAnalyzer::manual_checks()),
        Arc::new(HeadingPresence),
        Arc::new(FilenameFromHeading),
    ]
}

pub(crate) fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
        assert_eq!(truncate("ééééé", 4), "é...");
    }
}
