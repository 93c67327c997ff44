//! Seam towards the external accessibility checking service.

mod directory;

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::report::AccessibilityReport;

pub use directory::DirectoryChecker;

/// Inclusive, 1-based page range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: u32,
    pub end: u32,
}

impl PageRange {
    /// Returns `None` unless `1 <= start <= end`.
    pub fn new(start: u32, end: u32) -> Option<Self> {
        (start >= 1 && start <= end).then_some(Self { start, end })
    }

    pub fn single(page: u32) -> Option<Self> {
        Self::new(page, page)
    }

    pub fn contains(&self, page: u32) -> bool {
        (self.start..=self.end).contains(&page)
    }

    pub fn len(&self) -> usize {
        (self.end - self.start) as usize + 1
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }

    /// Parses `"3"` or `"2-7"`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.split_once('-') {
            Some((a, b)) => Self::new(a.trim().parse().ok()?, b.trim().parse().ok()?),
            None => Self::single(s.trim().parse().ok()?),
        }
    }
}

impl std::fmt::Display for PageRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// The external checking service. `pages: None` checks the whole document.
///
/// Implementations must be callable from several collector threads at once.
pub trait AccessibilityChecker: Send + Sync {
    fn check(&self, pdf_path: &Path, pages: Option<PageRange>)
        -> Result<AccessibilityReport, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_range_validation() {
        assert!(PageRange::new(0, 3).is_none());
        assert!(PageRange::new(4, 3).is_none());
        let range = PageRange::new(2, 5).unwrap();
        assert_eq!(range.len(), 4);
        assert!(range.contains(2) && range.contains(5));
        assert!(!range.contains(1) && !range.contains(6));
        assert_eq!(range.pages().collect::<Vec<_>>(), vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_page_range_parse_and_display() {
        assert_eq!(PageRange::parse("3"), PageRange::single(3));
        assert_eq!(PageRange::parse("2-7"), PageRange::new(2, 7));
        assert_eq!(PageRange::parse(" 2 - 7 "), PageRange::new(2, 7));
        assert!(PageRange::parse("7-2").is_none());
        assert!(PageRange::parse("a-b").is_none());
        assert_eq!(PageRange::new(2, 7).unwrap().to_string(), "2-7");
        assert_eq!(PageRange::single(4).unwrap().to_string(), "4");
    }
}
