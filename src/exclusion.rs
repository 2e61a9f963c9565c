//! Exclusion list for files that must be left where they are.
//!
//! Patterns containing a dot (`.part`, `.crdownload`) match the file's
//! extension exactly. Patterns without a dot (`temp`) match anywhere in the
//! lowercased filename.

use crate::rules::extension_of;

/// Ordered, lowercased exclusion patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionList {
    patterns: Vec<String>,
}

impl ExclusionList {
    /// Builds a list from raw patterns, trimming and lowercasing each and
    /// dropping blank entries.
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { patterns }
    }

    /// Parses a comma-separated list such as `".tmp, .part, temp"`.
    pub fn parse(list: &str) -> Self {
        Self::new(list.split(','))
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// Returns the pattern that excludes `filename`, if any.
    ///
    /// Extension patterns are checked before substring patterns.
    pub fn matching_pattern(&self, filename: &str) -> Option<&str> {
        let ext = extension_of(filename);
        if let Some(pattern) = self.patterns.iter().find(|p| **p == ext) {
            return Some(pattern.as_str());
        }

        let lowered = filename.to_lowercase();
        self.patterns
            .iter()
            .filter(|p| !p.contains('.'))
            .find(|p| lowered.contains(p.as_str()))
            .map(String::as_str)
    }

    /// Whether `filename` must be left untouched.
    pub fn is_excluded(&self, filename: &str) -> bool {
        self.matching_pattern(filename).is_some()
    }
}
