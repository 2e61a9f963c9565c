//! Extension-based sorting rules.
//!
//! A [`RuleTable`] is an ordered list of [`SortingRule`]s, each mapping a set
//! of extensions to one destination directory. When an extension is listed by
//! more than one rule, the earliest rule wins.
//!
//! # Examples
//!
//! ```
//! use sortwatch::rules::{RuleTable, SortingRule};
//! use std::path::Path;
//!
//! let table = RuleTable::new(vec![
//!     SortingRule::new(["pdf", ".DOCX"], "/home/me/Documents"),
//!     SortingRule::new([".mp4"], "/home/me/Videos"),
//! ]);
//! let watch = Path::new("/home/me/Downloads");
//! assert_eq!(
//!     table.find_destination("Report.PDF", watch),
//!     Some(Path::new("/home/me/Documents"))
//! );
//! assert_eq!(table.find_destination("data.xyz", watch), None);
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Returns the lowercased extension of a filename, including the leading dot.
///
/// Leading dots do not start an extension, so `.bashrc` has none, while
/// `archive.tar.gz` yields `.gz`. Returns an empty string when there is no
/// extension.
///
/// ```
/// use sortwatch::rules::extension_of;
///
/// assert_eq!(extension_of("Photo.JPG"), ".jpg");
/// assert_eq!(extension_of("archive.tar.gz"), ".gz");
/// assert_eq!(extension_of(".bashrc"), "");
/// assert_eq!(extension_of("README"), "");
/// ```
pub fn extension_of(filename: &str) -> String {
    split_extension(filename).1.to_lowercase()
}

/// Splits a filename into its stem and extension, preserving case.
///
/// The extension keeps its leading dot; the stem is everything before it.
pub(crate) fn split_extension(filename: &str) -> (&str, &str) {
    let leading = filename.len() - filename.trim_start_matches('.').len();
    match filename[leading..].rfind('.') {
        Some(idx) => filename.split_at(leading + idx),
        None => (filename, ""),
    }
}

/// Normalizes a configured extension: trimmed, lowercased, with a leading dot.
fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{}", ext)
    }
}

/// A single sorting rule: files with any of `extensions` go to `destination`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortingRule {
    /// Lowercased extensions, each with a leading dot.
    pub extensions: Vec<String>,
    /// Directory that matching files are moved into.
    pub destination: PathBuf,
}

impl SortingRule {
    /// Creates a rule, normalizing every extension.
    pub fn new<I, S>(extensions: I, destination: impl Into<PathBuf>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for ext in extensions {
            let ext = normalize_extension(ext.as_ref());
            if ext.len() > 1 && !normalized.contains(&ext) {
                normalized.push(ext);
            }
        }
        Self {
            extensions: normalized,
            destination: destination.into(),
        }
    }

    /// Returns the final component of the destination, used in log messages.
    pub fn destination_name(&self) -> String {
        directory_name(&self.destination)
    }
}

/// Returns the last path component as a string, or the whole path if it has none.
pub fn directory_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Ordered rule table with a precomputed extension index.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<SortingRule>,
    index: HashMap<String, usize>,
}

impl RuleTable {
    /// Builds a table from rules in priority order.
    pub fn new(rules: Vec<SortingRule>) -> Self {
        let mut index = HashMap::new();
        for (position, rule) in rules.iter().enumerate() {
            for ext in &rule.extensions {
                // First rule to claim an extension keeps it.
                index.entry(ext.clone()).or_insert(position);
            }
        }
        Self { rules, index }
    }

    /// The rules in priority order.
    pub fn rules(&self) -> &[SortingRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns the first rule whose extension set contains the file's extension.
    pub fn rule_for(&self, filename: &str) -> Option<&SortingRule> {
        let ext = extension_of(filename);
        if ext.is_empty() {
            return None;
        }
        self.index.get(&ext).map(|&position| &self.rules[position])
    }

    /// Finds where a file should be moved.
    ///
    /// Returns `None` when no rule matches, or when the matching rule points
    /// back at `watch_dir` itself.
    pub fn find_destination(&self, filename: &str, watch_dir: &Path) -> Option<&Path> {
        let rule = self.rule_for(filename)?;
        if same_directory(&rule.destination, watch_dir) {
            return None;
        }
        Some(rule.destination.as_path())
    }
}

/// Compares two directories, resolving symlinks and `..` when both exist.
fn same_directory(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_table() -> RuleTable {
        RuleTable::new(vec![
            SortingRule::new([".png", ".jpg"], "/sort/Pictures"),
            SortingRule::new([".mp4", ".mkv"], "/sort/Videos"),
            SortingRule::new([".pdf", ".mp4"], "/sort/Documents"),
        ])
    }

    #[test]
    fn test_extension_of_lowercases() {
        assert_eq!(extension_of("IMG_0001.JPG"), ".jpg");
        assert_eq!(extension_of("notes.Txt"), ".txt");
    }

    #[test]
    fn test_extension_of_edge_cases() {
        assert_eq!(extension_of(""), "");
        assert_eq!(extension_of("Makefile"), "");
        assert_eq!(extension_of(".hidden"), "");
        assert_eq!(extension_of("..double"), "");
        assert_eq!(extension_of(".config.toml"), ".toml");
        assert_eq!(extension_of("trailing."), ".");
    }

    #[test]
    fn test_split_extension_preserves_case() {
        assert_eq!(split_extension("Photo.JPG"), ("Photo", ".JPG"));
        assert_eq!(split_extension("a.b.c"), ("a.b", ".c"));
        assert_eq!(split_extension(".bashrc"), (".bashrc", ""));
    }

    #[test]
    fn test_rule_normalizes_extensions() {
        let rule = SortingRule::new(["PDF", " .Docx ", ".pdf", ""], "/sort/Documents");
        assert_eq!(rule.extensions, vec![".pdf".to_string(), ".docx".to_string()]);
    }

    #[test]
    fn test_find_destination_matches_extension() {
        let table = sample_table();
        let watch = Path::new("/sort/Downloads");
        assert_eq!(
            table.find_destination("cat.PNG", watch),
            Some(Path::new("/sort/Pictures"))
        );
        assert_eq!(
            table.find_destination("paper.pdf", watch),
            Some(Path::new("/sort/Documents"))
        );
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let table = sample_table();
        let watch = Path::new("/sort/Downloads");
        assert_eq!(
            table.find_destination("clip.mp4", watch),
            Some(Path::new("/sort/Videos"))
        );
    }

    #[test]
    fn test_no_rule_for_unknown_or_missing_extension() {
        let table = sample_table();
        let watch = Path::new("/sort/Downloads");
        assert_eq!(table.find_destination("data.xyz", watch), None);
        assert_eq!(table.find_destination("LICENSE", watch), None);
    }

    #[test]
    fn test_destination_equal_to_watch_dir_is_no_rule() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let watch = temp_dir.path();
        let table = RuleTable::new(vec![SortingRule::new([".pdf"], watch)]);
        assert_eq!(table.find_destination("report.pdf", watch), None);

        // Same directory spelled differently still counts.
        let spelled = watch.join("sub").join("..");
        std::fs::create_dir(watch.join("sub")).expect("Failed to create subdirectory");
        let table = RuleTable::new(vec![SortingRule::new([".pdf"], spelled)]);
        assert_eq!(table.find_destination("report.pdf", watch), None);
    }

    #[test]
    fn test_empty_table_has_no_destinations() {
        let table = RuleTable::default();
        assert!(table.is_empty());
        assert!(!sample_table().is_empty());
        assert_eq!(table.find_destination("report.pdf", Path::new("/sort")), None);
    }

    #[test]
    fn test_destination_name() {
        let rule = SortingRule::new([".mp3"], "/home/me/Music");
        assert_eq!(rule.destination_name(), "Music");
        assert_eq!(directory_name(Path::new("/")), "/");
    }
}
