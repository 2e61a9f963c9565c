//! sortwatch - keep a downloads folder tidy
//!
//! This library watches a directory for new files and moves each one into the
//! destination folder its extension maps to. It provides the rule table, the
//! exclusion list for in-progress downloads, collision-safe renaming, the
//! sorter that ties them together, and the watch loop that feeds it from
//! filesystem notifications.

pub mod cli;
pub mod collision;
pub mod config;
pub mod events;
pub mod exclusion;
pub mod output;
pub mod rules;
pub mod sorter;
pub mod watcher;

pub use config::{Config, ConfigError, SorterConfig};
pub use events::{EventKind, LogEvent, Severity, SortStats, StatsSnapshot};
pub use exclusion::ExclusionList;
pub use rules::{RuleTable, SortingRule};
pub use sorter::Sorter;
pub use watcher::{Dispatcher, Monitor, MonitorState, WatchError};

pub use cli::{Cli, run_cli};
