/// Classification and move of a single file.
///
/// The [`Sorter`] takes one path from the watch directory, decides whether and
/// where it should go, moves it, and reports every step as a [`LogEvent`].
/// Nothing here returns an error: each failure becomes an event.
use crate::collision::resolve_collision_within;
use crate::config::SorterConfig;
use crate::events::{EventKind, EventSender, LogEvent, Severity, SortStats};
use crate::rules::directory_name;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Sorts files according to one session's configuration.
#[derive(Clone)]
pub struct Sorter {
    config: Arc<SorterConfig>,
    stats: Arc<SortStats>,
    events: EventSender,
}

impl Sorter {
    pub fn new(config: Arc<SorterConfig>, stats: Arc<SortStats>, events: EventSender) -> Self {
        Self {
            config,
            stats,
            events,
        }
    }

    pub fn config(&self) -> &SorterConfig {
        &self.config
    }

    /// Classifies and moves one file.
    ///
    /// Returns the final event for the file, or `None` when the file is
    /// already gone (a repeated notification for a file that was handled).
    /// A `duplicate-renamed` event, when one applies, is sent before the
    /// returned event.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sortwatch::config::Config;
    /// use sortwatch::events::{event_channel, SortStats};
    /// use sortwatch::sorter::Sorter;
    /// use std::path::Path;
    /// use std::sync::Arc;
    ///
    /// let config = Arc::new(Config::default().compile().unwrap());
    /// let (sender, receiver) = event_channel();
    /// let sorter = Sorter::new(config, Arc::new(SortStats::new()), sender);
    ///
    /// if let Some(event) = sorter.sort_file(Path::new("/home/me/Downloads/report.pdf")) {
    ///     println!("{}", event.kind.message());
    /// }
    /// ```
    pub fn sort_file(&self, file_path: &Path) -> Option<LogEvent> {
        if !file_path.is_file() {
            tracing::debug!(path = %file_path.display(), "File no longer present, skipping");
            return None;
        }

        let name = file_path.file_name()?;
        Some(self.emit(self.classify_and_move(file_path, name)))
    }

    /// Matching and event payloads use the lossy `filename`; paths are built
    /// from the raw `name` so its bytes survive the move.
    fn classify_and_move(&self, file_path: &Path, name: &OsStr) -> EventKind {
        let filename = name.to_string_lossy().to_string();

        if let Some(pattern) = self.config.exclusions.matching_pattern(&filename) {
            return EventKind::Excluded {
                pattern: pattern.to_string(),
                filename,
            };
        }

        let Some(destination) = self
            .config
            .rules
            .find_destination(&filename, &self.config.watch_dir)
        else {
            return EventKind::NoRule { filename };
        };

        if !destination.is_dir() {
            return EventKind::DestinationMissing {
                destination: destination.to_path_buf(),
                filename,
            };
        }

        // Already known to exist; tolerates a concurrent create.
        if let Err(e) = fs::create_dir_all(destination) {
            return EventKind::MoveError {
                detail: format!("cannot use {}: {}", destination.display(), e),
                filename,
            };
        }

        let desired = destination.join(name);
        let target = match resolve_collision_within(&desired, self.config.collision_limit) {
            Ok(target) => target,
            Err(e) => {
                return EventKind::MoveError {
                    detail: e.to_string(),
                    filename,
                };
            }
        };

        if target != desired {
            self.emit(EventKind::DuplicateRenamed {
                filename: filename.clone(),
                new_name: directory_name(&target),
            });
        }

        match self.move_file(file_path, &target) {
            Ok(()) => EventKind::Moved {
                destination: directory_name(destination),
                path: target,
                filename,
            },
            Err(e) => EventKind::MoveError {
                detail: e.to_string(),
                filename,
            },
        }
    }

    fn move_file(&self, src: &Path, dest: &Path) -> io::Result<()> {
        relocate(src, dest, self.config.copy_fallback, |from, to| fs::rename(from, to))
    }

    /// Logs, counts, and publishes an event.
    fn emit(&self, kind: EventKind) -> LogEvent {
        let event = LogEvent::new(kind);
        log_event(&event);
        self.stats.record(&event.kind);
        self.events.send(event.clone());
        event
    }
}

/// Moves `src` to `dest` with `rename`, copying across filesystems when
/// `copy_fallback` is set.
///
/// The copy is written to a hidden sibling of `dest` and renamed into place,
/// so `dest` never holds a partial file. On any failure the source is left
/// where it was and no copy remains.
fn relocate<R>(src: &Path, dest: &Path, copy_fallback: bool, rename: R) -> io::Result<()>
where
    R: Fn(&Path, &Path) -> io::Result<()>,
{
    match rename(src, dest) {
        Ok(()) => Ok(()),
        Err(e) if copy_fallback && e.kind() == io::ErrorKind::CrossesDevices => {
            tracing::warn!(error = %e, "Atomic rename failed, falling back to copy+remove");
            copy_into_place(src, dest)
        }
        Err(e) => Err(e),
    }
}

fn copy_into_place(src: &Path, dest: &Path) -> io::Result<()> {
    let staging = staging_path(dest);
    if let Err(e) = fs::copy(src, &staging).and_then(|_| fs::rename(&staging, dest)) {
        let _ = fs::remove_file(&staging);
        return Err(e);
    }
    if let Err(e) = fs::remove_file(src) {
        // Keep a single copy: the source is still there.
        let _ = fs::remove_file(dest);
        return Err(e);
    }
    Ok(())
}

/// `dir/.name.sortwatch-partial` next to `dest`.
fn staging_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    if let Some(file_name) = dest.file_name() {
        name.push(file_name);
    }
    name.push(".sortwatch-partial");
    dest.with_file_name(name)
}

/// Mirrors an event into the tracing log at a matching level.
pub(crate) fn log_event(event: &LogEvent) {
    let message = event.kind.message();
    let file = event.kind.filename().unwrap_or_default();
    match event.severity {
        Severity::Info | Severity::Success => tracing::info!(file, "{}", message),
        Severity::Warning => tracing::warn!(file, "{}", message),
        Severity::Error => tracing::error!(file, "{}", message),
    }
}
