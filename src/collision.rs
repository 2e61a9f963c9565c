//! Collision-free destination naming.
//!
//! When `photo.jpg` already exists at the destination, the file is renamed to
//! `photo (1).jpg`, then `photo (2).jpg`, and so on. Every candidate is
//! checked against the filesystem as it is at resolution time.

use crate::rules::split_extension;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Largest counter tried before giving up on a name.
pub const MAX_COLLISION_ATTEMPTS: u32 = 10_000;

#[derive(Debug, Error)]
pub enum CollisionError {
    /// Every candidate up to the attempt limit already exists.
    #[error("no free name for {} after {attempts} attempts", .path.display())]
    Exhausted { path: PathBuf, attempts: u32 },
}

/// Returns `desired` if nothing exists there, otherwise the first free
/// `stem (n)ext` sibling.
///
/// # Examples
///
/// ```no_run
/// use sortwatch::collision::resolve_collision;
/// use std::path::Path;
///
/// let path = resolve_collision(Path::new("/home/me/Pictures/photo.jpg")).unwrap();
/// println!("moving to {}", path.display());
/// ```
pub fn resolve_collision(desired: &Path) -> Result<PathBuf, CollisionError> {
    resolve_collision_within(desired, MAX_COLLISION_ATTEMPTS)
}

/// Like [`resolve_collision`], trying at most `max_attempts` counters.
pub fn resolve_collision_within(
    desired: &Path,
    max_attempts: u32,
) -> Result<PathBuf, CollisionError> {
    if !desired.exists() {
        return Ok(desired.to_path_buf());
    }

    if let Some(file_name) = desired.file_name() {
        for counter in 1..=max_attempts {
            let candidate = desired.with_file_name(numbered_name(file_name, counter));
            if !candidate.exists() {
                return Ok(candidate);
            }
        }
    }

    Err(CollisionError::Exhausted {
        path: desired.to_path_buf(),
        attempts: max_attempts,
    })
}

/// Builds `stem (counter)ext` without decoding the name, so names that are
/// not valid UTF-8 keep their exact bytes.
fn numbered_name(file_name: &OsStr, counter: u32) -> OsString {
    let suffix = format!(" ({})", counter);
    let mut name = OsString::with_capacity(file_name.len() + suffix.len());

    // `Path` splits the same way as `split_extension` once the name has an
    // extension past its leading dots; without one the whole name is the stem.
    let has_extension = !split_extension(&file_name.to_string_lossy()).1.is_empty();
    let path = Path::new(file_name);
    match (path.file_stem(), path.extension()) {
        (Some(stem), Some(extension)) if has_extension => {
            name.push(stem);
            name.push(&suffix);
            name.push(".");
            name.push(extension);
        }
        _ => {
            name.push(file_name);
            name.push(&suffix);
        }
    }
    name
}
