//! Turns user-supplied path arguments into watch registrations.

use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::error::WatchError;

/// Anything paths can be registered with.
pub trait WatchRegistry {
    fn add(&mut self, path: &Path) -> Result<(), WatchError>;
}

/// Registers one path argument and returns how many paths were registered.
///
/// A file (or any non-directory) is registered as is. A directory is walked
/// once and every directory in it, the root included, is registered; files
/// inside are covered by their parent's registration. Directories created
/// later are not picked up.
///
/// Registration is best effort and not transactional: if the walk fails
/// halfway, directories already registered stay registered.
pub fn register_path<R: WatchRegistry + ?Sized>(
    registry: &mut R,
    path: &Path,
) -> Result<usize, WatchError> {
    let metadata = fs::metadata(path).map_err(|source| WatchError::Stat {
        path: path.to_path_buf(),
        source,
    })?;

    if !metadata.is_dir() {
        registry.add(path)?;
        return Ok(1);
    }

    let walker = WalkBuilder::new(path)
        .standard_filters(false)
        .follow_links(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    let mut registered = 0;
    for entry in walker {
        let entry = entry.map_err(|source| WatchError::Walk {
            path: path.to_path_buf(),
            source,
        })?;
        // The root was already stat'ed through any symlink; nested links are
        // not followed.
        let is_dir = entry.depth() == 0 || entry.file_type().is_some_and(|t| t.is_dir());
        if is_dir {
            registry.add(entry.path())?;
            registered += 1;
        }
    }

    tracing::debug!("registered {} directories under {}", registered, path.display());
    Ok(registered)
}

/// Registers every argument in order, stopping at the first failure.
pub fn register_all<R: WatchRegistry + ?Sized>(
    registry: &mut R,
    paths: &[PathBuf],
) -> Result<usize, WatchError> {
    let mut total = 0;
    for path in paths {
        total += register_path(registry, path)?;
    }
    Ok(total)
}
