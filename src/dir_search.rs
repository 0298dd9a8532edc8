//! Iterative search for a directory by name.
//!
//! Traversal is stack-based pre-order. Each popped directory is read once, its
//! direct children are checked for a name match first, and only then are the
//! children pushed for descent (in reverse name order, so the
//! lexicographically first child is explored next). Directories are tracked by
//! their `(device, inode)` identity key so a directory reachable along two
//! paths is scanned once. Symbolic links are reported and skipped: they are
//! never matched and never descended into.

use std::collections::HashSet;
use std::fs;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// `(st_dev, st_ino)` pair identifying a directory on disk.
pub type IdentityKey = (u64, u64);

/// Progress notifications emitted while searching.
#[derive(Debug)]
pub enum SearchEvent<'a> {
    /// A directory entry compared against the target name.
    Checking(&'a Path),
    /// A symbolic link to a directory that was not followed.
    SkippedSymlink(&'a Path),
    /// A directory that could not be read; the search continues elsewhere.
    Unreadable(&'a Path, &'a io::Error),
}

/// Identity key of a directory as the filesystem reports it.
pub fn identity(_path: &Path, metadata: &fs::Metadata) -> IdentityKey {
    (metadata.dev(), metadata.ino())
}

/// Finds the first directory named `target` below `root`.
///
/// Never fails: unreadable directories are skipped and an exhausted search
/// returns `None`.
pub fn find(root: &Path, target: &str) -> Option<PathBuf> {
    find_with(root, target, identity, |event| match event {
        SearchEvent::Checking(path) => debug!("Checking directory {:?}", path),
        SearchEvent::SkippedSymlink(path) => debug!("Skipping symlinked directory {:?}", path),
        SearchEvent::Unreadable(path, e) => warn!("Cannot read {:?}: {}", path, e),
    })
}

/// Like [`find`], keying directories with `identify` and reporting each
/// traversal step to `on_event`.
///
/// A directory whose key was already seen is neither scanned nor descended
/// into again.
pub fn find_with<I, F>(root: &Path, target: &str, mut identify: I, mut on_event: F) -> Option<PathBuf>
where
    I: FnMut(&Path, &fs::Metadata) -> IdentityKey,
    F: FnMut(SearchEvent<'_>),
{
    let root = match fs::canonicalize(root) {
        Ok(path) => path,
        Err(e) => {
            on_event(SearchEvent::Unreadable(root, &e));
            return None;
        }
    };

    let mut stack = vec![root];
    let mut visited: HashSet<IdentityKey> = HashSet::new();

    while let Some(current) = stack.pop() {
        let key = match fs::metadata(&current) {
            Ok(metadata) => identify(&current, &metadata),
            Err(e) => {
                on_event(SearchEvent::Unreadable(&current, &e));
                continue;
            }
        };
        if !visited.insert(key) {
            continue;
        }

        let subdirs = match child_directories(&current, &mut identify, &mut on_event) {
            Ok(subdirs) => subdirs,
            Err(e) => {
                on_event(SearchEvent::Unreadable(&current, &e));
                continue;
            }
        };

        for (path, _) in &subdirs {
            on_event(SearchEvent::Checking(path));
            if path.file_name().is_some_and(|name| name == target) {
                return Some(path.clone());
            }
        }

        for (path, key) in subdirs.into_iter().rev() {
            if !visited.contains(&key) {
                stack.push(path);
            }
        }
    }

    None
}

/// Real (non-symlink) subdirectories of `dir`, sorted by name.
fn child_directories<I, F>(
    dir: &Path,
    identify: &mut I,
    on_event: &mut F,
) -> io::Result<Vec<(PathBuf, IdentityKey)>>
where
    I: FnMut(&Path, &fs::Metadata) -> IdentityKey,
    F: FnMut(SearchEvent<'_>),
{
    let mut subdirs = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                on_event(SearchEvent::Unreadable(dir, &e));
                continue;
            }
        };
        let path = entry.path();

        // symlink_metadata does not follow the link.
        let metadata = match fs::symlink_metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                on_event(SearchEvent::Unreadable(&path, &e));
                continue;
            }
        };

        if metadata.file_type().is_symlink() {
            if path.is_dir() {
                on_event(SearchEvent::SkippedSymlink(&path));
            }
            continue;
        }

        if metadata.is_dir() {
            let key = identify(&path, &metadata);
            subdirs.push((path, key));
        }
    }

    subdirs.sort_by(|a, b| a.0.file_name().cmp(&b.0.file_name()));
    Ok(subdirs)
}
