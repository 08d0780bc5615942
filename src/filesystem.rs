//! Filesystem collaborator: directory snapshots and entry materialization.
//!
//! The archive codec only ever sees in-memory [`CpioEntry`] values; this
//! module is where those values meet the real filesystem. Traversal is
//! depth-first with sorted names, so packing the same tree twice produces
//! the same archive bytes. All paths are resolved against an explicit base
//! directory; nothing here touches the process working directory.

use std::fs;
use std::io;
use std::os::unix::fs::{symlink, MetadataExt, PermissionsExt};
use std::path::Path;

use walkdir::WalkDir;

use crate::archive::entry::{CpioEntry, EntryBody};
use crate::error::FormatError;

/// Snapshot the tree under `root` as archive entries, root excluded.
///
/// Entries come out in deterministic depth-first order with parent
/// directories before their contents. Anything that is not a directory,
/// regular file or symlink fails with
/// [`FormatError::UnsupportedEntryType`].
pub fn snapshot_tree(root: &Path) -> Result<Vec<CpioEntry>, FormatError> {
    let mut entries = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name();

    for dirent in walker {
        let dirent = dirent.map_err(io::Error::from)?;
        let meta = dirent.metadata().map_err(io::Error::from)?;
        let name = dirent
            .path()
            .strip_prefix(root)
            .unwrap_or(dirent.path())
            .to_string_lossy()
            .into_owned();

        let file_type = dirent.file_type();
        let body = if file_type.is_dir() {
            EntryBody::Directory
        } else if file_type.is_symlink() {
            let target = fs::read_link(dirent.path())?;
            EntryBody::Symlink(target.to_string_lossy().into_owned())
        } else if file_type.is_file() {
            EntryBody::File(fs::read(dirent.path())?)
        } else {
            return Err(FormatError::UnsupportedEntryType {
                name,
                mode: meta.mode(),
            });
        };

        entries.push(CpioEntry {
            name,
            ino: meta.ino() as u32,
            mode: meta.mode(),
            body,
        });
    }
    Ok(entries)
}

/// Materialize one decoded entry under `base`.
///
/// Parent directories are created as needed; permission bits are applied
/// to everything except symlinks, which do not carry their own.
pub fn materialize_entry(base: &Path, entry: &CpioEntry) -> Result<(), FormatError> {
    let path = base.join(&entry.name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    match &entry.body {
        EntryBody::Directory => {
            if !path.is_dir() {
                fs::create_dir(&path)?;
            }
        }
        EntryBody::File(data) => {
            fs::write(&path, data)?;
        }
        EntryBody::Symlink(target) => {
            symlink(target, &path)?;
        }
    }

    if !entry.is_symlink() {
        fs::set_permissions(&path, fs::Permissions::from_mode(entry.permissions()))?;
    }
    Ok(())
}

/// Unpack decoded entries into `base`, creating it first if needed.
pub fn materialize_tree(base: &Path, entries: &[CpioEntry]) -> Result<(), FormatError> {
    fs::create_dir_all(base)?;
    for entry in entries {
        materialize_entry(base, entry)?;
    }
    Ok(())
}
