//! Turns a directory into an ordered list of upload tasks.
//!
//! Only the immediate entries of the directory are considered. Regular files
//! (symlinks are followed) become tasks; subdirectories and anything else are
//! skipped. Tasks are sorted by file name so repeated runs over an unchanged
//! directory produce the same sequence.

use std::fs;
use std::path::Path;

use log::{debug, info, warn};

use crate::errors::ListingError;
use crate::models::UploadTask;

/// List `directory` and build one task per regular file.
///
/// Each task's destination key is `object_key(key_prefix, file_name)`.
/// An empty directory yields `Ok(vec![])`; a directory that cannot be read
/// yields a [`ListingError`], never an empty list.
pub fn enumerate(directory: &Path, key_prefix: &str) -> Result<Vec<UploadTask>, ListingError> {
    let metadata = fs::metadata(directory)
        .map_err(|e| ListingError::from_io(directory.to_path_buf(), e))?;
    if !metadata.is_dir() {
        return Err(ListingError::NotADirectory(directory.to_path_buf()));
    }

    let entries = fs::read_dir(directory)
        .map_err(|e| ListingError::from_io(directory.to_path_buf(), e))?;

    let mut files = Vec::new();
    let mut skipped = 0usize;

    for entry in entries {
        let entry = entry.map_err(|e| ListingError::from_io(directory.to_path_buf(), e))?;
        let path = entry.path();

        let file_name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(raw) => {
                warn!("Skipping entry with non UTF-8 name: {:?}", raw);
                skipped += 1;
                continue;
            }
        };

        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => files.push(file_name),
            Ok(meta) if meta.is_dir() => {
                debug!("Skipping subdirectory {}", path.display());
                skipped += 1;
            },
            Ok(_) => {
                debug!("Skipping non-regular entry {}", path.display());
                skipped += 1;
            },
            Err(e) => {
                warn!("Skipping unreadable entry {}: {}", path.display(), e);
                skipped += 1;
            }
        }
    }

    files.sort();

    let tasks: Vec<UploadTask> = files
        .into_iter()
        .map(|name| {
            let key = object_key(key_prefix, &name);
            UploadTask::new(directory.join(&name), key)
        })
        .collect();

    info!(
        "Found {} files in {} ({} entries skipped)",
        tasks.len(),
        directory.display(),
        skipped
    );

    Ok(tasks)
}

/// Join a key prefix and a file name into an object key.
///
/// Only the prefix is normalised: `/` and `\` both separate segments, empty
/// and `.` segments are dropped and `..` removes the previous segment. The
/// file name is appended as is apart from `\` becoming `/`, so distinct
/// names always give distinct keys.
///
/// ```
/// use dirpush::enumerate::object_key;
///
/// assert_eq!(object_key("backups", "a.txt"), "backups/a.txt");
/// assert_eq!(object_key("logs\\2024\\", "app.log"), "logs/2024/app.log");
/// assert_eq!(object_key("", "a.txt"), "a.txt");
/// assert_eq!(object_key("backups", "..\\x.txt"), "backups/../x.txt");
/// ```
pub fn object_key(prefix: &str, file_name: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in prefix.split(['/', '\\']) {
        match segment {
            "" | "." => {},
            ".." => {
                segments.pop();
            },
            other => segments.push(other),
        }
    }

    let name = file_name.replace('\\', "/");
    if segments.is_empty() {
        name
    } else {
        format!("{}/{}", segments.join("/"), name)
    }
}
