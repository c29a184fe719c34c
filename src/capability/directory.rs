//! Directory access: one picked directory and the named entries inside it

use std::io;
use std::path::{Path, PathBuf};
use serde::Serialize;
use super::{CapabilityError, CapabilityResult};

/// Directory created by [`LocalDirectory::create_directory`] when no name is given
pub const DEFAULT_SUBDIRECTORY: &str = "files";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedEntry {
    pub name: String,
    pub kind: EntryKind,
    /// Milliseconds since the Unix epoch, when the platform reports it
    pub last_modified: Option<i64>,
}

/// Handle on a directory the user picked. Entry names are single path
/// components; anything that would escape the directory is rejected.
#[derive(Debug, Clone)]
pub struct LocalDirectory {
    root: PathBuf,
}

impl LocalDirectory {
    pub fn open(path: impl Into<PathBuf>) -> CapabilityResult<Self> {
        let root = path.into();
        let metadata = std::fs::metadata(&root).map_err(classify)?;
        if !metadata.is_dir() {
            return Err(CapabilityError::Unavailable(format!(
                "{} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Create (or reuse) a subdirectory and return a handle on it
    pub fn create_directory(&self, name: Option<&str>) -> CapabilityResult<LocalDirectory> {
        let path = self.entry_path(name.unwrap_or(DEFAULT_SUBDIRECTORY))?;
        std::fs::create_dir_all(&path).map_err(classify)?;
        Ok(Self { root: path })
    }

    /// Create or overwrite a file
    pub fn create_file(&self, name: &str, contents: &str) -> CapabilityResult<()> {
        let path = self.entry_path(name)?;
        std::fs::write(path, contents).map_err(classify)
    }

    pub fn read_file(&self, name: &str) -> CapabilityResult<String> {
        let path = self.entry_path(name)?;
        std::fs::read_to_string(path).map_err(classify)
    }

    /// Rewrite a file, renaming it when `new_name` differs.
    /// The new entry is written before the old one is removed.
    pub fn update_file(&self, name: &str, new_name: &str, contents: &str) -> CapabilityResult<()> {
        self.create_file(new_name, contents)?;
        if name != new_name {
            self.delete_file(name)?;
        }
        Ok(())
    }

    /// Entries sorted by name
    pub fn list(&self) -> CapabilityResult<Vec<ListedEntry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&self.root).map_err(classify)? {
            let entry = entry.map_err(classify)?;
            let metadata = entry.metadata().map_err(classify)?;
            let kind = if metadata.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            };
            let last_modified = metadata
                .modified()
                .ok()
                .map(|time| chrono::DateTime::<chrono::Utc>::from(time).timestamp_millis());

            entries.push(ListedEntry {
                name: entry.file_name().to_string_lossy().to_string(),
                kind,
                last_modified,
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Remove a file or an empty directory
    pub fn delete_file(&self, name: &str) -> CapabilityResult<()> {
        let path = self.entry_path(name)?;
        let metadata = std::fs::symlink_metadata(&path).map_err(classify)?;
        if metadata.is_dir() {
            std::fs::remove_dir(&path).map_err(classify)
        } else {
            std::fs::remove_file(&path).map_err(classify)
        }
    }

    /// Remove every entry, including subdirectories and their contents
    pub fn clear(&self) -> CapabilityResult<()> {
        for entry in std::fs::read_dir(&self.root).map_err(classify)? {
            let entry = entry.map_err(classify)?;
            let path = entry.path();
            if entry.file_type().map_err(classify)?.is_dir() {
                std::fs::remove_dir_all(&path).map_err(classify)?;
            } else {
                std::fs::remove_file(&path).map_err(classify)?;
            }
        }
        Ok(())
    }

    fn entry_path(&self, name: &str) -> CapabilityResult<PathBuf> {
        let invalid = name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
            || name.contains('\0');
        if invalid {
            return Err(CapabilityError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

fn classify(err: io::Error) -> CapabilityError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => CapabilityError::PermissionDenied(err.to_string()),
        _ => CapabilityError::Io(err),
    }
}
