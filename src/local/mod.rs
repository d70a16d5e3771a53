// src/local/mod.rs

//! Local install state
//!
//! - [`LocalDirectory`]: the directory content files are installed into
//! - [`LocalMetaData`]: the registry of installed files and the version that
//!   installed each of them

mod metadata;

pub use metadata::SqliteMetaData;

use crate::error::{Error, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Registry of installed files
///
/// The registry is the set of currently installed files; a file name appears
/// at most once. Each mutation is committed atomically on its own, so a crash
/// can never leave a half-registered file.
pub trait LocalMetaData: Send {
    /// Names of every registered file
    fn list_entries(&self) -> Result<Vec<String>>;

    /// Register a file as installed by `version_id`
    ///
    /// Fails with [`Error::DuplicateEntry`] if the name is already registered.
    fn register_entry(&self, file_name: &str, version_id: i64) -> Result<()>;

    /// Remove a file from the registry; removing an absent name is a no-op
    fn remove_entry(&self, file_name: &str) -> Result<()>;

    fn exists(&self, file_name: &str) -> Result<bool>;

    /// Version that installed the file, or [`Error::EntryNotFound`]
    fn version_of(&self, file_name: &str) -> Result<i64>;
}

/// Version shared by every registered entry
///
/// Returns `None` for an empty registry, for entries installed by different
/// versions, and for non-positive ids.
pub fn installed_version_id(metadata: &dyn LocalMetaData) -> Result<Option<i64>> {
    let mut version = None;
    for name in metadata.list_entries()? {
        let entry_version = metadata.version_of(&name)?;
        match version {
            None => version = Some(entry_version),
            Some(v) if v == entry_version => {}
            Some(v) => {
                warn!(
                    "Registry holds files from versions {} and {}, treating as not installed",
                    v, entry_version
                );
                return Ok(None);
            }
        }
    }
    Ok(version.filter(|v| *v > 0))
}

/// Directory content files are installed into
#[derive(Debug, Clone)]
pub struct LocalDirectory {
    path: PathBuf,
}

impl LocalDirectory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the directory exists; safe to call repeatedly
    pub fn prepare_for_writing(&self) -> Result<()> {
        debug!("Preparing {} for writing", self.path.display());
        fs::create_dir_all(&self.path)?;
        Ok(())
    }

    /// Absolute location of a content file inside this directory
    ///
    /// Rejects paths that are empty or would escape the directory.
    pub fn path_for(&self, file_name: &str) -> Result<PathBuf> {
        Ok(self.path.join(relative_content_path(file_name)?))
    }
}

/// Normalize a `/`-separated content path into a relative path
///
/// Leading slashes and `.` components are dropped; `..` is rejected.
pub fn relative_content_path(file_name: &str) -> Result<PathBuf> {
    let mut normalized = PathBuf::new();
    for component in Path::new(file_name.trim_start_matches('/')).components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir => {}
            Component::ParentDir => {
                warn!("Path traversal attempt detected: {}", file_name);
                return Err(Error::InvalidPath(file_name.to_string()));
            }
            Component::Prefix(_) | Component::RootDir => {
                return Err(Error::InvalidPath(file_name.to_string()));
            }
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::InvalidPath(file_name.to_string()));
    }

    Ok(normalized)
}

/// Registry key for a normalized content path: its components joined by `/`
pub fn registry_name(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
