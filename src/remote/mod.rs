// src/remote/mod.rs

//! Remote collaborators: license checks and content package downloads
//!
//! Both sources share one layout, rooted at a base URL or directory:
//! - `{base}/{version}/content.package`
//! - `{base}/{version}/content.package.meta` (pack1 packages only)
//! - `{base}/keys/{key}`, a JSON [`KeyInfo`]

mod http;
mod local;

pub use http::HttpRemote;
pub use local::LocalMirror;

use crate::cancellation::CancellationToken;
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const PACKAGE_FILE_NAME: &str = "content.package";
pub const META_FILE_NAME: &str = "content.package.meta";

const CHUNK_SIZE: usize = 64 * 1024;

/// License key state returned by the license service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyInfo {
    pub key_secret: String,
    #[serde(default)]
    pub blocked: bool,
}

/// Resolves license keys
pub trait LicenseApi: Send {
    /// Look up `key` for the application identified by `app_secret`
    ///
    /// Unknown keys fail with [`crate::Error::LicenseInvalid`].
    fn key_info(&self, app_secret: &str, key: &str) -> Result<KeyInfo>;
}

/// What to download and where to put it
#[derive(Debug, Clone)]
pub struct DownloadRequest<'a> {
    pub version_id: i64,
    pub key_secret: Option<&'a str>,
    /// Also fetch the companion pack1 meta file
    pub with_meta: bool,
    pub destination_dir: &'a Path,
}

/// Local copies of a downloaded package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedPackage {
    pub package_path: PathBuf,
    pub meta_path: Option<PathBuf>,
}

/// Fetches content packages to local paths
pub trait ContentDownloader: Send {
    /// Download the package for `request.version_id`
    ///
    /// `on_progress` receives `(bytes_done, bytes_total)` for the package
    /// body; `bytes_total` is 0 when the size is unknown. `cancel` is
    /// checked between chunks.
    fn download(
        &self,
        request: &DownloadRequest<'_>,
        on_progress: &mut dyn FnMut(u64, u64),
        cancel: &CancellationToken,
    ) -> Result<DownloadedPackage>;
}

/// Local paths a package for `version_id` is downloaded to
pub fn local_package_paths(destination_dir: &Path, version_id: i64) -> (PathBuf, PathBuf) {
    let package = destination_dir.join(format!("content-{}.package", version_id));
    let meta = destination_dir.join(format!("content-{}.package.meta", version_id));
    (package, meta)
}

/// Relative remote location of a file belonging to `version_id`
pub(crate) fn version_path(version_id: i64, file_name: &str) -> String {
    format!("{}/{}", version_id, file_name)
}

fn temp_path_for(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

/// Stream `reader` into `dest` through a `.tmp` sibling, renamed on success
///
/// The temporary file is removed again if writing fails or is cancelled.
pub(crate) fn stream_to_file(
    reader: &mut dyn Read,
    dest: &Path,
    total: u64,
    on_progress: &mut dyn FnMut(u64, u64),
    cancel: &CancellationToken,
) -> Result<u64> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = temp_path_for(dest);
    match write_chunks(reader, &temp_path, total, on_progress, cancel) {
        Ok(written) => {
            fs::rename(&temp_path, dest)?;
            Ok(written)
        }
        Err(e) => {
            let _ = fs::remove_file(&temp_path);
            Err(e)
        }
    }
}

fn write_chunks(
    reader: &mut dyn Read,
    path: &Path,
    total: u64,
    on_progress: &mut dyn FnMut(u64, u64),
    cancel: &CancellationToken,
) -> Result<u64> {
    let mut file = File::create(path)?;
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut written: u64 = 0;

    loop {
        cancel.check("download")?;
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        file.write_all(&buffer[..read])?;
        written += read as u64;
        on_progress(written, total);
    }

    file.sync_all()?;
    Ok(written)
}
