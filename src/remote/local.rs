// src/remote/local.rs

//! Content source backed by a local directory

use super::{
    ContentDownloader, DownloadRequest, DownloadedPackage, KeyInfo, LicenseApi, META_FILE_NAME,
    PACKAGE_FILE_NAME, local_package_paths, stream_to_file, version_path,
};
use crate::cancellation::CancellationToken;
use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Serves keys and packages from a mirror directory
#[derive(Debug, Clone)]
pub struct LocalMirror {
    root: PathBuf,
}

impl LocalMirror {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn copy_file(
        &self,
        remote_path: &str,
        dest_path: &Path,
        on_progress: &mut dyn FnMut(u64, u64),
        cancel: &CancellationToken,
    ) -> Result<u64> {
        let source = self.root.join(remote_path);
        if !source.is_file() {
            return Err(Error::DownloadError(format!(
                "{} not found in mirror",
                source.display()
            )));
        }

        info!("Copying {} to {}", source.display(), dest_path.display());
        let file = File::open(&source)?;
        let total = file.metadata()?.len();
        stream_to_file(&mut BufReader::new(file), dest_path, total, on_progress, cancel)
    }
}

impl LicenseApi for LocalMirror {
    fn key_info(&self, _app_secret: &str, key: &str) -> Result<KeyInfo> {
        if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
            return Err(Error::LicenseInvalid(key.to_string()));
        }

        let path = self.root.join("keys").join(key);
        debug!("Checking license key at {}", path.display());

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::LicenseInvalid(key.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        Ok(serde_json::from_str(&content)?)
    }
}

impl ContentDownloader for LocalMirror {
    fn download(
        &self,
        request: &DownloadRequest<'_>,
        on_progress: &mut dyn FnMut(u64, u64),
        cancel: &CancellationToken,
    ) -> Result<DownloadedPackage> {
        let (package_path, meta_path) =
            local_package_paths(request.destination_dir, request.version_id);

        let meta_path = if request.with_meta {
            self.copy_file(
                &version_path(request.version_id, META_FILE_NAME),
                &meta_path,
                &mut |_, _| {},
                cancel,
            )?;
            Some(meta_path)
        } else {
            None
        };

        self.copy_file(
            &version_path(request.version_id, PACKAGE_FILE_NAME),
            &package_path,
            on_progress,
            cancel,
        )?;

        Ok(DownloadedPackage {
            package_path,
            meta_path,
        })
    }
}
