// src/updater/context.rs

use super::UpdaterConfig;
use crate::content::ContentSummary;
use crate::error::{Error, Result};
use crate::local::{LocalDirectory, LocalMetaData, SqliteMetaData};
use crate::remote::{ContentDownloader, HttpRemote, LicenseApi, LocalMirror};
use crate::status::UpdaterStatus;
use std::path::Path;
use tracing::debug;

/// Everything one update run works with
///
/// Commands borrow the context; nothing here is global.
pub struct AppUpdaterContext {
    pub config: UpdaterConfig,
    pub local_directory: LocalDirectory,
    pub metadata: Box<dyn LocalMetaData>,
    pub license_api: Box<dyn LicenseApi>,
    pub downloader: Box<dyn ContentDownloader>,
    pub content_summary: ContentSummary,
    pub latest_version_id: i64,
    pub status: UpdaterStatus,
}

impl AppUpdaterContext {
    pub fn new(
        config: UpdaterConfig,
        metadata: Box<dyn LocalMetaData>,
        license_api: Box<dyn LicenseApi>,
        downloader: Box<dyn ContentDownloader>,
        content_summary: ContentSummary,
        latest_version_id: i64,
    ) -> Self {
        assert!(
            latest_version_id > 0,
            "invalid latest version id {}",
            latest_version_id
        );

        let local_directory = LocalDirectory::new(&config.install_dir);
        Self {
            config,
            local_directory,
            metadata,
            license_api,
            downloader,
            content_summary,
            latest_version_id,
            status: UpdaterStatus::new(),
        }
    }

    /// Build a context with the SQLite registry from `config` and a remote
    /// source: an `http(s)://` base URL or a local mirror directory
    pub fn open(
        config: UpdaterConfig,
        source: &str,
        content_summary: ContentSummary,
        latest_version_id: i64,
    ) -> Result<Self> {
        if latest_version_id <= 0 {
            return Err(Error::InitError(format!(
                "invalid version id {}",
                latest_version_id
            )));
        }

        let metadata = SqliteMetaData::open(&config.metadata_path())?;
        let (license_api, downloader) = remote_source(source)?;

        Ok(Self::new(
            config,
            Box::new(metadata),
            license_api,
            downloader,
            content_summary,
            latest_version_id,
        ))
    }
}

type RemotePair = (Box<dyn LicenseApi>, Box<dyn ContentDownloader>);

/// Resolve a source string into license and download collaborators
pub fn remote_source(source: &str) -> Result<RemotePair> {
    if source.starts_with("http://") || source.starts_with("https://") {
        debug!("Using HTTP source {}", source);
        let remote = HttpRemote::new(source)?;
        Ok((Box::new(remote.clone()), Box::new(remote)))
    } else {
        let root = Path::new(source);
        if !root.is_dir() {
            return Err(Error::InitError(format!(
                "mirror directory {} does not exist",
                root.display()
            )));
        }
        debug!("Using local mirror {}", root.display());
        let mirror = LocalMirror::new(root);
        Ok((Box::new(mirror.clone()), Box::new(mirror)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> ContentSummary {
        ContentSummary {
            files: vec![],
            compression_method: "zip".to_string(),
            size: 0,
        }
    }

    #[test]
    fn test_open_creates_registry() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = UpdaterConfig::new("app", temp_dir.path().join("install"));
        let mirror = tempfile::tempdir().unwrap();

        let context = AppUpdaterContext::open(
            config.clone(),
            mirror.path().to_str().unwrap(),
            summary(),
            3,
        )
        .unwrap();

        assert!(config.metadata_path().exists());
        assert_eq!(context.local_directory.path(), config.install_dir.as_path());
        assert!(context.metadata.list_entries().unwrap().is_empty());
    }

    #[test]
    fn test_remote_source_selection() {
        assert!(remote_source("https://cdn.example.com/app").is_ok());
        assert!(matches!(
            remote_source("/definitely/not/a/mirror"),
            Err(Error::InitError(_))
        ));
    }

    #[test]
    fn test_open_rejects_invalid_version() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = UpdaterConfig::new("app", temp_dir.path());
        let result = AppUpdaterContext::open(config, "https://example.com", summary(), 0);
        assert!(matches!(result, Err(Error::InitError(_))));
    }
}
