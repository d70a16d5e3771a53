// src/commands/download.rs

use super::{AppUpdaterCommand, CommandPhase};
use crate::cancellation::CancellationToken;
use crate::content::ContentSummary;
use crate::error::Result;
use crate::remote::{ContentDownloader, DownloadRequest, DownloadedPackage};
use crate::status::{OperationStatus, UpdaterStatus, weight};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

const NAME: &str = "DownloadContentPackageCommand";

/// Downloads the content package of one version, plus its pack1 meta file
/// when the package needs one
pub struct DownloadContentPackageCommand<'a> {
    version_id: i64,
    content_summary: &'a ContentSummary,
    downloader: &'a dyn ContentDownloader,
    destination_dir: PathBuf,
    key_secret: Option<String>,
    phase: CommandPhase,
    status: Arc<OperationStatus>,
    package: Option<DownloadedPackage>,
}

impl<'a> DownloadContentPackageCommand<'a> {
    pub fn new(
        version_id: i64,
        content_summary: &'a ContentSummary,
        downloader: &'a dyn ContentDownloader,
        destination_dir: PathBuf,
    ) -> Self {
        assert!(version_id > 0, "{}: invalid version id {}", NAME, version_id);
        debug!("Creating {} for version {}", NAME, version_id);

        Self {
            version_id,
            content_summary,
            downloader,
            destination_dir,
            key_secret: None,
            phase: CommandPhase::New,
            status: Arc::new(OperationStatus::new(weight::download_package_weight(
                content_summary,
            ))),
            package: None,
        }
    }

    /// Authorization secret obtained from license validation
    pub fn set_key_secret(&mut self, key_secret: Option<String>) {
        self.key_secret = key_secret;
    }

    /// Downloaded package paths, available after a successful execute
    pub fn package(&self) -> Option<&DownloadedPackage> {
        self.package.as_ref()
    }

    pub fn into_package(self) -> Option<DownloadedPackage> {
        self.package
    }
}

impl AppUpdaterCommand for DownloadContentPackageCommand<'_> {
    fn prepare(&mut self, status: &UpdaterStatus) {
        self.phase.enter_prepare(NAME);
        status.register_operation(Arc::clone(&self.status));
    }

    fn execute(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.phase.enter_execute(NAME);
        self.status.begin("Downloading package...");

        let compression = self.content_summary.compression()?;
        let request = DownloadRequest {
            version_id: self.version_id,
            key_secret: self.key_secret.as_deref(),
            with_meta: compression.requires_meta(),
            destination_dir: &self.destination_dir,
        };

        let status = Arc::clone(&self.status);
        let package = self.downloader.download(
            &request,
            &mut |done, total| {
                if total > 0 {
                    status.set_progress(done as f64 / total as f64);
                }
            },
            cancel,
        )?;

        info!("Downloaded package to {}", package.package_path.display());
        self.package = Some(package);
        self.status.complete();
        Ok(())
    }
}
