// src/commands/install_content.rs

//! Content installation
//!
//! Installation runs as a fixed sequence:
//! 1. ready the install directory
//! 2. check preconditions: the package exists and the registry is empty
//! 3. parse the pack1 meta file, for pack1 packages
//! 4. unarchive into a scoped temporary workspace next to the package
//! 5. move every declared file into place, in declaration order, registering
//!    each one only after it has been moved
//!
//! The workspace is removed on every exit path.
//!
//! Directories are not listed in content summaries, so empty directories are
//! neither registered nor guaranteed to exist after installation.

use super::{AppUpdaterCommand, CommandPhase};
use crate::archive::{Pack1Meta, PackageUnarchiver, Unarchiver};
use crate::cancellation::CancellationToken;
use crate::content::{CompressionMethod, ContentFile, ContentSummary};
use crate::error::{Error, Result};
use crate::local::{LocalDirectory, LocalMetaData, registry_name, relative_content_path};
use crate::remote::DownloadedPackage;
use crate::status::{OperationStatus, UpdaterStatus, weight};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info, warn};

const NAME: &str = "InstallContentCommand";

/// Unpacks a downloaded package and installs its files
pub struct InstallContentCommand<'a> {
    version_id: i64,
    content_summary: &'a ContentSummary,
    local_directory: &'a LocalDirectory,
    metadata: &'a dyn LocalMetaData,
    package_password: Option<String>,
    package: Option<DownloadedPackage>,
    phase: CommandPhase,
    unarchive_status: Arc<OperationStatus>,
    copy_files_status: Arc<OperationStatus>,
}

impl<'a> InstallContentCommand<'a> {
    pub fn new(
        version_id: i64,
        content_summary: &'a ContentSummary,
        local_directory: &'a LocalDirectory,
        metadata: &'a dyn LocalMetaData,
        package_password: Option<String>,
    ) -> Self {
        assert!(version_id > 0, "{}: invalid version id {}", NAME, version_id);
        debug!("Creating {} for version {}", NAME, version_id);

        Self {
            version_id,
            content_summary,
            local_directory,
            metadata,
            package_password,
            package: None,
            phase: CommandPhase::New,
            unarchive_status: Arc::new(OperationStatus::new(weight::unarchive_package_weight(
                content_summary,
            ))),
            copy_files_status: Arc::new(OperationStatus::new(
                weight::copy_content_files_weight(content_summary),
            )),
        }
    }

    /// Package (and optional meta file) produced by the download step
    pub fn set_package(&mut self, package: DownloadedPackage) {
        self.package = Some(package);
    }

    pub fn with_package(mut self, package: DownloadedPackage) -> Self {
        self.set_package(package);
        self
    }

    fn load_pack1_meta(&self, package: &DownloadedPackage) -> Result<Pack1Meta> {
        let meta_path = package
            .meta_path
            .as_deref()
            .filter(|path| path.is_file())
            .ok_or_else(|| {
                Error::InvalidPackageMeta(
                    "compression method is pack1, but meta file does not exist".to_string(),
                )
            })?;

        debug!("Parsing package meta file {}", meta_path.display());
        Pack1Meta::parse_from_file(meta_path)
    }

    fn unpack_and_install(
        &self,
        workspace: &Path,
        compression: CompressionMethod,
        pack1_meta: Option<Pack1Meta>,
        package_path: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut unarchiver = PackageUnarchiver::new(
            compression,
            package_path.to_path_buf(),
            pack1_meta,
            workspace.to_path_buf(),
            self.package_password.clone(),
        )?;
        let suffix = unarchiver.file_suffix().to_string();

        debug!("Unarchiving package");
        self.unarchive_status.begin("Unarchiving package...");
        let unarchive_status = Arc::clone(&self.unarchive_status);
        unarchiver.unarchive(
            &mut |progress| unarchive_status.set_progress(progress.overall()),
            cancel,
        )?;
        self.unarchive_status.complete();

        debug!("Copying files");
        self.copy_files_status.begin("Installing package...");
        let files = &self.content_summary.files;
        for (index, file) in files.iter().enumerate() {
            cancel.check("install content")?;
            self.install_file(file, workspace, &suffix)?;
            self.copy_files_status
                .set_progress((index + 1) as f64 / files.len() as f64);
        }
        self.copy_files_status.complete();

        Ok(())
    }

    fn install_file(&self, file: &ContentFile, workspace: &Path, suffix: &str) -> Result<()> {
        let relative = relative_content_path(&file.path)?;
        let name = registry_name(&relative);

        debug!("Installing file {}", name);

        // Two summary paths may normalize to the same file
        if self.metadata.exists(&name)? {
            return Err(Error::DuplicateEntry(name));
        }

        let mut source = workspace.join(&relative).into_os_string();
        source.push(suffix);
        let source = PathBuf::from(source);

        if !source.is_file() {
            return Err(Error::PackageCorrupt(format!(
                "cannot find file {} in content package",
                file.path
            )));
        }

        if let Some(expected) = &file.hash {
            verify_hash(&source, expected)?;
        }

        let destination = self.local_directory.path().join(&relative);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        if fs::symlink_metadata(&destination).is_ok() {
            debug!(
                "Destination file {} already exists, removing it",
                destination.display()
            );
            fs::remove_file(&destination)?;
        }

        move_file(&source, &destination)?;
        self.metadata.register_entry(&name, self.version_id)
    }
}

impl AppUpdaterCommand for InstallContentCommand<'_> {
    fn prepare(&mut self, status: &UpdaterStatus) {
        self.phase.enter_prepare(NAME);
        debug!("Preparing content installation");
        status.register_operation(Arc::clone(&self.copy_files_status));
        status.register_operation(Arc::clone(&self.unarchive_status));
    }

    fn execute(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.phase.enter_execute(NAME);

        let Some(package) = self.package.clone() else {
            panic!("{}: execute called without a package", NAME);
        };

        self.local_directory.prepare_for_writing()?;

        if !package.package_path.is_file() {
            return Err(Error::PackageFileMissing(package.package_path));
        }
        let registered = self.metadata.list_entries()?;
        assert!(
            registered.is_empty(),
            "{}: cannot install content while {} files of a previous version are registered",
            NAME,
            registered.len()
        );

        let compression = self.content_summary.compression()?;
        let pack1_meta = if compression.requires_meta() {
            Some(self.load_pack1_meta(&package)?)
        } else {
            None
        };

        info!(
            "Installing version {} ({} files, {})",
            self.version_id,
            self.content_summary.files.len(),
            compression.as_str()
        );

        let workspace = create_workspace(&package.package_path)?;
        debug!("Unpacking into {}", workspace.path().display());

        let result = self.unpack_and_install(
            workspace.path(),
            compression,
            pack1_meta,
            &package.package_path,
            cancel,
        );

        let workspace_path = workspace.path().to_path_buf();
        if let Err(e) = workspace.close() {
            warn!(
                "Failed to remove workspace {}: {}",
                workspace_path.display(),
                e
            );
        }

        if result.is_ok() {
            info!("Installed version {}", self.version_id);
        }
        result
    }
}

/// Uniquely named temporary directory beside the package
fn create_workspace(package_path: &Path) -> Result<TempDir> {
    let parent = package_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let package_name = package_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "package".to_string());

    let workspace = tempfile::Builder::new()
        .prefix(&format!("{}.temp_unpack_", package_name))
        .tempdir_in(parent)?;
    Ok(workspace)
}

fn verify_hash(path: &Path, expected: &str) -> Result<()> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    let actual = format!("{:x}", hasher.finalize());

    if !actual.eq_ignore_ascii_case(expected) {
        return Err(Error::ChecksumMismatch {
            expected: expected.to_string(),
            actual,
        });
    }
    Ok(())
}

/// Move `source` to `destination`, copying across filesystems
fn move_file(source: &Path, destination: &Path) -> Result<()> {
    match fs::rename(source, destination) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            debug!(
                "{} is on another filesystem, copying instead",
                destination.display()
            );
            fs::copy(source, destination)?;
            File::open(destination)?.sync_all()?;
            fs::remove_file(source)?;
        }
        Err(e) => return Err(e.into()),
    }
    sync_parent(destination)
}

#[cfg(unix)]
fn sync_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        File::open(parent)?.sync_all()?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) -> Result<()> {
    Ok(())
}
