// src/updater/strategy.rs

use super::{AppUpdaterContext, StrategyKind};
use crate::cancellation::CancellationToken;
use crate::commands::{AppUpdaterCommand, AppUpdaterCommandFactory};
use crate::error::{Error, Result};
use crate::remote::DownloadedPackage;
use std::fs;
use tracing::{debug, info, warn};

/// One complete patch sequence
///
/// `patch` consumes the strategy, so a sequence can run at most once.
pub trait AppUpdaterStrategy {
    fn patch(self: Box<Self>, cancel: &CancellationToken) -> Result<()>;
}

/// Pick the strategy implementation for `kind`
pub fn resolve_strategy<'a>(
    kind: StrategyKind,
    context: &'a AppUpdaterContext,
) -> Result<Box<dyn AppUpdaterStrategy + 'a>> {
    match kind {
        StrategyKind::Content => Ok(Box::new(AppUpdaterContentStrategy::new(context))),
        StrategyKind::Diff => Err(Error::UnsupportedStrategy(kind.as_str().to_string())),
    }
}

/// Full reinstall: validate license, uninstall, download, install
pub struct AppUpdaterContentStrategy<'a> {
    context: &'a AppUpdaterContext,
}

impl<'a> AppUpdaterContentStrategy<'a> {
    pub fn new(context: &'a AppUpdaterContext) -> Self {
        Self { context }
    }
}

impl AppUpdaterStrategy for AppUpdaterContentStrategy<'_> {
    fn patch(self: Box<Self>, cancel: &CancellationToken) -> Result<()> {
        info!("Patching with content strategy");

        let factory = AppUpdaterCommandFactory::new(self.context);
        let latest_version_id = self.context.latest_version_id;
        let status = &self.context.status;

        let mut validate_license = factory.create_validate_license_command();
        validate_license.prepare(status);

        let mut uninstall = factory.create_uninstall_command();
        uninstall.prepare(status);

        let mut download = factory.create_download_content_package_command(latest_version_id);
        download.prepare(status);

        let mut install = factory.create_install_content_command(latest_version_id);
        install.prepare(status);

        validate_license.execute(cancel)?;

        uninstall.execute(cancel)?;

        download.set_key_secret(validate_license.key_secret().map(str::to_string));
        download.execute(cancel)?;
        let package = download
            .into_package()
            .ok_or_else(|| Error::DownloadError("download produced no package".to_string()))?;

        install.set_package(package.clone());
        install.execute(cancel)?;

        remove_download(&package);
        Ok(())
    }
}

/// Delete downloaded files once their content is installed
fn remove_download(package: &DownloadedPackage) {
    let paths = std::iter::once(&package.package_path).chain(package.meta_path.iter());
    for path in paths {
        match fs::remove_file(path) {
            Ok(()) => debug!("Removed download {}", path.display()),
            Err(e) => warn!("Failed to remove download {}: {}", path.display(), e),
        }
    }
}
