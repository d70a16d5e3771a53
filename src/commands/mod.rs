// src/commands/mod.rs

//! Update pipeline commands
//!
//! Every command is a single, irrepeatable unit of work with two phases:
//! - `prepare` registers the command's weighted operations with the shared
//!   [`UpdaterStatus`]; it performs no I/O
//! - `execute` does the work, checking the cancellation token at every
//!   iteration boundary
//!
//! Calling a phase twice, or executing before preparing, is a programming
//! error and panics.

mod download;
mod install_content;
mod uninstall;
mod validate_license;

pub use download::DownloadContentPackageCommand;
pub use install_content::InstallContentCommand;
pub use uninstall::UninstallCommand;
pub use validate_license::ValidateLicenseCommand;

use crate::cancellation::CancellationToken;
use crate::error::Result;
use crate::status::UpdaterStatus;
use crate::updater::AppUpdaterContext;

/// Two-phase contract shared by all pipeline commands
pub trait AppUpdaterCommand {
    /// Register weighted operations with `status`
    fn prepare(&mut self, status: &UpdaterStatus);

    /// Perform the operation, blocking the calling thread
    fn execute(&mut self, cancel: &CancellationToken) -> Result<()>;
}

/// Lifecycle position of a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommandPhase {
    #[default]
    New,
    Prepared,
    Executed,
}

impl CommandPhase {
    /// Move from `New` to `Prepared`, panicking on any other state
    pub fn enter_prepare(&mut self, command: &str) {
        assert!(
            *self == CommandPhase::New,
            "{}: prepare called twice",
            command
        );
        *self = CommandPhase::Prepared;
    }

    /// Move from `Prepared` to `Executed`, panicking on any other state
    pub fn enter_execute(&mut self, command: &str) {
        assert!(
            *self != CommandPhase::Executed,
            "{}: execute called twice",
            command
        );
        assert!(
            *self == CommandPhase::Prepared,
            "{}: execute called before prepare",
            command
        );
        *self = CommandPhase::Executed;
    }
}

/// Builds pipeline commands from a shared context
pub struct AppUpdaterCommandFactory<'a> {
    context: &'a AppUpdaterContext,
}

impl<'a> AppUpdaterCommandFactory<'a> {
    pub fn new(context: &'a AppUpdaterContext) -> Self {
        Self { context }
    }

    pub fn create_validate_license_command(&self) -> ValidateLicenseCommand<'a> {
        let config = &self.context.config;
        ValidateLicenseCommand::new(
            &*self.context.license_api,
            &config.app_secret,
            config.uses_license_keys,
            config.license_key.as_deref(),
        )
    }

    pub fn create_uninstall_command(&self) -> UninstallCommand<'a> {
        UninstallCommand::new(&self.context.local_directory, &*self.context.metadata)
    }

    pub fn create_download_content_package_command(
        &self,
        version_id: i64,
    ) -> DownloadContentPackageCommand<'a> {
        DownloadContentPackageCommand::new(
            version_id,
            &self.context.content_summary,
            &*self.context.downloader,
            self.context.config.download_dir(),
        )
    }

    pub fn create_install_content_command(&self, version_id: i64) -> InstallContentCommand<'a> {
        InstallContentCommand::new(
            version_id,
            &self.context.content_summary,
            &self.context.local_directory,
            &*self.context.metadata,
            self.context.config.package_password.clone(),
        )
    }
}
