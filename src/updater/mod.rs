// src/updater/mod.rs

//! Update orchestration
//!
//! [`AppUpdater`] checks whether the installed version is current and, if
//! not, runs the configured [`AppUpdaterStrategy`] against a shared
//! [`AppUpdaterContext`].

mod config;
mod context;
mod strategy;

pub use config::{StrategyKind, UpdaterConfig};
pub use context::{AppUpdaterContext, remote_source};
pub use strategy::{AppUpdaterContentStrategy, AppUpdaterStrategy, resolve_strategy};

use crate::cancellation::CancellationToken;
use crate::error::Result;
use crate::local::installed_version_id;
use crate::status::UpdaterStatus;
use tracing::info;

/// Result of an update run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The installed version already matches the latest one
    UpToDate { version_id: i64 },
    /// The latest version was installed
    Updated { version_id: i64 },
}

/// Entry point for updating an installed application
pub struct AppUpdater {
    context: AppUpdaterContext,
}

impl AppUpdater {
    pub fn new(context: AppUpdaterContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &AppUpdaterContext {
        &self.context
    }

    /// Shared progress aggregate; clones observe the same operations
    pub fn status(&self) -> UpdaterStatus {
        self.context.status.clone()
    }

    pub fn into_context(self) -> AppUpdaterContext {
        self.context
    }

    /// Bring the install directory to the latest version
    ///
    /// May be called again after a failure; each run starts with a cleared
    /// [`UpdaterStatus`].
    pub fn update(&self, cancel: &CancellationToken) -> Result<UpdateOutcome> {
        let latest = self.context.latest_version_id;
        let installed = installed_version_id(&*self.context.metadata)?;

        if installed == Some(latest) {
            info!("Version {} is already installed", latest);
            return Ok(UpdateOutcome::UpToDate { version_id: latest });
        }

        match installed {
            Some(version) => info!("Updating from version {} to {}", version, latest),
            None => info!("Installing version {}", latest),
        }

        // Each run reports progress over its own operations only
        self.context.status.clear();

        let strategy = resolve_strategy(self.context.config.strategy, &self.context)?;
        strategy.patch(cancel)?;

        Ok(UpdateOutcome::Updated { version_id: latest })
    }
}
