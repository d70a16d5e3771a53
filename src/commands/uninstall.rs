// src/commands/uninstall.rs

use super::{AppUpdaterCommand, CommandPhase};
use crate::cancellation::CancellationToken;
use crate::error::Result;
use crate::local::{LocalDirectory, LocalMetaData};
use crate::status::{OperationStatus, UpdaterStatus, weight};
use std::fs;
use std::io;
use std::sync::Arc;
use tracing::{debug, info};

const NAME: &str = "UninstallCommand";

/// Removes every registered file and its registry entry
///
/// Files already missing from disk are skipped. Each file's registry entry is
/// removed right after the file itself, so the registry never lists a file
/// that has been deleted.
pub struct UninstallCommand<'a> {
    local_directory: &'a LocalDirectory,
    metadata: &'a dyn LocalMetaData,
    phase: CommandPhase,
    status: Arc<OperationStatus>,
}

impl<'a> UninstallCommand<'a> {
    pub fn new(local_directory: &'a LocalDirectory, metadata: &'a dyn LocalMetaData) -> Self {
        debug!("Creating {}", NAME);
        Self {
            local_directory,
            metadata,
            phase: CommandPhase::New,
            status: Arc::new(OperationStatus::new(weight::uninstall_weight())),
        }
    }
}

impl AppUpdaterCommand for UninstallCommand<'_> {
    fn prepare(&mut self, status: &UpdaterStatus) {
        self.phase.enter_prepare(NAME);
        status.register_operation(Arc::clone(&self.status));
    }

    fn execute(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.phase.enter_execute(NAME);
        self.status.begin("Uninstalling previous version...");

        let entries = self.metadata.list_entries()?;
        let total = entries.len();
        info!("Uninstalling {} files", total);

        for (index, name) in entries.iter().enumerate() {
            cancel.check("uninstall")?;

            let path = self.local_directory.path_for(name)?;
            match fs::remove_file(&path) {
                Ok(()) => debug!("Removed {}", path.display()),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!("{} already removed", path.display());
                }
                Err(e) => return Err(e.into()),
            }
            self.metadata.remove_entry(name)?;

            self.status.set_progress((index + 1) as f64 / total as f64);
        }

        self.status.complete();
        Ok(())
    }
}
