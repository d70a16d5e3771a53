// src/commands/validate_license.rs

use super::{AppUpdaterCommand, CommandPhase};
use crate::cancellation::CancellationToken;
use crate::error::{Error, Result};
use crate::remote::LicenseApi;
use crate::status::{OperationStatus, UpdaterStatus, weight};
use std::sync::Arc;
use tracing::{debug, info};

const NAME: &str = "ValidateLicenseCommand";

/// Checks the configured license key and exposes its key secret
pub struct ValidateLicenseCommand<'a> {
    license_api: &'a dyn LicenseApi,
    app_secret: &'a str,
    uses_license_keys: bool,
    license_key: Option<&'a str>,
    phase: CommandPhase,
    status: Arc<OperationStatus>,
    key_secret: Option<String>,
}

impl<'a> ValidateLicenseCommand<'a> {
    pub fn new(
        license_api: &'a dyn LicenseApi,
        app_secret: &'a str,
        uses_license_keys: bool,
        license_key: Option<&'a str>,
    ) -> Self {
        debug!("Creating {}", NAME);
        Self {
            license_api,
            app_secret,
            uses_license_keys,
            license_key,
            phase: CommandPhase::New,
            status: Arc::new(OperationStatus::new(weight::validate_license_weight())),
            key_secret: None,
        }
    }

    /// Secret authorizing the download; `None` when the app does not use keys
    pub fn key_secret(&self) -> Option<&str> {
        self.key_secret.as_deref()
    }
}

impl AppUpdaterCommand for ValidateLicenseCommand<'_> {
    fn prepare(&mut self, status: &UpdaterStatus) {
        self.phase.enter_prepare(NAME);
        status.register_operation(Arc::clone(&self.status));
    }

    fn execute(&mut self, cancel: &CancellationToken) -> Result<()> {
        self.phase.enter_execute(NAME);
        let status = Arc::clone(&self.status);
        status.begin("Validating license...");

        if !self.uses_license_keys {
            debug!("Application does not use license keys, skipping validation");
            status.complete();
            return Ok(());
        }

        cancel.check("validate license")?;

        let key = self
            .license_key
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::LicenseInvalid("no license key configured".to_string()))?;

        let info = self.license_api.key_info(self.app_secret, key)?;
        if info.blocked {
            return Err(Error::LicenseBlocked(key.to_string()));
        }

        info!("License key validated");
        self.key_secret = Some(info.key_secret);
        status.complete();
        Ok(())
    }
}
