// src/updater/config.rs

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_DATA_DIR: &str = ".updraft";
const METADATA_FILE_NAME: &str = "metadata.db";
const DOWNLOADS_DIR_NAME: &str = "downloads";

/// Update strategy variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Uninstall the previous version and install the full content package
    #[default]
    Content,
    /// Incremental patch on top of the installed version
    Diff,
}

impl StrategyKind {
    pub fn as_str(&self) -> &str {
        match self {
            StrategyKind::Content => "content",
            StrategyKind::Diff => "diff",
        }
    }
}

/// Updater configuration, usually loaded from a JSON file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Application identifier sent with license checks
    pub app_secret: String,
    /// Directory content files are installed into
    pub install_dir: PathBuf,
    /// Registry and download location; defaults to `<install_dir>/.updraft`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub uses_license_keys: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_key: Option<String>,
    /// Password for encrypted zip packages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_password: Option<String>,
    #[serde(default)]
    pub strategy: StrategyKind,
}

impl UpdaterConfig {
    pub fn new(app_secret: impl Into<String>, install_dir: impl Into<PathBuf>) -> Self {
        Self {
            app_secret: app_secret.into(),
            install_dir: install_dir.into(),
            data_dir: None,
            uses_license_keys: false,
            license_key: None,
            package_password: None,
            strategy: StrategyKind::default(),
        }
    }

    /// Load a configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| self.install_dir.join(DEFAULT_DATA_DIR))
    }

    /// Location of the installed file registry
    pub fn metadata_path(&self) -> PathBuf {
        self.data_dir().join(METADATA_FILE_NAME)
    }

    /// Directory downloaded packages are written to
    pub fn download_dir(&self) -> PathBuf {
        self.data_dir().join(DOWNLOADS_DIR_NAME)
    }
}
