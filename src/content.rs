// src/content.rs

//! Version content descriptors
//!
//! A `ContentSummary` is produced by the version metadata resolver and is
//! read-only to the installer: it lists every file of one version, the
//! package compression method and the package byte size.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// One file declared by a content summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFile {
    /// Relative `/`-separated path inside the install directory
    pub path: String,
    /// Uncompressed size in bytes
    pub size: u64,
    /// Hex-encoded SHA-256 of the file content, when the producer supplies one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
}

impl ContentFile {
    pub fn new(path: impl Into<String>, size: u64) -> Self {
        Self {
            path: path.into(),
            size,
            hash: None,
        }
    }
}

/// Manifest describing the installable content of one version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSummary {
    pub files: Vec<ContentFile>,
    /// Raw compression method name; resolved with [`ContentSummary::compression`]
    pub compression_method: String,
    /// Package size in bytes
    pub size: u64,
}

impl ContentSummary {
    /// Load a content summary from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Total uncompressed size of all declared files
    pub fn uncompressed_size(&self) -> u64 {
        self.files.iter().map(|f| f.size).fold(0, u64::saturating_add)
    }

    /// Resolve the declared compression method
    pub fn compression(&self) -> Result<CompressionMethod> {
        self.compression_method.parse()
    }
}

/// Archive formats a content package may use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// Off-the-shelf zip archive, optionally password protected
    Zip,
    /// Sequential pack with an external binary meta descriptor
    Pack1,
}

impl CompressionMethod {
    pub fn as_str(&self) -> &str {
        match self {
            CompressionMethod::Zip => "zip",
            CompressionMethod::Pack1 => "pack1",
        }
    }

    /// Whether the package needs a companion meta file
    pub fn requires_meta(&self) -> bool {
        matches!(self, CompressionMethod::Pack1)
    }
}

impl FromStr for CompressionMethod {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "zip" | "generic" => Ok(CompressionMethod::Zip),
            "pack1" | "sequentialPack" => Ok(CompressionMethod::Pack1),
            _ => Err(Error::UnsupportedCompressionMethod(s.to_string())),
        }
    }
}
