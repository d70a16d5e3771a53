// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Core error types for Updraft
#[derive(Error, Debug)]
pub enum Error {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors raised by the zip reader
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Database initialization error
    #[error("Failed to initialize database: {0}")]
    InitError(String),

    /// Database not found
    #[error("Database not found at path: {0}")]
    DatabaseNotFound(String),

    /// Download or remote request failure
    #[error("Download failed: {0}")]
    DownloadError(String),

    /// Content hash did not match the expected value
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Content summary names a compression method we cannot unpack
    #[error("Unsupported compression method: {0}")]
    UnsupportedCompressionMethod(String),

    /// Pack1 meta file is missing or malformed
    #[error("Invalid package meta: {0}")]
    InvalidPackageMeta(String),

    /// Downloaded package file does not exist
    #[error("Package file not found: {}", .0.display())]
    PackageFileMissing(PathBuf),

    /// Package does not contain what the content summary declares
    #[error("Package is corrupt: {0}")]
    PackageCorrupt(String),

    /// License key rejected by the remote check
    #[error("License key is invalid: {0}")]
    LicenseInvalid(String),

    /// License key has been blocked
    #[error("License key is blocked: {0}")]
    LicenseBlocked(String),

    /// File name already registered in the metadata registry
    #[error("Entry already registered: {0}")]
    DuplicateEntry(String),

    /// File name not present in the metadata registry
    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    /// Content path escapes the install directory or is empty
    #[error("Invalid content path: {0}")]
    InvalidPath(String),

    /// Update strategy variant without an implementation
    #[error("Unsupported update strategy: {0}")]
    UnsupportedStrategy(String),

    /// Operation was cancelled through its cancellation token
    #[error("Operation cancelled: {0}")]
    Cancelled(String),
}

/// Stable classification of an [`Error`], suitable for presentation layers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Cancelled,
    License,
    Package,
    Registry,
    Network,
    Io,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::License => "license",
            ErrorKind::Package => "package",
            ErrorKind::Registry => "registry",
            ErrorKind::Network => "network",
            ErrorKind::Io => "io",
            ErrorKind::Internal => "internal",
        }
    }
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Cancelled(_) => ErrorKind::Cancelled,
            Error::LicenseInvalid(_) | Error::LicenseBlocked(_) => ErrorKind::License,
            Error::Archive(_)
            | Error::ChecksumMismatch { .. }
            | Error::UnsupportedCompressionMethod(_)
            | Error::InvalidPackageMeta(_)
            | Error::PackageFileMissing(_)
            | Error::PackageCorrupt(_)
            | Error::InvalidPath(_) => ErrorKind::Package,
            Error::Database(_)
            | Error::InitError(_)
            | Error::DatabaseNotFound(_)
            | Error::DuplicateEntry(_)
            | Error::EntryNotFound(_) => ErrorKind::Registry,
            Error::DownloadError(_) => ErrorKind::Network,
            Error::Io(_) => ErrorKind::Io,
            Error::Json(_) | Error::UnsupportedStrategy(_) => ErrorKind::Internal,
        }
    }

    /// True when the operation stopped because cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled(_))
    }
}

/// Result type alias using Updraft's Error type
pub type Result<T> = std::result::Result<T, Error>;
