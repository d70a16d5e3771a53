// src/archive/mod.rs

//! Content package unarchiving
//!
//! Two interchangeable package formats share the [`Unarchiver`] capability:
//! - [`ZipUnarchiver`]: a zip archive, optionally password protected
//! - [`Pack1Unarchiver`]: a sequential pack whose entry layout lives in a
//!   separate binary meta file ([`Pack1Meta`])
//!
//! [`PackageUnarchiver`] is the tagged variant over both, selected from the
//! content summary's compression method.

pub mod pack1;
mod zip_archive;

pub use self::pack1::{Pack1Entry, Pack1EntryKind, Pack1Meta, Pack1Unarchiver, Pack1Writer};
pub use self::zip_archive::ZipUnarchiver;

use crate::cancellation::CancellationToken;
use crate::content::CompressionMethod;
use crate::error::{Error, Result};
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing::warn;

/// Suffix appended to every file extracted from a pack1 package
///
/// Files without an extension are mishandled by some downstream tooling, so
/// pack1 extraction always writes `<name>_`; the installer strips it again.
pub const PACK1_FILE_SUFFIX: &str = "_";

const COPY_BUFFER_SIZE: usize = 64 * 1024;

/// One progress event raised while unarchiving
#[derive(Debug, Clone, Copy)]
pub struct UnarchiveProgress<'a> {
    pub entry_name: &'a str,
    pub is_file: bool,
    /// 1-based index of the current entry
    pub entry: usize,
    pub total: usize,
    /// Completion of the current entry in `[0, 1]`
    pub entry_fraction: f64,
}

impl UnarchiveProgress<'_> {
    /// Overall unarchive progress for this event
    pub fn overall(&self) -> f64 {
        overall_progress(self.entry, self.total, self.entry_fraction)
    }
}

/// Interpolate between the previous and the current entry boundary
///
/// `(max(0, entry - 1) + entry_fraction) / total`, so in-flight progress of
/// one entry never moves the bar backwards. The end of one entry and the
/// start of the next divide the same numerator and compare equal.
pub fn overall_progress(entry: usize, total: usize, entry_fraction: f64) -> f64 {
    if total == 0 {
        return 1.0;
    }
    let fraction = if entry_fraction.is_nan() {
        0.0
    } else {
        entry_fraction.clamp(0.0, 1.0)
    };
    ((entry.saturating_sub(1) as f64 + fraction) / total as f64).min(1.0)
}

/// Capability shared by every package format
pub trait Unarchiver {
    /// Extract every package entry into the destination directory
    ///
    /// Checks `cancel` before each entry and between copied chunks.
    fn unarchive(
        &mut self,
        on_progress: &mut dyn FnMut(&UnarchiveProgress<'_>),
        cancel: &CancellationToken,
    ) -> Result<()>;
}

/// Tagged variant over the supported package formats
pub enum PackageUnarchiver {
    Zip(ZipUnarchiver),
    Pack1(Pack1Unarchiver),
}

impl PackageUnarchiver {
    /// Build the unarchiver for `method`
    ///
    /// Pack1 packages need their parsed meta; passing `None` fails with
    /// [`Error::InvalidPackageMeta`].
    pub fn new(
        method: CompressionMethod,
        package_path: PathBuf,
        pack1_meta: Option<Pack1Meta>,
        destination: PathBuf,
        password: Option<String>,
    ) -> Result<Self> {
        match method {
            CompressionMethod::Zip => Ok(PackageUnarchiver::Zip(ZipUnarchiver::new(
                package_path,
                destination,
                password,
            ))),
            CompressionMethod::Pack1 => {
                let meta = pack1_meta.ok_or_else(|| {
                    Error::InvalidPackageMeta("pack1 package requires a meta file".to_string())
                })?;
                if password.is_some() {
                    warn!(
                        "Package password is set, but pack1 packages are not encrypted; ignoring it for {}",
                        package_path.display()
                    );
                }
                Ok(PackageUnarchiver::Pack1(Pack1Unarchiver::new(
                    package_path,
                    meta,
                    destination,
                    PACK1_FILE_SUFFIX,
                )))
            }
        }
    }

    /// Suffix this variant appends to extracted file names
    pub fn file_suffix(&self) -> &str {
        match self {
            PackageUnarchiver::Zip(_) => "",
            PackageUnarchiver::Pack1(u) => u.suffix(),
        }
    }
}

impl Unarchiver for PackageUnarchiver {
    fn unarchive(
        &mut self,
        on_progress: &mut dyn FnMut(&UnarchiveProgress<'_>),
        cancel: &CancellationToken,
    ) -> Result<()> {
        match self {
            PackageUnarchiver::Zip(u) => u.unarchive(on_progress, cancel),
            PackageUnarchiver::Pack1(u) => u.unarchive(on_progress, cancel),
        }
    }
}

/// Copy `reader` into `writer` in chunks, reporting the fraction of
/// `expected_len` written after every chunk
///
/// Returns the number of bytes copied.
pub(crate) fn copy_with_progress(
    reader: &mut dyn Read,
    writer: &mut dyn Write,
    expected_len: u64,
    cancel: &CancellationToken,
    on_fraction: &mut dyn FnMut(f64),
) -> Result<u64> {
    let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
    let mut copied: u64 = 0;

    loop {
        cancel.check("unarchive")?;

        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };

        writer.write_all(&buffer[..read])?;
        copied += read as u64;

        if expected_len > 0 {
            on_fraction(copied as f64 / expected_len as f64);
        }
    }

    writer.flush()?;
    Ok(copied)
}

#[cfg(unix)]
pub(crate) fn apply_mode(path: &std::path::Path, mode: Option<u32>) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = mode {
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode & 0o7777))?;
    }
    Ok(())
}

#[cfg(not(unix))]
pub(crate) fn apply_mode(_path: &std::path::Path, _mode: Option<u32>) -> Result<()> {
    Ok(())
}
