// src/archive/zip_archive.rs

//! Zip package support

use super::{UnarchiveProgress, Unarchiver, apply_mode, copy_with_progress};
use crate::cancellation::CancellationToken;
use crate::error::{Error, Result};
use ::zip::ZipArchive;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::PathBuf;
use tracing::debug;

/// Extracts a zip package, optionally decrypting entries with a password
pub struct ZipUnarchiver {
    package_path: PathBuf,
    destination: PathBuf,
    password: Option<String>,
}

impl ZipUnarchiver {
    pub fn new(package_path: PathBuf, destination: PathBuf, password: Option<String>) -> Self {
        Self {
            package_path,
            destination,
            password,
        }
    }
}

impl Unarchiver for ZipUnarchiver {
    fn unarchive(
        &mut self,
        on_progress: &mut dyn FnMut(&UnarchiveProgress<'_>),
        cancel: &CancellationToken,
    ) -> Result<()> {
        debug!(
            "Unarchiving zip {} into {}",
            self.package_path.display(),
            self.destination.display()
        );

        let file = File::open(&self.package_path)?;
        let mut archive = ZipArchive::new(BufReader::new(file))?;
        let total = archive.len();

        for index in 0..total {
            cancel.check("unarchive")?;

            let mut entry = match self.password.as_deref() {
                Some(password) => archive.by_index_decrypt(index, password.as_bytes())?,
                None => archive.by_index(index)?,
            };

            let name = entry.name().to_string();
            let relative = entry.enclosed_name().ok_or_else(|| {
                Error::PackageCorrupt(format!("zip entry {} escapes the package root", name))
            })?;
            let target = self.destination.join(relative);
            let is_file = !entry.is_dir();

            let mut report = |entry_fraction: f64| {
                on_progress(&UnarchiveProgress {
                    entry_name: &name,
                    is_file,
                    entry: index + 1,
                    total,
                    entry_fraction,
                })
            };
            report(0.0);

            if is_file {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                let size = entry.size();
                let mut output = File::create(&target)?;
                copy_with_progress(&mut entry, &mut output, size, cancel, &mut report)?;
                drop(output);
                apply_mode(&target, entry.unix_mode())?;
            } else {
                fs::create_dir_all(&target)?;
            }

            report(1.0);
        }

        debug!("Extracted {} zip entries", total);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::zip::ZipWriter;
    use ::zip::write::SimpleFileOptions;
    use std::io::Write;
    use std::path::Path;

    fn write_zip(path: &Path, files: &[(&str, &[u8])]) {
        let mut writer = ZipWriter::new(File::create(path).unwrap());
        for (name, data) in files {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_unarchive_extracts_files_and_reports_progress() {
        let temp_dir = tempfile::tempdir().unwrap();
        let package = temp_dir.path().join("content.zip");
        let out = temp_dir.path().join("out");
        write_zip(
            &package,
            &[("bin/game", b"binary"), ("data/a.txt", b"alpha"), ("readme", b"hi")],
        );

        let mut unarchiver = ZipUnarchiver::new(package, out.clone(), None);
        let mut events = Vec::new();
        unarchiver
            .unarchive(
                &mut |p| events.push((p.entry_name.to_string(), p.entry, p.total, p.overall())),
                &CancellationToken::new(),
            )
            .unwrap();

        assert_eq!(fs::read(out.join("bin/game")).unwrap(), b"binary");
        assert_eq!(fs::read(out.join("data/a.txt")).unwrap(), b"alpha");
        assert_eq!(fs::read(out.join("readme")).unwrap(), b"hi");

        assert!(events.iter().all(|(_, _, total, _)| *total == 3));
        assert!(events.windows(2).all(|w| w[0].3 <= w[1].3));
        assert_eq!(events.last().unwrap().1, 3);
        assert!((events.last().unwrap().3 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_unarchive_cancelled_before_first_entry() {
        let temp_dir = tempfile::tempdir().unwrap();
        let package = temp_dir.path().join("content.zip");
        let out = temp_dir.path().join("out");
        write_zip(&package, &[("a.txt", b"alpha")]);

        let token = CancellationToken::new();
        token.cancel();

        let err = ZipUnarchiver::new(package, out.clone(), None)
            .unarchive(&mut |_| {}, &token)
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(!out.join("a.txt").exists());
    }

    #[test]
    fn test_unarchive_rejects_non_zip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let package = temp_dir.path().join("content.zip");
        fs::write(&package, b"definitely not a zip").unwrap();

        let err = ZipUnarchiver::new(package, temp_dir.path().join("out"), None)
            .unarchive(&mut |_| {}, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::Archive(_)));
    }
}
