// src/archive/pack1.rs

//! Pack1 sequential package format
//!
//! A pack1 package is a flat concatenation of entry payloads. The entry
//! layout is not stored in the package itself but in a companion meta file:
//!
//! ```text
//! header:  "PK1M" | u16 version | u16 flags | u32 entry count
//! entry:   u8 kind | u32 mode | u64 offset | u64 size | u64 uncompressed size
//!          | u16 name length | name (UTF-8, '/'-separated, relative)
//! ```
//!
//! All integers are little-endian. Flag bit 0 marks gzip-compressed payloads.

use super::{UnarchiveProgress, Unarchiver, apply_mode, copy_with_progress};
use crate::cancellation::CancellationToken;
use crate::error::{Error, Result};
use crate::local::relative_content_path;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const PACK1_MAGIC: &[u8; 4] = b"PK1M";
pub const PACK1_VERSION: u16 = 1;

const FLAG_GZIP: u16 = 0x0001;
const KNOWN_FLAGS: u16 = FLAG_GZIP;

/// Kind of a packed entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pack1EntryKind {
    File,
    Directory,
}

impl Pack1EntryKind {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Pack1EntryKind::File),
            1 => Some(Pack1EntryKind::Directory),
            _ => None,
        }
    }

    fn as_u8(&self) -> u8 {
        match self {
            Pack1EntryKind::File => 0,
            Pack1EntryKind::Directory => 1,
        }
    }
}

/// One entry of the meta table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pack1Entry {
    pub name: String,
    pub kind: Pack1EntryKind,
    pub mode: u32,
    /// Byte offset of the payload inside the package
    pub offset: u64,
    /// Payload length as stored in the package
    pub size: u64,
    pub uncompressed_size: u64,
}

/// Parsed pack1 meta descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pack1Meta {
    pub version: u16,
    pub gzip: bool,
    pub entries: Vec<Pack1Entry>,
}

impl Default for Pack1Meta {
    fn default() -> Self {
        Self {
            version: PACK1_VERSION,
            gzip: false,
            entries: Vec::new(),
        }
    }
}

/// Bounds-checked little-endian reader over the meta bytes
struct MetaReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> MetaReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                Error::InvalidPackageMeta(format!("truncated meta while reading {}", what))
            })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.take(1, what)?[0])
    }

    fn read_u16(&mut self, what: &str) -> Result<u16> {
        let mut buf = [0u8; 2];
        buf.copy_from_slice(self.take(2, what)?);
        Ok(u16::from_le_bytes(buf))
    }

    fn read_u32(&mut self, what: &str) -> Result<u32> {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(self.take(4, what)?);
        Ok(u32::from_le_bytes(buf))
    }

    fn read_u64(&mut self, what: &str) -> Result<u64> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8, what)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }
}

impl Pack1Meta {
    /// Load and parse the meta file at `path`
    pub fn parse_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::InvalidPackageMeta(format!(
                "meta file not found: {}",
                path.display()
            )));
        }
        let bytes = fs::read(path)?;
        Self::parse(&bytes)
    }

    /// Parse meta bytes
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = MetaReader::new(bytes);

        let magic = reader.take(PACK1_MAGIC.len(), "magic")?;
        if magic != PACK1_MAGIC {
            return Err(Error::InvalidPackageMeta("bad magic".to_string()));
        }

        let version = reader.read_u16("version")?;
        if version != PACK1_VERSION {
            return Err(Error::InvalidPackageMeta(format!(
                "unsupported meta version {}",
                version
            )));
        }

        let flags = reader.read_u16("flags")?;
        if flags & !KNOWN_FLAGS != 0 {
            return Err(Error::InvalidPackageMeta(format!(
                "unknown flags {:#06x}",
                flags
            )));
        }

        let count = reader.read_u32("entry count")? as usize;
        let mut entries = Vec::with_capacity(count.min(reader.remaining()));

        for index in 0..count {
            let kind_byte = reader.read_u8("entry kind")?;
            let kind = Pack1EntryKind::from_u8(kind_byte).ok_or_else(|| {
                Error::InvalidPackageMeta(format!(
                    "entry {} has unknown kind {}",
                    index, kind_byte
                ))
            })?;
            let mode = reader.read_u32("entry mode")?;
            let offset = reader.read_u64("entry offset")?;
            let size = reader.read_u64("entry size")?;
            let uncompressed_size = reader.read_u64("entry uncompressed size")?;
            let name_len = reader.read_u16("entry name length")? as usize;
            let name = std::str::from_utf8(reader.take(name_len, "entry name")?)
                .map_err(|_| {
                    Error::InvalidPackageMeta(format!("entry {} name is not UTF-8", index))
                })?
                .to_string();

            validate_entry_name(&name)?;

            entries.push(Pack1Entry {
                name,
                kind,
                mode,
                offset,
                size,
                uncompressed_size,
            });
        }

        if reader.remaining() != 0 {
            return Err(Error::InvalidPackageMeta(format!(
                "{} trailing bytes after entry table",
                reader.remaining()
            )));
        }

        debug!("Parsed pack1 meta with {} entries", entries.len());

        Ok(Self {
            version,
            gzip: flags & FLAG_GZIP != 0,
            entries,
        })
    }

    /// Encode this meta in the v1 binary layout
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(PACK1_MAGIC);
        out.extend_from_slice(&self.version.to_le_bytes());
        let flags = if self.gzip { FLAG_GZIP } else { 0 };
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());

        for entry in &self.entries {
            out.push(entry.kind.as_u8());
            out.extend_from_slice(&entry.mode.to_le_bytes());
            out.extend_from_slice(&entry.offset.to_le_bytes());
            out.extend_from_slice(&entry.size.to_le_bytes());
            out.extend_from_slice(&entry.uncompressed_size.to_le_bytes());
            out.extend_from_slice(&(entry.name.len() as u16).to_le_bytes());
            out.extend_from_slice(entry.name.as_bytes());
        }

        out
    }

    /// Number of regular file entries
    pub fn file_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| e.kind == Pack1EntryKind::File)
            .count()
    }

    /// Verify every payload range lies inside a package of `package_len` bytes
    pub fn check_bounds(&self, package_len: u64) -> Result<()> {
        for entry in &self.entries {
            let end = entry.offset.checked_add(entry.size);
            if end.is_none_or(|end| end > package_len) {
                return Err(Error::InvalidPackageMeta(format!(
                    "entry {} points past the end of the package ({} bytes)",
                    entry.name, package_len
                )));
            }
        }
        Ok(())
    }
}

fn validate_entry_name(name: &str) -> Result<()> {
    relative_content_path(name)
        .map(|_| ())
        .map_err(|_| Error::InvalidPackageMeta(format!("invalid entry name: {:?}", name)))
}

/// Extracts a pack1 package using its parsed meta
pub struct Pack1Unarchiver {
    package_path: PathBuf,
    meta: Pack1Meta,
    destination: PathBuf,
    suffix: String,
}

impl Pack1Unarchiver {
    pub fn new(package_path: PathBuf, meta: Pack1Meta, destination: PathBuf, suffix: &str) -> Self {
        Self {
            package_path,
            meta,
            destination,
            suffix: suffix.to_string(),
        }
    }

    /// Suffix appended to every extracted file name
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    pub fn meta(&self) -> &Pack1Meta {
        &self.meta
    }

    fn target_path(&self, entry: &Pack1Entry) -> Result<PathBuf> {
        let relative = relative_content_path(&entry.name)
            .map_err(|_| Error::InvalidPackageMeta(format!("invalid entry name: {:?}", entry.name)))?;
        let mut target = self.destination.join(relative).into_os_string();
        if entry.kind == Pack1EntryKind::File {
            target.push(&self.suffix);
        }
        Ok(PathBuf::from(target))
    }
}

impl Unarchiver for Pack1Unarchiver {
    fn unarchive(
        &mut self,
        on_progress: &mut dyn FnMut(&UnarchiveProgress<'_>),
        cancel: &CancellationToken,
    ) -> Result<()> {
        debug!(
            "Unarchiving pack1 {} into {}",
            self.package_path.display(),
            self.destination.display()
        );

        let mut package = File::open(&self.package_path)?;
        self.meta.check_bounds(package.metadata()?.len())?;

        let total = self.meta.entries.len();
        fs::create_dir_all(&self.destination)?;

        for (index, entry) in self.meta.entries.iter().enumerate() {
            cancel.check("unarchive")?;

            let target = self.target_path(entry)?;
            let is_file = entry.kind == Pack1EntryKind::File;

            let mut report = |entry_fraction: f64| {
                on_progress(&UnarchiveProgress {
                    entry_name: &entry.name,
                    is_file,
                    entry: index + 1,
                    total,
                    entry_fraction,
                })
            };
            report(0.0);

            match entry.kind {
                Pack1EntryKind::Directory => {
                    fs::create_dir_all(&target)?;
                }
                Pack1EntryKind::File => {
                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent)?;
                    }

                    package.seek(SeekFrom::Start(entry.offset))?;
                    let mut payload = Read::take(&mut package, entry.size);
                    let mut output = File::create(&target)?;

                    let written = if self.meta.gzip {
                        let mut decoder = GzDecoder::new(&mut payload);
                        copy_with_progress(
                            &mut decoder,
                            &mut output,
                            entry.uncompressed_size,
                            cancel,
                            &mut report,
                        )
                    } else {
                        copy_with_progress(
                            &mut payload,
                            &mut output,
                            entry.uncompressed_size,
                            cancel,
                            &mut report,
                        )
                    }
                    .map_err(|e| corrupt_payload(e, &entry.name))?;

                    if written != entry.uncompressed_size {
                        return Err(Error::PackageCorrupt(format!(
                            "entry {} unpacked to {} bytes, expected {}",
                            entry.name, written, entry.uncompressed_size
                        )));
                    }

                    drop(output);
                    if entry.mode != 0 {
                        apply_mode(&target, Some(entry.mode))?;
                    }
                }
            }

            report(1.0);
        }

        debug!("Extracted {} pack1 entries", total);
        Ok(())
    }
}

/// Decoder failures on payload bytes mean the package itself is damaged
fn corrupt_payload(err: Error, name: &str) -> Error {
    match err {
        Error::Io(e)
            if matches!(
                e.kind(),
                io::ErrorKind::InvalidData
                    | io::ErrorKind::InvalidInput
                    | io::ErrorKind::UnexpectedEof
            ) =>
        {
            Error::PackageCorrupt(format!("entry {}: {}", name, e))
        }
        other => other,
    }
}

enum PendingEntry {
    Directory { name: String, mode: u32 },
    File { name: String, mode: u32, data: Vec<u8> },
}

/// Produces pack1 package and meta file pairs
pub struct Pack1Writer {
    gzip: bool,
    entries: Vec<PendingEntry>,
}

impl Pack1Writer {
    pub fn new(gzip: bool) -> Self {
        Self {
            gzip,
            entries: Vec::new(),
        }
    }

    pub fn add_directory(&mut self, name: &str) -> &mut Self {
        self.entries.push(PendingEntry::Directory {
            name: name.to_string(),
            mode: 0o755,
        });
        self
    }

    pub fn add_file(&mut self, name: &str, data: impl Into<Vec<u8>>) -> &mut Self {
        self.add_file_with_mode(name, data, 0o644)
    }

    pub fn add_file_with_mode(&mut self, name: &str, data: impl Into<Vec<u8>>, mode: u32) -> &mut Self {
        self.entries.push(PendingEntry::File {
            name: name.to_string(),
            mode,
            data: data.into(),
        });
        self
    }

    /// Write the package payloads and the companion meta file
    pub fn write(&self, package_path: &Path, meta_path: &Path) -> Result<Pack1Meta> {
        let mut package = BufWriter::new(File::create(package_path)?);
        let mut meta = Pack1Meta {
            gzip: self.gzip,
            ..Pack1Meta::default()
        };
        let mut offset: u64 = 0;

        for pending in &self.entries {
            match pending {
                PendingEntry::Directory { name, mode } => {
                    validate_entry_name(name)?;
                    meta.entries.push(Pack1Entry {
                        name: name.clone(),
                        kind: Pack1EntryKind::Directory,
                        mode: *mode,
                        offset,
                        size: 0,
                        uncompressed_size: 0,
                    });
                }
                PendingEntry::File { name, mode, data } => {
                    validate_entry_name(name)?;
                    let payload = if self.gzip {
                        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                        encoder.write_all(data)?;
                        encoder.finish()?
                    } else {
                        data.clone()
                    };
                    package.write_all(&payload)?;

                    meta.entries.push(Pack1Entry {
                        name: name.clone(),
                        kind: Pack1EntryKind::File,
                        mode: *mode,
                        offset,
                        size: payload.len() as u64,
                        uncompressed_size: data.len() as u64,
                    });
                    offset += payload.len() as u64;
                }
            }
        }

        package.flush()?;
        fs::write(meta_path, meta.to_bytes())?;

        debug!(
            "Wrote pack1 package {} ({} entries, {} bytes)",
            package_path.display(),
            meta.entries.len(),
            offset
        );

        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::PACK1_FILE_SUFFIX;

    /// Directory "data" followed by the 12-byte file "data/file.txt"
    /// stored as a 32-byte gzip payload at offset 0.
    const FIXTURE: &[u8] = &[
        0x50, 0x4B, 0x31, 0x4D, // magic
        0x01, 0x00, // version
        0x01, 0x00, // flags: gzip
        0x02, 0x00, 0x00, 0x00, // entry count
        // entry 0
        0x01, // directory
        0xED, 0x01, 0x00, 0x00, // 0o755
        0, 0, 0, 0, 0, 0, 0, 0, // offset
        0, 0, 0, 0, 0, 0, 0, 0, // size
        0, 0, 0, 0, 0, 0, 0, 0, // uncompressed
        0x04, 0x00, b'd', b'a', b't', b'a',
        // entry 1
        0x00, // file
        0xA4, 0x01, 0x00, 0x00, // 0o644
        0, 0, 0, 0, 0, 0, 0, 0, // offset
        0x20, 0, 0, 0, 0, 0, 0, 0, // size
        0x0C, 0, 0, 0, 0, 0, 0, 0, // uncompressed
        0x0D, 0x00, b'd', b'a', b't', b'a', b'/', b'f', b'i', b'l', b'e', b'.', b't', b'x', b't',
    ];

    #[test]
    fn test_parse_known_good_fixture() {
        let meta = Pack1Meta::parse(FIXTURE).unwrap();

        assert_eq!(meta.version, 1);
        assert!(meta.gzip);
        assert_eq!(meta.entries.len(), 2);
        assert_eq!(meta.file_count(), 1);

        assert_eq!(
            meta.entries[0],
            Pack1Entry {
                name: "data".to_string(),
                kind: Pack1EntryKind::Directory,
                mode: 0o755,
                offset: 0,
                size: 0,
                uncompressed_size: 0,
            }
        );
        assert_eq!(
            meta.entries[1],
            Pack1Entry {
                name: "data/file.txt".to_string(),
                kind: Pack1EntryKind::File,
                mode: 0o644,
                offset: 0,
                size: 32,
                uncompressed_size: 12,
            }
        );

        assert_eq!(meta.to_bytes(), FIXTURE);
    }

    #[test]
    fn test_parse_rejects_malformed_meta() {
        let mut bad_magic = FIXTURE.to_vec();
        bad_magic[0] = b'X';
        assert!(matches!(Pack1Meta::parse(&bad_magic), Err(Error::InvalidPackageMeta(_))));

        let mut bad_version = FIXTURE.to_vec();
        bad_version[4] = 2;
        assert!(matches!(Pack1Meta::parse(&bad_version), Err(Error::InvalidPackageMeta(_))));

        let mut bad_flags = FIXTURE.to_vec();
        bad_flags[6] = 0x03;
        assert!(matches!(Pack1Meta::parse(&bad_flags), Err(Error::InvalidPackageMeta(_))));

        let mut bad_kind = FIXTURE.to_vec();
        bad_kind[12] = 7;
        assert!(matches!(Pack1Meta::parse(&bad_kind), Err(Error::InvalidPackageMeta(_))));

        let truncated = &FIXTURE[..FIXTURE.len() - 3];
        assert!(matches!(Pack1Meta::parse(truncated), Err(Error::InvalidPackageMeta(_))));

        let mut trailing = FIXTURE.to_vec();
        trailing.push(0);
        assert!(matches!(Pack1Meta::parse(&trailing), Err(Error::InvalidPackageMeta(_))));

        assert!(matches!(Pack1Meta::parse(&[]), Err(Error::InvalidPackageMeta(_))));
    }

    #[test]
    fn test_parse_rejects_escaping_names() {
        let meta = Pack1Meta {
            entries: vec![Pack1Entry {
                name: "../outside".to_string(),
                kind: Pack1EntryKind::File,
                mode: 0o644,
                offset: 0,
                size: 0,
                uncompressed_size: 0,
            }],
            ..Pack1Meta::default()
        };
        let err = Pack1Meta::parse(&meta.to_bytes()).unwrap_err();
        assert!(matches!(err, Error::InvalidPackageMeta(_)));
    }

    #[test]
    fn test_parse_from_missing_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = Pack1Meta::parse_from_file(&temp_dir.path().join("absent.meta")).unwrap_err();
        assert!(matches!(err, Error::InvalidPackageMeta(_)));
    }

    #[test]
    fn test_check_bounds() {
        let meta = Pack1Meta::parse(FIXTURE).unwrap();
        assert!(meta.check_bounds(32).is_ok());
        assert!(matches!(meta.check_bounds(31), Err(Error::InvalidPackageMeta(_))));
    }

    fn unpack(gzip: bool) {
        let temp_dir = tempfile::tempdir().unwrap();
        let package = temp_dir.path().join("content.package");
        let meta_path = temp_dir.path().join("content.package.meta");
        let out = temp_dir.path().join("out");

        let written = Pack1Writer::new(gzip)
            .add_directory("bin")
            .add_file_with_mode("bin/game", b"#!/bin/sh\necho hi\n".to_vec(), 0o755)
            .add_file("data/level1.dat", vec![42u8; 100_000])
            .add_file("empty", Vec::new())
            .write(&package, &meta_path)
            .unwrap();

        let meta = Pack1Meta::parse_from_file(&meta_path).unwrap();
        assert_eq!(meta, written);

        let mut events = Vec::new();
        Pack1Unarchiver::new(package, meta, out.clone(), PACK1_FILE_SUFFIX)
            .unarchive(
                &mut |p| events.push((p.entry, p.is_file, p.overall())),
                &CancellationToken::new(),
            )
            .unwrap();

        assert!(out.join("bin").is_dir());
        assert_eq!(fs::read(out.join("bin/game_")).unwrap(), b"#!/bin/sh\necho hi\n");
        assert_eq!(fs::read(out.join("data/level1.dat_")).unwrap(), vec![42u8; 100_000]);
        assert_eq!(fs::read(out.join("empty_")).unwrap(), b"");
        assert!(!out.join("bin/game").exists());

        assert!(events.windows(2).all(|w| w[0].2 <= w[1].2));
        assert_eq!(events.first().map(|e| (e.0, e.1)), Some((1, false)));
        assert!((events.last().unwrap().2 - 1.0).abs() < 1e-12);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(out.join("bin/game_")).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o755);
        }
    }

    #[test]
    fn test_unarchive_plain_payloads() {
        unpack(false);
    }

    #[test]
    fn test_unarchive_gzip_payloads() {
        unpack(true);
    }

    #[test]
    fn test_unarchive_detects_size_mismatch() {
        let temp_dir = tempfile::tempdir().unwrap();
        let package = temp_dir.path().join("content.package");
        let meta_path = temp_dir.path().join("content.package.meta");

        let mut meta = Pack1Writer::new(false)
            .add_file("a.txt", b"alpha".to_vec())
            .write(&package, &meta_path)
            .unwrap();
        meta.entries[0].uncompressed_size = 9;

        let err = Pack1Unarchiver::new(package, meta, temp_dir.path().join("out"), "_")
            .unarchive(&mut |_| {}, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::PackageCorrupt(_)));
    }

    #[test]
    fn test_unarchive_rejects_out_of_range_meta() {
        let temp_dir = tempfile::tempdir().unwrap();
        let package = temp_dir.path().join("content.package");
        fs::write(&package, b"short").unwrap();

        let meta = Pack1Meta::parse(FIXTURE).unwrap();
        let out = temp_dir.path().join("out");
        let err = Pack1Unarchiver::new(package, meta, out.clone(), "_")
            .unarchive(&mut |_| {}, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidPackageMeta(_)));
        assert!(!out.exists());
    }

    #[test]
    fn test_unarchive_stops_when_cancelled() {
        let temp_dir = tempfile::tempdir().unwrap();
        let package = temp_dir.path().join("content.package");
        let meta_path = temp_dir.path().join("content.package.meta");
        let out = temp_dir.path().join("out");

        let meta = Pack1Writer::new(false)
            .add_file("a.txt", b"alpha".to_vec())
            .add_file("b.txt", b"beta".to_vec())
            .write(&package, &meta_path)
            .unwrap();

        let token = CancellationToken::new();
        let cancel_after_first = token.clone();
        let err = Pack1Unarchiver::new(package, meta, out.clone(), "_")
            .unarchive(
                &mut |p| {
                    if p.entry == 1 && p.entry_fraction >= 1.0 {
                        cancel_after_first.cancel();
                    }
                },
                &token,
            )
            .unwrap_err();

        assert!(err.is_cancelled());
        assert!(out.join("a.txt_").exists());
        assert!(!out.join("b.txt_").exists());
    }
}
