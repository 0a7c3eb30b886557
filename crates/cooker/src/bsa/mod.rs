//! Thin adapter over the `ba2` crate for TES4 (Skyrim SE) archives.
//!
//! The pipeline never touches `ba2` types directly; it consumes this module's
//! contract instead: [`ArchiveReader`] lists an existing container's directory
//! and extracts entry bytes, [`ArchiveWriter`] accumulates files in insertion
//! order and finalizes them into a new archive on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use ba2::prelude::*;
use ba2::tes4::{
    Archive, ArchiveFlags, ArchiveKey, ArchiveOptions, Directory, DirectoryKey, File,
    FileCompressionOptions as CompressionOptions, Version,
};
use thiserror::Error;

pub use ba2::tes4::ArchiveTypes;

/// Archive format version written by this tool.
const VERSION: Version = Version::SSE;

#[derive(Debug, Error)]
pub enum BsaError {
    #[error("archive codec error")]
    Format(#[from] ba2::tes4::Error),

    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("entry '{0}' not present in archive")]
    MissingEntry(String),
}

/// Opaque handle locating one entry inside its container.
///
/// Holds the raw directory and file name bytes as the codec reported them, so
/// a later lookup hits the same entry regardless of path normalization.
#[derive(Debug, Clone)]
pub struct EntryRef {
    dir: Vec<u8>,
    name: Vec<u8>,
}

#[cfg(test)]
impl EntryRef {
    pub(crate) fn for_tests(name: &str) -> Self {
        Self {
            dir: Vec::new(),
            name: name.as_bytes().to_vec(),
        }
    }
}

/// One entry of a container's internal directory.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Internal path, `/`-separated as reported by the codec.
    pub path: String,
    /// Decompressed size in bytes.
    pub size: u64,
    /// Handle for later extraction.
    pub entry: EntryRef,
}

/// Anything entry bytes can be pulled out of.
///
/// The production implementation is [`ArchiveReader`]; tests substitute an
/// in-memory fake.
pub trait ArchiveSource: Send + Sync {
    fn extract(&self, entry: &EntryRef) -> Result<Vec<u8>, BsaError>;
}

/// A parsed archive container held open for entry extraction.
pub struct ArchiveReader {
    path: PathBuf,
    archive: Archive<'static>,
    version: Version,
}

impl ArchiveReader {
    /// Parse the container's directory. The parsed structure stays resident
    /// until the reader is dropped.
    pub fn open(path: &Path) -> Result<Self, BsaError> {
        let (archive, meta) = Archive::read(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            archive,
            version: meta.version(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The internal directory in the codec's reported order.
    pub fn entries(&self) -> Vec<ArchiveEntry> {
        let mut out = Vec::new();
        for (dir_key, dir) in self.archive.iter() {
            let dir_name = String::from_utf8_lossy(dir_key.name().as_ref()).into_owned();
            for (file_key, file) in dir.iter() {
                let file_name = String::from_utf8_lossy(file_key.name().as_ref()).into_owned();
                let path = if dir_name.is_empty() {
                    file_name.clone()
                } else {
                    format!("{}/{}", dir_name.replace('\\', "/"), file_name)
                };
                let size = file.decompressed_len().unwrap_or_else(|| file.len()) as u64;
                out.push(ArchiveEntry {
                    path,
                    size,
                    entry: EntryRef {
                        dir: AsRef::<[u8]>::as_ref(dir_key.name()).to_vec(),
                        name: AsRef::<[u8]>::as_ref(file_key.name()).to_vec(),
                    },
                });
            }
        }
        out
    }
}

impl ArchiveSource for ArchiveReader {
    /// Fully decode one entry into memory.
    fn extract(&self, entry: &EntryRef) -> Result<Vec<u8>, BsaError> {
        let file = self
            .archive
            .get(&ArchiveKey::from(entry.dir.as_slice()))
            .and_then(|dir| dir.get(&DirectoryKey::from(entry.name.as_slice())))
            .ok_or_else(|| {
                BsaError::MissingEntry(String::from_utf8_lossy(&entry.name).into_owned())
            })?;

        if file.is_compressed() {
            let options = CompressionOptions::builder().version(self.version).build();
            let decompressed = file.decompress(&options)?;
            Ok(decompressed.as_bytes().to_vec())
        } else {
            Ok(file.as_bytes().to_vec())
        }
    }
}

impl std::fmt::Debug for ArchiveReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveReader")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

struct PendingFile {
    path: String,
    compress: bool,
    data: Vec<u8>,
}

/// Builder for one output archive.
///
/// Files are added in insertion order with their bytes fully materialized;
/// `finalize` performs the single write step that produces the archive, so a
/// failed build never leaves a half-written file behind a successful return.
pub struct ArchiveWriter {
    types: ArchiveTypes,
    files: Vec<PendingFile>,
}

impl ArchiveWriter {
    /// `types` is the archive-level category flag union for the header.
    pub fn new(types: ArchiveTypes) -> Self {
        Self {
            types,
            files: Vec::new(),
        }
    }

    /// Queue a file. `canonical_path` must be the engine's canonical archive
    /// form: lowercase, `\`-separated.
    pub fn add_file(&mut self, canonical_path: &str, compress: bool, data: Vec<u8>) {
        self.files.push(PendingFile {
            path: canonical_path.to_string(),
            compress,
            data,
        });
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|f| f.data.len() as u64).sum()
    }

    /// Build and persist the archive.
    pub fn finalize(&self, out: &Path) -> Result<(), BsaError> {
        let compression = CompressionOptions::builder().version(VERSION).build();
        let any_compressed = self.files.iter().any(|f| f.compress);

        let mut directories: HashMap<&str, Vec<(&str, File<'_>)>> = HashMap::new();
        for pending in &self.files {
            let (dir, name) = match pending.path.rsplit_once('\\') {
                Some((dir, name)) => (dir, name),
                None => ("", pending.path.as_str()),
            };
            let mut file = File::from_decompressed(pending.data.as_slice());
            if pending.compress {
                file = file.compress(&compression)?;
            }
            directories.entry(dir).or_default().push((name, file));
        }

        let archive: Archive<'_> = directories
            .into_iter()
            .map(|(dir, files)| {
                let directory: Directory<'_> = files
                    .into_iter()
                    .map(|(name, file)| (DirectoryKey::from(name.as_bytes()), file))
                    .collect();
                (ArchiveKey::from(dir.as_bytes()), directory)
            })
            .collect();

        let mut flags = ArchiveFlags::DIRECTORY_STRINGS
            | ArchiveFlags::FILE_STRINGS
            | ArchiveFlags::RETAIN_FILE_NAMES
            | ArchiveFlags::RETAIN_STRINGS_DURING_STARTUP;
        if any_compressed {
            flags |= ArchiveFlags::COMPRESSED;
        }

        let options = ArchiveOptions::builder()
            .version(VERSION)
            .flags(flags)
            .types(self.types)
            .build();

        let mut dst = std::fs::File::create(out)?;
        archive.write(&mut dst, &options)?;
        Ok(())
    }
}
