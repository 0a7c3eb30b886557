//! Case-normalized relative paths.
//!
//! Mod-supplied paths come from a case-insensitive filesystem convention, so
//! two mods shipping `Textures/Rock.dds` and `textures/rock.dds` must collide.
//! [`RelPath`] normalizes once at construction (lowercase, `/` separators) and
//! is used as the key type for every table in the pipeline.

use std::fmt;
use std::path::{Path, PathBuf};

/// A relative file path in normalized form: lowercase, `/`-separated, no
/// leading separator.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RelPath(String);

impl RelPath {
    pub fn new(path: impl AsRef<str>) -> Self {
        let lowered = path.as_ref().replace('\\', "/").to_lowercase();
        let mut trimmed = lowered.as_str();
        loop {
            if let Some(rest) = trimmed.strip_prefix("./") {
                trimmed = rest;
            } else if let Some(rest) = trimmed.strip_prefix('/') {
                trimmed = rest;
            } else {
                break;
            }
        }
        RelPath(trimmed.to_string())
    }

    /// Normalize a filesystem path (lossy for non-UTF-8 segments).
    pub fn from_path(path: &Path) -> Self {
        Self::new(path.to_string_lossy())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Extension of the final segment, without the dot. Already lowercase.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => Some(ext),
            _ => None,
        }
    }

    /// Final path segment.
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The whole path with the final extension removed, e.g. the plugin base
    /// name used to derive companion archive names.
    pub fn strip_extension(&self) -> &str {
        match self.extension() {
            Some(ext) => &self.0[..self.0.len() - ext.len() - 1],
            None => &self.0,
        }
    }

    /// The path in the archive codec's canonical form: `\`-separated.
    pub fn to_archive_path(&self) -> String {
        self.0.replace('/', "\\")
    }

    /// The path as an on-disk relative path.
    pub fn to_fs_path(&self) -> PathBuf {
        PathBuf::from(&self.0)
    }
}

impl fmt::Display for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for RelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelPath({:?})", self.0)
    }
}

impl From<&str> for RelPath {
    fn from(s: &str) -> Self {
        RelPath::new(s)
    }
}
