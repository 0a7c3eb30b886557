//! The resolved-file abstraction.
//!
//! Every candidate the pipeline handles is one of two things: a loose file on
//! disk inside a mod directory, or an entry inside an archive container. Both
//! expose the same small capability set (path, owning priority, size, open a
//! readable stream), so the rest of the pipeline never branches on the
//! variant.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::OnceCell;

use crate::bsa::{ArchiveSource, EntryRef};
use crate::error::{CookError, Result};
use crate::paths::RelPath;
use crate::util;

/// A loose file on disk, tagged with its owning mod's priority.
#[derive(Debug)]
pub struct DiskFile {
    priority: usize,
    path: RelPath,
    disk_path: PathBuf,
    size: OnceCell<u64>,
}

impl DiskFile {
    pub fn new(priority: usize, path: RelPath, disk_path: PathBuf) -> Self {
        Self {
            priority,
            path,
            disk_path,
            size: OnceCell::new(),
        }
    }

    /// A disk file with its size already known, skipping the lazy stat.
    pub fn with_size(priority: usize, path: RelPath, disk_path: PathBuf, size: u64) -> Self {
        Self {
            priority,
            path,
            disk_path,
            size: OnceCell::new_with(Some(size)),
        }
    }

    pub fn priority(&self) -> usize {
        self.priority
    }

    pub fn path(&self) -> &RelPath {
        &self.path
    }

    pub fn disk_path(&self) -> &Path {
        &self.disk_path
    }

    /// Size in bytes, stat'ed once and cached.
    pub async fn size(&self) -> Result<u64> {
        self.size
            .get_or_try_init(|| async {
                let meta = tokio::fs::metadata(&self.disk_path)
                    .await
                    .map_err(|e| CookError::io(&self.disk_path, e))?;
                Ok(meta.len())
            })
            .await
            .copied()
    }
}

/// An entry inside an archive container, tagged with the container's owning
/// mod priority. Holds a shared handle to the parsed container (a
/// back-reference, not ownership).
pub struct ArchiveFile {
    priority: usize,
    path: RelPath,
    size: u64,
    owner: Arc<DiskFile>,
    source: Arc<dyn ArchiveSource>,
    entry: EntryRef,
}

impl ArchiveFile {
    pub fn new(
        path: RelPath,
        size: u64,
        owner: Arc<DiskFile>,
        source: Arc<dyn ArchiveSource>,
        entry: EntryRef,
    ) -> Self {
        Self {
            priority: owner.priority(),
            path,
            size,
            owner,
            source,
            entry,
        }
    }

    pub fn priority(&self) -> usize {
        self.priority
    }

    pub fn path(&self) -> &RelPath {
        &self.path
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// The container this entry lives in.
    pub fn owner(&self) -> &Arc<DiskFile> {
        &self.owner
    }

    /// Fully decode the entry into memory.
    pub async fn read_bytes(&self) -> Result<Vec<u8>> {
        let source = Arc::clone(&self.source);
        let entry = self.entry.clone();
        let container = self.owner.disk_path().to_path_buf();
        util::blocking(move || {
            source.extract(&entry).map_err(|e| CookError::ArchiveRead {
                path: container,
                source: e,
            })
        })
        .await
    }
}

impl std::fmt::Debug for ArchiveFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveFile")
            .field("path", &self.path)
            .field("priority", &self.priority)
            .field("size", &self.size)
            .field("owner", &self.owner.path())
            .finish_non_exhaustive()
    }
}

/// One resolved candidate for a relative path.
#[derive(Debug, Clone)]
pub enum ResolvedFile {
    Disk(Arc<DiskFile>),
    Archived(Arc<ArchiveFile>),
}

impl ResolvedFile {
    pub fn path(&self) -> &RelPath {
        match self {
            Self::Disk(f) => f.path(),
            Self::Archived(f) => f.path(),
        }
    }

    pub fn priority(&self) -> usize {
        match self {
            Self::Disk(f) => f.priority(),
            Self::Archived(f) => f.priority(),
        }
    }

    pub fn is_disk(&self) -> bool {
        matches!(self, Self::Disk(_))
    }

    pub async fn size(&self) -> Result<u64> {
        match self {
            Self::Disk(f) => f.size().await,
            Self::Archived(f) => Ok(f.size()),
        }
    }

    /// Open the file for reading.
    ///
    /// Disk files stream from the filesystem; archived entries are fully
    /// decoded into a rewindable in-memory buffer first, so callers must
    /// expect full materialization. The buffer is released when the stream is
    /// dropped.
    pub async fn open_stream(&self) -> Result<FileStream> {
        match self {
            Self::Disk(f) => {
                let file = tokio::fs::File::open(f.disk_path())
                    .await
                    .map_err(|e| CookError::io(f.disk_path(), e))?;
                Ok(FileStream::Disk(file))
            }
            Self::Archived(f) => Ok(FileStream::Memory(Cursor::new(f.read_bytes().await?))),
        }
    }

    /// Read the whole content into memory.
    pub async fn read_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Self::Disk(f) => tokio::fs::read(f.disk_path())
                .await
                .map_err(|e| CookError::io(f.disk_path(), e)),
            Self::Archived(f) => f.read_bytes().await,
        }
    }
}

/// Readable stream over either variant.
pub enum FileStream {
    Disk(tokio::fs::File),
    Memory(Cursor<Vec<u8>>),
}

impl AsyncRead for FileStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            FileStream::Disk(f) => Pin::new(f).poll_read(cx, buf),
            FileStream::Memory(c) => Pin::new(c).poll_read(cx, buf),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn disk_file_size_is_cached() {
        let dir = tempdir().unwrap();
        let on_disk = dir.path().join("a.dds");
        tokio::fs::write(&on_disk, b"12345").await.unwrap();

        let file = DiskFile::new(0, RelPath::new("textures/a.dds"), on_disk.clone());
        assert_eq!(file.size().await.unwrap(), 5);

        // A second call must not re-stat.
        tokio::fs::remove_file(&on_disk).await.unwrap();
        assert_eq!(file.size().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn with_size_never_touches_disk() {
        let file = DiskFile::with_size(
            1,
            RelPath::new("meshes/x.nif"),
            PathBuf::from("/nonexistent/x.nif"),
            42,
        );
        assert_eq!(file.size().await.unwrap(), 42);
    }

    #[tokio::test]
    async fn disk_stream_reads_contents() {
        use tokio::io::AsyncReadExt;

        let dir = tempdir().unwrap();
        let on_disk = dir.path().join("b.txt");
        tokio::fs::write(&on_disk, b"hello").await.unwrap();

        let resolved = ResolvedFile::Disk(Arc::new(DiskFile::new(
            0,
            RelPath::new("b.txt"),
            on_disk,
        )));
        let mut stream = resolved.open_stream().await.unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"hello");
    }
}
