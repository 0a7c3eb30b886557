//! Archive content indexing.
//!
//! Every enumerated `.bsa` container is opened through the codec and its
//! internal directory wrapped into [`ArchiveFile`]s carrying the owning mod's
//! priority. Containers are parsed with bounded parallelism; the per-archive
//! entry order is the codec's reported order.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::bsa::ArchiveReader;
use crate::error::{CookError, Result};
use crate::paths::RelPath;
use crate::resolve::file::{ArchiveFile, DiskFile};
use crate::util;

/// Extension marking a file as an archive container.
pub const CONTAINER_EXTENSION: &str = "bsa";

/// Mapping from owning container to its ordered contents.
#[derive(Debug, Default)]
pub struct ArchiveIndex {
    contents: HashMap<(usize, RelPath), Vec<Arc<ArchiveFile>>>,
}

impl ArchiveIndex {
    /// Open every container among `files` and index its contents.
    pub async fn build(files: &[Arc<DiskFile>], concurrency: usize) -> Result<Self> {
        let containers: Vec<Arc<DiskFile>> = files
            .iter()
            .filter(|f| f.path().extension() == Some(CONTAINER_EXTENSION))
            .cloned()
            .collect();

        let indexed = util::pmap(containers, concurrency, |container| async move {
            debug!("reading contents of {}", container.path());
            let disk_path = container.disk_path().to_path_buf();
            let reader = util::blocking(move || {
                ArchiveReader::open(&disk_path).map_err(|e| CookError::ArchiveRead {
                    path: disk_path.clone(),
                    source: e,
                })
            })
            .await?;

            let source = Arc::new(reader);
            let entries = source
                .entries()
                .into_iter()
                .map(|entry| {
                    Arc::new(ArchiveFile::new(
                        RelPath::new(&entry.path),
                        entry.size,
                        Arc::clone(&container),
                        source.clone() as Arc<dyn crate::bsa::ArchiveSource>,
                        entry.entry,
                    ))
                })
                .collect::<Vec<_>>();
            Ok((container, entries))
        })
        .await?;

        let mut index = Self::default();
        let mut total = 0usize;
        for (container, entries) in indexed {
            total += entries.len();
            index.insert(&container, entries);
        }
        info!(
            "resolved {total} files from {} archives",
            index.contents.len()
        );
        Ok(index)
    }

    pub(crate) fn insert(&mut self, container: &DiskFile, entries: Vec<Arc<ArchiveFile>>) {
        self.contents
            .insert((container.priority(), container.path().clone()), entries);
    }

    /// Contents of one container, in codec order.
    pub fn contents_of(&self, container: &DiskFile) -> Option<&[Arc<ArchiveFile>]> {
        self.contents
            .get(&(container.priority(), container.path().clone()))
            .map(Vec::as_slice)
    }

    pub fn container_count(&self) -> usize {
        self.contents.len()
    }

    pub fn entry_count(&self) -> usize {
        self.contents.values().map(Vec::len).sum()
    }
}
