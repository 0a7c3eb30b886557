//! Per-mod file enumeration.

use std::path::Path;
use std::sync::Arc;

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{CookError, Result};
use crate::manifest::ModEntry;
use crate::paths::RelPath;
use crate::resolve::file::DiskFile;
use crate::util;

/// Recursively list every file beneath each enabled mod's root, tagged with
/// the owning mod's priority and its mod-root-relative path.
///
/// Mods are walked concurrently through the task pool; the returned list is
/// ordered by mod input order (ascending priority), with each mod's files in
/// walk order.
pub async fn enumerate_mods(mods: &[ModEntry], concurrency: usize) -> Result<Vec<Arc<DiskFile>>> {
    let per_mod = util::pmap(mods.iter().cloned(), concurrency, |entry| async move {
        util::blocking(move || walk_mod(&entry)).await
    })
    .await?;

    let files: Vec<Arc<DiskFile>> = per_mod.into_iter().flatten().collect();
    debug!("resolved {} disk files", files.len());
    Ok(files)
}

fn walk_mod(entry: &ModEntry) -> Result<Vec<Arc<DiskFile>>> {
    let mut files = Vec::new();
    for item in WalkDir::new(&entry.root).follow_links(false) {
        let item = item.map_err(|e| {
            let path = e.path().unwrap_or(&entry.root).to_path_buf();
            match e.into_io_error() {
                Some(io) => CookError::io(path, io),
                None => CookError::io(
                    path,
                    std::io::Error::new(std::io::ErrorKind::Other, "filesystem loop"),
                ),
            }
        })?;
        if !item.file_type().is_file() {
            continue;
        }
        let rel = relative_to(item.path(), &entry.root);
        files.push(Arc::new(DiskFile::new(
            entry.priority,
            rel,
            item.into_path(),
        )));
    }
    Ok(files)
}

fn relative_to(path: &Path, root: &Path) -> RelPath {
    let rel = path.strip_prefix(root).unwrap_or(path);
    RelPath::from_path(rel)
}
