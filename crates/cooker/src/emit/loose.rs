//! Loose-file partitions and profile output.
//!
//! Files that stay outside archives are spread across numbered partition
//! mods, at most `loose_partition_size` entries each, to keep directory entry
//! counts reasonable. The source profile is copied alongside so the cooked
//! manifests land next to the state they describe.

use indexmap::IndexMap;
use tokio::io::AsyncWriteExt;
use tracing::info;
use walkdir::WalkDir;

use crate::config::CookerConfig;
use crate::error::{CookError, Result};
use crate::paths::RelPath;
use crate::resolve::ResolvedFile;
use crate::util;

/// Write every loose file beneath its partition directory. Returns the number
/// of partitions created.
pub async fn write_loose_partitions(
    loose: &IndexMap<RelPath, ResolvedFile>,
    config: &CookerConfig,
) -> Result<usize> {
    info!("writing {} loose files", loose.len());

    let tasks: Vec<(usize, &RelPath, &ResolvedFile)> = loose
        .iter()
        .enumerate()
        .map(|(idx, (path, file))| (idx / config.loose_partition_size, path, file))
        .collect();
    let partitions = tasks.last().map(|(idx, ..)| idx + 1).unwrap_or(0);

    util::pmap(tasks, config.concurrency, |(partition, path, file)| async move {
        let out = config.partition_dir(partition).join(path.to_fs_path());
        if let Some(parent) = out.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CookError::io(parent, e))?;
        }
        let mut stream = file.open_stream().await?;
        let mut dest = tokio::fs::File::create(&out)
            .await
            .map_err(|e| CookError::io(&out, e))?;
        tokio::io::copy(&mut stream, &mut dest)
            .await
            .map_err(|e| CookError::io(&out, e))?;
        dest.flush().await.map_err(|e| CookError::io(&out, e))?;
        Ok(())
    })
    .await?;

    Ok(partitions)
}

/// Copy the source profile's files into the cooked profile directory,
/// preserving relative structure.
pub async fn copy_profile(config: &CookerConfig) -> Result<()> {
    info!("copying profile");

    let profile_dir = config.profile_dir.clone();
    let files = util::blocking(move || {
        let mut files = Vec::new();
        for item in WalkDir::new(&profile_dir) {
            let item = item.map_err(|e| {
                let path = e.path().unwrap_or(&profile_dir).to_path_buf();
                match e.into_io_error() {
                    Some(io) => CookError::io(path, io),
                    None => CookError::io(
                        path,
                        std::io::Error::new(std::io::ErrorKind::Other, "filesystem loop"),
                    ),
                }
            })?;
            if item.file_type().is_file() {
                files.push(item.into_path());
            }
        }
        Ok(files)
    })
    .await?;

    util::pmap(files, config.concurrency, |src| async move {
        let rel = src
            .strip_prefix(&config.profile_dir)
            .unwrap_or(&src)
            .to_path_buf();
        let dest = config.cooked_profile_dir.join(rel);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CookError::io(parent, e))?;
        }
        tokio::fs::copy(&src, &dest)
            .await
            .map_err(|e| CookError::io(&dest, e))?;
        Ok(())
    })
    .await?;

    Ok(())
}
