//! Archive emission.
//!
//! Each sealed batch becomes one `Cooked<idx>.bsa`, built in parallel across
//! batches. An archive that already exists on disk is skipped wholesale, so a
//! re-run after a partial failure only builds what is missing. Alongside the
//! archives, one placeholder plugin per batch index makes the engine load the
//! archive by naming convention.

use std::path::PathBuf;

use tracing::info;

use crate::batch::{settings_for, Batch};
use crate::bsa::{ArchiveTypes, ArchiveWriter};
use crate::config::CookerConfig;
use crate::error::{CookError, Result};
use crate::util;

/// Minimal TES4 plugin: an empty header record with an `HEDR` subrecord.
/// Enough for the engine to count it as a plugin and pull in the sibling
/// archive.
const PLACEHOLDER_PLUGIN: [u8; 42] = [
    b'T', b'E', b'S', b'4', // record type
    18, 0, 0, 0, // data size
    0, 0, 0, 0, // flags
    0, 0, 0, 0, // form id
    0, 0, 0, 0, // vc info
    44, 0, 0, 0, // internal version
    b'H', b'E', b'D', b'R', // header subrecord
    12, 0, // subrecord size
    0x9a, 0x99, 0xd9, 0x3f, // version 1.7
    0, 0, 0, 0, // record count
    0, 0x08, 0, 0, // next object id
];

/// Build every batch's archive, then write the placeholder plugins.
///
/// Returns the paths of archives actually built this run (skipped ones are
/// not listed).
pub async fn emit_archives(batches: &[Batch], config: &CookerConfig) -> Result<Vec<PathBuf>> {
    info!("building {} archives", batches.len());

    let built = util::pmap(batches.iter(), config.concurrency, |batch| async move {
        emit_one(batch, config).await
    })
    .await?;

    for batch in batches {
        let path = config.plugin_path(batch.index);
        tokio::fs::write(&path, PLACEHOLDER_PLUGIN)
            .await
            .map_err(|e| CookError::io(&path, e))?;
    }

    Ok(built.into_iter().flatten().collect())
}

/// Build one archive, or skip it if the output already exists.
async fn emit_one(batch: &Batch, config: &CookerConfig) -> Result<Option<PathBuf>> {
    let out = config.archive_path(batch.index);
    let exists = tokio::fs::try_exists(&out)
        .await
        .map_err(|e| CookError::io(&out, e))?;
    if exists {
        info!("archive {} already exists, skipping", out.display());
        return Ok(None);
    }

    info!("adding {} files to archive {}", batch.files.len(), batch.index);

    let flags = batch
        .files
        .keys()
        .filter_map(settings_for)
        .fold(ArchiveTypes::empty(), |acc, s| acc | s.types);

    let contents = util::pmap(batch.files.iter(), config.concurrency, |(path, file)| {
        let path = path.clone();
        async move {
            let settings = settings_for(&path);
            let compress = settings.map(|s| s.compress).unwrap_or(false);
            let bytes = file.read_bytes().await?;
            Ok((path.to_archive_path(), compress, bytes))
        }
    })
    .await?;

    info!("writing {} files to archive {}", batch.files.len(), batch.index);
    let out_path = out.clone();
    util::blocking(move || {
        let mut writer = ArchiveWriter::new(flags);
        for (path, compress, bytes) in contents {
            writer.add_file(&path, compress, bytes);
        }
        writer
            .finalize(&out_path)
            .map_err(|e| CookError::ArchiveWrite {
                path: out_path.clone(),
                source: e,
            })
    })
    .await?;

    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    use indexmap::IndexMap;
    use tempfile::tempdir;

    use crate::paths::RelPath;
    use crate::resolve::{DiskFile, ResolvedFile};

    async fn config_in(dir: &std::path::Path) -> CookerConfig {
        let profile = dir.join("profiles/Test");
        tokio::fs::create_dir_all(&profile).await.unwrap();
        let mut config = CookerConfig::from_mod_list(profile.join("modlist.txt")).unwrap();
        config.concurrency = 2;
        tokio::fs::create_dir_all(&config.cooked_mod_dir)
            .await
            .unwrap();
        config
    }

    fn batch_of(index: usize, entries: Vec<(RelPath, ResolvedFile)>) -> Batch {
        let files: IndexMap<RelPath, ResolvedFile> = entries.into_iter().collect();
        Batch {
            index,
            total_size: 0,
            files,
        }
    }

    #[tokio::test]
    async fn existing_archive_is_skipped_untouched() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path()).await;

        let marker = b"pre-existing archive".to_vec();
        tokio::fs::write(config.archive_path(0), &marker)
            .await
            .unwrap();

        // The batch references a nonexistent source file; a skip must never
        // try to read it.
        let rel = RelPath::new("textures/a.dds");
        let file = ResolvedFile::Disk(Arc::new(DiskFile::with_size(
            0,
            rel.clone(),
            PathBuf::from("/nonexistent/a.dds"),
            4,
        )));
        let batches = vec![batch_of(0, vec![(rel, file)])];

        let built = emit_archives(&batches, &config).await.unwrap();
        assert!(built.is_empty());

        let after = tokio::fs::read(config.archive_path(0)).await.unwrap();
        assert_eq!(after, marker);
        // The placeholder plugin is still (re)written.
        assert!(tokio::fs::try_exists(config.plugin_path(0)).await.unwrap());
    }

    #[tokio::test]
    async fn builds_archive_and_placeholder_from_disk_sources() {
        let dir = tempdir().unwrap();
        let config = config_in(dir.path()).await;

        let src = dir.path().join("mods/M/textures/rock.dds");
        tokio::fs::create_dir_all(src.parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(&src, b"texture bytes").await.unwrap();

        let rel = RelPath::new("textures/rock.dds");
        let file = ResolvedFile::Disk(Arc::new(DiskFile::new(0, rel.clone(), src)));
        let batches = vec![batch_of(0, vec![(rel, file)])];

        let built = emit_archives(&batches, &config).await.unwrap();
        assert_eq!(built, vec![config.archive_path(0)]);

        let reader = crate::bsa::ArchiveReader::open(&config.archive_path(0)).unwrap();
        let entries = reader.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "textures/rock.dds");

        let plugin = tokio::fs::read(config.plugin_path(0)).await.unwrap();
        assert_eq!(&plugin[..4], b"TES4");
    }
}
