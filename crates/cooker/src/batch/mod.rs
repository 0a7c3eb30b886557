//! Batch classification and assembly.
//!
//! The classifier splits the resolved load order into the subset worth
//! packing into archives (known asset extensions) and the loose remainder.
//! The assembler then greedily groups the packable subset into size-bounded
//! batches, one output archive each.

use std::collections::HashMap;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use tracing::{debug, info};

use crate::bsa::ArchiveTypes;
use crate::error::Result;
use crate::paths::RelPath;
use crate::resolve::{LoadOrder, ResolvedFile};
use crate::util;

/// Packing rules for one extension.
#[derive(Debug, Clone, Copy)]
pub struct BatchSettings {
    /// Category flag contributed to the archive header.
    pub types: ArchiveTypes,
    /// Whether entries of this extension are stored compressed.
    pub compress: bool,
}

/// Extension → packing rules. Extensions absent from this table stay loose.
static BATCH_SETTINGS: Lazy<HashMap<&'static str, BatchSettings>> = Lazy::new(|| {
    let compressed = |types| BatchSettings {
        types,
        compress: true,
    };
    let stored = |types| BatchSettings {
        types,
        compress: false,
    };
    HashMap::from([
        ("dds", compressed(ArchiveTypes::TEXTURES)),
        ("nif", compressed(ArchiveTypes::MESHES)),
        ("btr", compressed(ArchiveTypes::MESHES)),
        ("bto", compressed(ArchiveTypes::MESHES)),
        ("tri", compressed(ArchiveTypes::MESHES)),
        ("hkx", stored(ArchiveTypes::MESHES)),
        ("fuz", stored(ArchiveTypes::SOUNDS)),
        ("wav", stored(ArchiveTypes::SOUNDS)),
        ("lip", stored(ArchiveTypes::SOUNDS)),
        ("pex", stored(ArchiveTypes::SOUNDS)),
    ])
});

/// Packing rules for a path, if its extension is packable.
pub fn settings_for(path: &RelPath) -> Option<&'static BatchSettings> {
    BATCH_SETTINGS.get(path.extension()?)
}

/// The load order split into packable and loose subsets. Disjoint; their
/// union is exactly the load order.
#[derive(Debug, Default)]
pub struct Split {
    pub packable: IndexMap<RelPath, ResolvedFile>,
    pub loose: IndexMap<RelPath, ResolvedFile>,
}

/// Partition the load order, preserving resolution order in both halves.
pub fn classify(order: &LoadOrder) -> Split {
    let mut split = Split::default();
    for (path, file) in order.iter() {
        if settings_for(path).is_some() {
            split.packable.insert(path.clone(), file.clone());
        } else {
            split.loose.insert(path.clone(), file.clone());
        }
    }
    info!(
        "found {} files to pack into archives out of {}",
        split.packable.len(),
        order.len()
    );
    info!("found {} loose files", split.loose.len());

    let mut by_ext: HashMap<&str, usize> = HashMap::new();
    for path in split.loose.keys() {
        *by_ext.entry(path.extension().unwrap_or("")).or_default() += 1;
    }
    let mut ranked: Vec<(&str, usize)> = by_ext.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    for (ext, count) in ranked {
        debug!("{count} loose .{ext} files");
    }

    split
}

/// One size-bounded group of packable files destined for a single archive.
#[derive(Debug)]
pub struct Batch {
    pub index: usize,
    pub files: IndexMap<RelPath, ResolvedFile>,
    pub total_size: u64,
}

/// Greedily group the packable subset into batches below `cap` bytes.
///
/// Sizes are prefetched through the task pool first, then files are taken in
/// resolution order. A batch seals when the next candidate would reach the
/// cap; a single file at or above the cap occupies a batch alone (files are
/// never split).
pub async fn assemble(
    packable: &IndexMap<RelPath, ResolvedFile>,
    cap: u64,
    concurrency: usize,
) -> Result<Vec<Batch>> {
    let sizes = util::pmap(packable.values().cloned(), concurrency, |file| async move {
        file.size().await
    })
    .await?;

    let mut batches: Vec<Batch> = Vec::new();
    let mut current = Batch {
        index: 0,
        files: IndexMap::new(),
        total_size: 0,
    };
    for ((path, file), size) in packable.iter().zip(sizes) {
        if !current.files.is_empty() && current.total_size + size >= cap {
            info!(
                "batch {} defined, {}",
                current.index,
                util::format_size(current.total_size)
            );
            let next_index = current.index + 1;
            batches.push(current);
            current = Batch {
                index: next_index,
                files: IndexMap::new(),
                total_size: 0,
            };
        }
        current.files.insert(path.clone(), file.clone());
        current.total_size += size;
    }
    if !current.files.is_empty() {
        info!(
            "batch {} defined, {}",
            current.index,
            util::format_size(current.total_size)
        );
        batches.push(current);
    }

    info!("generated {} batches", batches.len());
    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Arc;

    use crate::resolve::DiskFile;

    fn sized(path: &str, size: u64) -> (RelPath, ResolvedFile) {
        let rel = RelPath::new(path);
        let file = ResolvedFile::Disk(Arc::new(DiskFile::with_size(
            0,
            rel.clone(),
            PathBuf::from(format!("/mods/m/{path}")),
            size,
        )));
        (rel, file)
    }

    fn packable_of(entries: &[(&str, u64)]) -> IndexMap<RelPath, ResolvedFile> {
        entries.iter().map(|(p, s)| sized(p, *s)).collect()
    }

    #[test]
    fn classified_subsets_partition_the_load_order() {
        let files: Vec<Arc<DiskFile>> = [
            "textures/rock.dds",
            "meshes/x.nif",
            "interface/menu.swf",
            "Test.esp",
            "readme.txt",
            "sound/fx/a.wav",
        ]
        .iter()
        .map(|p| {
            Arc::new(DiskFile::with_size(
                0,
                RelPath::new(p),
                PathBuf::from(format!("/mods/m/{p}")),
                8,
            ))
        })
        .collect();

        let table = crate::resolve::PathTable::build(&files);
        let order =
            crate::resolve::resolve(&[], &table, &crate::resolve::ArchiveIndex::default())
                .unwrap();
        let split = classify(&order);

        assert_eq!(split.packable.len() + split.loose.len(), order.len());
        for path in split.packable.keys() {
            assert!(!split.loose.contains_key(path));
            assert!(order.get(path).is_some());
        }
        for path in split.loose.keys() {
            assert!(order.get(path).is_some());
        }
        assert!(split.packable.contains_key(&RelPath::new("meshes/x.nif")));
        assert!(split.packable.contains_key(&RelPath::new("sound/fx/a.wav")));
        assert!(split.loose.contains_key(&RelPath::new("test.esp")));
        assert!(split.loose.contains_key(&RelPath::new("interface/menu.swf")));
    }

    #[test]
    fn classifier_partitions_by_extension_table() {
        assert!(settings_for(&RelPath::new("textures/a.DDS")).is_some());
        assert!(settings_for(&RelPath::new("meshes/x.nif")).is_some());
        assert!(settings_for(&RelPath::new("interface/menu.swf")).is_none());
        assert!(settings_for(&RelPath::new("readme")).is_none());

        let settings = settings_for(&RelPath::new("sound/voice/a.fuz")).unwrap();
        assert_eq!(settings.types, ArchiveTypes::SOUNDS);
        assert!(!settings.compress);
    }

    #[tokio::test]
    async fn batches_seal_before_reaching_cap() {
        let packable = packable_of(&[
            ("textures/a.dds", 1_500_000_000),
            ("textures/b.dds", 500_000_000),
            ("textures/c.dds", 1_000_000_000),
        ]);
        let batches = assemble(&packable, 1_900_000_000, 2).await.unwrap();

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].index, 0);
        assert_eq!(batches[0].files.len(), 1);
        assert_eq!(batches[0].total_size, 1_500_000_000);
        assert_eq!(batches[1].index, 1);
        assert_eq!(batches[1].files.len(), 2);
        assert_eq!(batches[1].total_size, 1_500_000_000);
    }

    #[tokio::test]
    async fn oversized_file_gets_its_own_batch() {
        let packable = packable_of(&[
            ("meshes/huge.nif", 3_000_000_000),
            ("meshes/small.nif", 10),
        ]);
        let batches = assemble(&packable, 1_900_000_000, 2).await.unwrap();

        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].files.len(), 1);
        assert!(batches[0].total_size > 1_900_000_000);
        assert_eq!(batches[1].files.len(), 1);
    }

    #[tokio::test]
    async fn every_packable_file_lands_in_exactly_one_batch() {
        let entries: Vec<(String, u64)> = (0..25)
            .map(|i| (format!("textures/{i}.dds"), 400))
            .collect();
        let refs: Vec<(&str, u64)> = entries.iter().map(|(p, s)| (p.as_str(), *s)).collect();
        let packable = packable_of(&refs);

        let batches = assemble(&packable, 1000, 4).await.unwrap();
        let mut seen = Vec::new();
        for batch in &batches {
            assert!(batch.total_size < 1000 || batch.files.len() == 1);
            seen.extend(batch.files.keys().cloned());
        }
        seen.sort();
        let mut expected: Vec<RelPath> = packable.keys().cloned().collect();
        expected.sort();
        assert_eq!(seen, expected);
    }
}
