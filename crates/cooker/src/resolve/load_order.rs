//! The layered resolver.
//!
//! Computes, for every logical path, the single file the engine would see
//! after applying the whole mod stack. Resolution runs in two strict phases:
//!
//! 1. *Archive phase*: walk the active plugins in manifest order; for each,
//!    find its companion archives by naming convention and write every entry
//!    into the table. Later plugins and later-ordered companion suffixes
//!    overwrite earlier ones.
//! 2. *Loose-file phase*: write every path's highest-priority loose
//!    candidate, unconditionally overwriting archive entries. A loose file
//!    always beats the same path packed inside an archive, independent of
//!    load order.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::error::{CookError, Result};
use crate::manifest::Plugin;
use crate::paths::RelPath;
use crate::resolve::file::{DiskFile, ResolvedFile};
use crate::resolve::index::ArchiveIndex;

/// Companion archive name suffixes, tested per plugin in this exact order.
/// Later entries override earlier ones for colliding paths.
pub const COMPANION_SUFFIXES: &[&str] = &[
    ".bsa",
    " - Textures.bsa",
    " - Meshes.bsa",
    " - Misc.bsa",
    " - Sounds.bsa",
    " - Music.bsa",
    " - Animations.bsa",
];

/// Extensions that never occupy a load-order slot: archive containers,
/// mod-manager hidden-file markers, and script sources.
pub const IGNORED_EXTENSIONS: &[&str] = &["bsa", "mohidden", "psc"];

fn is_ignored(path: &RelPath) -> bool {
    matches!(path.extension(), Some(ext) if IGNORED_EXTENSIONS.contains(&ext))
}

/// All loose candidates per path, grouped and ordered by descending mod
/// priority; index 0 of each group is the loose-file winner.
#[derive(Debug, Default)]
pub struct PathTable {
    inner: IndexMap<RelPath, Vec<Arc<DiskFile>>>,
}

impl PathTable {
    pub fn build(files: &[Arc<DiskFile>]) -> Self {
        let mut sorted: Vec<Arc<DiskFile>> = files.to_vec();
        sorted.sort_by(|a, b| b.priority().cmp(&a.priority()));

        let mut inner: IndexMap<RelPath, Vec<Arc<DiskFile>>> = IndexMap::new();
        for file in sorted {
            inner.entry(file.path().clone()).or_default().push(file);
        }
        Self { inner }
    }

    /// The highest-priority candidate for a path.
    pub fn winner(&self, path: &RelPath) -> Option<&Arc<DiskFile>> {
        self.inner.get(path).and_then(|group| group.first())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RelPath, &[Arc<DiskFile>])> {
        self.inner.iter().map(|(k, v)| (k, v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// The canonical path → winning-file mapping, in resolution order.
#[derive(Debug, Default)]
pub struct LoadOrder {
    inner: IndexMap<RelPath, ResolvedFile>,
}

impl LoadOrder {
    pub fn get(&self, path: &RelPath) -> Option<&ResolvedFile> {
        self.inner.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RelPath, &ResolvedFile)> {
        self.inner.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = &ResolvedFile> {
        self.inner.values()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Companion archives of one plugin, in suffix test order.
fn companion_archives<'a>(
    plugin: &Plugin,
    table: &'a PathTable,
) -> Vec<&'a Arc<DiskFile>> {
    let base = RelPath::new(&plugin.name).strip_extension().to_string();
    COMPANION_SUFFIXES
        .iter()
        .filter_map(|suffix| {
            let candidate = RelPath::new(format!("{base}{suffix}"));
            let found = table.winner(&candidate);
            if let Some(archive) = found {
                info!("using {} for {}", archive.path(), plugin.name);
            }
            found
        })
        .collect()
}

/// Build the load order from the frozen path table and archive index.
pub fn resolve(
    plugins: &[Plugin],
    table: &PathTable,
    index: &ArchiveIndex,
) -> Result<LoadOrder> {
    let mut order: IndexMap<RelPath, ResolvedFile> = IndexMap::new();

    // Phase A: archive contents, plugin by plugin in manifest order.
    for plugin in plugins {
        let plugin_path = RelPath::new(&plugin.name);
        let source = table
            .winner(&plugin_path)
            .ok_or_else(|| CookError::MissingPluginSource {
                plugin: plugin.name.clone(),
            })?;
        debug!("plugin {} resolved to priority {}", plugin.name, source.priority());

        for archive in companion_archives(plugin, table) {
            let Some(contents) = index.contents_of(archive) else {
                continue;
            };
            for file in contents {
                if is_ignored(file.path()) {
                    continue;
                }
                order.insert(file.path().clone(), ResolvedFile::Archived(file.clone()));
            }
        }
    }

    // Phase B: loose winners overwrite everything.
    for (path, group) in table.iter() {
        if is_ignored(path) {
            continue;
        }
        order.insert(path.clone(), ResolvedFile::Disk(group[0].clone()));
    }

    let order = LoadOrder { inner: order };
    log_summary(&order);
    Ok(order)
}

fn log_summary(order: &LoadOrder) {
    let on_disk = order.values().filter(|f| f.is_disk()).count();
    info!("full load order resolved, {} files in load", order.len());
    info!("{on_disk} files on disk");
    info!("{} files in archives", order.len() - on_disk);

    let mut by_ext: HashMap<&str, (usize, usize)> = HashMap::new();
    for file in order.values() {
        let ext = file.path().extension().unwrap_or("");
        let counts = by_ext.entry(ext).or_default();
        counts.0 += 1;
        if file.is_disk() {
            counts.1 += 1;
        }
    }
    let mut ranked: Vec<(&str, (usize, usize))> = by_ext.into_iter().collect();
    ranked.sort_by(|a, b| b.1.0.cmp(&a.1.0));
    for (ext, (total, disk)) in ranked {
        info!("{total} .{ext} files ({disk} on disk)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    use crate::bsa::{ArchiveSource, BsaError, EntryRef};
    use crate::resolve::file::ArchiveFile;

    #[derive(Debug)]
    struct NoSource;

    impl ArchiveSource for NoSource {
        fn extract(&self, entry: &EntryRef) -> std::result::Result<Vec<u8>, BsaError> {
            let _ = entry;
            Err(BsaError::MissingEntry("fake".into()))
        }
    }

    fn disk(priority: usize, path: &str) -> Arc<DiskFile> {
        Arc::new(DiskFile::with_size(
            priority,
            RelPath::new(path),
            PathBuf::from(format!("/mods/{priority}/{path}")),
            16,
        ))
    }

    fn archived(owner: &Arc<DiskFile>, path: &str) -> Arc<ArchiveFile> {
        Arc::new(ArchiveFile::new(
            RelPath::new(path),
            8,
            Arc::clone(owner),
            Arc::new(NoSource),
            EntryRef::for_tests(path),
        ))
    }

    fn plugin(name: &str) -> Plugin {
        Plugin { name: name.into() }
    }

    #[test]
    fn higher_priority_loose_file_wins() {
        let files = vec![
            disk(0, "textures/rock.dds"),
            disk(1, "textures/rock.dds"),
        ];
        let table = PathTable::build(&files);
        let order = resolve(&[], &table, &ArchiveIndex::default()).unwrap();

        let winner = order.get(&RelPath::new("textures/rock.dds")).unwrap();
        assert_eq!(winner.priority(), 1);
    }

    #[test]
    fn archive_entry_resolves_when_no_loose_override() {
        let esp = disk(0, "Test.esp");
        let bsa = disk(0, "Test - Meshes.bsa");
        let files = vec![esp, bsa.clone()];
        let table = PathTable::build(&files);

        let mut index = ArchiveIndex::default();
        index.insert(&bsa, vec![archived(&bsa, "meshes/x.nif")]);

        let order = resolve(&[plugin("Test.esp")], &table, &index).unwrap();
        let winner = order.get(&RelPath::new("meshes/x.nif")).unwrap();
        assert!(matches!(winner, ResolvedFile::Archived(_)));
    }

    #[test]
    fn loose_file_beats_archived_entry_regardless_of_priority() {
        let esp = disk(5, "Test.esp");
        let bsa = disk(5, "Test.bsa");
        let loose = disk(0, "meshes/x.nif");
        let table = PathTable::build(&[esp, bsa.clone(), loose]);

        let mut index = ArchiveIndex::default();
        index.insert(&bsa, vec![archived(&bsa, "meshes/x.nif")]);

        let order = resolve(&[plugin("Test.esp")], &table, &index).unwrap();
        let winner = order.get(&RelPath::new("meshes/x.nif")).unwrap();
        assert!(winner.is_disk());
        assert_eq!(winner.priority(), 0);
    }

    #[test]
    fn later_plugin_archive_wins_between_archives() {
        let a_esp = disk(0, "A.esp");
        let a_bsa = disk(0, "A.bsa");
        let b_esp = disk(1, "B.esp");
        let b_bsa = disk(1, "B.bsa");
        let table = PathTable::build(&[a_esp, a_bsa.clone(), b_esp, b_bsa.clone()]);

        let mut index = ArchiveIndex::default();
        index.insert(&a_bsa, vec![archived(&a_bsa, "sound/fx/a.wav")]);
        index.insert(&b_bsa, vec![archived(&b_bsa, "sound/fx/a.wav")]);

        // B.esp is later in the plugin manifest, so its archive wins.
        let order = resolve(&[plugin("A.esp"), plugin("B.esp")], &table, &index).unwrap();
        let winner = order.get(&RelPath::new("sound/fx/a.wav")).unwrap();
        assert_eq!(winner.priority(), 1);
    }

    #[test]
    fn later_companion_suffix_wins_within_one_plugin() {
        let esp = disk(0, "Test.esp");
        let plain = disk(0, "Test.bsa");
        let meshes = disk(0, "Test - Meshes.bsa");
        let table = PathTable::build(&[esp, plain.clone(), meshes.clone()]);

        let mut index = ArchiveIndex::default();
        index.insert(&plain, vec![archived(&plain, "meshes/x.nif")]);
        index.insert(&meshes, vec![archived(&meshes, "meshes/x.nif")]);

        let order = resolve(&[plugin("Test.esp")], &table, &index).unwrap();
        let winner = order.get(&RelPath::new("meshes/x.nif")).unwrap();
        match winner {
            ResolvedFile::Archived(f) => {
                assert_eq!(f.owner().path(), &RelPath::new("Test - Meshes.bsa"));
            }
            other => panic!("expected archived winner, got {other:?}"),
        }
    }

    #[test]
    fn missing_plugin_source_is_fatal() {
        let table = PathTable::build(&[disk(0, "Other.esp")]);
        let err = resolve(&[plugin("Test.esp")], &table, &ArchiveIndex::default()).unwrap_err();
        assert!(matches!(err, CookError::MissingPluginSource { .. }));
    }

    #[test]
    fn ignored_extensions_never_enter_the_load_order() {
        let esp = disk(0, "Test.esp");
        let bsa = disk(0, "Test.bsa");
        let table = PathTable::build(&[
            esp,
            bsa.clone(),
            disk(0, "scripts/source/a.psc"),
            disk(0, "textures/hidden.dds.mohidden"),
        ]);

        let mut index = ArchiveIndex::default();
        index.insert(
            &bsa,
            vec![
                archived(&bsa, "scripts/source/b.psc"),
                archived(&bsa, "meshes/ok.nif"),
            ],
        );

        let order = resolve(&[plugin("Test.esp")], &table, &index).unwrap();
        assert!(order.get(&RelPath::new("Test.bsa")).is_none());
        assert!(order.get(&RelPath::new("scripts/source/a.psc")).is_none());
        assert!(order.get(&RelPath::new("scripts/source/b.psc")).is_none());
        assert!(order.get(&RelPath::new("textures/hidden.dds.mohidden")).is_none());
        assert!(order.get(&RelPath::new("meshes/ok.nif")).is_some());
        assert!(order.get(&RelPath::new("Test.esp")).is_some());
    }

    #[test]
    fn resolution_order_is_archive_phase_then_loose_phase() {
        let esp = disk(0, "Test.esp");
        let bsa = disk(0, "Test.bsa");
        let loose = disk(0, "textures/z.dds");
        let table = PathTable::build(&[esp, bsa.clone(), loose]);

        let mut index = ArchiveIndex::default();
        index.insert(
            &bsa,
            vec![
                archived(&bsa, "meshes/a.nif"),
                archived(&bsa, "meshes/b.nif"),
            ],
        );

        let order = resolve(&[plugin("Test.esp")], &table, &index).unwrap();
        let keys: Vec<&str> = order.iter().map(|(k, _)| k.as_str()).collect();
        // Archive-phase insertions first (codec order), then loose-phase
        // first-seen order for paths not already present.
        assert_eq!(keys[0], "meshes/a.nif");
        assert_eq!(keys[1], "meshes/b.nif");
        assert!(keys.contains(&"textures/z.dds"));
        assert!(keys.contains(&"test.esp"));
    }
}
