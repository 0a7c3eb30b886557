//! Pipeline configuration.
//!
//! Every filesystem location is derived from the one user-supplied path: the
//! profile's `modlist.txt` inside an MO2 install. The layout convention is
//! `<root>/profiles/<profile>/modlist.txt` with mods under `<root>/mods`.

use std::path::{Path, PathBuf};

use crate::error::{CookError, Result};

/// Default cap on the byte size of one output archive, kept under the archive
/// format's addressable limit.
pub const DEFAULT_MAX_BATCH_SIZE: u64 = 1_900_000_000;

/// Default maximum number of entries per loose-file output directory.
pub const DEFAULT_LOOSE_PARTITION_SIZE: usize = 1000;

/// Configuration for a cooking run.
#[derive(Debug, Clone)]
pub struct CookerConfig {
    /// The source profile's `modlist.txt`.
    pub src_mod_list: PathBuf,
    /// MO2 install root (three levels above the modlist).
    pub root_dir: PathBuf,
    /// The source profile directory.
    pub profile_dir: PathBuf,
    /// The source profile's `plugins.txt`.
    pub plugins_path: PathBuf,
    /// Directory holding one subdirectory per mod.
    pub mods_dir: PathBuf,
    /// Name of the source profile.
    pub profile_name: String,
    /// Output mod directory receiving the packed archives.
    pub cooked_mod_dir: PathBuf,
    /// Output profile directory receiving the rewritten manifests.
    pub cooked_profile_dir: PathBuf,
    /// Seal a batch before its size would reach this many bytes.
    pub max_batch_size: u64,
    /// Maximum number of files per loose-file partition directory.
    pub loose_partition_size: usize,
    /// Concurrency limit for each parallel pipeline stage.
    pub concurrency: usize,
}

impl CookerConfig {
    /// Derive the full filesystem layout from a profile's `modlist.txt` path.
    pub fn from_mod_list(src_mod_list: impl Into<PathBuf>) -> Result<Self> {
        let src_mod_list = src_mod_list.into();
        let invalid = || CookError::InvalidLayout {
            path: src_mod_list.clone(),
        };

        let profile_dir = src_mod_list.parent().ok_or_else(invalid)?.to_path_buf();
        let profile_name = profile_dir
            .file_name()
            .ok_or_else(invalid)?
            .to_string_lossy()
            .into_owned();
        let root_dir = profile_dir
            .parent()
            .and_then(Path::parent)
            .ok_or_else(invalid)?
            .to_path_buf();

        let plugins_path = profile_dir.join("plugins.txt");
        let mods_dir = root_dir.join("mods");
        let cooked_mod_dir = mods_dir.join(format!("{profile_name} Cooked"));
        let cooked_profile_dir = root_dir
            .join("profiles")
            .join(format!("{profile_name} Cooked"));

        Ok(Self {
            src_mod_list,
            root_dir,
            profile_dir,
            plugins_path,
            mods_dir,
            profile_name,
            cooked_mod_dir,
            cooked_profile_dir,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            loose_partition_size: DEFAULT_LOOSE_PARTITION_SIZE,
            concurrency: default_concurrency(),
        })
    }

    /// Output path of the packed archive for batch `index`.
    pub fn archive_path(&self, index: usize) -> PathBuf {
        self.cooked_mod_dir.join(format!("Cooked{index}.bsa"))
    }

    /// Output path of the placeholder plugin for batch `index`.
    pub fn plugin_path(&self, index: usize) -> PathBuf {
        self.cooked_mod_dir.join(format!("Cooked{index}.esp"))
    }

    /// Name of the loose-file partition mod at `index`.
    pub fn partition_name(&self, index: usize) -> String {
        format!("{} Cooked_{index}", self.profile_name)
    }

    /// Output directory of the loose-file partition at `index`.
    pub fn partition_dir(&self, index: usize) -> PathBuf {
        self.mods_dir.join(self.partition_name(index))
    }

    /// Name of the output mod holding the packed archives.
    pub fn cooked_mod_name(&self) -> String {
        format!("{} Cooked", self.profile_name)
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(usize::from)
        .unwrap_or(8)
}
