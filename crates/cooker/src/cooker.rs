//! The pipeline orchestrator.

use tracing::info;

use crate::batch::{self, Batch, Split};
use crate::config::CookerConfig;
use crate::emit;
use crate::error::{CookError, Result};
use crate::manifest::{self, ModEntry, Plugin};
use crate::resolve::{self, ArchiveIndex, LoadOrder, PathTable};
use crate::util;

/// Frozen result of the analysis stage: every input inventoried and resolved
/// down to one winning file per path.
#[derive(Debug)]
pub struct Analysis {
    pub mods: Vec<ModEntry>,
    pub plugins: Vec<Plugin>,
    pub path_table: PathTable,
    pub archive_index: ArchiveIndex,
    pub load_order: LoadOrder,
}

/// The cook plan: what goes into archives, batch by batch, and what stays
/// loose.
#[derive(Debug)]
pub struct CookPlan {
    pub batches: Vec<Batch>,
    pub split: Split,
}

/// Drives the full cooking pipeline against one configuration.
pub struct Cooker {
    config: CookerConfig,
}

impl Cooker {
    pub fn new(config: CookerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CookerConfig {
        &self.config
    }

    /// Read manifests, enumerate mods, index archives, and resolve the load
    /// order.
    pub async fn analyze(&self) -> Result<Analysis> {
        let mods = manifest::read_mod_entries(&self.config).await?;
        let plugins = manifest::read_plugins(&self.config).await?;

        info!("resolving all disk files");
        let files = resolve::enumerate_mods(&mods, self.config.concurrency).await?;
        info!("resolved {} disk files", files.len());

        info!("reading archive contents");
        let archive_index = ArchiveIndex::build(&files, self.config.concurrency).await?;

        info!("ordering {} files by mod order", files.len());
        let path_table = PathTable::build(&files);

        info!("resolving {} plugins", plugins.len());
        let load_order = resolve::resolve(&plugins, &path_table, &archive_index)?;

        info!("calculating size");
        let sizes = util::pmap(
            load_order.values().cloned().collect::<Vec<_>>(),
            self.config.concurrency,
            |file| async move { file.size().await },
        )
        .await?;
        let total: u64 = sizes.iter().sum();
        info!("total size: {}", util::format_size(total));

        Ok(Analysis {
            mods,
            plugins,
            path_table,
            archive_index,
            load_order,
        })
    }

    /// Split the load order and assemble the packable half into batches.
    pub async fn plan(&self, analysis: &Analysis) -> Result<CookPlan> {
        let split = batch::classify(&analysis.load_order);
        let batches = batch::assemble(
            &split.packable,
            self.config.max_batch_size,
            self.config.concurrency,
        )
        .await?;
        Ok(CookPlan { batches, split })
    }

    /// Create the output mod and profile directories.
    pub async fn create_output_folders(&self) -> Result<()> {
        for dir in [&self.config.cooked_mod_dir, &self.config.cooked_profile_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| CookError::io(dir, e))?;
        }
        Ok(())
    }

    /// Emit every artifact: archives, placeholder plugins, loose partitions,
    /// the copied profile, and the rewritten manifests.
    pub async fn build(&self, plan: &CookPlan) -> Result<()> {
        emit::emit_archives(&plan.batches, &self.config).await?;

        let partitions = emit::write_loose_partitions(&plan.split.loose, &self.config).await?;

        emit::copy_profile(&self.config).await?;
        manifest::write_cooked_mod_list(&self.config, partitions).await?;
        manifest::append_cooked_plugins(&self.config, plan.batches.len()).await?;

        info!("cook complete");
        Ok(())
    }

    /// Run the whole pipeline in order.
    pub async fn run(&self) -> Result<()> {
        let analysis = self.analyze().await?;
        let plan = self.plan(&analysis).await?;
        self.create_output_folders().await?;
        self.build(&plan).await
    }
}
