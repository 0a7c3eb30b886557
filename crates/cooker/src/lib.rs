//! Cooker
//!
//! Consolidates an MO2 load order into a handful of packed BSA archives plus
//! a small loose-file overlay, suitable for shipping as one self-contained
//! installation.
//!
//! The pipeline enumerates every enabled mod's files, indexes every archive
//! container, resolves the single engine-visible winner per path (archive
//! contents by plugin order, then loose files on top), packs the known asset
//! extensions into size-bounded archives, and writes the remainder as
//! partitioned loose-file mods with a rewritten profile.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use cooker::{Cooker, CookerConfig};
//!
//! # async fn example() -> cooker::Result<()> {
//! let config = CookerConfig::from_mod_list(
//!     "/mo2/profiles/Living Skyrim/modlist.txt",
//! )?;
//! Cooker::new(config).run().await?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod bsa;
pub mod config;
pub mod cooker;
pub mod emit;
pub mod error;
pub mod manifest;
pub mod paths;
pub mod resolve;
pub mod util;

pub use batch::{Batch, BatchSettings, Split};
pub use config::CookerConfig;
pub use cooker::{Analysis, CookPlan, Cooker};
pub use error::{CookError, Result};
pub use manifest::{ModEntry, Plugin};
pub use paths::RelPath;
pub use resolve::{ArchiveIndex, LoadOrder, PathTable, ResolvedFile};
