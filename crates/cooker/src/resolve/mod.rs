//! Resolution stage: enumeration, archive indexing, and the layered resolver
//! that computes the single winning file per path.

pub mod enumerate;
pub mod file;
pub mod index;
pub mod load_order;

pub use enumerate::enumerate_mods;
pub use file::{ArchiveFile, DiskFile, FileStream, ResolvedFile};
pub use index::{ArchiveIndex, CONTAINER_EXTENSION};
pub use load_order::{LoadOrder, PathTable, resolve, COMPANION_SUFFIXES, IGNORED_EXTENSIONS};
