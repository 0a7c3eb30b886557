//! MO2 manifest parsing and rewriting.
//!
//! `modlist.txt` carries one mod per line, enabled entries prefixed `+`,
//! disabled `-`, separators `*`; entries nearer the top of the file are
//! higher-priority (applied later). `plugins.txt` carries one plugin per
//! line, active entries prefixed `*`, in engine load order.

use std::path::Path;

use tracing::info;

use crate::config::CookerConfig;
use crate::error::{CookError, Result};

/// One enabled mod directory with its resolved priority rank.
///
/// Ranks run 0..N-1 with higher = loads later = wins, so rank N-1 belongs to
/// the mod on the first line of the file.
#[derive(Debug, Clone)]
pub struct ModEntry {
    pub priority: usize,
    pub name: String,
    pub root: std::path::PathBuf,
}

/// One active plugin, in manifest order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plugin {
    pub name: String,
}

/// Read and rank the enabled mods.
pub async fn read_mod_entries(config: &CookerConfig) -> Result<Vec<ModEntry>> {
    let text = read_manifest(&config.src_mod_list).await?;
    let mut names = parse_mod_list(&text, &config.src_mod_list)?;
    names.reverse();
    let mods: Vec<ModEntry> = names
        .into_iter()
        .enumerate()
        .map(|(priority, name)| ModEntry {
            priority,
            root: config.mods_dir.join(&name),
            name,
        })
        .collect();
    info!("found {} enabled mods", mods.len());
    Ok(mods)
}

/// Read the active plugins, keeping manifest order.
pub async fn read_plugins(config: &CookerConfig) -> Result<Vec<Plugin>> {
    let text = read_manifest(&config.plugins_path).await?;
    let plugins = parse_plugin_list(&text, &config.plugins_path)?;
    info!("found {} plugins", plugins.len());
    Ok(plugins)
}

async fn read_manifest(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| CookError::io(path, e))?;
    String::from_utf8(bytes).map_err(|_| CookError::MalformedManifest {
        path: path.to_path_buf(),
        line: 0,
    })
}

/// Enabled mod names in file order (top first).
pub fn parse_mod_list(text: &str, path: &Path) -> Result<Vec<String>> {
    let malformed = |line| CookError::MalformedManifest {
        path: path.to_path_buf(),
        line,
    };
    let mut names = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut chars = line.chars();
        let prefix = chars.next();
        let name = chars.as_str();
        match prefix {
            Some('+' | '-' | '*') => {
                if name.is_empty() {
                    return Err(malformed(idx + 1));
                }
                if prefix == Some('+') {
                    names.push(name.to_string());
                }
            }
            _ => return Err(malformed(idx + 1)),
        }
    }
    Ok(names)
}

/// Active plugins in file order. Unprefixed lines are inactive plugins and
/// are skipped.
pub fn parse_plugin_list(text: &str, path: &Path) -> Result<Vec<Plugin>> {
    let mut plugins = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim_end_matches('\r');
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(name) = line.strip_prefix('*') {
            if name.is_empty() {
                return Err(CookError::MalformedManifest {
                    path: path.to_path_buf(),
                    line: idx + 1,
                });
            }
            plugins.push(Plugin {
                name: name.to_string(),
            });
        }
    }
    Ok(plugins)
}

/// Write the cooked profile's `modlist.txt`: one entry per loose partition,
/// the archive mod itself, and the DLC markers the engine expects.
pub async fn write_cooked_mod_list(config: &CookerConfig, partitions: usize) -> Result<()> {
    let mut lines: Vec<String> = (0..partitions)
        .map(|idx| format!("+{}", config.partition_name(idx)))
        .collect();
    lines.push(format!("+{}", config.cooked_mod_name()));
    lines.push("*DLC: Dawnguard".to_string());
    lines.push("*DLC: Dragonborn".to_string());
    lines.push("*DLC: HearthFires".to_string());

    let path = config.cooked_profile_dir.join("modlist.txt");
    tokio::fs::write(&path, lines.join("\n") + "\n")
        .await
        .map_err(|e| CookError::io(&path, e))
}

/// Append one active entry per emitted archive to the cooked profile's
/// `plugins.txt`, preserving whatever the profile copy brought along.
pub async fn append_cooked_plugins(config: &CookerConfig, batches: usize) -> Result<()> {
    let path = config.cooked_profile_dir.join("plugins.txt");
    let existing = read_manifest(&path).await?;
    let mut lines: Vec<String> = existing.lines().map(str::to_string).collect();
    lines.extend((0..batches).map(|idx| format!("*Cooked{idx}.esp")));
    tokio::fs::write(&path, lines.join("\n") + "\n")
        .await
        .map_err(|e| CookError::io(&path, e))
}
