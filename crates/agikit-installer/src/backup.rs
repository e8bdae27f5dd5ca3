use std::fs;
use std::path::{Path, PathBuf};

use agikit_core::InstallScope;
use anyhow::{Context, Result};
use chrono::Utc;

use crate::fs_utils::{copy_path, is_symlink, path_exists_no_follow};
use crate::layout::{
    HomeDirs, InstallLayout, ENV_FILE, GLOBAL_ROOT_DIR, INSTRUCTIONS_FILE, INSTRUCTION_ALIASES,
    MANAGED_DIRS, PLATFORM_LINKS, VERSION_STAMP_FILE,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupItem {
    pub source: PathBuf,
    /// Location inside the backup directory.
    pub rel_dest: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupPlan {
    pub backup_dir: PathBuf,
    pub items: Vec<BackupItem>,
}

impl BackupPlan {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupReport {
    pub backup_dir: PathBuf,
    pub copied: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

pub fn backup_timestamp() -> String {
    Utc::now().format("%Y%m%d-%H%M%S").to_string()
}

/// Project backups sit next to the install; global ones in the home dir.
pub fn backup_dir_for(
    layout: &InstallLayout,
    scope: InstallScope,
    homes: &HomeDirs,
    timestamp: &str,
) -> PathBuf {
    match scope {
        InstallScope::Project => layout.root().join(format!(".agi-backup-{timestamp}")),
        InstallScope::Global => homes
            .home
            .join(format!("{GLOBAL_ROOT_DIR}-backup-{timestamp}")),
    }
}

/// Lists every watched path that currently exists. In global scope a real
/// platform skills directory is about to be replaced by a link, so it is
/// watched too; an existing link there is not.
pub fn plan_backup(
    layout: &InstallLayout,
    scope: InstallScope,
    homes: &HomeDirs,
    timestamp: &str,
) -> BackupPlan {
    let mut watched: Vec<&str> = vec![INSTRUCTIONS_FILE];
    watched.extend(INSTRUCTION_ALIASES);
    watched.push(ENV_FILE);
    watched.push(VERSION_STAMP_FILE);
    watched.extend(MANAGED_DIRS);

    let mut items: Vec<BackupItem> = watched
        .into_iter()
        .map(|name| BackupItem {
            source: layout.root().join(name),
            rel_dest: PathBuf::from(name),
        })
        .filter(|item| path_exists_no_follow(&item.source))
        .collect();

    if scope.is_global() {
        for platform in &PLATFORM_LINKS {
            let link = layout.platform_link_path(platform, scope, homes);
            if !link.exists() || is_symlink(&link) {
                continue;
            }
            items.push(BackupItem {
                source: link,
                rel_dest: PathBuf::from("platforms").join(platform.id).join("skills"),
            });
        }
    }

    BackupPlan {
        backup_dir: backup_dir_for(layout, scope, homes, timestamp),
        items,
    }
}

/// Copies every planned item into a fresh backup directory. One failed item
/// does not stop the others. The originals are never modified.
pub fn run_backup(plan: &BackupPlan) -> Result<BackupReport> {
    let backup_dir = unique_backup_dir(&plan.backup_dir);
    fs::create_dir_all(&backup_dir)
        .with_context(|| format!("failed to create backup dir: {}", backup_dir.display()))?;

    let mut report = BackupReport {
        backup_dir: backup_dir.clone(),
        copied: Vec::new(),
        warnings: Vec::new(),
    };
    for item in &plan.items {
        let dest = backup_dir.join(&item.rel_dest);
        match copy_path(&item.source, &dest) {
            Ok(()) => {
                tracing::debug!(source = %item.source.display(), "backed up");
                report.copied.push(item.source.clone());
            }
            Err(err) => {
                tracing::warn!(source = %item.source.display(), error = %err, "backup item failed");
                report.warnings.push(format!(
                    "failed to back up {}: {err:#}",
                    item.source.display()
                ));
            }
        }
    }
    Ok(report)
}

fn unique_backup_dir(preferred: &Path) -> PathBuf {
    if !path_exists_no_follow(preferred) {
        return preferred.to_path_buf();
    }
    let base = preferred.display().to_string();
    (1..)
        .map(|n| PathBuf::from(format!("{base}-{n}")))
        .find(|candidate| !path_exists_no_follow(candidate))
        .unwrap_or_else(|| preferred.to_path_buf())
}
