use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::fs_utils::{
    copy_dir_missing_only, copy_dir_recursive, path_exists_no_follow, remove_path,
};
use crate::layout::{InstallLayout, TemplatesLayout, BASE_FILES, BASE_TREES, MANAGED_DIRS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshMode {
    /// Overwrite everything the templates ship.
    Overwrite,
    /// Keep files the user may have edited; refresh managed trees.
    PreserveUserFiles,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseReport {
    pub copied: Vec<String>,
    pub preserved: Vec<String>,
    pub warnings: Vec<String>,
}

pub fn install_base_files(
    layout: &InstallLayout,
    templates: &TemplatesLayout,
    mode: RefreshMode,
) -> BaseReport {
    let mut report = BaseReport::default();
    let base = templates.base_dir();

    for file in BASE_FILES {
        let src = base.join(file);
        if !src.is_file() {
            tracing::debug!(file, "base template file absent");
            continue;
        }
        let dst = layout.root().join(file);
        if mode == RefreshMode::PreserveUserFiles && path_exists_no_follow(&dst) {
            report.preserved.push(file.to_string());
            continue;
        }
        match fs::copy(&src, &dst) {
            Ok(_) => report.copied.push(file.to_string()),
            Err(err) => report
                .warnings
                .push(format!("failed to copy {file}: {err}")),
        }
    }

    for tree in BASE_TREES {
        let src = base.join(tree);
        if !src.is_dir() {
            continue;
        }
        match copy_dir_recursive(&src, &layout.managed_dir(tree)) {
            Ok(()) => report.copied.push(format!("{tree}/")),
            Err(err) => report
                .warnings
                .push(format!("failed to install {tree}/: {err:#}")),
        }
    }

    report
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentStructureOutcome {
    Installed,
    /// Existing tree kept; only files missing locally were added.
    Merged { added: usize },
    TemplateMissing,
}

pub fn install_agent_structure(
    layout: &InstallLayout,
    templates: &TemplatesLayout,
    mode: RefreshMode,
) -> Result<AgentStructureOutcome> {
    let Some(src) = templates.agent_dir() else {
        return Ok(AgentStructureOutcome::TemplateMissing);
    };
    let dst = layout.agent_dir();

    if mode == RefreshMode::PreserveUserFiles && dst.is_dir() {
        let added = copy_dir_missing_only(&src, &dst)?;
        return Ok(AgentStructureOutcome::Merged { added });
    }

    copy_dir_recursive(&src, &dst)?;
    Ok(AgentStructureOutcome::Installed)
}

pub fn write_version_stamp(layout: &InstallLayout, version: &str) -> Result<PathBuf> {
    let path = layout.version_stamp_path();
    fs::write(&path, format!("{}\n", version.trim()))
        .with_context(|| format!("failed to write version stamp: {}", path.display()))?;
    Ok(path)
}

/// Removes the managed subtrees ahead of a full reinstall. Callers take a
/// backup first.
pub fn clear_managed_subtrees(layout: &InstallLayout) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for dir in MANAGED_DIRS {
        let path = layout.managed_dir(dir);
        if !path_exists_no_follow(&path) {
            continue;
        }
        remove_path(&path)?;
        removed.push(path);
    }
    Ok(removed)
}
