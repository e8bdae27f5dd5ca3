use std::fs;
use std::path::{Path, PathBuf};

use agikit_core::InstallScope;
use anyhow::{Context, Result};

use crate::fs_utils::{
    create_symlink, is_symlink, path_exists_no_follow, relative_path, remove_symlink,
};
use crate::layout::{HomeDirs, InstallLayout, INSTRUCTION_ALIASES, PLATFORM_LINKS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    InstructionAlias,
    PlatformSkills,
}

/// A link the manager maintains, re-derived on every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLink {
    pub kind: LinkKind,
    pub label: String,
    pub link: PathBuf,
    pub target: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    Created,
    Refreshed,
    /// A real file or directory occupies the path; left untouched.
    SkippedRealPath,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkOutcome {
    pub planned: PlannedLink,
    pub action: LinkAction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymlinkReport {
    pub outcomes: Vec<LinkOutcome>,
    pub warnings: Vec<String>,
}

impl SymlinkReport {
    pub fn count(&self, action: &LinkAction) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| &outcome.action == action)
            .count()
    }
}

pub fn instruction_alias_links(layout: &InstallLayout) -> Vec<PlannedLink> {
    INSTRUCTION_ALIASES
        .iter()
        .map(|alias| PlannedLink {
            kind: LinkKind::InstructionAlias,
            label: (*alias).to_string(),
            link: layout.alias_path(alias),
            target: layout.instructions_path(),
        })
        .collect()
}

pub fn platform_links_for(
    layout: &InstallLayout,
    scope: InstallScope,
    homes: &HomeDirs,
) -> Vec<PlannedLink> {
    PLATFORM_LINKS
        .iter()
        .map(|platform| PlannedLink {
            kind: LinkKind::PlatformSkills,
            label: platform.display_name.to_string(),
            link: layout.platform_link_path(platform, scope, homes),
            target: layout.skills_dir(),
        })
        .collect()
}

/// Creates or refreshes every instruction alias and platform skills link.
/// Existing symlinks are replaced; real files and directories never are.
pub fn sync_symlinks(
    layout: &InstallLayout,
    scope: InstallScope,
    homes: &HomeDirs,
) -> SymlinkReport {
    let mut report = SymlinkReport::default();

    if layout.instructions_path().is_file() {
        for planned in instruction_alias_links(layout) {
            let outcome = sync_link(planned, false);
            record(&mut report, outcome);
        }
    } else {
        report.warnings.push(format!(
            "{} not found, skipping instruction aliases",
            layout.instructions_path().display()
        ));
    }

    if layout.skills_dir().is_dir() {
        for planned in platform_links_for(layout, scope, homes) {
            let outcome = sync_link(planned, true);
            record(&mut report, outcome);
        }
    } else {
        report.warnings.push(format!(
            "{} not found, skipping platform skill links",
            layout.skills_dir().display()
        ));
    }

    report
}

fn record(report: &mut SymlinkReport, outcome: LinkOutcome) {
    match &outcome.action {
        LinkAction::SkippedRealPath => report.warnings.push(format!(
            "{} exists and is not a symlink, left untouched",
            outcome.planned.link.display()
        )),
        LinkAction::Failed(reason) => report.warnings.push(format!(
            "failed to link {} ({}): {reason}",
            outcome.planned.link.display(),
            outcome.planned.label
        )),
        LinkAction::Created | LinkAction::Refreshed => {}
    }
    report.outcomes.push(outcome);
}

fn sync_link(planned: PlannedLink, is_dir: bool) -> LinkOutcome {
    let action = match replace_link(&planned.link, &planned.target, is_dir) {
        Ok(action) => action,
        Err(err) => {
            tracing::warn!(link = %planned.link.display(), error = %err, "symlink sync failed");
            LinkAction::Failed(format!("{err:#}"))
        }
    };
    tracing::debug!(link = %planned.link.display(), ?action, "symlink synced");
    LinkOutcome { planned, action }
}

fn replace_link(link: &Path, target: &Path, is_dir: bool) -> Result<LinkAction> {
    let parent = link
        .parent()
        .with_context(|| format!("link path has no parent: {}", link.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;

    let mut action = LinkAction::Created;
    if path_exists_no_follow(link) {
        if !is_symlink(link) {
            return Ok(LinkAction::SkippedRealPath);
        }
        remove_symlink(link)?;
        action = LinkAction::Refreshed;
    }

    create_symlink(&relative_path(parent, target), link, is_dir)?;
    Ok(action)
}
