use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use agikit_core::{compare_versions, parse_kit_version, VersionRelation};
use anyhow::{Context, Result};
use regex::Regex;

use crate::layout::InstallLayout;

const INSTRUCTIONS_VERSION_PATTERN: &str = r"(?i)\bversion\b[\s:=]*v?(\d+\.\d+\.\d+)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSource {
    Stamp,
    Instructions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallState {
    pub root: PathBuf,
    pub marker_present: bool,
    pub installed_version: Option<String>,
    pub version_source: Option<VersionSource>,
    pub incoming_version: String,
    pub relation: VersionRelation,
}

impl InstallState {
    pub fn is_clean(&self) -> bool {
        !self.marker_present
    }

    /// Warnings shown before the install/update prompt. Neither blocks.
    pub fn advisories(&self) -> Vec<String> {
        if !self.marker_present {
            return Vec::new();
        }
        match self.relation {
            VersionRelation::Equal => vec![format!(
                "version {} is already installed; reinstalling will overwrite it",
                self.incoming_version
            )],
            VersionRelation::Older => vec![format!(
                "downgrade: installed version {} is newer than {}",
                self.installed_version.as_deref().unwrap_or("unknown"),
                self.incoming_version
            )],
            VersionRelation::Newer | VersionRelation::Unknown => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallDecision {
    /// Nothing installed yet, or non-interactive mode.
    Install,
    /// Refresh managed subtrees, keep user files.
    Update,
    /// Full overwrite after a backup.
    Reinstall,
    Cancel,
}

impl InstallDecision {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Install => "install",
            Self::Update => "update",
            Self::Reinstall => "reinstall",
            Self::Cancel => "cancel",
        }
    }
}

pub fn detect_install_state(
    layout: &InstallLayout,
    incoming_version: &str,
) -> Result<InstallState> {
    let marker_present = layout.instructions_path().is_file();
    let (installed_version, version_source) = if marker_present {
        match read_installed_version(layout)? {
            Some((version, source)) => (Some(version), Some(source)),
            None => (None, None),
        }
    } else {
        (None, None)
    };

    let relation = compare_versions(installed_version.as_deref(), Some(incoming_version));
    tracing::debug!(
        root = %layout.root().display(),
        marker_present,
        installed = ?installed_version,
        incoming = incoming_version,
        relation = relation.as_str(),
        "detected install state"
    );

    Ok(InstallState {
        root: layout.root().to_path_buf(),
        marker_present,
        installed_version,
        version_source,
        incoming_version: incoming_version.to_string(),
        relation,
    })
}

/// Picks the decision without prompting when the situation allows it; the
/// prompt only runs for an existing installation in interactive mode.
pub fn resolve_install_decision(
    state: &InstallState,
    non_interactive: bool,
    prompt: impl FnOnce(&InstallState) -> Result<InstallDecision>,
) -> Result<InstallDecision> {
    if state.is_clean() || non_interactive {
        return Ok(InstallDecision::Install);
    }
    prompt(state)
}

/// The stamp file wins; otherwise the version is scraped from the
/// instructions document. Unparsable values count as absent.
pub fn read_installed_version(
    layout: &InstallLayout,
) -> Result<Option<(String, VersionSource)>> {
    if let Some(raw) = read_optional(&layout.version_stamp_path())? {
        let candidate = raw.trim();
        if let Some(version) = parse_kit_version(candidate) {
            return Ok(Some((version.to_string(), VersionSource::Stamp)));
        }
        tracing::debug!(value = candidate, "ignoring unparsable version stamp");
    }

    let Some(instructions) = read_optional(&layout.instructions_path())? else {
        return Ok(None);
    };
    Ok(scrape_instructions_version(&instructions)?
        .map(|version| (version, VersionSource::Instructions)))
}

pub fn scrape_instructions_version(raw: &str) -> Result<Option<String>> {
    let pattern = Regex::new(INSTRUCTIONS_VERSION_PATTERN)
        .context("invalid instructions version pattern")?;
    let version = pattern
        .captures_iter(raw)
        .filter_map(|captures| captures.get(1))
        .find_map(|found| parse_kit_version(found.as_str()))
        .map(|version| version.to_string());
    Ok(version)
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) if err.kind() == io::ErrorKind::InvalidData => Ok(None),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}
