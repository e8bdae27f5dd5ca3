use std::fs;
use std::io;

use agikit_core::MemorySettings;
use anyhow::{Context, Result};
use regex::{NoExpand, Regex};

use crate::layout::{InstallLayout, TemplatesLayout};

pub const ENV_MARKER_KEY: &str = "MEMORY_ENABLED";
pub const ENV_BLOCK_BEGIN: &str = "# --- agi-agent-kit memory system ---";
pub const ENV_BLOCK_END: &str = "# --- end agi-agent-kit memory system ---";
pub const ENV_MINIMAL_HEADER: &str = "# agi-agent-kit environment configuration\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvMergeOutcome {
    Created { from_template: bool },
    /// Only the marker key line was rewritten.
    Patched,
    Appended,
    Unchanged,
}

impl EnvMergeOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created {
                from_template: true,
            } => "created from template",
            Self::Created {
                from_template: false,
            } => "created",
            Self::Patched => "updated MEMORY_ENABLED",
            Self::Appended => "appended memory settings",
            Self::Unchanged => "unchanged",
        }
    }
}

pub fn render_env_block(settings: &MemorySettings) -> String {
    let mut block = String::new();
    block.push_str(ENV_BLOCK_BEGIN);
    block.push('\n');
    for (key, value) in settings.entries() {
        block.push_str(&format!("{key}={value}\n"));
    }
    block.push_str(ENV_BLOCK_END);
    block.push('\n');
    block
}

fn marker_line_pattern() -> Result<Regex> {
    Regex::new(&format!(r"(?m)^[ \t]*{ENV_MARKER_KEY}[ \t]*=[^\r\n]*"))
        .context("invalid environment marker pattern")
}

fn marker_line(settings: &MemorySettings) -> String {
    format!("{ENV_MARKER_KEY}={}", settings.enabled)
}

/// Pure merge over file content: patch the marker line when present,
/// otherwise append the whole block after the untouched existing bytes.
pub fn merge_env_content(existing: &str, settings: &MemorySettings) -> Result<(String, bool)> {
    let pattern = marker_line_pattern()?;
    if pattern.is_match(existing) {
        let line = marker_line(settings);
        let patched = pattern.replacen(existing, 1, NoExpand(&line)).into_owned();
        return Ok((patched, true));
    }

    let mut merged = String::with_capacity(existing.len() + 256);
    merged.push_str(existing);
    if !existing.is_empty() {
        if !existing.ends_with('\n') {
            merged.push('\n');
        }
        merged.push('\n');
    }
    merged.push_str(&render_env_block(settings));
    Ok((merged, false))
}

/// Creates or patches `<root>/.env` so it holds exactly one memory block.
pub fn merge_environment(
    layout: &InstallLayout,
    templates: &TemplatesLayout,
    settings: &MemorySettings,
) -> Result<EnvMergeOutcome> {
    settings.validate()?;
    let path = layout.env_path();

    let existing = match fs::read_to_string(&path) {
        Ok(raw) => Some(raw),
        Err(err) if err.kind() == io::ErrorKind::NotFound => None,
        Err(err) => {
            return Err(err).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    let (content, outcome) = match existing {
        None => {
            let template = templates.env_template_path();
            let (seed, from_template) = if template.is_file() {
                let raw = fs::read_to_string(&template)
                    .with_context(|| format!("failed to read {}", template.display()))?;
                (raw, true)
            } else {
                (ENV_MINIMAL_HEADER.to_string(), false)
            };
            let (content, _) = merge_env_content(&seed, settings)?;
            (content, EnvMergeOutcome::Created { from_template })
        }
        Some(existing) => {
            let (content, patched) = merge_env_content(&existing, settings)?;
            if content == existing {
                return Ok(EnvMergeOutcome::Unchanged);
            }
            let outcome = if patched {
                EnvMergeOutcome::Patched
            } else {
                EnvMergeOutcome::Appended
            };
            (content, outcome)
        }
    };

    fs::write(&path, content.as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::debug!(path = %path.display(), outcome = outcome.as_str(), "environment merged");
    Ok(outcome)
}
