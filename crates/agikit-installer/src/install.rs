use std::path::PathBuf;

use agikit_core::{InstallScope, MemorySettings, Pack};
use anyhow::{anyhow, Context, Result};

use crate::backup::{run_backup, BackupPlan, BackupReport};
use crate::base::{
    clear_managed_subtrees, install_agent_structure, install_base_files, write_version_stamp,
    AgentStructureOutcome, BaseReport, RefreshMode,
};
use crate::detect::{InstallDecision, InstallState};
use crate::environment::{merge_environment, EnvMergeOutcome};
use crate::layout::{HomeDirs, InstallLayout, TemplatesLayout};
use crate::skills::{apply_skill_plan, plan_skills, PlannedSkill, SkillInstallReport, SkillPlan};
use crate::symlinks::{sync_symlinks, SymlinkReport};
use crate::uninstall::write_uninstall_script;

/// Everything the engine needs, already resolved by the caller. Building one
/// never prompts.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    pub layout: InstallLayout,
    pub templates: TemplatesLayout,
    pub scope: InstallScope,
    pub homes: HomeDirs,
    pub decision: InstallDecision,
    pub pack: Pack,
    pub memory: MemorySettings,
    pub symlinks: bool,
    pub version: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupPolicy {
    None,
    /// Offer the backup; the caller confirms (auto-confirmed when non-interactive).
    Confirm,
    Unconditional,
}

/// Reinstall always backs up; update and a non-interactive install over an
/// existing tree ask first; a clean install has nothing to save.
pub fn backup_policy(decision: InstallDecision, state: &InstallState) -> BackupPolicy {
    match decision {
        InstallDecision::Reinstall => BackupPolicy::Unconditional,
        InstallDecision::Update => BackupPolicy::Confirm,
        InstallDecision::Install if state.marker_present => BackupPolicy::Confirm,
        InstallDecision::Install | InstallDecision::Cancel => BackupPolicy::None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentStep {
    Merged(EnvMergeOutcome),
    /// Update keeps the user's file as-is.
    Preserved,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub decision: InstallDecision,
    pub backup: Option<BackupReport>,
    pub cleared: Vec<PathBuf>,
    pub base: BaseReport,
    pub version_stamp: PathBuf,
    pub skills: SkillInstallReport,
    pub agent: Option<AgentStructureOutcome>,
    pub environment: EnvironmentStep,
    pub symlinks: Option<SymlinkReport>,
    pub uninstall_script: Option<PathBuf>,
    pub warnings: Vec<String>,
}

/// Progress hooks for long steps. Defaults do nothing.
pub trait InstallObserver {
    fn skills_planned(&mut self, _plan: &SkillPlan) {}
    fn skill_processed(&mut self, _skill: &PlannedSkill) {}
    fn skills_finished(&mut self, _report: &SkillInstallReport) {}
}

pub struct NoopObserver;

impl InstallObserver for NoopObserver {}

pub fn execute_install(
    request: &InstallRequest,
    backup: Option<&BackupPlan>,
    observer: &mut dyn InstallObserver,
) -> Result<InstallOutcome> {
    if request.decision == InstallDecision::Cancel {
        return Err(anyhow!("cancelled installs must not reach the engine"));
    }
    if !request.templates.exists() {
        return Err(anyhow!(
            "templates directory not found: {}",
            request.templates.root().display()
        ));
    }

    let layout = &request.layout;
    std::fs::create_dir_all(layout.root())
        .with_context(|| format!("failed to create {}", layout.root().display()))?;

    let mut warnings = Vec::new();

    let backup = match backup.filter(|plan| !plan.is_empty()) {
        Some(plan) => {
            let report = run_backup(plan)?;
            warnings.extend(report.warnings.iter().cloned());
            Some(report)
        }
        None => None,
    };

    let cleared = if request.decision == InstallDecision::Reinstall {
        clear_managed_subtrees(layout)?
    } else {
        Vec::new()
    };

    let mode = if request.decision == InstallDecision::Update {
        RefreshMode::PreserveUserFiles
    } else {
        RefreshMode::Overwrite
    };

    layout.ensure_structure()?;
    let base = install_base_files(layout, &request.templates, mode);
    warnings.extend(base.warnings.iter().cloned());
    let version_stamp = write_version_stamp(layout, &request.version)?;

    let plan = plan_skills(&request.templates, &request.pack);
    observer.skills_planned(&plan);
    let skills = apply_skill_plan(layout, &request.pack, &plan, |skill| {
        observer.skill_processed(skill)
    })?;
    observer.skills_finished(&skills);
    warnings.extend(skills.warnings.iter().cloned());

    let agent = if request.pack.includes_agent_structure {
        match install_agent_structure(layout, &request.templates, mode) {
            Ok(outcome) => {
                if outcome == AgentStructureOutcome::TemplateMissing {
                    warnings.push(".agent/ template not found".to_string());
                }
                Some(outcome)
            }
            Err(err) => {
                warnings.push(format!("failed to install .agent/: {err:#}"));
                None
            }
        }
    } else {
        None
    };

    let environment = if mode == RefreshMode::PreserveUserFiles && layout.env_path().exists() {
        EnvironmentStep::Preserved
    } else {
        match merge_environment(layout, &request.templates, &request.memory) {
            Ok(outcome) => EnvironmentStep::Merged(outcome),
            Err(err) => {
                let reason = format!("{err:#}");
                warnings.push(format!("environment file not updated: {reason}"));
                EnvironmentStep::Failed(reason)
            }
        }
    };

    let symlinks = if request.symlinks {
        let report = sync_symlinks(layout, request.scope, &request.homes);
        warnings.extend(report.warnings.iter().cloned());
        Some(report)
    } else {
        None
    };

    let uninstall_script = if request.scope.is_global() {
        match write_uninstall_script(layout, &request.homes) {
            Ok(path) => Some(path),
            Err(err) => {
                warnings.push(format!("failed to write uninstall script: {err:#}"));
                None
            }
        }
    } else {
        None
    };

    Ok(InstallOutcome {
        decision: request.decision,
        backup,
        cleared,
        base,
        version_stamp,
        skills,
        agent,
        environment,
        symlinks,
        uninstall_script,
        warnings,
    })
}
