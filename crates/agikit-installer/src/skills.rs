use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use agikit_core::{Pack, SkillGroup};
use anyhow::{Context, Result};

use crate::fs_utils::{copy_dir_recursive, path_exists_no_follow, remove_path};
use crate::layout::{InstallLayout, TemplatesLayout, MANIFEST_MARKER};

/// One skill directory found in the templates, ready to be copied flat to
/// `skills/<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedSkill {
    pub name: String,
    pub source: PathBuf,
    pub group: String,
    /// Category directory the skill was nested under, kept for reporting only.
    pub category: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillPlan {
    pub skills: Vec<PlannedSkill>,
    pub groups: Vec<GroupScan>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupScan {
    pub group: String,
    pub found: bool,
    pub skill_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SkillInstallReport {
    pub installed: Vec<PlannedSkill>,
    pub per_group: BTreeMap<String, usize>,
    pub per_domain: BTreeMap<String, usize>,
    pub skipped_refresh_only: Vec<String>,
    pub warnings: Vec<String>,
}

impl SkillInstallReport {
    pub fn installed_count(&self) -> usize {
        self.installed.len()
    }
}

pub fn is_skill_dir(path: &Path) -> bool {
    path.join(MANIFEST_MARKER).is_file()
}

/// Walks every group of the pack and lists the skills it would install.
/// Nothing is written.
pub fn plan_skills(templates: &TemplatesLayout, pack: &Pack) -> SkillPlan {
    let mut plan = SkillPlan {
        skills: Vec::new(),
        groups: Vec::new(),
        warnings: Vec::new(),
    };

    for group in &pack.groups {
        let group_dir = templates.group_dir(&group.rel_path);
        if !group_dir.is_dir() {
            // Per-domain subtrees are optional; top-level groups are not.
            if !group.rel_path.contains('/') {
                plan.warnings.push(format!(
                    "skills directory not found: {}",
                    group_dir.display()
                ));
            }
            tracing::debug!(group = %group.rel_path, "skill group absent");
            plan.groups.push(GroupScan {
                group: group.rel_path.clone(),
                found: false,
                skill_count: 0,
            });
            continue;
        }

        match scan_group(&group_dir, group) {
            Ok(skills) => {
                if skills.is_empty() && !group.refresh_only {
                    plan.warnings
                        .push(format!("no skills found in group '{}'", group.rel_path));
                }
                plan.groups.push(GroupScan {
                    group: group.rel_path.clone(),
                    found: true,
                    skill_count: skills.len(),
                });
                plan.skills.extend(skills);
            }
            Err(err) => {
                tracing::warn!(group = %group.rel_path, error = %err, "failed to scan skill group");
                plan.warnings.push(format!(
                    "failed to scan skill group '{}': {err:#}",
                    group.rel_path
                ));
                plan.groups.push(GroupScan {
                    group: group.rel_path.clone(),
                    found: true,
                    skill_count: 0,
                });
            }
        }
    }

    plan
}

fn scan_group(group_dir: &Path, group: &SkillGroup) -> Result<Vec<PlannedSkill>> {
    let mut skills = Vec::new();
    for (entry_name, entry_path) in sorted_subdirs(group_dir)? {
        if is_skill_dir(&entry_path) {
            skills.push(PlannedSkill {
                name: entry_name,
                source: entry_path,
                group: group.rel_path.clone(),
                category: None,
            });
            continue;
        }

        // Not a skill, so a category: only its direct children count.
        for (skill_name, skill_path) in sorted_subdirs(&entry_path)? {
            if !is_skill_dir(&skill_path) {
                continue;
            }
            skills.push(PlannedSkill {
                name: skill_name,
                source: skill_path,
                group: group.rel_path.clone(),
                category: Some(entry_name.clone()),
            });
        }
    }
    Ok(skills)
}

fn sorted_subdirs(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut subdirs = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        subdirs.push((name, path));
    }
    subdirs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(subdirs)
}

pub fn install_skills(
    layout: &InstallLayout,
    templates: &TemplatesLayout,
    pack: &Pack,
) -> Result<SkillInstallReport> {
    let plan = plan_skills(templates, pack);
    apply_skill_plan(layout, pack, &plan, |_| {})
}

/// Copies every planned skill to `skills/<name>`. A failed copy is recorded
/// and the remaining skills still install. When two groups ship the same
/// name the later group wins.
pub fn apply_skill_plan(
    layout: &InstallLayout,
    pack: &Pack,
    plan: &SkillPlan,
    mut on_skill: impl FnMut(&PlannedSkill),
) -> Result<SkillInstallReport> {
    let skills_dir = layout.skills_dir();
    fs::create_dir_all(&skills_dir)
        .with_context(|| format!("failed to create {}", skills_dir.display()))?;

    let refresh_only_groups: Vec<&str> = pack
        .groups
        .iter()
        .filter(|group| group.refresh_only)
        .map(|group| group.rel_path.as_str())
        .collect();

    let mut report = SkillInstallReport {
        warnings: plan.warnings.clone(),
        ..SkillInstallReport::default()
    };
    for scan in &plan.groups {
        report.per_group.entry(scan.group.clone()).or_insert(0);
    }
    let mut written_by: BTreeMap<String, String> = BTreeMap::new();

    for skill in &plan.skills {
        let destination = layout.skill_dir(&skill.name);
        if refresh_only_groups.contains(&skill.group.as_str())
            && !path_exists_no_follow(&destination)
        {
            report.skipped_refresh_only.push(skill.name.clone());
            on_skill(skill);
            continue;
        }

        if let Some(previous_group) = written_by.get(&skill.name) {
            report.warnings.push(format!(
                "skill '{}' from '{}' replaces the copy from '{}'",
                skill.name, skill.group, previous_group
            ));
        }

        match copy_skill(skill, &destination, written_by.contains_key(&skill.name)) {
            Ok(()) => {
                tracing::debug!(skill = %skill.name, group = %skill.group, "installed skill");
                written_by.insert(skill.name.clone(), skill.group.clone());
                *report.per_group.entry(skill.group.clone()).or_insert(0) += 1;
                report.installed.retain(|existing| existing.name != skill.name);
                report.installed.push(skill.clone());
            }
            Err(err) => {
                tracing::warn!(skill = %skill.name, error = %err, "skill copy failed");
                report
                    .warnings
                    .push(format!("failed to install skill '{}': {err:#}", skill.name));
            }
        }
        on_skill(skill);
    }

    for domain in &pack.domains {
        let [knowledge, extended] = domain.source_groups();
        let count = report.per_group.get(&knowledge).copied().unwrap_or(0)
            + report.per_group.get(&extended).copied().unwrap_or(0);
        if count == 0 {
            report
                .warnings
                .push(format!("no skills found for domain '{}'", domain.id));
        }
        report.per_domain.insert(domain.id.to_string(), count);
    }

    Ok(report)
}

fn copy_skill(skill: &PlannedSkill, destination: &Path, replace_run_copy: bool) -> Result<()> {
    if replace_run_copy && path_exists_no_follow(destination) {
        remove_path(destination)?;
    }
    copy_dir_recursive(&skill.source, destination)
}

/// Skill names currently present under `skills/`.
pub fn installed_skill_names(layout: &InstallLayout) -> Result<Vec<String>> {
    let dir = layout.skills_dir();
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    Ok(sorted_subdirs(&dir)?
        .into_iter()
        .map(|(name, _)| name)
        .collect())
}
