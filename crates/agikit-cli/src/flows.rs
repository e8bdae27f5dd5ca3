use std::process::Command;

use agikit_core::{parse_domain_selection, DomainSelection, Pack, PackId};
use agikit_installer::{
    activate_hint, backup_policy, backup_timestamp, bootstrap_python_env, detect_install_state,
    execute_install, installed_skill_names, plan_backup, resolve_install_decision,
    run_platform_setup, verify_memory_system, AgentStructureOutcome, BackupPlan, BackupPolicy, EnvironmentStep,
    InstallDecision, InstallLayout, InstallObserver, InstallOutcome, InstallRequest, InstallState,
    LinkAction, MemoryCheckOutcome, PlannedSkill, PlatformSetupOutcome, ProcessOptions,
    ProcessOutput, PythonEnvOutcome, SkillInstallReport, SkillPlan, VersionSource,
};
use anyhow::{anyhow, Result};

use crate::options::{RunCommand, RunOptions};
use crate::prompts::{parse_pack_answer, Prompter};
use crate::render::{render_status_line, OutputStyle, TerminalProgress, TerminalRenderer};
use crate::KIT_VERSION;

const MEMORY_BOOT_COMMAND: &str = "python3 execution/session_boot.py --auto-fix";

#[derive(Debug)]
pub(crate) enum FlowOutcome {
    Completed(Box<InstallOutcome>),
    Cancelled,
}

struct SkillProgress {
    renderer: TerminalRenderer,
    progress: Option<TerminalProgress>,
}

impl InstallObserver for SkillProgress {
    fn skills_planned(&mut self, plan: &SkillPlan) {
        self.progress = Some(
            self.renderer
                .start_progress("skills", plan.skills.len() as u64),
        );
    }

    fn skill_processed(&mut self, _skill: &PlannedSkill) {
        if let Some(progress) = self.progress.as_mut() {
            progress.advance();
        }
    }

    fn skills_finished(&mut self, _report: &SkillInstallReport) {
        if let Some(progress) = self.progress.take() {
            progress.finish_success();
        }
    }
}

/// `init` and `update`: detect, decide, pick a pack, back up, install, then
/// optionally bootstrap the runtime. Prompts only go through `prompter`.
pub(crate) fn run_install_flow<R>(
    options: &RunOptions,
    prompter: &mut dyn Prompter,
    renderer: TerminalRenderer,
    run: R,
) -> Result<FlowOutcome>
where
    R: FnMut(&mut Command, &ProcessOptions) -> Result<ProcessOutput>,
{
    let layout = &options.layout;
    renderer.print_section("agi-agent-kit");

    let state = detect_install_state(layout, KIT_VERSION)?;
    if let Some(line) = describe_existing_install(&state) {
        renderer.print_status("step", &line);
    }
    renderer.print_warnings(&state.advisories());

    let decision = match options.command {
        RunCommand::Update => {
            if state.is_clean() {
                return Err(anyhow!(
                    "AGENTS.md not found in {}; run `agikit init` to start a new project",
                    layout.root().display()
                ));
            }
            InstallDecision::Update
        }
        RunCommand::Init => resolve_install_decision(&state, options.non_interactive, |state| {
            prompter.choose_decision(state)
        })?,
    };
    if decision == InstallDecision::Cancel {
        renderer.print_status("step", "cancelled, nothing was changed");
        return Ok(FlowOutcome::Cancelled);
    }

    let pack = match options.command {
        RunCommand::Update => Pack::update_refresh(),
        RunCommand::Init => resolve_pack(options, prompter, renderer)?,
    };

    if !options.templates.exists() {
        return Err(anyhow!(
            "templates directory not found: {} (use --templates or AGIKIT_TEMPLATES)",
            options.templates.root().display()
        ));
    }

    renderer.print_status(
        "step",
        &format!(
            "{} {} pack into {} ({} scope)",
            install_verb(decision),
            pack.id,
            layout.root().display(),
            options.scope.as_str()
        ),
    );

    let backup = choose_backup(options, &state, decision, prompter, renderer)?;

    let request = InstallRequest {
        layout: layout.clone(),
        templates: options.templates.clone(),
        scope: options.scope,
        homes: options.homes.clone(),
        decision,
        pack,
        memory: options.memory.clone(),
        symlinks: options.symlinks,
        version: KIT_VERSION.to_string(),
    };
    let mut observer = SkillProgress {
        renderer,
        progress: None,
    };
    let outcome = execute_install(&request, backup.as_ref(), &mut observer)?;

    renderer.print_lines(&format_install_outcome_lines(&outcome, renderer.style()));
    renderer.print_warnings(&outcome.warnings);

    if options.skip_setup {
        renderer.print_status("step", "skipping runtime setup (--skip-setup)");
    } else {
        renderer.print_section("runtime setup");
        let lines = run_setup(layout, options.memory.enabled, renderer.style(), run);
        renderer.print_lines(&lines);
    }

    renderer.print_section("next steps");
    renderer.print_lines(&next_steps(&outcome, options));

    Ok(FlowOutcome::Completed(Box::new(outcome)))
}

fn describe_existing_install(state: &InstallState) -> Option<String> {
    if state.is_clean() {
        return None;
    }
    let line = match (&state.installed_version, state.version_source) {
        (Some(version), Some(VersionSource::Stamp)) => {
            format!("existing installation found (version {version})")
        }
        (Some(version), _) => {
            format!("existing installation found (version {version}, read from AGENTS.md)")
        }
        (None, _) => "existing installation found (version unknown)".to_string(),
    };
    Some(line)
}

fn install_verb(decision: InstallDecision) -> &'static str {
    match decision {
        InstallDecision::Update => "updating",
        InstallDecision::Reinstall => "reinstalling",
        InstallDecision::Install | InstallDecision::Cancel => "installing",
    }
}

/// Flag or config first; otherwise ask, or take `core` when prompting is off.
pub(crate) fn resolve_pack(
    options: &RunOptions,
    prompter: &mut dyn Prompter,
    renderer: TerminalRenderer,
) -> Result<Pack> {
    let id = match options.pack {
        Some(id) => id,
        None if options.non_interactive => PackId::Core,
        None => {
            let (id, warning) = parse_pack_answer(&prompter.choose_pack()?);
            if let Some(warning) = warning {
                renderer.print_status("warn", &warning);
            }
            id
        }
    };
    if id != PackId::Custom {
        return Ok(Pack::resolve(id, &DomainSelection::none()));
    }

    let selection = match options.domains.as_deref() {
        Some(raw) => parse_domain_selection(raw),
        None if options.non_interactive => DomainSelection::none(),
        None => parse_domain_selection(&prompter.choose_domains()?),
    };
    if selection.is_empty() {
        renderer.print_status("warn", "no domains selected, installing the core pack");
    } else {
        renderer.print_status(
            "step",
            &format!("selected domains: {}", selection.ids().join(", ")),
        );
    }
    Ok(Pack::resolve(id, &selection))
}

fn choose_backup(
    options: &RunOptions,
    state: &InstallState,
    decision: InstallDecision,
    prompter: &mut dyn Prompter,
    renderer: TerminalRenderer,
) -> Result<Option<BackupPlan>> {
    let policy = backup_policy(decision, state);
    if policy == BackupPolicy::None {
        return Ok(None);
    }
    let plan = plan_backup(
        &options.layout,
        options.scope,
        &options.homes,
        &backup_timestamp(),
    );
    if plan.is_empty() {
        return Ok(None);
    }
    renderer.print_lines(&backup_plan_lines(&plan));
    let confirmed = match policy {
        BackupPolicy::Unconditional => true,
        BackupPolicy::Confirm if options.non_interactive => true,
        BackupPolicy::Confirm => prompter.confirm_backup(&plan)?,
        BackupPolicy::None => false,
    };
    Ok(confirmed.then_some(plan))
}

pub(crate) fn backup_plan_lines(plan: &BackupPlan) -> Vec<String> {
    let mut lines = vec![format!(
        "existing files to back up into {}:",
        plan.backup_dir.display()
    )];
    lines.extend(
        plan.items
            .iter()
            .map(|item| format!("  {}", item.source.display())),
    );
    lines
}

pub(crate) fn format_install_outcome_lines(
    outcome: &InstallOutcome,
    style: OutputStyle,
) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(backup) = &outcome.backup {
        lines.push(render_status_line(
            style,
            "ok",
            &format!(
                "backed up {} item(s) to {}",
                backup.copied.len(),
                backup.backup_dir.display()
            ),
        ));
    }
    if !outcome.cleared.is_empty() {
        lines.push(render_status_line(
            style,
            "step",
            &format!("cleared {} managed director(ies)", outcome.cleared.len()),
        ));
    }
    if !outcome.base.copied.is_empty() {
        lines.push(render_status_line(
            style,
            "ok",
            &format!("base files: {}", outcome.base.copied.join(", ")),
        ));
    }
    if !outcome.base.preserved.is_empty() {
        lines.push(render_status_line(
            style,
            "step",
            &format!("kept your {}", outcome.base.preserved.join(", ")),
        ));
    }

    let skills = &outcome.skills;
    lines.push(render_status_line(
        style,
        "ok",
        &format!("installed {} skill(s)", skills.installed_count()),
    ));
    for (group, count) in &skills.per_group {
        lines.push(format!("  {group}: {count}"));
    }
    for (domain, count) in &skills.per_domain {
        lines.push(format!("  domain {domain}: {count}"));
    }
    if !skills.skipped_refresh_only.is_empty() {
        lines.push(render_status_line(
            style,
            "step",
            &format!(
                "left {} extended skill(s) uninstalled (not present before)",
                skills.skipped_refresh_only.len()
            ),
        ));
    }

    if let Some(agent) = &outcome.agent {
        let line = match agent {
            AgentStructureOutcome::Installed => ".agent/ installed".to_string(),
            AgentStructureOutcome::Merged { added } => {
                format!(".agent/ kept, {added} new file(s) added")
            }
            AgentStructureOutcome::TemplateMissing => {
                ".agent/ template not available".to_string()
            }
        };
        lines.push(render_status_line(style, "ok", &line));
    }

    let env_line = match &outcome.environment {
        EnvironmentStep::Merged(merge) => Some(format!(".env {}", merge.as_str())),
        EnvironmentStep::Preserved => Some(".env kept as is".to_string()),
        EnvironmentStep::Failed(_) => None,
    };
    if let Some(line) = env_line {
        lines.push(render_status_line(style, "ok", &line));
    }

    if let Some(links) = &outcome.symlinks {
        lines.push(render_status_line(
            style,
            "ok",
            &format!(
                "symlinks: {} created, {} refreshed, {} skipped",
                links.count(&LinkAction::Created),
                links.count(&LinkAction::Refreshed),
                links.count(&LinkAction::SkippedRealPath)
            ),
        ));
    }
    if let Some(script) = &outcome.uninstall_script {
        lines.push(render_status_line(
            style,
            "ok",
            &format!("uninstall script: {}", script.display()),
        ));
    }
    lines
}

/// Python venv, platform wizard and memory check. Failures become warning
/// lines with the command to run by hand.
pub(crate) fn run_setup<R>(
    layout: &InstallLayout,
    memory_enabled: bool,
    style: OutputStyle,
    mut run: R,
) -> Vec<String>
where
    R: FnMut(&mut Command, &ProcessOptions) -> Result<ProcessOutput>,
{
    let mut lines = Vec::new();
    let mut push = |status: &str, message: String| {
        lines.push(render_status_line(style, status, &message));
    };

    match bootstrap_python_env(layout, &mut run) {
        PythonEnvOutcome::AlreadyPresent => push("step", ".venv already exists".to_string()),
        PythonEnvOutcome::NoRequirements => {
            push("step", "no requirements.txt, skipping .venv".to_string())
        }
        PythonEnvOutcome::InterpreterMissing { manual } => {
            push("warn", "python3 not found; set up the environment by hand:".to_string());
            for command in manual {
                push("step", command);
            }
        }
        PythonEnvOutcome::VenvFailed { reason, manual } => {
            push("warn", format!("failed to create .venv: {reason}"));
            for command in manual {
                push("step", command);
            }
        }
        PythonEnvOutcome::Ready {
            dependencies_installed,
            manual,
        } => {
            push("ok", "created .venv".to_string());
            if dependencies_installed {
                push("ok", "installed Python dependencies".to_string());
            } else {
                push("warn", "dependency install failed; retry with:".to_string());
                for command in manual {
                    push("step", command);
                }
            }
        }
    }

    match run_platform_setup(layout, &mut run) {
        PlatformSetupOutcome::NotInstalled => {}
        PlatformSetupOutcome::Completed { stdout } => {
            push("ok", "platform setup complete".to_string());
            for line in stdout.lines().filter(|line| !line.trim().is_empty()) {
                push("step", line.to_string());
            }
        }
        PlatformSetupOutcome::Failed { reason, manual } => {
            push("warn", format!("platform setup failed: {reason}"));
            push("step", format!("run manually: {manual}"));
        }
    }

    if memory_enabled {
        match verify_memory_system(layout, &mut run) {
            MemoryCheckOutcome::Skipped => {}
            MemoryCheckOutcome::Ready => push("ok", "memory system ready".to_string()),
            MemoryCheckOutcome::NotReady { reason } => {
                push("warn", format!("memory system not ready: {reason}"));
                push(
                    "step",
                    format!("start Qdrant and Ollama, then run: {MEMORY_BOOT_COMMAND}"),
                );
            }
        }
    }

    lines
}

pub(crate) fn next_steps(outcome: &InstallOutcome, options: &RunOptions) -> Vec<String> {
    let mut steps = Vec::new();
    if options.layout.venv_dir().exists() {
        steps.push(format!("activate the Python environment: {}", activate_hint()));
    }
    steps.push("review AGENTS.md for the architecture overview".to_string());
    let available = match installed_skill_names(&options.layout) {
        Ok(names) => names.len(),
        Err(err) => {
            tracing::debug!(error = %err, "could not list installed skills");
            outcome.skills.installed_count()
        }
    };
    steps.push(format!("browse skills/ for the {available} installed skill(s)"));
    if options.memory.enabled {
        steps.push(format!(
            "boot the memory system (needs Qdrant + Ollama): {MEMORY_BOOT_COMMAND}"
        ));
    }
    steps.push("add your API keys to .env".to_string());
    if let Some(script) = &outcome.uninstall_script {
        steps.push(format!("to remove the global install later: sh {}", script.display()));
    }
    steps
        .into_iter()
        .enumerate()
        .map(|(index, step)| format!("  {}. {step}", index + 1))
        .collect()
}
