use agikit_core::{PackId, DOMAINS};
use agikit_installer::{BackupPlan, InstallDecision, InstallState};
use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};

/// The interactive questions a run may ask. Each answer resolves to the same
/// values the matching flag would provide.
pub(crate) trait Prompter {
    fn choose_decision(&mut self, state: &InstallState) -> Result<InstallDecision>;
    /// Raw pack answer; see [`parse_pack_answer`].
    fn choose_pack(&mut self) -> Result<String>;
    /// Raw domain selection; see `agikit_core::parse_domain_selection`.
    fn choose_domains(&mut self) -> Result<String>;
    fn confirm_backup(&mut self, plan: &BackupPlan) -> Result<bool>;
}

pub(crate) struct TerminalPrompter;

const DECISIONS: [(InstallDecision, &str); 3] = [
    (
        InstallDecision::Update,
        "Update    refresh skills and scripts, keep your .env, AGENTS.md and edits",
    ),
    (
        InstallDecision::Reinstall,
        "Reinstall back up, then overwrite the installation",
    ),
    (InstallDecision::Cancel, "Cancel    leave everything as it is"),
];

impl Prompter for TerminalPrompter {
    fn choose_decision(&mut self, state: &InstallState) -> Result<InstallDecision> {
        let installed = state.installed_version.as_deref().unwrap_or("unknown version");
        let items: Vec<&str> = DECISIONS.iter().map(|(_, label)| *label).collect();
        let index = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "agi-agent-kit ({installed}) is already installed here. What now?"
            ))
            .items(&items)
            .default(0)
            .interact()?;
        Ok(DECISIONS[index].0)
    }

    fn choose_pack(&mut self) -> Result<String> {
        for line in pack_menu_lines() {
            println!("{line}");
        }
        let answer: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Enter choice (1-4) or pack name (default: core)")
            .allow_empty(true)
            .interact_text()?;
        Ok(answer)
    }

    fn choose_domains(&mut self) -> Result<String> {
        for line in domain_menu_lines() {
            println!("{line}");
        }
        let answer: String = Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Domains (e.g. 1,3,5-7 or all; empty for core only)")
            .allow_empty(true)
            .interact_text()?;
        Ok(answer)
    }

    fn confirm_backup(&mut self, plan: &BackupPlan) -> Result<bool> {
        let confirmed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "Back up {} existing item(s) to {} first?",
                plan.items.len(),
                plan.backup_dir.display()
            ))
            .default(true)
            .interact()?;
        Ok(confirmed)
    }
}

pub(crate) fn pack_menu_lines() -> Vec<String> {
    PackId::ALL
        .iter()
        .enumerate()
        .map(|(index, pack)| {
            format!(
                "  {}. {:<8} {:<11} {}",
                index + 1,
                pack.as_str(),
                pack.label(),
                pack.description()
            )
        })
        .collect()
}

pub(crate) fn domain_menu_lines() -> Vec<String> {
    DOMAINS
        .iter()
        .enumerate()
        .map(|(index, domain)| {
            format!(
                "  {:>2}. {:<24} {:>3} professional, {:>3} community",
                index + 1,
                domain.label,
                domain.professional_skills,
                domain.community_skills
            )
        })
        .collect()
}

/// Menu number or pack name. Empty means `core`; anything unrecognized falls
/// back to `core` with a warning for the caller to show.
pub(crate) fn parse_pack_answer(answer: &str) -> (PackId, Option<String>) {
    let trimmed = answer.trim();
    if trimmed.is_empty() {
        return (PackId::Core, None);
    }
    if let Ok(index) = trimmed.parse::<usize>() {
        if let Some(pack) = index.checked_sub(1).and_then(|i| PackId::ALL.get(i)) {
            return (*pack, None);
        }
    }
    match PackId::parse(trimmed) {
        Some(pack) => (pack, None),
        None => (
            PackId::Core,
            Some(format!("invalid choice '{trimmed}', defaulting to core")),
        ),
    }
}
