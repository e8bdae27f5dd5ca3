mod backup;
mod base;
mod detect;
mod environment;
mod fs_utils;
mod install;
mod layout;
mod runtime;
mod skills;
mod symlinks;
mod uninstall;

pub use backup::{
    backup_dir_for, backup_timestamp, plan_backup, run_backup, BackupItem, BackupPlan,
    BackupReport,
};
pub use base::{
    clear_managed_subtrees, install_agent_structure, install_base_files, write_version_stamp,
    AgentStructureOutcome, BaseReport, RefreshMode,
};
pub use detect::{
    detect_install_state, read_installed_version, resolve_install_decision,
    scrape_instructions_version, InstallDecision, InstallState, VersionSource,
};
pub use environment::{
    merge_env_content, merge_environment, render_env_block, EnvMergeOutcome, ENV_BLOCK_BEGIN,
    ENV_BLOCK_END, ENV_MARKER_KEY, ENV_MINIMAL_HEADER,
};
pub use fs_utils::{
    copy_dir_missing_only, copy_dir_recursive, copy_path, create_symlink, is_symlink,
    path_exists_no_follow, relative_path, remove_path, remove_symlink,
};
pub use install::{
    backup_policy, execute_install, BackupPolicy, EnvironmentStep, InstallObserver,
    InstallOutcome, InstallRequest, NoopObserver,
};
pub use layout::{
    home_dir, HomeDirs, InstallLayout, PlatformLink, TemplatesLayout, BASE_FILES, BASE_TREES,
    CONFIG_FILE, ENV_FILE, ENV_TEMPLATE_FILE, GLOBAL_ROOT_DIR, INSTRUCTIONS_FILE,
    INSTRUCTION_ALIASES, MANAGED_DIRS, MANIFEST_MARKER, PLATFORM_LINKS, UNINSTALL_SCRIPT,
    VERSION_STAMP_FILE,
};
pub use runtime::{
    activate_hint, bootstrap_python_env, run_platform_setup, run_process, venv_python,
    verify_memory_system, MemoryCheckOutcome, PlatformSetupOutcome, ProcessOptions,
    ProcessOutput, PythonEnvOutcome, MEMORY_CHECK_TIMEOUT, PIP_TIMEOUT, PLATFORM_SETUP_TIMEOUT,
    PROBE_TIMEOUT, VENV_TIMEOUT,
};
pub use skills::{
    apply_skill_plan, install_skills, installed_skill_names, is_skill_dir, plan_skills,
    GroupScan, PlannedSkill, SkillInstallReport, SkillPlan,
};
pub use symlinks::{
    instruction_alias_links, platform_links_for, sync_symlinks, LinkAction, LinkKind,
    LinkOutcome, PlannedLink, SymlinkReport,
};
pub use uninstall::{render_uninstall_script, write_uninstall_script};

#[cfg(test)]
mod tests;
