use super::*;
use std::sync::atomic::{AtomicU64, Ordering};

use agikit_core::{parse_domain_selection, InstallScope, MemorySettings, Pack, PackId};
use anyhow::anyhow;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

static TEST_ROOT_COUNTER: AtomicU64 = AtomicU64::new(0);

fn build_test_root_path(nanos: u128) -> PathBuf {
    let mut path = std::env::temp_dir();
    let sequence = TEST_ROOT_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.push(format!(
        "agikit-installer-tests-{}-{}-{}",
        std::process::id(),
        nanos,
        sequence
    ));
    path
}

#[test]
fn build_test_root_path_disambiguates_same_timestamp_calls() {
    let first = build_test_root_path(42);
    let second = build_test_root_path(42);
    assert_ne!(first, second);
}

fn test_root() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let root = build_test_root_path(nanos);
    fs::create_dir_all(&root).expect("must create test root");
    root
}

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("must create parent");
    }
    fs::write(path, contents).expect("must write file");
}

fn write_skill(dir: &Path, body: &str) {
    write_file(&dir.join(MANIFEST_MARKER), body);
}

/// Templates with a flat core skill, a categorized core skill and the base
/// files every pack installs.
fn seed_templates(root: &Path) -> TemplatesLayout {
    let templates = TemplatesLayout::new(root.join("templates"));
    let skills = templates.skills_dir();
    write_skill(&skills.join("core").join("webcrawler"), "# webcrawler\n");
    write_file(
        &skills
            .join("core")
            .join("webcrawler")
            .join("scripts")
            .join("crawl.py"),
        "print('crawl')\n",
    );
    write_skill(
        &skills.join("core").join("documents").join("pdf-reader"),
        "# pdf-reader\n",
    );
    write_file(&skills.join("core").join("documents").join("notes.txt"), "n");
    fs::create_dir_all(skills.join("core").join("empty-category")).expect("must create dir");

    let base = templates.base_dir();
    write_file(&base.join(INSTRUCTIONS_FILE), "# Agents\nVersion: 1.4.0\n");
    write_file(&base.join(".gitignore"), ".env\n.tmp/\n");
    write_file(&base.join("requirements.txt"), "requests\n");
    write_file(&base.join("execution").join("session_boot.py"), "pass\n");
    write_file(&base.join("directives").join("README.md"), "directives\n");
    write_file(&base.join(ENV_TEMPLATE_FILE), "# example\nFOO=1\n");
    write_file(
        &templates.root().join(".agent").join("workflows").join("ship.md"),
        "ship\n",
    );
    templates
}

fn install_request(
    root: &Path,
    templates: TemplatesLayout,
    decision: InstallDecision,
    pack: Pack,
) -> InstallRequest {
    InstallRequest {
        layout: InstallLayout::new(root.join("project")),
        templates,
        scope: InstallScope::Project,
        homes: HomeDirs::new(root.join("home")),
        decision,
        pack,
        memory: MemorySettings::default(),
        symlinks: true,
        version: "1.4.0".to_string(),
    }
}

#[test]
fn plan_flattens_direct_and_categorized_skills() {
    let root = test_root();
    let templates = seed_templates(&root);

    let plan = plan_skills(&templates, &Pack::core());

    let names: Vec<&str> = plan.skills.iter().map(|skill| skill.name.as_str()).collect();
    assert_eq!(names, vec!["pdf-reader", "webcrawler"]);
    assert_eq!(plan.skills[0].category.as_deref(), Some("documents"));
    assert_eq!(plan.skills[1].category, None);
    assert!(plan.warnings.is_empty(), "{:?}", plan.warnings);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn plan_warns_for_missing_top_level_group_only() {
    let root = test_root();
    let templates = TemplatesLayout::new(root.join("templates"));
    fs::create_dir_all(templates.skills_dir()).expect("must create skills");

    let core_plan = plan_skills(&templates, &Pack::core());
    assert!(core_plan
        .warnings
        .iter()
        .any(|warning| warning.contains("skills directory not found")));

    write_skill(&templates.group_dir("core/webcrawler"), "x");
    let custom = Pack::resolve(PackId::Custom, &parse_domain_selection("frontend"));
    let custom_plan = plan_skills(&templates, &custom);
    assert!(custom_plan.warnings.is_empty(), "{:?}", custom_plan.warnings);
    assert_eq!(custom_plan.skills.len(), 1);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn install_skills_copies_each_skill_flat_under_skills_dir() {
    let root = test_root();
    let templates = seed_templates(&root);
    let layout = InstallLayout::new(root.join("project"));

    let report = install_skills(&layout, &templates, &Pack::core()).expect("must install");

    assert_eq!(report.installed_count(), 2);
    assert_eq!(report.per_group.get("core"), Some(&2));
    assert!(layout.skill_dir("webcrawler").join(MANIFEST_MARKER).is_file());
    assert!(layout
        .skill_dir("webcrawler")
        .join("scripts")
        .join("crawl.py")
        .is_file());
    assert!(layout.skill_dir("pdf-reader").join(MANIFEST_MARKER).is_file());
    assert!(!layout.skill_dir("documents").exists());
    assert!(!layout.skill_dir("empty-category").exists());
    assert_eq!(
        installed_skill_names(&layout).expect("must list"),
        vec!["pdf-reader", "webcrawler"]
    );

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn later_group_wins_name_collision_and_warns() {
    let root = test_root();
    let templates = TemplatesLayout::new(root.join("templates"));
    write_skill(&templates.group_dir("core/shared"), "from core");
    write_file(
        &templates.group_dir("core/shared").join("only-core.txt"),
        "core",
    );
    write_skill(&templates.group_dir("knowledge/shared"), "from knowledge");
    let layout = InstallLayout::new(root.join("project"));
    let pack = Pack::fixed(PackId::Medium).expect("medium is fixed");

    let report = install_skills(&layout, &templates, &pack).expect("must install");

    let manifest = fs::read_to_string(layout.skill_dir("shared").join(MANIFEST_MARKER))
        .expect("must read manifest");
    assert_eq!(manifest, "from knowledge");
    assert!(!layout.skill_dir("shared").join("only-core.txt").exists());
    assert_eq!(report.installed_count(), 1);
    assert_eq!(report.installed[0].group, "knowledge");
    assert!(report
        .warnings
        .iter()
        .any(|warning| warning.contains("replaces the copy from 'core'")));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn failed_skill_copy_does_not_stop_the_rest() {
    let root = test_root();
    let templates = TemplatesLayout::new(root.join("templates"));
    write_skill(&templates.group_dir("core/broken"), "broken");
    write_skill(&templates.group_dir("core/good"), "good");
    let layout = InstallLayout::new(root.join("project"));
    write_file(&layout.skill_dir("broken"), "a file where a directory should go");

    let report = install_skills(&layout, &templates, &Pack::core()).expect("must install");

    assert_eq!(report.installed_count(), 1);
    assert_eq!(report.installed[0].name, "good");
    assert!(report
        .warnings
        .iter()
        .any(|warning| warning.contains("failed to install skill 'broken'")));
    assert!(layout.skill_dir("good").join(MANIFEST_MARKER).is_file());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn refresh_only_group_updates_existing_skills_without_adding_new_ones() {
    let root = test_root();
    let templates = TemplatesLayout::new(root.join("templates"));
    write_skill(&templates.group_dir("core/webcrawler"), "core");
    write_skill(&templates.group_dir("knowledge/notes"), "notes");
    write_skill(&templates.group_dir("extended/frontend/react"), "react v2");
    write_skill(&templates.group_dir("extended/frontend/vue"), "vue");
    let layout = InstallLayout::new(root.join("project"));
    write_skill(&layout.skill_dir("react"), "react v1");

    let report =
        install_skills(&layout, &templates, &Pack::update_refresh()).expect("must install");

    let react = fs::read_to_string(layout.skill_dir("react").join(MANIFEST_MARKER))
        .expect("must read react");
    assert_eq!(react, "react v2");
    assert!(!layout.skill_dir("vue").exists());
    assert_eq!(report.skipped_refresh_only, vec!["vue"]);
    assert_eq!(report.per_group.get("extended"), Some(&1));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn custom_pack_reports_per_domain_counts() {
    let root = test_root();
    let templates = TemplatesLayout::new(root.join("templates"));
    write_skill(&templates.group_dir("core/webcrawler"), "core");
    write_skill(&templates.group_dir("knowledge/frontend/ui-kit"), "ui");
    write_skill(&templates.group_dir("extended/frontend/react"), "react");
    let layout = InstallLayout::new(root.join("project"));
    let pack = Pack::resolve(
        PackId::Custom,
        &parse_domain_selection("frontend,security"),
    );

    let report = install_skills(&layout, &templates, &pack).expect("must install");

    assert_eq!(report.per_domain.get("frontend"), Some(&2));
    assert_eq!(report.per_domain.get("security"), Some(&0));
    assert!(report
        .warnings
        .iter()
        .any(|warning| warning == "no skills found for domain 'security'"));
    assert_eq!(report.installed_count(), 3);

    let _ = fs::remove_dir_all(&root);
}

#[cfg(unix)]
#[test]
fn core_install_end_to_end_produces_expected_tree() {
    let root = test_root();
    let templates = seed_templates(&root);
    let request = install_request(&root, templates, InstallDecision::Install, Pack::core());
    let layout = request.layout.clone();

    let outcome =
        execute_install(&request, None, &mut NoopObserver).expect("install must succeed");

    assert!(layout.instructions_path().is_file());
    assert_eq!(
        fs::read_to_string(layout.version_stamp_path()).expect("must read stamp"),
        "1.4.0\n"
    );
    assert!(layout.skill_dir("webcrawler").join(MANIFEST_MARKER).is_file());
    assert!(layout.skill_dir("pdf-reader").join(MANIFEST_MARKER).is_file());
    assert!(layout.tmp_dir().is_dir());
    assert!(layout
        .managed_dir("execution")
        .join("session_boot.py")
        .is_file());
    assert!(!layout.agent_dir().exists());
    assert_eq!(outcome.agent, None);
    assert_eq!(
        outcome.environment,
        EnvironmentStep::Merged(EnvMergeOutcome::Created {
            from_template: true
        })
    );
    let env = fs::read_to_string(layout.env_path()).expect("must read env");
    assert!(env.starts_with("# example\nFOO=1\n"));
    assert_eq!(env.matches(ENV_BLOCK_BEGIN).count(), 1);

    assert!(is_symlink(&layout.alias_path("CLAUDE.md")));
    let alias = fs::read_to_string(layout.alias_path("CLAUDE.md")).expect("alias resolves");
    assert!(alias.contains("Version: 1.4.0"));
    let claude_skills = layout.root().join(".claude").join("skills");
    assert!(is_symlink(&claude_skills));
    assert!(claude_skills.join("webcrawler").join(MANIFEST_MARKER).is_file());
    assert_eq!(outcome.uninstall_script, None);
    assert!(outcome.backup.is_none());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn medium_pack_installs_agent_structure() {
    let root = test_root();
    let templates = seed_templates(&root);
    let pack = Pack::fixed(PackId::Medium).expect("medium is fixed");
    let mut request = install_request(&root, templates, InstallDecision::Install, pack);
    request.symlinks = false;

    let outcome =
        execute_install(&request, None, &mut NoopObserver).expect("install must succeed");

    assert_eq!(outcome.agent, Some(AgentStructureOutcome::Installed));
    assert!(request
        .layout
        .agent_dir()
        .join("workflows")
        .join("ship.md")
        .is_file());
    assert!(outcome.symlinks.is_none());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn update_preserves_user_files_and_merges_agent_tree() {
    let root = test_root();
    let templates = seed_templates(&root);
    let pack = Pack::fixed(PackId::Medium).expect("medium is fixed");
    let mut request = install_request(&root, templates, InstallDecision::Install, pack);
    request.symlinks = false;
    execute_install(&request, None, &mut NoopObserver).expect("install must succeed");

    let layout = request.layout.clone();
    write_file(&layout.instructions_path(), "my own instructions\n");
    write_file(&layout.env_path(), "MINE=1\n");
    fs::remove_file(layout.agent_dir().join("workflows").join("ship.md"))
        .expect("must remove workflow");
    write_file(&layout.agent_dir().join("own.md"), "mine\n");

    request.decision = InstallDecision::Update;
    let outcome =
        execute_install(&request, None, &mut NoopObserver).expect("update must succeed");

    assert_eq!(
        fs::read_to_string(layout.instructions_path()).expect("must read"),
        "my own instructions\n"
    );
    assert_eq!(
        fs::read_to_string(layout.env_path()).expect("must read"),
        "MINE=1\n"
    );
    assert_eq!(outcome.environment, EnvironmentStep::Preserved);
    assert_eq!(
        outcome.agent,
        Some(AgentStructureOutcome::Merged { added: 1 })
    );
    assert!(layout.agent_dir().join("own.md").is_file());
    assert!(outcome.base.preserved.contains(&INSTRUCTIONS_FILE.to_string()));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn reinstall_backs_up_then_clears_managed_subtrees() {
    let root = test_root();
    let templates = seed_templates(&root);
    let request = install_request(&root, templates, InstallDecision::Reinstall, Pack::core());
    let layout = request.layout.clone();
    write_file(&layout.instructions_path(), "# old\nVersion: 1.0.0\n");
    write_skill(&layout.skill_dir("stale-skill"), "stale");

    let plan = plan_backup(
        &layout,
        InstallScope::Project,
        &request.homes,
        "20260101-000000",
    );
    let outcome =
        execute_install(&request, Some(&plan), &mut NoopObserver).expect("must reinstall");

    let backup = outcome.backup.expect("backup must run");
    assert_eq!(
        backup.backup_dir,
        layout.root().join(".agi-backup-20260101-000000")
    );
    assert_eq!(
        fs::read_to_string(backup.backup_dir.join("skills/stale-skill").join(MANIFEST_MARKER))
            .expect("backup holds the old skill"),
        "stale"
    );
    assert!(!layout.skill_dir("stale-skill").exists());
    assert!(layout.skill_dir("webcrawler").is_dir());
    assert!(outcome.cleared.contains(&layout.skills_dir()));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn execute_install_rejects_cancel_and_missing_templates() {
    let root = test_root();
    let templates = seed_templates(&root);
    let cancelled = install_request(&root, templates, InstallDecision::Cancel, Pack::core());
    assert!(execute_install(&cancelled, None, &mut NoopObserver).is_err());

    let missing = install_request(
        &root,
        TemplatesLayout::new(root.join("missing")),
        InstallDecision::Install,
        Pack::core(),
    );
    let err = execute_install(&missing, None, &mut NoopObserver).expect_err("must fail");
    assert!(err.to_string().contains("templates directory not found"));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn observer_sees_every_planned_skill() {
    struct Counting {
        planned: usize,
        processed: usize,
        finished: bool,
    }
    impl InstallObserver for Counting {
        fn skills_planned(&mut self, plan: &SkillPlan) {
            self.planned = plan.skills.len();
        }
        fn skill_processed(&mut self, _skill: &PlannedSkill) {
            self.processed += 1;
        }
        fn skills_finished(&mut self, _report: &SkillInstallReport) {
            self.finished = true;
        }
    }

    let root = test_root();
    let templates = seed_templates(&root);
    let mut request = install_request(&root, templates, InstallDecision::Install, Pack::core());
    request.symlinks = false;
    let mut observer = Counting {
        planned: 0,
        processed: 0,
        finished: false,
    };

    execute_install(&request, None, &mut observer).expect("must install");

    assert_eq!(observer.planned, 2);
    assert_eq!(observer.processed, 2);
    assert!(observer.finished);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn backup_policy_follows_decision() {
    let clean = InstallState {
        root: PathBuf::from("/tmp/x"),
        marker_present: false,
        installed_version: None,
        version_source: None,
        incoming_version: "1.4.0".to_string(),
        relation: agikit_core::VersionRelation::Unknown,
    };
    let existing = InstallState {
        marker_present: true,
        ..clean.clone()
    };

    assert_eq!(
        backup_policy(InstallDecision::Install, &clean),
        BackupPolicy::None
    );
    assert_eq!(
        backup_policy(InstallDecision::Install, &existing),
        BackupPolicy::Confirm
    );
    assert_eq!(
        backup_policy(InstallDecision::Update, &existing),
        BackupPolicy::Confirm
    );
    assert_eq!(
        backup_policy(InstallDecision::Reinstall, &existing),
        BackupPolicy::Unconditional
    );
}

#[cfg(unix)]
#[test]
fn sync_symlinks_is_idempotent() {
    let root = test_root();
    let layout = InstallLayout::new(root.join("project"));
    write_file(&layout.instructions_path(), "# Agents\n");
    fs::create_dir_all(layout.skills_dir()).expect("must create skills");
    let homes = HomeDirs::new(root.join("home"));

    let first = sync_symlinks(&layout, InstallScope::Project, &homes);
    assert_eq!(first.count(&LinkAction::Created), 9);
    assert!(first.warnings.is_empty(), "{:?}", first.warnings);

    let second = sync_symlinks(&layout, InstallScope::Project, &homes);
    assert_eq!(second.count(&LinkAction::Refreshed), 9);
    assert!(second.warnings.is_empty(), "{:?}", second.warnings);

    assert_eq!(
        fs::read_link(layout.alias_path("GEMINI.md")).expect("must read link"),
        PathBuf::from("AGENTS.md")
    );
    assert_eq!(
        fs::read_link(layout.root().join(".gemini").join("skills")).expect("must read link"),
        PathBuf::from("../skills")
    );

    let _ = fs::remove_dir_all(&root);
}

#[cfg(unix)]
#[test]
fn sync_symlinks_never_replaces_real_paths() {
    let root = test_root();
    let layout = InstallLayout::new(root.join("project"));
    write_file(&layout.instructions_path(), "# Agents\n");
    fs::create_dir_all(layout.skills_dir()).expect("must create skills");
    write_file(&layout.alias_path("CLAUDE.md"), "hand written\n");
    let cursor_skills = layout.root().join(".cursor").join("skills");
    write_file(&cursor_skills.join("mine").join(MANIFEST_MARKER), "mine");

    let report = sync_symlinks(&layout, InstallScope::Project, &HomeDirs::new(root.join("h")));

    assert_eq!(report.count(&LinkAction::SkippedRealPath), 2);
    assert_eq!(report.warnings.len(), 2);
    assert_eq!(
        fs::read_to_string(layout.alias_path("CLAUDE.md")).expect("must read"),
        "hand written\n"
    );
    assert!(cursor_skills.join("mine").join(MANIFEST_MARKER).is_file());
    assert!(!is_symlink(&cursor_skills));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn sync_symlinks_skips_aliases_without_instructions() {
    let root = test_root();
    let layout = InstallLayout::new(root.join("project"));
    fs::create_dir_all(layout.root()).expect("must create root");

    let report = sync_symlinks(&layout, InstallScope::Project, &HomeDirs::new(root.join("h")));

    assert!(report.outcomes.is_empty());
    assert_eq!(report.warnings.len(), 2);
    assert!(!path_exists_no_follow(&layout.alias_path("CLAUDE.md")));

    let _ = fs::remove_dir_all(&root);
}

#[cfg(unix)]
#[test]
fn global_links_live_in_home_and_honor_codex_home() {
    let root = test_root();
    let homes = HomeDirs {
        home: root.join("home"),
        codex_home: Some(root.join("codex")),
    };
    let layout = InstallLayout::new(homes.global_install_root());
    write_file(&layout.instructions_path(), "# Agents\n");
    write_skill(&layout.skill_dir("webcrawler"), "x");

    let report = sync_symlinks(&layout, InstallScope::Global, &homes);

    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    let claude = homes.home.join(".claude").join("skills");
    assert!(is_symlink(&claude));
    assert_eq!(
        fs::canonicalize(&claude).expect("link resolves"),
        fs::canonicalize(layout.skills_dir()).expect("skills resolves")
    );
    assert!(is_symlink(&root.join("codex").join("skills")));
    assert!(!path_exists_no_follow(&homes.home.join(".codex").join("skills")));
    assert!(root
        .join("codex")
        .join("skills")
        .join("webcrawler")
        .join(MANIFEST_MARKER)
        .is_file());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn relative_path_walks_up_to_common_ancestor() {
    assert_eq!(
        relative_path(Path::new("/p/.claude"), Path::new("/p/skills")),
        PathBuf::from("../skills")
    );
    assert_eq!(
        relative_path(
            Path::new("/home/u/.claude"),
            Path::new("/home/u/.agi-agent-kit/skills")
        ),
        PathBuf::from("../.agi-agent-kit/skills")
    );
    assert_eq!(
        relative_path(Path::new("/p"), Path::new("/p/AGENTS.md")),
        PathBuf::from("AGENTS.md")
    );
    assert_eq!(
        relative_path(Path::new("/p/a"), Path::new("/p/a")),
        PathBuf::from(".")
    );
}

#[test]
fn clean_target_detects_no_installation() {
    let root = test_root();
    let layout = InstallLayout::new(root.join("project"));

    let state = detect_install_state(&layout, "1.4.0").expect("must detect");

    assert!(state.is_clean());
    assert_eq!(state.installed_version, None);
    assert_eq!(state.relation, agikit_core::VersionRelation::Unknown);
    assert!(state.advisories().is_empty());
    let decision = resolve_install_decision(&state, false, |_| Err(anyhow!("must not prompt")))
        .expect("must resolve");
    assert_eq!(decision, InstallDecision::Install);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn version_stamp_wins_over_instructions_scrape() {
    let root = test_root();
    let layout = InstallLayout::new(root.clone());
    write_file(&layout.instructions_path(), "# Agents\nVersion: 1.1.0\n");
    write_file(&layout.version_stamp_path(), "1.2.0\n");

    let state = detect_install_state(&layout, "1.3.0").expect("must detect");

    assert_eq!(state.installed_version.as_deref(), Some("1.2.0"));
    assert_eq!(state.version_source, Some(VersionSource::Stamp));
    assert_eq!(state.relation, agikit_core::VersionRelation::Newer);
    assert!(state.advisories().is_empty());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn unparsable_stamp_falls_back_to_instructions() {
    let root = test_root();
    let layout = InstallLayout::new(root.clone());
    write_file(&layout.instructions_path(), "# Agents\nVersion: 1.1.0\n");
    write_file(&layout.version_stamp_path(), "garbage\n");

    let (version, source) = read_installed_version(&layout)
        .expect("must read")
        .expect("version must be found");

    assert_eq!(version, "1.1.0");
    assert_eq!(source, VersionSource::Instructions);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn advisories_flag_same_version_and_downgrade() {
    let root = test_root();
    let layout = InstallLayout::new(root.clone());
    write_file(&layout.instructions_path(), "# Agents\n");
    write_file(&layout.version_stamp_path(), "v2.0.0\n");

    let same = detect_install_state(&layout, "2.0.0").expect("must detect");
    assert_eq!(same.relation, agikit_core::VersionRelation::Equal);
    assert!(same.advisories()[0].contains("already installed"));

    let older = detect_install_state(&layout, "1.9.0").expect("must detect");
    assert_eq!(older.relation, agikit_core::VersionRelation::Older);
    assert_eq!(
        older.advisories(),
        vec!["downgrade: installed version 2.0.0 is newer than 1.9.0".to_string()]
    );

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn existing_install_prompts_only_when_interactive() {
    let root = test_root();
    let layout = InstallLayout::new(root.clone());
    write_file(&layout.instructions_path(), "# Agents\n");
    let state = detect_install_state(&layout, "1.4.0").expect("must detect");
    assert!(!state.is_clean());
    assert_eq!(state.relation, agikit_core::VersionRelation::Unknown);

    let non_interactive = resolve_install_decision(&state, true, |_| Err(anyhow!("no prompt")))
        .expect("must resolve");
    assert_eq!(non_interactive, InstallDecision::Install);

    let interactive = resolve_install_decision(&state, false, |_| Ok(InstallDecision::Update))
        .expect("must resolve");
    assert_eq!(interactive, InstallDecision::Update);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn scrape_instructions_version_accepts_common_shapes() {
    assert_eq!(
        scrape_instructions_version("# Kit\n> Version v2.0.1 release notes\n")
            .expect("must scrape"),
        Some("2.0.1".to_string())
    );
    assert_eq!(
        scrape_instructions_version("version = 3.1.4").expect("must scrape"),
        Some("3.1.4".to_string())
    );
    assert_eq!(
        scrape_instructions_version("version: 1.2").expect("must scrape"),
        None
    );
    assert_eq!(
        scrape_instructions_version("no version here").expect("must scrape"),
        None
    );
}

#[test]
fn scrape_instructions_version_ignores_unrelated_v_numbers() {
    let raw = "# Kit\nrequires Python v3.11.4 or newer\n\nVersion: 1.2.0\n";
    assert_eq!(
        scrape_instructions_version(raw).expect("must scrape"),
        Some("1.2.0".to_string())
    );
    assert_eq!(
        scrape_instructions_version("built with node v20.1.0\n").expect("must scrape"),
        None
    );
}

#[test]
fn backup_copies_watched_paths_and_leaves_originals() {
    let root = test_root();
    let layout = InstallLayout::new(root.join("project"));
    write_file(&layout.instructions_path(), "instructions\n");
    write_skill(&layout.skill_dir("a"), "skill a");
    write_file(&layout.env_path(), "SECRET=1\n");
    let homes = HomeDirs::new(root.join("home"));

    let plan = plan_backup(&layout, InstallScope::Project, &homes, "20260101-120000");
    let rel: Vec<PathBuf> = plan.items.iter().map(|item| item.rel_dest.clone()).collect();
    assert_eq!(
        rel,
        vec![
            PathBuf::from("AGENTS.md"),
            PathBuf::from(".env"),
            PathBuf::from("skills")
        ]
    );

    let report = run_backup(&plan).expect("backup must run");
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert_eq!(
        report.backup_dir,
        layout.root().join(".agi-backup-20260101-120000")
    );
    assert_eq!(
        fs::read_to_string(report.backup_dir.join("AGENTS.md")).expect("must read"),
        "instructions\n"
    );
    assert_eq!(
        fs::read_to_string(report.backup_dir.join("skills/a").join(MANIFEST_MARKER))
            .expect("must read"),
        "skill a"
    );
    assert_eq!(
        fs::read_to_string(layout.instructions_path()).expect("original intact"),
        "instructions\n"
    );
    assert!(layout.skill_dir("a").join(MANIFEST_MARKER).is_file());

    let second = run_backup(&plan).expect("second backup must run");
    assert_eq!(
        second.backup_dir,
        layout.root().join(".agi-backup-20260101-120000-1")
    );

    let _ = fs::remove_dir_all(&root);
}

#[cfg(unix)]
#[test]
fn global_backup_includes_real_platform_dirs_only() {
    let root = test_root();
    let homes = HomeDirs::new(root.join("home"));
    let layout = InstallLayout::new(homes.global_install_root());
    write_file(&layout.instructions_path(), "x\n");
    write_skill(&homes.home.join(".claude/skills/mine"), "mine");
    fs::create_dir_all(homes.home.join(".gemini")).expect("must create gemini");
    create_symlink(
        &layout.skills_dir(),
        &homes.home.join(".gemini/skills"),
        true,
    )
    .expect("must link");

    let plan = plan_backup(&layout, InstallScope::Global, &homes, "20260101-000000");

    assert_eq!(
        plan.backup_dir,
        homes.home.join(".agi-agent-kit-backup-20260101-000000")
    );
    let rel: Vec<PathBuf> = plan.items.iter().map(|item| item.rel_dest.clone()).collect();
    assert_eq!(
        rel,
        vec![
            PathBuf::from("AGENTS.md"),
            PathBuf::from("platforms/claude/skills")
        ]
    );

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn backup_timestamp_has_sortable_shape() {
    let stamp = backup_timestamp();
    assert_eq!(stamp.len(), 15);
    assert_eq!(&stamp[8..9], "-");
    assert!(stamp
        .chars()
        .enumerate()
        .all(|(index, ch)| index == 8 || ch.is_ascii_digit()));
}

#[test]
fn env_content_appends_block_after_existing_bytes() {
    let settings = MemorySettings::default();

    let (merged, patched) = merge_env_content("FOO=1", &settings).expect("must merge");

    assert!(!patched);
    assert!(merged.starts_with("FOO=1\n\n"));
    assert!(merged.ends_with(&format!("{ENV_BLOCK_END}\n")));
    assert!(merged.contains("MEMORY_ENABLED=true\n"));
    assert!(!merged.contains("QDRANT_API_KEY"));
}

#[test]
fn env_content_patches_only_marker_line() {
    let settings = MemorySettings {
        enabled: false,
        ..MemorySettings::default()
    };
    let existing = "A=1\nMEMORY_ENABLED=true\nQDRANT_URL=http://custom:6333\nB=2\n";

    let (merged, patched) = merge_env_content(existing, &settings).expect("must merge");

    assert!(patched);
    assert_eq!(
        merged,
        "A=1\nMEMORY_ENABLED=false\nQDRANT_URL=http://custom:6333\nB=2\n"
    );
}

#[test]
fn merge_environment_is_idempotent() {
    let root = test_root();
    let layout = InstallLayout::new(root.clone());
    let templates = TemplatesLayout::new(root.join("templates"));
    write_file(&layout.env_path(), "USER_KEY=keep\n");
    let settings = MemorySettings {
        api_key: Some("secret".to_string()),
        ..MemorySettings::default()
    };

    let first = merge_environment(&layout, &templates, &settings).expect("must merge");
    assert_eq!(first, EnvMergeOutcome::Appended);
    let after_first = fs::read(layout.env_path()).expect("must read");

    let second = merge_environment(&layout, &templates, &settings).expect("must merge");
    assert_eq!(second, EnvMergeOutcome::Unchanged);
    assert_eq!(fs::read(layout.env_path()).expect("must read"), after_first);

    let env = String::from_utf8(after_first).expect("utf8");
    assert!(env.starts_with("USER_KEY=keep\n"));
    assert!(env.contains("QDRANT_API_KEY=secret\n"));
    assert_eq!(env.matches("MEMORY_ENABLED=").count(), 1);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn merge_environment_seeds_minimal_header_without_template() {
    let root = test_root();
    let layout = InstallLayout::new(root.clone());
    let templates = TemplatesLayout::new(root.join("templates"));

    let outcome =
        merge_environment(&layout, &templates, &MemorySettings::default()).expect("must merge");

    assert_eq!(
        outcome,
        EnvMergeOutcome::Created {
            from_template: false
        }
    );
    let env = fs::read_to_string(layout.env_path()).expect("must read");
    assert!(env.starts_with(ENV_MINIMAL_HEADER));
    assert!(env.contains(ENV_BLOCK_BEGIN));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn merge_environment_rejects_invalid_settings_without_writing() {
    let root = test_root();
    let layout = InstallLayout::new(root.clone());
    let templates = TemplatesLayout::new(root.join("templates"));
    let settings = MemorySettings {
        qdrant_url: "localhost:6333".to_string(),
        ..MemorySettings::default()
    };

    assert!(merge_environment(&layout, &templates, &settings).is_err());
    assert!(!layout.env_path().exists());

    let _ = fs::remove_dir_all(&root);
}

fn ok_output() -> ProcessOutput {
    ProcessOutput {
        success: true,
        ..ProcessOutput::default()
    }
}

fn failed_output(stderr: &str) -> ProcessOutput {
    ProcessOutput {
        stderr: stderr.to_string(),
        ..ProcessOutput::default()
    }
}

fn program_and_args(command: &Command) -> Vec<String> {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|part| part.to_string_lossy().into_owned())
        .collect()
}

#[test]
fn python_env_skips_without_requirements() {
    let root = test_root();
    let layout = InstallLayout::new(root.clone());

    let outcome = bootstrap_python_env(&layout, |_, _| Err(anyhow!("must not run")));

    assert_eq!(outcome, PythonEnvOutcome::NoRequirements);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn python_env_reports_missing_interpreter_with_manual_steps() {
    let root = test_root();
    let layout = InstallLayout::new(root.clone());
    write_file(&layout.requirements_path(), "requests\n");

    let outcome = bootstrap_python_env(&layout, |_, _| Err(anyhow!("not found")));

    match outcome {
        PythonEnvOutcome::InterpreterMissing { manual } => {
            assert_eq!(manual[0], "python3 -m venv .venv");
            assert_eq!(manual.len(), 3);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn python_env_runs_probe_venv_and_pip_with_their_timeouts() {
    let root = test_root();
    let layout = InstallLayout::new(root.clone());
    write_file(&layout.requirements_path(), "requests\n");
    let calls = RefCell::new(Vec::new());

    let outcome = bootstrap_python_env(&layout, |command, options| {
        calls
            .borrow_mut()
            .push((program_and_args(command), options.timeout));
        Ok(ok_output())
    });

    assert_eq!(
        outcome,
        PythonEnvOutcome::Ready {
            dependencies_installed: true,
            manual: Vec::new()
        }
    );
    let calls = calls.into_inner();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[0].0, vec!["python3", "--version"]);
    assert_eq!(calls[0].1, PROBE_TIMEOUT);
    assert_eq!(calls[1].0[1..3], ["-m".to_string(), "venv".to_string()]);
    assert_eq!(calls[1].1, VENV_TIMEOUT);
    assert_eq!(calls[2].0[1], "install");
    assert_eq!(calls[2].1, PIP_TIMEOUT);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn python_env_keeps_venv_when_pip_fails() {
    let root = test_root();
    let layout = InstallLayout::new(root.clone());
    write_file(&layout.requirements_path(), "requests\n");

    let outcome = bootstrap_python_env(&layout, |command, _| {
        if program_and_args(command).contains(&"install".to_string()) {
            Ok(failed_output("resolution failed"))
        } else {
            Ok(ok_output())
        }
    });

    match outcome {
        PythonEnvOutcome::Ready {
            dependencies_installed,
            manual,
        } => {
            assert!(!dependencies_installed);
            assert!(manual[0].ends_with("install -r requirements.txt"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn platform_setup_retries_with_confirmation_on_stdin() {
    let root = test_root();
    let layout = InstallLayout::new(root.clone());
    write_file(
        &layout
            .skills_dir()
            .join("plugin-discovery/scripts/platform_setup.py"),
        "pass\n",
    );
    let calls = RefCell::new(Vec::new());

    let outcome = run_platform_setup(&layout, |command, options| {
        let args = program_and_args(command);
        let auto = args.contains(&"--auto".to_string());
        calls.borrow_mut().push((auto, options.stdin.clone()));
        if auto {
            Ok(failed_output("needs confirmation"))
        } else {
            Ok(ProcessOutput {
                success: true,
                stdout: "configured\n".to_string(),
                ..ProcessOutput::default()
            })
        }
    });

    assert_eq!(
        outcome,
        PlatformSetupOutcome::Completed {
            stdout: "configured\n".to_string()
        }
    );
    assert_eq!(
        calls.into_inner(),
        vec![(true, None), (false, Some("y\n".to_string()))]
    );

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn platform_setup_absent_script_is_not_installed() {
    let root = test_root();
    let layout = InstallLayout::new(root.clone());

    let outcome = run_platform_setup(&layout, |_, _| Err(anyhow!("must not run")));

    assert_eq!(outcome, PlatformSetupOutcome::NotInstalled);

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn memory_check_reports_timeout() {
    let root = test_root();
    let layout = InstallLayout::new(root.clone());
    assert_eq!(
        verify_memory_system(&layout, |_, _| Err(anyhow!("must not run"))),
        MemoryCheckOutcome::Skipped
    );

    write_file(&layout.root().join("execution/session_boot.py"), "pass\n");
    let outcome = verify_memory_system(&layout, |command, options| {
        assert!(program_and_args(command).contains(&"--auto-fix".to_string()));
        assert_eq!(options.timeout, MEMORY_CHECK_TIMEOUT);
        Ok(ProcessOutput {
            timed_out: true,
            ..ProcessOutput::default()
        })
    });

    assert_eq!(
        outcome,
        MemoryCheckOutcome::NotReady {
            reason: "timed out".to_string()
        }
    );

    let _ = fs::remove_dir_all(&root);
}

#[cfg(unix)]
#[test]
fn run_process_collects_output_and_feeds_stdin() {
    let output = run_process(
        Command::new("sh").arg("-c").arg("cat; echo done >&2"),
        &ProcessOptions {
            timeout: std::time::Duration::from_secs(10),
            stdin: Some("y\n".to_string()),
        },
    )
    .expect("must run");

    assert!(output.success);
    assert!(!output.timed_out);
    assert_eq!(output.stdout, "y\n");
    assert_eq!(output.stderr, "done\n");
}

#[cfg(unix)]
#[test]
fn run_process_kills_child_on_timeout() {
    let output = run_process(
        Command::new("sleep").arg("5"),
        &ProcessOptions::with_timeout(std::time::Duration::from_millis(200)),
    )
    .expect("must run");

    assert!(!output.success);
    assert!(output.timed_out);
    assert_eq!(output.failure_reason(), "timed out");
}

#[cfg(unix)]
#[test]
fn run_process_timeout_is_not_held_up_by_background_grandchild() {
    let started = std::time::Instant::now();
    let output = run_process(
        Command::new("sh").arg("-c").arg("sleep 8 & sleep 8"),
        &ProcessOptions::with_timeout(std::time::Duration::from_secs(1)),
    )
    .expect("must run");

    assert!(output.timed_out);
    assert!(started.elapsed() < std::time::Duration::from_secs(3));
}

#[cfg(unix)]
#[test]
fn run_process_returns_when_grandchild_keeps_pipes_after_exit() {
    let started = std::time::Instant::now();
    let output = run_process(
        Command::new("sh").arg("-c").arg("sleep 8 & exit 0"),
        &ProcessOptions::with_timeout(std::time::Duration::from_secs(5)),
    )
    .expect("must run");

    assert!(output.success);
    assert!(!output.timed_out);
    assert!(started.elapsed() < std::time::Duration::from_secs(5));
}

#[test]
fn uninstall_script_removes_links_and_managed_paths_but_not_env() {
    let homes = HomeDirs {
        home: PathBuf::from("/home/dev"),
        codex_home: Some(PathBuf::from("/opt/codex")),
    };
    let layout = InstallLayout::new(homes.global_install_root());

    let script = render_uninstall_script(&layout, &homes);

    assert!(script.starts_with("#!/bin/sh\n"));
    assert!(script.contains("ROOT='/home/dev/.agi-agent-kit'\n"));
    assert!(script
        .contains("[ -L '/home/dev/.claude/skills' ] && rm -f '/home/dev/.claude/skills'"));
    assert!(script.contains("[ -L '/opt/codex/skills' ] && rm -f '/opt/codex/skills'"));
    assert!(script.contains("rm -rf \"$ROOT/skills\"\n"));
    assert!(script.contains("rm -f \"$ROOT/AGENTS.md\"\n"));
    assert!(!script.contains("\"$ROOT/.env\""));
}

#[cfg(unix)]
#[test]
fn global_install_writes_executable_uninstall_script() {
    use std::os::unix::fs::PermissionsExt;

    let root = test_root();
    let templates = seed_templates(&root);
    let homes = HomeDirs::new(root.join("home"));
    let mut request = install_request(&root, templates, InstallDecision::Install, Pack::core());
    request.layout = InstallLayout::new(homes.global_install_root());
    request.scope = InstallScope::Global;
    request.homes = homes.clone();

    let outcome = execute_install(&request, None, &mut NoopObserver).expect("must install");

    let script = outcome.uninstall_script.expect("global installs get a script");
    let mode = fs::metadata(&script).expect("must stat").permissions().mode();
    assert_eq!(mode & 0o777, 0o755);
    assert!(is_symlink(&homes.home.join(".claude/skills")));
    assert!(!path_exists_no_follow(
        &request.layout.root().join(".claude/skills")
    ));

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn ensure_structure_creates_scratch_dir() {
    let root = test_root();
    let layout = InstallLayout::new(root.join("project"));

    let created = layout.ensure_structure().expect("must create");

    assert!(created.contains(&layout.tmp_dir()));
    assert!(layout.tmp_dir().is_dir());
    assert!(layout.skills_dir().is_dir());

    let _ = fs::remove_dir_all(&root);
}

#[test]
fn agent_template_falls_back_to_base_dir() {
    let root = test_root();
    let templates = TemplatesLayout::new(root.join("templates"));
    assert_eq!(templates.agent_dir(), None);

    fs::create_dir_all(templates.base_dir().join(".agent")).expect("must create");
    assert_eq!(templates.agent_dir(), Some(templates.base_dir().join(".agent")));

    fs::create_dir_all(templates.root().join(".agent")).expect("must create");
    assert_eq!(templates.agent_dir(), Some(templates.root().join(".agent")));

    let _ = fs::remove_dir_all(&root);
}
