//! Tests for the 'list' command
//!
//! `list` describes sources and pipelines without touching any tool.

use backup_orchestrator::artifact::SourceKind;
use backup_orchestrator::config::parse_config;
use backup_orchestrator::managers::backup::source_plans;
use test_utils::{render, sample_config_toml, ConfigBuilder, ResultAssertions, TestContext};

#[test]
fn test_list_sample_config() {
    let ctx = TestContext::new();
    let config = parse_config(&render(sample_config_toml(), ctx.temp_dir())).assert_ok();

    let plans = source_plans(&config).assert_ok();

    assert_eq!(plans.len(), 2);

    assert_eq!(plans[0].name, "main");
    assert_eq!(plans[0].kind, SourceKind::Mysqldump);
    assert_eq!(plans[0].target, "all databases except system and legacy");
    assert_eq!(
        plans[0].pipeline,
        "gzip -> gpg(ops@example.org) -> s3(offsite) -> cleanup"
    );

    assert_eq!(plans[1].kind, SourceKind::Directory);
    assert!(plans[1].target.ends_with("www (incremental)"));
    assert_eq!(plans[1].pipeline, "bzip2 -> s3(offsite)");
}

#[test]
fn test_list_keeps_declaration_order() {
    let config = ConfigBuilder::new()
        .with_directory_source("zeta")
        .with_directory_source("alpha")
        .with_dump_source("db", &["app"])
        .build();

    let names: Vec<String> = source_plans(&config)
        .assert_ok()
        .into_iter()
        .map(|p| p.name)
        .collect();

    // Dump sources always come first
    assert_eq!(names, vec!["db", "zeta", "alpha"]);
}
