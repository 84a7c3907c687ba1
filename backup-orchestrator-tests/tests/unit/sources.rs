//! Source production: database selection, dumps and directory archives

use backup_orchestrator::managers::backup::PlannedTask;
use backup_orchestrator::strategies::mysqldump::resolve_databases;
use backup_orchestrator::utils::SecretString;
use rstest::rstest;
use std::path::Path;
use test_utils::{
    fake_toolchain, fake_toolchain_with_databases, file_names, Compression, ConfigBuilder,
    MockObjectStore, MockResponse, ResultAssertions, TestContext,
};

fn strings(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[rstest]
#[case::only_system(&["mysql", "sys", "information_schema", "performance_schema"], &[], &[])]
#[case::keeps_order(&["zeta", "mysql", "alpha"], &[], &["zeta", "alpha"])]
#[case::with_exclusions(&["app", "crm", "scratch"], &["scratch"], &["app", "crm"])]
#[case::exclusion_not_listed(&["app"], &["ghost"], &["app"])]
fn test_all_except_system_resolution(
    #[case] listed: &[&str],
    #[case] exclude: &[&str],
    #[case] expected: &[&str],
) {
    assert_eq!(
        resolve_databases(&strings(listed), &strings(exclude)),
        strings(expected)
    );
}

#[test]
fn test_all_databases_source_dumps_each_database() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::minimal()
            .with_all_databases_source("main", &["legacy"])
            .pipeline("main", Some(Compression::Gzip), None, Some("offsite")),
    );
    let executor = fake_toolchain_with_databases(&[
        "information_schema",
        "app",
        "legacy",
        "mysql",
        "crm",
        "sys",
    ]);
    let store = MockObjectStore::new();

    let summary = ctx.run(&executor, &store).assert_ok();

    let units: Vec<&str> = summary.outcomes.iter().map(|o| o.unit.as_str()).collect();
    assert_eq!(units, vec!["main/app", "main/crm"]);
    assert_eq!(executor.call_count("mysql"), 1);
    assert_eq!(executor.call_count("mysqldump"), 2);
    assert_eq!(
        store.uploaded_keys(),
        vec![
            "nightly/app-20250101_020000.sql.gz",
            "nightly/crm-20250101_020000.sql.gz"
        ]
    );
}

#[test]
fn test_explicit_list_ignores_server_listing() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::minimal().with_dump_source("main", &["app", "crm"]),
    );
    let executor = fake_toolchain();
    let store = MockObjectStore::new();

    let tasks = ctx.runner(&executor, &store).build_tasks().assert_ok();

    assert_eq!(tasks.len(), 1);
    assert!(matches!(tasks[0], PlannedTask::Ready(_)));
    assert!(!executor.was_called("mysql"));
}

#[test]
fn test_listing_failure_fails_only_that_source() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::minimal()
            .with_all_databases_source("main", &[])
            .with_directory_source("www"),
    );
    let executor =
        fake_toolchain().expect("mysql", MockResponse::failure("Access denied for user"));
    let store = MockObjectStore::new();

    let summary = ctx.run(&executor, &store).assert_ok();

    assert_eq!(summary.outcomes.len(), 2);
    assert!(!summary.outcomes[0].is_success());
    assert!(summary.outcomes[1].is_success());
    assert!(!executor.was_called("mysqldump"));
}

#[test]
fn test_credentials_only_travel_in_option_file() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::minimal()
            .with_dump_source("main", &["app"])
            .modify_dump("main", |s| {
                s.host = Some("db.internal".to_string());
                s.port = Some(3306);
                s.user = Some("backup".to_string());
                s.password = Some(SecretString::new("hunter2"));
            }),
    );
    let executor = fake_toolchain();
    let store = MockObjectStore::new();

    ctx.run(&executor, &store).assert_ok();

    let call = &executor.calls_to("mysqldump")[0];
    assert!(!call.has_arg_containing("hunter2"));
    assert!(!call
        .args
        .iter()
        .any(|a| a.starts_with("--user") || a.starts_with("--password")));

    let option_file = call.args[0]
        .strip_prefix("--defaults-extra-file=")
        .expect("option file must be the first argument");
    assert!(!Path::new(option_file).exists(), "option file must be removed after the call");
    assert!(call.args.contains(&"--host=db.internal".to_string()));
}

#[test]
fn test_partial_dump_removed_on_failure() {
    let ctx =
        TestContext::from_builder(ConfigBuilder::minimal().with_dump_source("main", &["app"]));
    let executor = fake_toolchain().expect("mysqldump", MockResponse::failure("Lost connection"));
    let store = MockObjectStore::new();

    let summary = ctx.run(&executor, &store).assert_ok();

    assert!(!summary.is_success());
    assert!(file_names(&ctx.path("dumps")).is_empty());
}

#[test]
fn test_incremental_snapshot_preserved_when_tar_fails() {
    let builder = ConfigBuilder::minimal().with_directory_source("www");
    let snapshot = builder.temp_path().join("state/www.snar");
    let ctx = TestContext::from_builder(builder.modify_directory("www", |s| {
        s.incremental = true;
        s.incremental_snapshot = Some(snapshot.clone());
    }));
    ctx.create_file("state/www.snar", "level-0 state");

    let executor =
        fake_toolchain().expect("tar", MockResponse::failure("file changed as we read it"));
    let store = MockObjectStore::new();

    let summary = ctx.run(&executor, &store).assert_ok();

    assert!(!summary.is_success());
    assert_eq!(ctx.read_file("state/www.snar").unwrap(), "level-0 state");
    assert_eq!(file_names(&ctx.path("state")), vec!["www.snar"]);
}

#[test]
fn test_incremental_snapshot_advances_on_success() {
    let builder = ConfigBuilder::minimal().with_directory_source("www");
    let snapshot = builder.temp_path().join("www.snar");
    let ctx = TestContext::from_builder(builder.modify_directory("www", |s| {
        s.incremental = true;
        s.incremental_snapshot = Some(snapshot.clone());
    }));

    let executor = fake_toolchain();
    let store = MockObjectStore::new();

    // First run starts from nothing, the next night's run builds on it
    ctx.run(&executor, &store).assert_ok();
    let next = ctx
        .runner(&executor, &store)
        .with_timestamp("20250102_020000")
        .run()
        .assert_ok();

    assert!(next.is_success(), "{:?}", next.outcomes);

    assert_eq!(ctx.read_file("www.snar").unwrap(), "+run+run");
    let tar_calls = executor.calls_to("tar");
    assert!(tar_calls[1].has_arg_containing("--listed-incremental="));
}

#[test]
fn test_second_source_with_same_dump_name_fails() {
    let ctx = TestContext::from_builder(
        ConfigBuilder::new()
            .with_dump_source("primary", &["app"])
            .with_dump_source("replica", &["app"]),
    );
    let executor = fake_toolchain();
    let store = MockObjectStore::new();

    let summary = ctx.run(&executor, &store).assert_ok();

    // The second unit must not silently replace the first one's dump
    assert!(summary.outcomes[0].is_success());
    assert!(!summary.outcomes[1].is_success());
    assert_eq!(summary.outcomes[1].unit, "replica/app");
    assert!(summary.outcomes[1]
        .error_detail()
        .unwrap()
        .contains("already exists"));

    assert_eq!(file_names(&ctx.path("dumps")), vec!["app-20250101_020000.sql"]);
    assert_eq!(
        ctx.read_file("dumps/app-20250101_020000.sql").unwrap(),
        "-- dump of app\n"
    );
    assert_eq!(executor.call_count("mysqldump"), 1);
}
