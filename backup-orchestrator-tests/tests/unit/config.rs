//! Configuration loading, validation and reference resolution

use backup_orchestrator::config::{load_config, parse_config, Compression, ConfigError};
use backup_orchestrator::managers::backup::source_plans;
use rstest::rstest;
use test_utils::{render, sample_config_toml, ConfigBuilder, ResultAssertions, TestContext};

#[test]
fn test_sample_config_round_trip() {
    let ctx = TestContext::new();
    let path = ctx.create_file("config.toml", &render(sample_config_toml(), ctx.temp_dir()));

    let config = load_config(&path).assert_ok();

    let main = &config.sources.mysqldump["main"];
    assert!(main.all_databases_except_system);
    assert_eq!(main.exclude_databases, vec!["legacy"]);
    assert_eq!(main.compress, Some(Compression::Gzip));
    assert_eq!(main.password.as_ref().map(|p| p.expose()), Some("s3cret"));
    // Secrets never show up in debug output
    assert!(!format!("{:?}", main).contains("s3cret"));

    let www = &config.sources.directories["www"];
    assert!(!www.cleanup);
    assert!(www.incremental);

    assert_eq!(config.global.timeout_seconds, Some(600));
    assert_eq!(config.destinations["offsite"].region.as_deref(), Some("eu-central-1"));
}

#[rstest]
#[case("gzip", Compression::Gzip)]
#[case("bzip2", Compression::Bzip2)]
#[case("none", Compression::None)]
fn test_compression_values(#[case] value: &str, #[case] expected: Compression) {
    let toml = format!(
        r#"
[sources.directories.www]
path = "/srv/www"
temp = "/tmp"
compress = "{}"
"#,
        value
    );

    let config = parse_config(&toml).assert_ok();
    assert_eq!(config.sources.directories["www"].compress, Some(expected));
}

#[test]
fn test_unknown_compression_is_rejected() {
    let toml = r#"
[sources.directories.www]
path = "/srv/www"
temp = "/tmp"
compress = "zstd"
"#;

    assert!(matches!(parse_config(toml), Err(ConfigError::ParseError(_))));
}

#[rstest]
#[case::no_selection(
    r#"
[sources.mysqldump.main]
temp = "/tmp"
"#,
    "no databases selected"
)]
#[case::both_selections(
    r#"
[sources.mysqldump.main]
temp = "/tmp"
databases = ["app"]
all_databases_except_system = true
"#,
    "mutually exclusive"
)]
#[case::missing_snapshot(
    r#"
[sources.directories.www]
path = "/srv/www"
temp = "/tmp"
incremental = true
"#,
    "incremental_snapshot"
)]
#[case::unknown_encryption(
    r#"
[sources.directories.www]
path = "/srv/www"
temp = "/tmp"
encryption = "nope"
"#,
    "unknown encryption 'nope'"
)]
#[case::empty_bucket(
    r#"
[destinations.offsite]
method = "s3"
bucket = ""
"#,
    "bucket must not be empty"
)]
fn test_invalid_configs(#[case] toml: &str, #[case] needle: &str) {
    parse_config(toml).assert_err_contains(needle);
}

#[test]
fn test_missing_required_field() {
    // `temp` is required for dump sources
    let toml = r#"
[sources.mysqldump.main]
databases = ["app"]
"#;

    assert!(matches!(parse_config(toml), Err(ConfigError::ParseError(_))));
}

#[test]
fn test_builder_config_survives_toml() {
    let (path, _temp) = ConfigBuilder::minimal()
        .with_all_databases_source("main", &["legacy"])
        .with_directory_source("www")
        .pipeline("www", Some(Compression::Bzip2), Some("ops"), Some("offsite"))
        .write_toml();

    let config = load_config(&path).assert_ok();

    let names: Vec<&String> = config
        .sources
        .mysqldump
        .keys()
        .chain(config.sources.directories.keys())
        .collect();
    assert_eq!(names, vec!["main", "www"]);
    assert_eq!(config.sources.directories["www"].encryption.as_deref(), Some("ops"));
}

#[test]
fn test_source_plans_describe_pipelines() {
    let config = ConfigBuilder::minimal()
        .with_dump_source("main", &["app", "crm"])
        .pipeline("main", Some(Compression::Gzip), Some("ops"), Some("offsite"))
        .with_directory_source("www")
        .modify_directory("www", |s| s.cleanup = false)
        .pipeline("www", None, None, Some("offsite"))
        .build();

    let plans = source_plans(&config).assert_ok();

    assert_eq!(plans.len(), 2);
    assert_eq!(plans[0].target, "app, crm");
    assert_eq!(plans[0].pipeline, "gzip -> gpg(ops@example.org) -> s3(offsite) -> cleanup");
    assert_eq!(plans[1].pipeline, "s3(offsite)");
}
