//! Fake external tools and sample configuration text
//!
//! The fake toolchain is a `MockExecutor` whose side effects write the files
//! the real tools would write, so the whole pipeline can run without any of
//! them installed.

use backup_orchestrator::utils::executor::mock::{MockExecutor, MockResponse};
use std::fs;
use std::path::Path;

/// Timestamp used for every run started through the test helpers
pub const TEST_TIMESTAMP: &str = "20250101_020000";

fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|pos| args.get(pos + 1))
        .map(String::as_str)
}

fn value_of<'a>(args: &'a [String], prefix: &str) -> Option<&'a str> {
    args.iter().find_map(|a| a.strip_prefix(prefix))
}

fn missing(what: &str) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("missing {}", what))
}

/// Executor that behaves like mysqldump, tar, gzip, bzip2 and gpg
pub fn fake_toolchain() -> MockExecutor {
    MockExecutor::new()
        .with_side_effect("mysqldump", |args| {
            let target = value_of(args, "--result-file=").ok_or_else(|| missing("--result-file"))?;
            let database = args.last().ok_or_else(|| missing("database"))?;
            fs::write(target, format!("-- dump of {}\n", database))
        })
        .with_side_effect("tar", |args| {
            let target = value_after(args, "--file").ok_or_else(|| missing("--file"))?;
            fs::write(target, b"fake tar archive")?;
            if let Some(snapshot) = value_of(args, "--listed-incremental=") {
                let mut state = fs::read(snapshot).unwrap_or_default();
                state.extend_from_slice(b"+run");
                fs::write(snapshot, state)?;
            }
            Ok(())
        })
        .with_side_effect("gzip", |args| {
            let input = args.last().ok_or_else(|| missing("input"))?;
            fs::write(format!("{}.gz", input), b"gzip data")
        })
        .with_side_effect("bzip2", |args| {
            let input = args.last().ok_or_else(|| missing("input"))?;
            fs::write(format!("{}.bz2", input), b"bzip2 data")
        })
        .with_side_effect("gpg", |args| {
            let output = value_after(args, "--output").ok_or_else(|| missing("--output"))?;
            fs::write(output, b"-----BEGIN PGP MESSAGE-----")
        })
}

/// Fake toolchain whose `mysql` lists the given databases
pub fn fake_toolchain_with_databases(databases: &[&str]) -> MockExecutor {
    let listing = databases.iter().map(|db| format!("{}\n", db)).collect::<String>();
    fake_toolchain().expect("mysql", MockResponse::stdout(&listing))
}

/// File names directly inside `dir`, sorted
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// Full-featured configuration in the documented layout
pub fn sample_config_toml() -> &'static str {
    r#"
[global]
log_level = "debug"
timeout_seconds = 600
lock_file = "{temp}/run.lock"

[notifications]
discord_webhook_url = ""
notify_on = ["failure"]

[sources.mysqldump.main]
temp = "{temp}/dumps"
all_databases_except_system = true
exclude_databases = ["legacy"]
compress = "gzip"
encryption = "ops"
destination = "offsite"
host = "db.internal"
user = "backup"
password = "s3cret"
extra_args = ["--single-transaction"]

[sources.directories.www]
path = "{temp}/www"
temp = "{temp}/archives"
compress = "bzip2"
destination = "offsite"
cleanup = false
incremental = true
incremental_snapshot = "{temp}/www.snar"

[destinations.offsite]
method = "s3"
bucket = "backups"
prefix = "nightly"
region = "eu-central-1"

[encryptions.ops]
method = "gpg"
recipient = "ops@example.org"
"#
}

/// Fill the `{temp}` placeholder of a template
pub fn render(template: &str, temp: &Path) -> String {
    template.replace("{temp}", &temp.display().to_string())
}
