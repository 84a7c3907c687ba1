//! MySQL dump tests against a MariaDB container
//!
//! Requires Docker plus the `mysql` and `mysqldump` clients on the host.
//! Run with: `cargo test -p backup-orchestrator-tests --test integration -- --ignored`

use crate::common::{is_docker_available, ContainerGuard};
use backup_orchestrator::managers::backup::BackupRunner;
use backup_orchestrator::utils::{RealExecutor, SecretString};
use serial_test::serial;
use std::process::Command;
use std::thread;
use std::time::Duration;
use test_utils::{file_names, ConfigBuilder, MockObjectStore, TEST_TIMESTAMP};

const CONTAINER: &str = "backup-orchestrator-test-mariadb";
const PORT: u16 = 33306;
const ROOT_PASSWORD: &str = "testpass";

fn start_mariadb() -> anyhow::Result<ContainerGuard> {
    let port_mapping = format!("{}:3306", PORT);
    let password = format!("MARIADB_ROOT_PASSWORD={}", ROOT_PASSWORD);

    let output = Command::new("docker")
        .args(["run", "-d", "--name", CONTAINER])
        .args(["-p", &port_mapping, "-e", &password, "mariadb:11"])
        .output()?;
    if !output.status.success() {
        anyhow::bail!("docker run failed: {}", String::from_utf8_lossy(&output.stderr));
    }

    let guard = ContainerGuard::new(CONTAINER);

    for _ in 0..60 {
        if exec_sql("SELECT 1").is_ok() {
            return Ok(guard);
        }
        thread::sleep(Duration::from_secs(1));
    }

    anyhow::bail!("MariaDB failed to become ready")
}

fn exec_sql(sql: &str) -> anyhow::Result<String> {
    let password = format!("-p{}", ROOT_PASSWORD);
    let output = Command::new("docker")
        .args(["exec", CONTAINER, "mariadb", "-uroot", &password, "-e", sql])
        .output()?;
    if !output.status.success() {
        anyhow::bail!("{}", String::from_utf8_lossy(&output.stderr));
    }
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

#[test]
#[ignore]
#[serial]
fn test_dump_all_databases_except_system() {
    if !is_docker_available() {
        eprintln!("skipping: Docker not available");
        return;
    }
    require_tools!("mysql", "mysqldump");

    let _container = start_mariadb().expect("Failed to start MariaDB");
    exec_sql("CREATE DATABASE app; CREATE TABLE app.t (id INT); INSERT INTO app.t VALUES (42);")
        .unwrap();
    exec_sql("CREATE DATABASE legacy").unwrap();

    let builder = ConfigBuilder::new()
        .with_all_databases_source("main", &["legacy"])
        .modify_dump("main", |s| {
            s.host = Some("127.0.0.1".to_string());
            s.port = Some(PORT);
            s.user = Some("root".to_string());
            s.password = Some(SecretString::new(ROOT_PASSWORD));
            s.extra_args = vec!["--single-transaction".to_string()];
        });
    let dumps = builder.temp_path().join("dumps");
    let (config, _temp) = builder.persist();

    let summary = BackupRunner::new(
        config,
        Box::new(RealExecutor::new()),
        Box::new(MockObjectStore::new()),
    )
    .with_timestamp(TEST_TIMESTAMP)
    .run()
    .unwrap();

    assert!(summary.is_success(), "{:?}", summary.outcomes);
    assert_eq!(file_names(&dumps), vec!["app-20250101_020000.sql"]);

    let dump = std::fs::read_to_string(dumps.join("app-20250101_020000.sql")).unwrap();
    assert!(dump.contains("INSERT INTO `t` VALUES (42)"));
}

#[test]
#[ignore]
#[serial]
fn test_wrong_password_fails_unit() {
    if !is_docker_available() {
        eprintln!("skipping: Docker not available");
        return;
    }
    require_tools!("mysql", "mysqldump");

    let _container = start_mariadb().expect("Failed to start MariaDB");

    let (config, _temp) = ConfigBuilder::new()
        .with_dump_source("main", &["mysql"])
        .modify_dump("main", |s| {
            s.host = Some("127.0.0.1".to_string());
            s.port = Some(PORT);
            s.user = Some("root".to_string());
            s.password = Some(SecretString::new("wrong"));
        })
        .persist();

    let summary = BackupRunner::new(
        config,
        Box::new(RealExecutor::new()),
        Box::new(MockObjectStore::new()),
    )
    .with_timestamp(TEST_TIMESTAMP)
    .run()
    .unwrap();

    assert!(!summary.is_success());
    assert!(summary.outcomes[0]
        .error_detail()
        .unwrap()
        .contains("Access denied"));
}
