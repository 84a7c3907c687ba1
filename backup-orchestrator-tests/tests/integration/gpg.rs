//! gpg encryption round trip
//!
//! Generates a throwaway key in a private GNUPGHOME. Key generation can be
//! slow on machines with little entropy, so this is ignored by default.

use backup_orchestrator::artifact::{Artifact, ArtifactStage};
use backup_orchestrator::config::EncryptionConfig;
use backup_orchestrator::stages::encrypt;
use backup_orchestrator::utils::RealExecutor;
use serial_test::serial;
use std::fs;
use std::process::Command;
use std::time::Duration;

const RECIPIENT: &str = "backup-test@example.org";

fn generate_key(home: &std::path::Path) -> bool {
    Command::new("gpg")
        .env("GNUPGHOME", home)
        .args([
            "--batch",
            "--pinentry-mode",
            "loopback",
            "--passphrase",
            "",
            "--quick-generate-key",
            RECIPIENT,
            "default",
            "default",
            "never",
        ])
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[test]
#[ignore]
#[serial]
fn test_encrypt_decrypt_round_trip() {
    require_tools!("gpg");

    let home = tempfile::TempDir::new().unwrap();
    assert!(generate_key(home.path()), "key generation failed");

    // The encrypt stage inherits the environment
    std::env::set_var("GNUPGHOME", home.path());

    let work = tempfile::TempDir::new().unwrap();
    let input = work.path().join("app-20250101_020000.sql.gz");
    fs::write(&input, b"compressed dump bytes").unwrap();

    let result = encrypt(
        &RealExecutor::new(),
        Artifact {
            path: input.clone(),
            source: "main".to_string(),
            stage: ArtifactStage::Compressed,
        },
        &EncryptionConfig::gpg(RECIPIENT),
        Some(Duration::from_secs(60)),
    );

    std::env::remove_var("GNUPGHOME");
    let result = result.unwrap();

    assert_eq!(result.stage, ArtifactStage::Encrypted);
    assert!(!input.exists());

    let decrypted = Command::new("gpg")
        .env("GNUPGHOME", home.path())
        .args(["--batch", "--pinentry-mode", "loopback", "--passphrase", "", "--decrypt"])
        .arg(&result.path)
        .output()
        .unwrap();

    assert!(decrypted.status.success());
    assert_eq!(decrypted.stdout, b"compressed dump bytes");
}

#[test]
#[ignore]
#[serial]
fn test_unknown_recipient_fails() {
    require_tools!("gpg");

    let home = tempfile::TempDir::new().unwrap();
    std::env::set_var("GNUPGHOME", home.path());

    let work = tempfile::TempDir::new().unwrap();
    let input = work.path().join("www.tar");
    fs::write(&input, b"tar").unwrap();

    let result = encrypt(
        &RealExecutor::new(),
        Artifact::raw(&input, "www"),
        &EncryptionConfig::gpg("nobody@example.org"),
        Some(Duration::from_secs(60)),
    );

    std::env::remove_var("GNUPGHOME");

    assert!(result.is_err());
    assert!(input.exists());
    assert!(!work.path().join("www.tar.gpg").exists());
}
