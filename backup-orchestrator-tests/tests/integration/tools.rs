//! Round trips through the real gzip, bzip2 and tar binaries

use backup_orchestrator::artifact::{Artifact, ArtifactStage};
use backup_orchestrator::config::Compression;
use backup_orchestrator::managers::backup::BackupRunner;
use backup_orchestrator::stages::compress;
use backup_orchestrator::utils::RealExecutor;
use rstest::rstest;
use std::fs;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use test_utils::{file_names, ConfigBuilder, MockObjectStore, TEST_TIMESTAMP};

fn decompress(path: &Path, algorithm: Compression) -> Vec<u8> {
    let file = fs::File::open(path).unwrap();
    let mut out = Vec::new();
    match algorithm {
        Compression::Gzip => {
            flate2::read::GzDecoder::new(file).read_to_end(&mut out).unwrap();
        }
        Compression::Bzip2 => {
            bzip2::read::BzDecoder::new(file).read_to_end(&mut out).unwrap();
        }
        Compression::None => {
            out = fs::read(path).unwrap();
        }
    }
    out
}

#[rstest]
#[case(Compression::Gzip, "gzip")]
#[case(Compression::Bzip2, "bzip2")]
fn test_compression_round_trip(#[case] algorithm: Compression, #[case] tool: &str) {
    require_tools!(tool);

    let temp = tempfile::TempDir::new().unwrap();
    let input = temp.path().join("app-20250101_020000.sql");
    let original: Vec<u8> = (0..50_000u32).flat_map(|i| i.to_le_bytes()).collect();
    fs::write(&input, &original).unwrap();

    let result = compress(
        &RealExecutor::new(),
        Artifact::raw(&input, "main"),
        algorithm,
        Some(Duration::from_secs(60)),
    )
    .unwrap();

    assert_eq!(result.stage, ArtifactStage::Compressed);
    assert!(!input.exists());
    assert_eq!(decompress(&result.path, algorithm), original);
}

#[test]
fn test_directory_archive_with_real_tar() {
    require_tools!("tar", "gzip");

    let builder = ConfigBuilder::minimal()
        .with_directory_source("www")
        .pipeline("www", Some(Compression::Gzip), None, None);
    let archives = builder.temp_path().join("archives");
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
    assert_eq!(file_names(&archives), vec!["www-20250101_020000.tar.gz"]);

    let tar = decompress(&archives.join("www-20250101_020000.tar.gz"), Compression::Gzip);
    let listing = String::from_utf8_lossy(&tar);
    // Members are stored relative to the source's parent
    assert!(listing.contains("www/index.html"));
    assert!(listing.contains("<html>hello</html>"));
}

#[test]
fn test_incremental_archive_with_real_tar() {
    require_tools!("tar");

    let builder = ConfigBuilder::new().with_directory_source("www");
    let snapshot = builder.temp_path().join("www.snar");
    let data = builder.temp_path().join("data/www");
    let archives = builder.temp_path().join("archives");
    let (config, _temp) = builder
        .modify_directory("www", |s| {
            s.incremental = true;
            s.incremental_snapshot = Some(snapshot.clone());
        })
        .persist();

    let run = |timestamp: &str| {
        BackupRunner::new(
            config.clone(),
            Box::new(RealExecutor::new()),
            Box::new(MockObjectStore::new()),
        )
        .with_timestamp(timestamp)
        .run()
        .unwrap()
    };

    assert!(run("20250101_020000").is_success());
    assert!(snapshot.exists());

    fs::write(data.join("new.txt"), "added later").unwrap();
    assert!(run("20250102_020000").is_success());

    let second = fs::read(archives.join("www-20250102_020000.tar")).unwrap();
    let listing = String::from_utf8_lossy(&second);
    assert!(listing.contains("new.txt"));
    assert!(
        !listing.contains("<html>hello</html>"),
        "unchanged files belong to the level-0 archive"
    );
}
