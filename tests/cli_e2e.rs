//! End-to-end CLI tests for load-tweets.
//!
//! These tests run the actual binary against zip archives built in a
//! temporary directory. Each test points the config directory at its own
//! temp dir so no user config leaks in.
//!
//! # Test Organization
//!
//! - `test_load_*` - Load command tests
//! - `test_stats_*` - Stats command tests
//! - `test_cli_*` - General CLI tests (flags, help, version, config)

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

// =============================================================================
// Test Utilities
// =============================================================================

/// Log a test event with timestamp
macro_rules! test_log {
    ($($arg:tt)*) => {
        let timestamp = chrono::Utc::now().format("%H:%M:%S%.3f");
        eprintln!("[TEST {}] {}", timestamp, format!($($arg)*));
    };
}

const SAMPLE_RECORDS: &[&str] = &[
    r#"{"id": 1001, "created_at": "Sat Mar 14 15:09:26 +0000 2020", "text": "first #rust", "lang": "en", "user": {"id": 7, "created_at": "Mon Jan 01 00:00:00 +0000 2018", "screen_name": "alice", "name": "Alice"}, "entities": {"urls": [{"expanded_url": "https://example.com/a"}], "user_mentions": [{"id": 8, "screen_name": "bob", "name": "Bob"}], "hashtags": [{"text": "rust"}], "symbols": []}}"#,
    "",
    r#"{"id": 1002, "created_at": "Sat Mar 14 16:00:00 +0000 2020", "text": "second", "lang": "en", "in_reply_to_user_id": 9, "user": {"id": 7, "created_at": "Mon Jan 01 00:00:00 +0000 2018", "screen_name": "alice", "name": "Alice"}, "entities": {"urls": [], "user_mentions": [], "hashtags": [], "symbols": [{"text": "ABC"}]}, "geo": {"coordinates": [10.0, 20.0]}}"#,
];

/// Workspace for one test: a temp dir with an archive, a db path and an
/// isolated config directory.
struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        std::fs::create_dir_all(dir.path().join("config")).unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn db(&self) -> PathBuf {
        self.path().join("tweets.db")
    }

    fn archive(&self, name: &str, lines: &[&str]) -> PathBuf {
        let path = self.path().join(name);
        let mut writer = zip::ZipWriter::new(File::create(&path).unwrap());
        writer
            .start_file("part0.jsonl", SimpleFileOptions::default())
            .unwrap();
        for line in lines {
            writeln!(writer, "{line}").unwrap();
        }
        writer.finish().unwrap();
        path
    }

    fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("load-tweets");
        cmd.env("XDG_CONFIG_HOME", self.path().join("config"))
            .env("HOME", self.path())
            .env("NO_COLOR", "1")
            .env_remove("TWEET_LOADER_DB")
            .env_remove("TWEET_LOADER_PRINT_EVERY")
            .env_remove("TWEET_LOADER_NO_REVERSE")
            .env_remove("RUST_LOG");
        cmd
    }

    fn load(&self, archive: &Path) -> Command {
        let mut cmd = self.cmd();
        cmd.arg("--db")
            .arg(self.db())
            .arg("load")
            .arg("--inputs")
            .arg(archive);
        cmd
    }
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_cli_help() {
    test_log!("Starting test_cli_help");
    let start = Instant::now();

    Fixture::new()
        .cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("load-tweets"))
        .stdout(predicate::str::contains("Usage"));

    test_log!("test_cli_help completed in {:?}", start.elapsed());
}

#[test]
fn test_cli_version() {
    Fixture::new()
        .cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_load_requires_inputs() {
    Fixture::new()
        .cmd()
        .arg("load")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--inputs"));
}

// =============================================================================
// Load Tests
// =============================================================================

#[test]
fn test_load_archive() {
    test_log!("Starting test_load_archive");
    let start = Instant::now();

    let fx = Fixture::new();
    let archive = fx.archive("2020-03-14.zip", SAMPLE_RECORDS);

    fx.load(&archive)
        .assert()
        .success()
        .stdout(predicate::str::contains("Load complete!"))
        .stdout(predicate::str::contains("2 inserted, 0 already present"))
        .stdout(predicate::str::contains("part0.jsonl i= 0 id= 1001"));

    assert!(fx.db().exists());
    test_log!("test_load_archive completed in {:?}", start.elapsed());
}

#[test]
fn test_load_twice_skips_everything() {
    let fx = Fixture::new();
    let archive = fx.archive("2020-03-14.zip", SAMPLE_RECORDS);

    fx.load(&archive).assert().success();
    fx.load(&archive)
        .assert()
        .success()
        .stdout(predicate::str::contains("0 inserted, 2 already present"));
}

#[test]
fn test_load_print_every_samples_progress() {
    let fx = Fixture::new();
    let archive = fx.archive("2020-03-14.zip", SAMPLE_RECORDS);

    fx.load(&archive)
        .arg("--print-every")
        .arg("2")
        .assert()
        .success()
        .stdout(predicate::str::contains("i= 0 id= 1001"))
        .stdout(predicate::str::contains("i= 2 id= 1002"));
}

#[test]
fn test_load_quiet_prints_nothing() {
    let fx = Fixture::new();
    let archive = fx.archive("2020-03-14.zip", SAMPLE_RECORDS);

    fx.load(&archive)
        .arg("--quiet")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_load_json_summary() {
    let fx = Fixture::new();
    let archive = fx.archive("2020-03-14.zip", SAMPLE_RECORDS);

    let output = fx.load(&archive).arg("--format").arg("json").output().unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["summary"]["inserted"], 2);
    assert_eq!(report["tables"]["tweets"], 2);
    assert_eq!(report["tables"]["users"], 3);
    assert_eq!(report["tables"]["tweet_tags"], 2);
}

#[test]
fn test_load_missing_input_fails() {
    let fx = Fixture::new();
    fx.load(&fx.path().join("missing.zip"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Load failed"))
        .stderr(predicate::str::contains("Archive not found"))
        .stderr(predicate::str::contains("were committed").not());
}

#[test]
fn test_load_invalid_json_reports_line() {
    let fx = Fixture::new();
    let archive = fx.archive("bad.zip", &[SAMPLE_RECORDS[0], "{broken"]);

    fx.load(&archive)
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 2"))
        .stderr(predicate::str::contains("Try:"))
        .stderr(predicate::str::contains("already loaded tweets are skipped"))
        .stderr(predicate::str::contains("loaded before this one were committed"));
}

// =============================================================================
// Stats Tests
// =============================================================================

#[test]
fn test_stats_without_database_fails() {
    let fx = Fixture::new();
    fx.cmd()
        .arg("--db")
        .arg(fx.db())
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No database found"));
}

#[test]
fn test_stats_after_load() {
    let fx = Fixture::new();
    let archive = fx.archive("2020-03-14.zip", SAMPLE_RECORDS);
    fx.load(&archive).assert().success();

    fx.cmd()
        .arg("--db")
        .arg(fx.db())
        .arg("stats")
        .arg("--check")
        .assert()
        .success()
        .stdout(predicate::str::contains("Store Statistics"))
        .stdout(predicate::str::contains("unhydrated users:"))
        .stdout(predicate::str::contains("0 violations"));
}

#[test]
fn test_stats_json() {
    let fx = Fixture::new();
    let archive = fx.archive("2020-03-14.zip", SAMPLE_RECORDS);
    fx.load(&archive).assert().success();

    let output = fx
        .cmd()
        .arg("--db")
        .arg(fx.db())
        .arg("--format")
        .arg("json")
        .arg("stats")
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["tables"]["urls"], 1);
    // bob (mention) and user 9 (reply target)
    assert_eq!(report["unhydrated_users"], 2);
    assert!(report.get("checks").is_none());
}

// =============================================================================
// Config and Completions
// =============================================================================

#[test]
fn test_cli_config_show() {
    Fixture::new()
        .cmd()
        .arg("config")
        .arg("--show")
        .assert()
        .success()
        .stdout(predicate::str::contains("[load]"))
        .stdout(predicate::str::contains("print_every = 1000"));
}

#[test]
fn test_cli_config_init_writes_file() {
    let fx = Fixture::new();
    fx.cmd().arg("config").arg("--init").assert().success();

    let written = fx.path().join("config").join("tweet-loader").join("config.toml");
    assert!(written.exists());

    fx.cmd()
        .arg("config")
        .arg("--init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn test_cli_config_file_is_applied() {
    let fx = Fixture::new();
    let config_dir = fx.path().join("config").join("tweet-loader");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("config.toml"), "[load]\nprint_every = 0\n").unwrap();
    let archive = fx.archive("2020-03-14.zip", SAMPLE_RECORDS);

    fx.load(&archive)
        .assert()
        .success()
        .stdout(predicate::str::contains("i= ").not());
}

#[test]
fn test_cli_completions() {
    Fixture::new()
        .cmd()
        .arg("completions")
        .arg("bash")
        .assert()
        .success()
        .stdout(predicate::str::contains("load-tweets"));
}
