//! CLI tests for forge-review
//!
//! These run the real binary against temporary project directories.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a forge-review Command
fn forge_review() -> Command {
    cargo_bin_cmd!("forge-review")
}

/// Helper to create a temporary project directory
fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

/// Helper to initialize a project in a temp directory
fn init_project(dir: &TempDir) {
    forge_review()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();
}

fn add_feature(dir: &TempDir, title: &str) {
    forge_review()
        .current_dir(dir.path())
        .args(["add", title, "-d", "Some description"])
        .assert()
        .success();
}

fn stdout_json(dir: &TempDir, args: &[&str]) -> serde_json::Value {
    let output = forge_review()
        .current_dir(dir.path())
        .args(args)
        .output()
        .unwrap();
    assert!(output.status.success(), "{:?} failed", args);
    serde_json::from_slice(&output.stdout).unwrap()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_help() {
        forge_review()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("review"));
    }

    #[test]
    fn test_version() {
        forge_review().arg("--version").assert().success();
    }

    #[test]
    fn test_init_creates_structure() {
        let dir = create_temp_project();

        forge_review()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized review loop"));

        assert!(dir.path().join(".forge/review.toml").exists());
        assert!(dir.path().join(".forge/review.db").exists());
        let ignore = fs::read_to_string(dir.path().join(".forge/.gitignore")).unwrap();
        assert!(ignore.contains("review.db"));
    }

    #[test]
    fn test_init_idempotent() {
        let dir = create_temp_project();
        init_project(&dir);
        add_feature(&dir, "Keep me");

        forge_review()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Already initialized"));

        let features = stdout_json(&dir, &["list", "--json"]);
        assert_eq!(features.as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_commands_require_init() {
        let dir = create_temp_project();
        forge_review()
            .current_dir(dir.path())
            .arg("list")
            .assert()
            .failure()
            .stderr(predicate::str::contains("not initialized"));
    }

    #[test]
    fn test_project_dir_flag() {
        let dir = create_temp_project();
        forge_review()
            .arg("--project-dir")
            .arg(dir.path())
            .arg("init")
            .assert()
            .success();
        assert!(dir.path().join(".forge/review.toml").exists());
    }
}

// =============================================================================
// Feature Commands
// =============================================================================

mod features {
    use super::*;

    #[test]
    fn test_list_empty() {
        let dir = create_temp_project();
        init_project(&dir);
        forge_review()
            .current_dir(dir.path())
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("No features yet"));
    }

    #[test]
    fn test_add_and_list() {
        let dir = create_temp_project();
        init_project(&dir);

        forge_review()
            .current_dir(dir.path())
            .args(["add", "OAuth login"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Added feature"));

        forge_review()
            .current_dir(dir.path())
            .arg("list")
            .assert()
            .success()
            .stdout(predicate::str::contains("OAuth login"))
            .stdout(predicate::str::contains("backlog"));
    }

    #[test]
    fn test_status_json_before_review() {
        let dir = create_temp_project();
        init_project(&dir);
        add_feature(&dir, "Search");

        let feature = stdout_json(&dir, &["status", "1", "--json"]);
        assert_eq!(feature["id"], 1);
        assert_eq!(feature["title"], "Search");
        assert_eq!(feature["status"], "backlog");
        assert!(feature["review"].is_null());
    }

    #[test]
    fn test_start_moves_to_in_progress() {
        let dir = create_temp_project();
        init_project(&dir);
        add_feature(&dir, "Search");

        forge_review()
            .current_dir(dir.path())
            .args(["start", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("in_progress"));

        // Starting twice is an invalid transition
        forge_review()
            .current_dir(dir.path())
            .args(["start", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("expected backlog"));
    }

    #[test]
    fn test_status_unknown_feature() {
        let dir = create_temp_project();
        init_project(&dir);
        forge_review()
            .current_dir(dir.path())
            .args(["status", "42"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Feature 42 not found"));
    }

    #[test]
    fn test_history_empty() {
        let dir = create_temp_project();
        init_project(&dir);
        add_feature(&dir, "Search");

        forge_review()
            .current_dir(dir.path())
            .args(["history", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No review iterations yet"));

        let history = stdout_json(&dir, &["history", "1", "--json"]);
        assert_eq!(history["current_iteration"], 0);
        assert_eq!(history["iterations"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_context_before_review_is_feature_description() {
        let dir = create_temp_project();
        init_project(&dir);
        add_feature(&dir, "Search");

        forge_review()
            .current_dir(dir.path())
            .args(["context", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("# Implement: Search"))
            .stdout(predicate::str::contains("Some description"));
    }
}

// =============================================================================
// Review Loop Commands
// =============================================================================

mod review_loop {
    use super::*;

    #[test]
    fn test_review_requires_in_progress() {
        let dir = create_temp_project();
        init_project(&dir);
        add_feature(&dir, "Search");

        forge_review()
            .current_dir(dir.path())
            .args(["review", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("expected in_progress"));
    }

    #[test]
    fn test_review_with_stale_version_conflicts() {
        let dir = create_temp_project();
        init_project(&dir);
        add_feature(&dir, "Search");
        forge_review()
            .current_dir(dir.path())
            .args(["start", "1"])
            .assert()
            .success();

        forge_review()
            .current_dir(dir.path())
            .args(["review", "1", "--expected-version", "999"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Concurrent modification"));
    }

    #[test]
    fn test_recover_nothing_to_do() {
        let dir = create_temp_project();
        init_project(&dir);
        add_feature(&dir, "Search");

        forge_review()
            .current_dir(dir.path())
            .args(["recover", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("needs no recovery"));
    }

    #[test]
    fn test_halt_blocks_review() {
        let dir = create_temp_project();
        init_project(&dir);
        add_feature(&dir, "Search");
        forge_review()
            .current_dir(dir.path())
            .args(["start", "1"])
            .assert()
            .success();

        forge_review()
            .current_dir(dir.path())
            .args(["halt", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("halted"));

        let feature = stdout_json(&dir, &["status", "1", "--json"]);
        assert_eq!(feature["status"], "in_progress");
        assert_eq!(feature["review"]["status"], "failed");

        forge_review()
            .current_dir(dir.path())
            .args(["status", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Attempts left: 3"))
            .stdout(predicate::str::contains("manual intervention required"));

        forge_review()
            .current_dir(dir.path())
            .args(["review", "1"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("manual intervention"));
    }

    /// Full loop against a git repository with a stand-in reviewer script.
    #[cfg(unix)]
    #[test]
    fn test_review_commits_and_approves() {
        use std::os::unix::fs::PermissionsExt;

        let dir = create_temp_project();
        git2::Repository::init(dir.path()).unwrap();
        init_project(&dir);

        let script = dir.path().join("fake-claude.sh");
        fs::write(
            &script,
            "#!/bin/sh\ncat >/dev/null\necho '{\"decision\": \"approved\", \"summary\": \"ok\", \"findings\": [{\"severity\": \"info\", \"title\": \"Add a newline\"}]}'\n",
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        fs::write(
            dir.path().join(".forge/review.toml"),
            format!("[agent]\nclaude_cmd = \"{}\"\n", script.display()),
        )
        .unwrap();

        add_feature(&dir, "Greeting");
        forge_review()
            .current_dir(dir.path())
            .args(["start", "1"])
            .assert()
            .success();
        fs::write(dir.path().join("hello.txt"), "hello\n").unwrap();

        forge_review()
            .current_dir(dir.path())
            .args(["review", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Iteration 1 for feature 1: approved"));

        let feature = stdout_json(&dir, &["status", "1", "--json"]);
        assert_eq!(feature["status"], "waiting_approval");
        assert_eq!(feature["review"]["status"], "approved");

        forge_review()
            .current_dir(dir.path())
            .args(["history", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Findings: 0 error, 0 warning, 1 info"))
            .stdout(predicate::str::contains("Add a newline"));

        forge_review()
            .current_dir(dir.path())
            .args(["status", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Attempts left: 2"));

        forge_review()
            .current_dir(dir.path())
            .args(["history", "1", "--detail", "1"])
            .assert()
            .success()
            .stdout(predicate::str::contains("hello.txt"));

        // The store lives under .forge/ and is never committed.
        let repo = git2::Repository::open(dir.path()).unwrap();
        let tree = repo.head().unwrap().peel_to_tree().unwrap();
        assert!(tree.get_name("hello.txt").is_some());
        assert!(tree.get_name(".forge").is_none());
    }
}

// =============================================================================
// Config Commands
// =============================================================================

mod config {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = create_temp_project();
        init_project(&dir);
        forge_review()
            .current_dir(dir.path())
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("max_iterations = 3"))
            .stdout(predicate::str::contains("Effective values"));
    }

    #[test]
    fn test_config_validate_defaults() {
        let dir = create_temp_project();
        init_project(&dir);
        forge_review()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid."));
    }

    #[test]
    fn test_config_validate_rejects_zero_cap() {
        let dir = create_temp_project();
        init_project(&dir);
        fs::write(
            dir.path().join(".forge/review.toml"),
            "[review]\nmax_iterations = 0\n",
        )
        .unwrap();

        forge_review()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("Invalid configuration"));

        // Commands that open the store refuse to run on invalid config
        forge_review()
            .current_dir(dir.path())
            .arg("list")
            .assert()
            .failure()
            .stderr(predicate::str::contains("max_iterations"));
    }

    #[test]
    fn test_config_rejects_backward_pipeline_target() {
        let dir = create_temp_project();
        init_project(&dir);
        fs::write(
            dir.path().join(".forge/review.toml"),
            "[pipeline]\nafter_approval = \"in_progress\"\n",
        )
        .unwrap();

        forge_review()
            .current_dir(dir.path())
            .args(["config", "validate"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("pipeline targets"));
    }
}
