//! Integration tests for the cardboard binary.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const ENV_VARS: [&str; 8] = [
    "CARDBOARD_HOST",
    "CARDBOARD_PORT",
    "CARDBOARD_DB_PATH",
    "CARDBOARD_LOG_LEVEL",
    "CARDBOARD_LOG_FORMAT",
    "CARDBOARD_DEFAULT_USER",
    "CARDBOARD_DEFAULT_EMAIL",
    "RUST_LOG",
];

/// Helper to create a cardboard Command isolated from the caller's environment
fn cardboard(dir: &TempDir) -> Command {
    let mut cmd = cargo_bin_cmd!("cardboard");
    cmd.current_dir(dir.path());
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_cardboard_help() {
        let dir = create_temp_project();
        cardboard(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("serve"))
            .stdout(predicate::str::contains("init"))
            .stdout(predicate::str::contains("config"));
    }

    #[test]
    fn test_cardboard_version() {
        let dir = create_temp_project();
        cardboard(&dir).arg("--version").assert().success();
    }

    #[test]
    fn test_unknown_command_fails() {
        let dir = create_temp_project();
        cardboard(&dir).arg("frobnicate").assert().failure();
    }

    #[test]
    fn test_init_creates_database() {
        let dir = create_temp_project();

        cardboard(&dir)
            .args(["init", "--db-path", "data/board.db"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Database initialized"))
            .stdout(predicate::str::contains("Default user: demo"));

        assert!(dir.path().join("data/board.db").exists());
    }

    #[test]
    fn test_init_is_idempotent() {
        let dir = create_temp_project();

        for _ in 0..2 {
            cardboard(&dir)
                .args(["init", "--db-path", "board.db"])
                .assert()
                .success()
                .stdout(predicate::str::contains("Default user: demo (id 1)"));
        }
    }

    #[test]
    fn test_init_uses_default_db_path() {
        let dir = create_temp_project();

        cardboard(&dir).arg("init").assert().success();
        assert!(dir.path().join(".cardboard/cardboard.db").exists());
    }

    #[test]
    fn test_init_reads_db_path_from_env() {
        let dir = create_temp_project();

        cardboard(&dir)
            .arg("init")
            .env("CARDBOARD_DB_PATH", "from-env.db")
            .env("CARDBOARD_DEFAULT_USER", "alice")
            .assert()
            .success()
            .stdout(predicate::str::contains("Default user: alice"));

        assert!(dir.path().join("from-env.db").exists());
    }

    #[test]
    fn test_init_after_renaming_default_user() {
        let dir = create_temp_project();

        cardboard(&dir)
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Default user: demo (id 1)"));

        cardboard(&dir)
            .arg("init")
            .env("CARDBOARD_DEFAULT_USER", "alice")
            .assert()
            .success()
            .stdout(predicate::str::contains("Default user: alice (id 2)"));
    }
}

// =============================================================================
// Configuration Tests
// =============================================================================

mod configuration {
    use super::*;

    #[test]
    fn test_config_show_defaults() {
        let dir = create_temp_project();

        cardboard(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("using defaults"))
            .stdout(predicate::str::contains("port = 3001"));
    }

    #[test]
    fn test_config_init_creates_toml() {
        let dir = create_temp_project();

        cardboard(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Created"));

        let content = fs::read_to_string(dir.path().join("cardboard.toml")).unwrap();
        assert!(content.contains("[server]"));
        assert!(content.contains("[database]"));
    }

    #[test]
    fn test_config_init_does_not_overwrite() {
        let dir = create_temp_project();
        fs::write(dir.path().join("cardboard.toml"), "[server]\nport = 4321\n").unwrap();

        cardboard(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stdout(predicate::str::contains("already exists"));

        let content = fs::read_to_string(dir.path().join("cardboard.toml")).unwrap();
        assert!(content.contains("4321"));
    }

    #[test]
    fn test_config_shows_file_values() {
        let dir = create_temp_project();
        fs::write(
            dir.path().join("cardboard.toml"),
            "[server]\nport = 4321\n\n[auth]\ndefault_username = \"alice\"\n",
        )
        .unwrap();

        cardboard(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("port = 4321"))
            .stdout(predicate::str::contains("alice"));
    }

    #[test]
    fn test_config_env_overrides_file() {
        let dir = create_temp_project();
        fs::write(dir.path().join("cardboard.toml"), "[server]\nport = 4321\n").unwrap();

        cardboard(&dir)
            .args(["config", "show"])
            .env("CARDBOARD_PORT", "5555")
            .assert()
            .success()
            .stdout(predicate::str::contains("port = 5555"));
    }

    #[test]
    fn test_config_flag_selects_file() {
        let dir = create_temp_project();
        fs::create_dir_all(dir.path().join("conf")).unwrap();
        fs::write(dir.path().join("conf/custom.toml"), "[server]\nport = 6000\n").unwrap();

        cardboard(&dir)
            .args(["--config", "conf/custom.toml", "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("port = 6000"));
    }

    #[test]
    fn test_config_validate_defaults() {
        let dir = create_temp_project();

        cardboard(&dir)
            .args(["config", "validate"])
            .assert()
            .success()
            .stdout(predicate::str::contains("Configuration is valid"));
    }

    #[test]
    fn test_config_validate_reports_warnings() {
        let dir = create_temp_project();
        fs::write(
            dir.path().join("cardboard.toml"),
            "[server]\nport = 0\n\n[log]\nlevel = \"cardboard=loud\"\n",
        )
        .unwrap();

        cardboard(&dir)
            .args(["config", "validate"])
            .assert()
            .failure()
            .stdout(predicate::str::contains("server.port"))
            .stdout(predicate::str::contains("loud"));
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        let dir = create_temp_project();
        fs::write(dir.path().join("cardboard.toml"), "[server\nport =").unwrap();

        cardboard(&dir)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Failed to parse cardboard.toml"));
    }

    #[test]
    fn test_serve_rejects_invalid_port_env() {
        let dir = create_temp_project();

        cardboard(&dir)
            .arg("serve")
            .env("CARDBOARD_PORT", "not-a-port")
            .assert()
            .failure()
            .stderr(predicate::str::contains("CARDBOARD_PORT"));
    }
}

// =============================================================================
// Global Flag Tests
// =============================================================================

mod global_flags {
    use super::*;

    #[test]
    fn test_verbose_flag_sets_debug_level() {
        let dir = create_temp_project();

        cardboard(&dir)
            .args(["-v", "config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("level = \"debug\""));
    }

    #[test]
    fn test_dotenv_file_is_loaded() {
        let dir = create_temp_project();
        fs::write(dir.path().join(".env"), "CARDBOARD_PORT=7777\n").unwrap();

        cardboard(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("port = 7777"));
    }
}
