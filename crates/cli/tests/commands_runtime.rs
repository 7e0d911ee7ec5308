use std::env;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use slotbook_cli::commands::{doctor, migrate, seed};
use tempfile::TempDir;

const VALID_TOKEN: &str = "123456789:AAH-test-token-value";

fn database_env(dir: &Path) -> String {
    format!("sqlite://{}?mode=rwc", dir.join("slotbook.db").display())
}

#[test]
fn migrate_returns_success_with_valid_env() {
    let dir = TempDir::new().expect("tempdir");
    let url = database_env(dir.path());
    with_env(&[("SLOTBOOK_BOT_TOKEN", VALID_TOKEN), ("SLOTBOOK_DATABASE_URL", &url)], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_without_token() {
    with_env(&[("SLOTBOOK_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    let dir = TempDir::new().expect("tempdir");
    let url = database_env(dir.path());
    with_env(&[("SLOTBOOK_BOT_TOKEN", VALID_TOKEN), ("SLOTBOOK_DATABASE_URL", &url)], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success: {}", first.output);
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["command"], "seed");
        assert_eq!(first_payload["message"], "inserted 5 default packages (0 already present)");

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_payload = parse_payload(&second.output);
        assert_eq!(second_payload["message"], "catalog already holds all 5 default packages");
    });
}

#[test]
fn doctor_flags_pending_migrations_until_migrate_runs() {
    let dir = TempDir::new().expect("tempdir");
    let url = database_env(dir.path());
    with_env(&[("SLOTBOOK_BOT_TOKEN", VALID_TOKEN), ("SLOTBOOK_DATABASE_URL", &url)], || {
        let before = doctor::run(true);
        assert_eq!(before.exit_code, 1);
        let report = parse_payload(&before.output);
        assert_eq!(report["overall_status"], "fail");
        assert_eq!(check_status(&report, "database_connectivity"), "pass");
        assert_eq!(check_status(&report, "pending_migrations"), "fail");

        assert_eq!(migrate::run().exit_code, 0);

        let after = doctor::run(true);
        assert_eq!(after.exit_code, 0, "doctor should pass once migrated: {}", after.output);
        let report = parse_payload(&after.output);
        assert_eq!(report["overall_status"], "pass");
        assert_eq!(check_status(&report, "bot_token_format"), "pass");
    });
}

#[test]
fn doctor_skips_dependent_checks_when_config_is_invalid() {
    with_env(&[("SLOTBOOK_BOT_TOKEN", "not-a-token")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let report = parse_payload(&result.output);
        assert_eq!(check_status(&report, "config_validation"), "fail");
        assert_eq!(check_status(&report, "database_connectivity"), "skipped");
        assert_eq!(report["overall_status"], "fail");
    });
}

fn check_status(report: &Value, name: &str) -> String {
    report["checks"]
        .as_array()
        .and_then(|checks| checks.iter().find(|check| check["name"] == name))
        .and_then(|check| check["status"].as_str())
        .unwrap_or("missing")
        .to_owned()
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SLOTBOOK_DATABASE_URL",
        "SLOTBOOK_DATABASE_MAX_CONNECTIONS",
        "SLOTBOOK_DATABASE_TIMEOUT_SECS",
        "SLOTBOOK_BOT_TOKEN",
        "SLOTBOOK_BOT_API_BASE_URL",
        "SLOTBOOK_BOT_POLL_TIMEOUT_SECS",
        "SLOTBOOK_UTC_OFFSET",
        "SLOTBOOK_ADMINS",
        "SLOTBOOK_VENUE_NAME",
        "SLOTBOOK_VENUE_ADDRESS",
        "SLOTBOOK_SESSION_IDLE_TIMEOUT_SECS",
        "SLOTBOOK_SERVER_BIND_ADDRESS",
        "SLOTBOOK_SERVER_HEALTH_CHECK_PORT",
        "SLOTBOOK_LOGGING_LEVEL",
        "SLOTBOOK_LOGGING_FORMAT",
        "SLOTBOOK_LOG_LEVEL",
        "SLOTBOOK_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> = keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
