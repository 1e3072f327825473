use std::env;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use vitrina_cli::commands::{config, migrate, seed};

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("VITRINA_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["error_class"], Value::Null);
    });
}

#[test]
fn migrate_reports_config_failure_for_non_sqlite_url() {
    with_env(&[("VITRINA_DATABASE_URL", "postgres://localhost/vitrina")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_inserts_catalog_then_skips_existing_codes() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("seed.db").display());

    with_env(&[("VITRINA_DATABASE_URL", url.as_str())], || {
        let first = seed::run();
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["command"], "seed");
        assert_eq!(first_payload["status"], "ok");
        let first_message = first_payload["message"].as_str().unwrap_or_default();
        assert!(first_message.starts_with("seed catalog loaded: 10 inserted, 0 already present"));
        assert!(first_message.contains("MOU001"));

        let second = seed::run();
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_payload = parse_payload(&second.output);
        assert_eq!(second_payload["message"], "seed catalog loaded: 0 inserted, 10 already present");
    });
}

#[test]
fn config_reports_env_sources() {
    with_env(&[("VITRINA_SERVER_PORT", "9191")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        let message = payload["message"].as_str().unwrap_or_default();
        assert!(message.contains("- server.port = 9191 (source: env (VITRINA_SERVER_PORT))"));
        assert!(message.contains("- catalog.max_page_size = 100 (source: default)"));
    });
}

#[test]
fn config_rejects_unparseable_env_values() {
    with_env(&[("VITRINA_NOTIFIER_CHANNEL_CAPACITY", "lots")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "VITRINA_DATABASE_URL",
        "VITRINA_DATABASE_MAX_CONNECTIONS",
        "VITRINA_DATABASE_TIMEOUT_SECS",
        "VITRINA_SERVER_BIND_ADDRESS",
        "VITRINA_SERVER_PORT",
        "VITRINA_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "VITRINA_CATALOG_DEFAULT_PAGE_SIZE",
        "VITRINA_CATALOG_MAX_PAGE_SIZE",
        "VITRINA_NOTIFIER_CHANNEL_CAPACITY",
        "VITRINA_LOGGING_LEVEL",
        "VITRINA_LOGGING_FORMAT",
        "VITRINA_LOG_LEVEL",
        "VITRINA_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

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
