use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use toml::Value;
use vitrina_core::config::AppConfig;

use crate::commands::{load_config, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value) in effective_values(&config) {
        let source = field_source(
            key_path,
            &env_key(key_path),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(key_path, &value, source));
    }

    CommandResult::success("config", lines.join("\n"))
}

fn effective_values(config: &AppConfig) -> Vec<(&'static str, String)> {
    vec![
        ("database.url", config.database.url.clone()),
        ("database.max_connections", config.database.max_connections.to_string()),
        ("database.timeout_secs", config.database.timeout_secs.to_string()),
        ("server.bind_address", config.server.bind_address.clone()),
        ("server.port", config.server.port.to_string()),
        ("server.graceful_shutdown_secs", config.server.graceful_shutdown_secs.to_string()),
        ("catalog.default_page_size", config.catalog.default_page_size.to_string()),
        ("catalog.max_page_size", config.catalog.max_page_size.to_string()),
        ("notifier.channel_capacity", config.notifier.channel_capacity.to_string()),
        ("logging.level", config.logging.level.clone()),
        ("logging.format", format!("{:?}", config.logging.format)),
    ]
}

/// `server.port` -> `VITRINA_SERVER_PORT`
fn env_key(key_path: &str) -> String {
    format!("VITRINA_{}", key_path.replace('.', "_").to_ascii_uppercase())
}

fn detect_config_path() -> Option<PathBuf> {
    ["vitrina.toml", "config/vitrina.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, env_key, field_source};

    #[test]
    fn env_keys_follow_the_section_field_convention() {
        assert_eq!(env_key("notifier.channel_capacity"), "VITRINA_NOTIFIER_CHANNEL_CAPACITY");
        assert_eq!(env_key("database.url"), "VITRINA_DATABASE_URL");
    }

    #[test]
    fn file_source_is_reported_for_keys_present_in_the_document() {
        let doc: Value = "[catalog]\nmax_page_size = 50\n".parse().expect("toml");

        assert!(contains_path(&doc, "catalog.max_page_size"));
        assert!(!contains_path(&doc, "catalog.default_page_size"));
        assert_eq!(
            field_source("catalog.default_page_size", "VITRINA_TEST_UNSET_KEY", Some(&doc), None),
            "default"
        );
        assert_eq!(
            field_source("catalog.max_page_size", "VITRINA_TEST_UNSET_KEY", Some(&doc), None),
            "file (config file)"
        );
    }
}
