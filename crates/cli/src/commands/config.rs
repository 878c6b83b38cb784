use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use efiling_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", &["EFILING_DATABASE_URL"]),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", &["EFILING_DATABASE_MAX_CONNECTIONS"]),
    ));
    lines.push(render_line(
        "database.timeout_secs",
        &config.database.timeout_secs.to_string(),
        source("database.timeout_secs", &["EFILING_DATABASE_TIMEOUT_SECS"]),
    ));

    lines.push(render_line(
        "routing.global_role_codes",
        &config.routing.global_roles().codes().join(","),
        source("routing.global_role_codes", &["EFILING_ROUTING_GLOBAL_ROLE_CODES"]),
    ));
    lines.push(render_line(
        "routing.default_sla_hours",
        &config.routing.default_sla_hours.to_string(),
        source("routing.default_sla_hours", &["EFILING_ROUTING_DEFAULT_SLA_HOURS"]),
    ));

    let service_tokens = config
        .auth
        .service_tokens
        .iter()
        .map(|entry| format!("{}=>user {}", redact_token(entry.token.expose_secret()), entry.user_id.0))
        .collect::<Vec<_>>();
    lines.push(render_line(
        "auth.service_tokens",
        &if service_tokens.is_empty() { "<unset>".to_string() } else { service_tokens.join(", ") },
        source("auth.service_tokens", &["EFILING_AUTH_SERVICE_TOKENS"]),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["EFILING_LOGGING_LEVEL", "EFILING_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        config.logging.format.as_str(),
        source("logging.format", &["EFILING_LOGGING_FORMAT", "EFILING_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("efiling.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/efiling.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
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

fn redact_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.char_indices().nth(4) {
        Some((cut, _)) => format!("{}***", &trimmed[..cut]),
        None => "<redacted>".to_string(),
    }
}
