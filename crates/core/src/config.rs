use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::geography::UserId;
use crate::routing::{GlobalRoleSet, DEFAULT_SLA_HOURS};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub routing: RoutingConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct RoutingConfig {
    pub global_role_codes: Vec<String>,
    pub default_sla_hours: u32,
}

impl RoutingConfig {
    pub fn global_roles(&self) -> GlobalRoleSet {
        GlobalRoleSet::new(&self.global_role_codes)
    }
}

#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    pub service_tokens: Vec<ServiceToken>,
}

/// Bearer token bound to one e-filing user, for operator tooling.
#[derive(Clone, Debug)]
pub struct ServiceToken {
    pub token: SecretString,
    pub user_id: UserId,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub global_role_codes: Option<Vec<String>>,
    pub default_sla_hours: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://efiling.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            routing: RoutingConfig {
                global_role_codes: vec!["ADMIN".to_string(), "CEO".to_string()],
                default_sla_hours: DEFAULT_SLA_HOURS,
            },
            auth: AuthConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("efiling.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(routing) = patch.routing {
            if let Some(global_role_codes) = routing.global_role_codes {
                self.routing.global_role_codes = global_role_codes;
            }
            if let Some(default_sla_hours) = routing.default_sla_hours {
                self.routing.default_sla_hours = default_sla_hours;
            }
        }

        if let Some(auth) = patch.auth {
            if let Some(service_tokens) = auth.service_tokens {
                self.auth.service_tokens = service_tokens
                    .into_iter()
                    .map(|entry| ServiceToken {
                        token: SecretString::from(entry.token),
                        user_id: UserId(entry.user_id),
                    })
                    .collect();
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format.parse()?;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("EFILING_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("EFILING_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("EFILING_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("EFILING_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("EFILING_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("EFILING_ROUTING_GLOBAL_ROLE_CODES") {
            self.routing.global_role_codes = split_list(&value);
        }
        if let Some(value) = read_env("EFILING_ROUTING_DEFAULT_SLA_HOURS") {
            self.routing.default_sla_hours = parse_u32("EFILING_ROUTING_DEFAULT_SLA_HOURS", &value)?;
        }

        if let Some(value) = read_env("EFILING_AUTH_SERVICE_TOKENS") {
            self.auth.service_tokens = parse_service_tokens("EFILING_AUTH_SERVICE_TOKENS", &value)?;
        }

        let log_level = read_env("EFILING_LOGGING_LEVEL").or_else(|| read_env("EFILING_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("EFILING_LOGGING_FORMAT").or_else(|| read_env("EFILING_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(global_role_codes) = overrides.global_role_codes {
            self.routing.global_role_codes = global_role_codes;
        }
        if let Some(default_sla_hours) = overrides.default_sla_hours {
            self.routing.default_sla_hours = default_sla_hours;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_routing(&self.routing)?;
        validate_auth(&self.auth)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("efiling.toml"), PathBuf::from("config/efiling.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_routing(routing: &RoutingConfig) -> Result<(), ConfigError> {
    if routing.default_sla_hours == 0 {
        return Err(ConfigError::Validation(
            "routing.default_sla_hours must be greater than zero".to_string(),
        ));
    }

    if let Some(code) = routing.global_role_codes.iter().find(|code| code.contains('*')) {
        return Err(ConfigError::Validation(format!(
            "routing.global_role_codes entries are exact role codes; `{code}` contains a wildcard"
        )));
    }

    Ok(())
}

fn validate_auth(auth: &AuthConfig) -> Result<(), ConfigError> {
    let mut seen = std::collections::HashSet::new();
    for entry in &auth.service_tokens {
        let token = entry.token.expose_secret().trim();
        if token.is_empty() {
            return Err(ConfigError::Validation(format!(
                "auth.service_tokens entry for user {} has an empty token",
                entry.user_id.0
            )));
        }
        if !seen.insert(token) {
            return Err(ConfigError::Validation(
                "auth.service_tokens contains a duplicate token".to_string(),
            ));
        }
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// `token=user_id` pairs, comma separated.
fn parse_service_tokens(key: &str, value: &str) -> Result<Vec<ServiceToken>, ConfigError> {
    split_list(value)
        .into_iter()
        .map(|pair| {
            let (token, user_id) = pair
                .rsplit_once('=')
                .ok_or_else(|| invalid_env(key, "<token>=<user id>"))?;
            let user_id = user_id.trim().parse::<i64>().map_err(|_| invalid_env(key, "<user id>"))?;
            Ok(ServiceToken {
                token: SecretString::from(token.trim().to_string()),
                user_id: UserId(user_id),
            })
        })
        .collect()
}

fn invalid_env(key: &str, expected: &str) -> ConfigError {
    // Never echo the raw value.
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: expected.to_string() }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    routing: Option<RoutingPatch>,
    auth: Option<AuthPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct RoutingPatch {
    global_role_codes: Option<Vec<String>>,
    default_sla_hours: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthPatch {
    service_tokens: Option<Vec<ServiceTokenPatch>>,
}

#[derive(Debug, Deserialize)]
struct ServiceTokenPatch {
    token: String,
    user_id: i64,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
    use crate::domain::geography::UserId;

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_and_route_through_admin_roles() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let config = AppConfig::load(LoadOptions::default())
            .map_err(|err| format!("config load failed: {err}"))?;

        ensure(config.routing.default_sla_hours == 24, "default sla should be 24 hours")?;
        ensure(config.routing.global_roles().contains("ceo"), "CEO should be a global role")?;
        ensure(config.auth.service_tokens.is_empty(), "no service tokens by default")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_EFILING_OPERATOR_TOKEN", "operator-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("efiling.toml");
            fs::write(
                &path,
                r#"
[routing]
global_role_codes = ["CHAIRMAN", "SYS_ADMIN"]
default_sla_hours = 48

[[auth.service_tokens]]
token = "${TEST_EFILING_OPERATOR_TOKEN}"
user_id = 6
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.auth.service_tokens.len() == 1, "one service token should load")?;
            ensure(
                config.auth.service_tokens[0].token.expose_secret() == "operator-from-env",
                "token should be interpolated from environment",
            )?;
            ensure(config.auth.service_tokens[0].user_id == UserId(6), "token user should be 6")?;
            ensure(config.routing.default_sla_hours == 48, "file sla hours should apply")?;
            ensure(
                config.routing.global_roles().contains("sys_admin"),
                "file global roles should replace defaults",
            )?;
            ensure(!config.routing.global_roles().contains("CEO"), "defaults should be replaced")
        })();

        clear_vars(&["TEST_EFILING_OPERATOR_TOKEN"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("EFILING_LOG_LEVEL", "warn");
        env::set_var("EFILING_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["EFILING_LOG_LEVEL", "EFILING_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("EFILING_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("EFILING_ROUTING_GLOBAL_ROLE_CODES", "DG, ceo");
        env::set_var("EFILING_ROUTING_DEFAULT_SLA_HOURS", "36");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("efiling.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[routing]
global_role_codes = ["FROM_FILE"]
default_sla_hours = 12

[logging]
level = "warn"
format = "json"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "file logging format should survive",
            )?;
            ensure(config.routing.default_sla_hours == 36, "env sla hours should win over file")?;
            ensure(
                config.routing.global_role_codes == vec!["DG".to_string(), "ceo".to_string()],
                "env global roles should be split on commas",
            )?;
            Ok(())
        })();

        clear_vars(&[
            "EFILING_DATABASE_URL",
            "EFILING_ROUTING_GLOBAL_ROLE_CODES",
            "EFILING_ROUTING_DEFAULT_SLA_HOURS",
        ]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("EFILING_ROUTING_DEFAULT_SLA_HOURS", "0");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("routing.default_sla_hours")
            );
            ensure(has_message, "validation failure should mention routing.default_sla_hours")
        })();

        clear_vars(&["EFILING_ROUTING_DEFAULT_SLA_HOURS"]);
        result
    }

    #[test]
    fn malformed_service_token_env_is_rejected_without_echoing_it() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("EFILING_AUTH_SERVICE_TOKENS", "very-secret-token");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => return Err("expected malformed token pair to fail".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "EFILING_AUTH_SERVICE_TOKENS"),
                "error should name the token variable",
            )?;
            ensure(
                !error.to_string().contains("very-secret-token"),
                "error should not echo the token",
            )
        })();

        clear_vars(&["EFILING_AUTH_SERVICE_TOKENS"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("EFILING_AUTH_SERVICE_TOKENS", "operator-secret-value=6,clerk-secret-value=7");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(config.auth.service_tokens.len() == 2, "both tokens should load")?;
            ensure(
                !debug.contains("operator-secret-value"),
                "debug output should not contain operator token",
            )?;
            ensure(
                !debug.contains("clerk-secret-value"),
                "debug output should not contain clerk token",
            )
        })();

        clear_vars(&["EFILING_AUTH_SERVICE_TOKENS"]);
        result
    }
}
