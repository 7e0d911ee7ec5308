use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{FixedOffset, Offset, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::calendar::parse_utc_offset;
use crate::dialogue::{DialogueSettings, Venue};
use crate::domain::client::{AdminSet, ClientId};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub bot: BotConfig,
    pub booking: BookingConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct BotConfig {
    pub token: SecretString,
    pub api_base_url: String,
    pub poll_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct BookingConfig {
    pub utc_offset: String,
    pub admins: Vec<i64>,
    pub venue_name: String,
    pub venue_address: String,
    pub session_idle_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub health_check_port: u16,
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
    pub bot_token: Option<String>,
    pub admins: Option<Vec<i64>>,
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
                url: "sqlite://slotbook.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            bot: BotConfig {
                token: String::new().into(),
                api_base_url: "https://api.telegram.org".to_string(),
                poll_timeout_secs: 25,
            },
            booking: BookingConfig {
                utc_offset: "+03:00".to_string(),
                admins: Vec::new(),
                venue_name: "HGN Москва".to_string(),
                venue_address: "Мичуринский проспект, 19к1".to_string(),
                session_idle_timeout_secs: 1800,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), health_check_port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
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

impl BookingConfig {
    /// Falls back to UTC; `validate` rejects unparseable offsets first.
    pub fn offset(&self) -> FixedOffset {
        parse_utc_offset(&self.utc_offset).unwrap_or_else(|| Utc.fix())
    }

    pub fn admin_set(&self) -> AdminSet {
        AdminSet::new(self.admins.iter().copied().map(ClientId))
    }

    pub fn session_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.session_idle_timeout_secs)
    }

    pub fn dialogue_settings(&self) -> DialogueSettings {
        DialogueSettings {
            admins: self.admin_set(),
            venue: Venue { name: self.venue_name.clone(), address: self.venue_address.clone() },
            utc_offset: self.offset(),
            session_idle_timeout: self.session_idle_timeout(),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("slotbook.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
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

        if let Some(bot) = patch.bot {
            if let Some(token) = bot.token {
                self.bot.token = secret_value(token);
            }
            if let Some(api_base_url) = bot.api_base_url {
                self.bot.api_base_url = api_base_url;
            }
            if let Some(poll_timeout_secs) = bot.poll_timeout_secs {
                self.bot.poll_timeout_secs = poll_timeout_secs;
            }
        }

        if let Some(booking) = patch.booking {
            if let Some(utc_offset) = booking.utc_offset {
                self.booking.utc_offset = utc_offset;
            }
            if let Some(admins) = booking.admins {
                self.booking.admins = admins;
            }
            if let Some(venue_name) = booking.venue_name {
                self.booking.venue_name = venue_name;
            }
            if let Some(venue_address) = booking.venue_address {
                self.booking.venue_address = venue_address;
            }
            if let Some(timeout) = booking.session_idle_timeout_secs {
                self.booking.session_idle_timeout_secs = timeout;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(health_check_port) = server.health_check_port {
                self.server.health_check_port = health_check_port;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SLOTBOOK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SLOTBOOK_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("SLOTBOOK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SLOTBOOK_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("SLOTBOOK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SLOTBOOK_BOT_TOKEN") {
            self.bot.token = secret_value(value);
        }
        if let Some(value) = read_env("SLOTBOOK_BOT_API_BASE_URL") {
            self.bot.api_base_url = value;
        }
        if let Some(value) = read_env("SLOTBOOK_BOT_POLL_TIMEOUT_SECS") {
            self.bot.poll_timeout_secs = parse_u64("SLOTBOOK_BOT_POLL_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SLOTBOOK_UTC_OFFSET") {
            self.booking.utc_offset = value;
        }
        if let Some(value) = read_env("SLOTBOOK_ADMINS") {
            self.booking.admins = parse_id_list("SLOTBOOK_ADMINS", &value)?;
        }
        if let Some(value) = read_env("SLOTBOOK_VENUE_NAME") {
            self.booking.venue_name = value;
        }
        if let Some(value) = read_env("SLOTBOOK_VENUE_ADDRESS") {
            self.booking.venue_address = value;
        }
        if let Some(value) = read_env("SLOTBOOK_SESSION_IDLE_TIMEOUT_SECS") {
            self.booking.session_idle_timeout_secs =
                parse_u64("SLOTBOOK_SESSION_IDLE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SLOTBOOK_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SLOTBOOK_SERVER_HEALTH_CHECK_PORT") {
            self.server.health_check_port = parse_u16("SLOTBOOK_SERVER_HEALTH_CHECK_PORT", &value)?;
        }

        let log_level = read_env("SLOTBOOK_LOGGING_LEVEL").or_else(|| read_env("SLOTBOOK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SLOTBOOK_LOGGING_FORMAT").or_else(|| read_env("SLOTBOOK_LOG_FORMAT"));
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
        if let Some(bot_token) = overrides.bot_token {
            self.bot.token = secret_value(bot_token);
        }
        if let Some(admins) = overrides.admins {
            self.booking.admins = admins;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_bot(&self.bot)?;
        validate_booking(&self.booking)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("slotbook.toml"), PathBuf::from("config/slotbook.toml")]
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

/// Bot API tokens look like `123456789:AA...`: a numeric bot id, a colon,
/// then the secret part.
pub fn bot_token_is_well_formed(token: &str) -> bool {
    match token.split_once(':') {
        Some((id, secret)) => {
            !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) && secret.len() >= 10
        }
        None => false,
    }
}

fn validate_bot(bot: &BotConfig) -> Result<(), ConfigError> {
    let token = bot.token.expose_secret();
    if token.is_empty() {
        return Err(ConfigError::Validation(
            "bot.token is required. Get it from @BotFather and set SLOTBOOK_BOT_TOKEN".to_string(),
        ));
    }
    if !bot_token_is_well_formed(token) {
        return Err(ConfigError::Validation(
            "bot.token must look like `<bot id>:<secret>` as issued by @BotFather".to_string(),
        ));
    }

    if !bot.api_base_url.starts_with("http://") && !bot.api_base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "bot.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if bot.poll_timeout_secs == 0 || bot.poll_timeout_secs > 60 {
        return Err(ConfigError::Validation(
            "bot.poll_timeout_secs must be in range 1..=60".to_string(),
        ));
    }

    Ok(())
}

fn validate_booking(booking: &BookingConfig) -> Result<(), ConfigError> {
    if parse_utc_offset(&booking.utc_offset).is_none() {
        return Err(ConfigError::Validation(format!(
            "booking.utc_offset `{}` must be a fixed offset like `+03:00`",
            booking.utc_offset
        )));
    }

    if booking.session_idle_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "booking.session_idle_timeout_secs must be greater than zero".to_string(),
        ));
    }

    if booking.venue_name.trim().is_empty() {
        return Err(ConfigError::Validation("booking.venue_name must not be empty".to_string()));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.health_check_port == 0 {
        return Err(ConfigError::Validation(
            "server.health_check_port must be greater than zero".to_string(),
        ));
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

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
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

fn parse_id_list(key: &str, value: &str) -> Result<Vec<i64>, ConfigError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(|item| {
            item.parse::<i64>().map_err(|_| ConfigError::InvalidEnvOverride {
                key: key.to_string(),
                value: value.to_string(),
            })
        })
        .collect()
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    bot: Option<BotPatch>,
    booking: Option<BookingPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct BotPatch {
    token: Option<String>,
    api_base_url: Option<String>,
    poll_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct BookingPatch {
    utc_offset: Option<String>,
    admins: Option<Vec<i64>>,
    venue_name: Option<String>,
    venue_address: Option<String>,
    session_idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    health_check_port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{bot_token_is_well_formed, AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
    use crate::domain::client::ClientId;

    const TOKEN: &str = "123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw";

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
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_SLOTBOOK_TOKEN", TOKEN);

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("slotbook.toml");
            fs::write(
                &path,
                r#"
[bot]
token = "${TEST_SLOTBOOK_TOKEN}"

[booking]
admins = [111, 222]
utc_offset = "+05:00"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.bot.token.expose_secret() == TOKEN, "token should come from the environment")?;
            ensure(config.booking.admins == vec![111, 222], "admins should be read from the file")?;
            ensure(
                config.booking.offset().local_minus_utc() == 5 * 3600,
                "offset should be parsed from the file",
            )?;
            ensure(config.booking.admin_set().contains(ClientId(222)), "admin set should hold file ids")?;
            Ok(())
        })();

        clear_vars(&["TEST_SLOTBOOK_TOKEN"]);
        result
    }

    #[test]
    fn admins_env_list_is_comma_separated() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SLOTBOOK_BOT_TOKEN", TOKEN);
        env::set_var("SLOTBOOK_ADMINS", "5, 6,,7");
        env::set_var("SLOTBOOK_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.booking.admins == vec![5, 6, 7], "blank admin entries should be skipped")?;
            ensure(matches!(config.logging.format, LogFormat::Json), "json format should be set from env")?;
            Ok(())
        })();

        env::set_var("SLOTBOOK_ADMINS", "5,abc");
        let invalid = AppConfig::load(LoadOptions::default());

        clear_vars(&["SLOTBOOK_BOT_TOKEN", "SLOTBOOK_ADMINS", "SLOTBOOK_LOG_FORMAT"]);
        result?;
        ensure(
            matches!(invalid, Err(ConfigError::InvalidEnvOverride { ref key, .. }) if key == "SLOTBOOK_ADMINS"),
            "non-numeric admin id should be rejected",
        )
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SLOTBOOK_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("SLOTBOOK_BOT_TOKEN", TOKEN);

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("slotbook.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[bot]
token = "1:file-token-value"

[logging]
level = "warn"
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
                config.bot.token.expose_secret() == TOKEN,
                "env token should win over file and defaults",
            )?;
            Ok(())
        })();

        clear_vars(&["SLOTBOOK_DATABASE_URL", "SLOTBOOK_BOT_TOKEN"]);
        result
    }

    #[test]
    fn missing_token_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&["SLOTBOOK_BOT_TOKEN"]);

        let error = match AppConfig::load(LoadOptions::default()) {
            Ok(_) => return Err("expected validation failure but config load succeeded".to_string()),
            Err(error) => error,
        };
        ensure(
            matches!(error, ConfigError::Validation(ref message) if message.contains("bot.token")),
            "validation failure should mention bot.token",
        )
    }

    #[test]
    fn bad_offset_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SLOTBOOK_BOT_TOKEN", TOKEN);
        env::set_var("SLOTBOOK_UTC_OFFSET", "Europe/Moscow");

        let result = AppConfig::load(LoadOptions::default());

        clear_vars(&["SLOTBOOK_BOT_TOKEN", "SLOTBOOK_UTC_OFFSET"]);
        ensure(
            matches!(result, Err(ConfigError::Validation(ref message)) if message.contains("booking.utc_offset")),
            "tz database names are not fixed offsets",
        )
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("SLOTBOOK_BOT_TOKEN", TOKEN);

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw"), "debug output should not contain the token")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["SLOTBOOK_BOT_TOKEN"]);
        result
    }

    #[test]
    fn token_shape_check() {
        assert!(bot_token_is_well_formed(TOKEN));
        assert!(!bot_token_is_well_formed("no-colon-here"));
        assert!(!bot_token_is_well_formed("abc:AAHdqTcvCH1vGWJxfSeof"));
        assert!(!bot_token_is_well_formed("123:short"));
    }
}
