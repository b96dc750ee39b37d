use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::advisory::classifier::ArtifactPaths;

pub const DEFAULT_CONFIG_FILE: &str = "smartcrop.toml";
pub const NESTED_CONFIG_FILE: &str = "config/smartcrop.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub advisory: AdvisoryConfig,
    pub notifications: NotificationsConfig,
    pub weather: WeatherConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AdvisoryConfig {
    /// CSV replacing the builtin district soil table when set.
    pub soil_table_path: Option<PathBuf>,
    pub model_dir: PathBuf,
    pub classifier_file: String,
    pub scaler_file: String,
    pub encoder_file: String,
}

impl AdvisoryConfig {
    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths::in_dir(
            &self.model_dir,
            &self.classifier_file,
            &self.scaler_file,
            &self.encoder_file,
        )
    }
}

/// Channel credentials. A channel without complete credentials runs in mock mode.
#[derive(Clone, Debug)]
pub struct NotificationsConfig {
    pub timeout_secs: u64,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<SecretString>,
    pub twilio_from_number: Option<String>,
    pub whatsapp_token: Option<SecretString>,
    pub whatsapp_phone_number_id: Option<String>,
}

impl NotificationsConfig {
    pub fn twilio_enabled(&self) -> bool {
        self.twilio_account_sid.is_some()
            && self.twilio_auth_token.is_some()
            && self.twilio_from_number.is_some()
    }

    pub fn whatsapp_enabled(&self) -> bool {
        self.whatsapp_token.is_some() && self.whatsapp_phone_number_id.is_some()
    }
}

#[derive(Clone, Debug)]
pub struct WeatherConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub timeout_secs: u64,
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
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub model_dir: Option<PathBuf>,
    pub soil_table_path: Option<PathBuf>,
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

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://smartcrop.db?mode=rwc".to_string(),
            max_connections: 5,
            timeout_secs: 30,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 5000,
                graceful_shutdown_secs: 15,
            },
            advisory: AdvisoryConfig {
                soil_table_path: None,
                model_dir: PathBuf::from("models"),
                classifier_file: "crop_model.json".to_string(),
                scaler_file: "scaler.json".to_string(),
                encoder_file: "label_encoder.json".to_string(),
            },
            notifications: NotificationsConfig {
                timeout_secs: 10,
                twilio_account_sid: None,
                twilio_auth_token: None,
                twilio_from_number: None,
                whatsapp_token: None,
                whatsapp_phone_number_id: None,
            },
            weather: WeatherConfig {
                api_key: None,
                base_url: "https://api.openweathermap.org/data/2.5".to_string(),
                timeout_secs: 10,
            },
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

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
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

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(advisory) = patch.advisory {
            if let Some(soil_table_path) = advisory.soil_table_path {
                self.advisory.soil_table_path = Some(soil_table_path);
            }
            if let Some(model_dir) = advisory.model_dir {
                self.advisory.model_dir = model_dir;
            }
            if let Some(classifier_file) = advisory.classifier_file {
                self.advisory.classifier_file = classifier_file;
            }
            if let Some(scaler_file) = advisory.scaler_file {
                self.advisory.scaler_file = scaler_file;
            }
            if let Some(encoder_file) = advisory.encoder_file {
                self.advisory.encoder_file = encoder_file;
            }
        }

        if let Some(notifications) = patch.notifications {
            if let Some(timeout_secs) = notifications.timeout_secs {
                self.notifications.timeout_secs = timeout_secs;
            }
            if let Some(sid) = notifications.twilio_account_sid {
                self.notifications.twilio_account_sid = Some(sid);
            }
            if let Some(auth_token) = notifications.twilio_auth_token {
                self.notifications.twilio_auth_token = Some(secret_value(auth_token));
            }
            if let Some(from_number) = notifications.twilio_from_number {
                self.notifications.twilio_from_number = Some(from_number);
            }
            if let Some(whatsapp_token) = notifications.whatsapp_token {
                self.notifications.whatsapp_token = Some(secret_value(whatsapp_token));
            }
            if let Some(phone_number_id) = notifications.whatsapp_phone_number_id {
                self.notifications.whatsapp_phone_number_id = Some(phone_number_id);
            }
        }

        if let Some(weather) = patch.weather {
            if let Some(api_key) = weather.api_key {
                self.weather.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = weather.base_url {
                self.weather.base_url = base_url;
            }
            if let Some(timeout_secs) = weather.timeout_secs {
                self.weather.timeout_secs = timeout_secs;
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
        if let Some(value) = read_env("SMARTCROP_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("SMARTCROP_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("SMARTCROP_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("SMARTCROP_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("SMARTCROP_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SMARTCROP_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SMARTCROP_SERVER_PORT") {
            self.server.port = parse_u16("SMARTCROP_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("SMARTCROP_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("SMARTCROP_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("SMARTCROP_ADVISORY_SOIL_TABLE_PATH") {
            self.advisory.soil_table_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("SMARTCROP_ADVISORY_MODEL_DIR") {
            self.advisory.model_dir = PathBuf::from(value);
        }

        if let Some(value) = read_env("SMARTCROP_NOTIFICATIONS_TIMEOUT_SECS") {
            self.notifications.timeout_secs =
                parse_u64("SMARTCROP_NOTIFICATIONS_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SMARTCROP_TWILIO_ACCOUNT_SID") {
            self.notifications.twilio_account_sid = Some(value);
        }
        if let Some(value) = read_env("SMARTCROP_TWILIO_AUTH_TOKEN") {
            self.notifications.twilio_auth_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("SMARTCROP_TWILIO_FROM_NUMBER") {
            self.notifications.twilio_from_number = Some(value);
        }
        if let Some(value) = read_env("SMARTCROP_WHATSAPP_TOKEN") {
            self.notifications.whatsapp_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("SMARTCROP_WHATSAPP_PHONE_NUMBER_ID") {
            self.notifications.whatsapp_phone_number_id = Some(value);
        }

        if let Some(value) = read_env("SMARTCROP_WEATHER_API_KEY") {
            self.weather.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SMARTCROP_WEATHER_BASE_URL") {
            self.weather.base_url = value;
        }
        if let Some(value) = read_env("SMARTCROP_WEATHER_TIMEOUT_SECS") {
            self.weather.timeout_secs = parse_u64("SMARTCROP_WEATHER_TIMEOUT_SECS", &value)?;
        }

        let log_level =
            read_env("SMARTCROP_LOGGING_LEVEL").or_else(|| read_env("SMARTCROP_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SMARTCROP_LOGGING_FORMAT").or_else(|| read_env("SMARTCROP_LOG_FORMAT"));
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
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(model_dir) = overrides.model_dir {
            self.advisory.model_dir = model_dir;
        }
        if let Some(soil_table_path) = overrides.soil_table_path {
            self.advisory.soil_table_path = Some(soil_table_path);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_advisory(&self.advisory)?;
        validate_notifications(&self.notifications)?;
        validate_weather(&self.weather)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

/// Config file picked up when no explicit path is given.
pub fn detect_config_path() -> Option<PathBuf> {
    resolve_config_path(None)
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from(NESTED_CONFIG_FILE)]
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

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.bind_address.trim().is_empty() {
        return Err(ConfigError::Validation("server.bind_address must not be empty".to_string()));
    }

    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_advisory(advisory: &AdvisoryConfig) -> Result<(), ConfigError> {
    let files = [
        ("advisory.classifier_file", &advisory.classifier_file),
        ("advisory.scaler_file", &advisory.scaler_file),
        ("advisory.encoder_file", &advisory.encoder_file),
    ];
    for (key, file) in files {
        if file.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{key} must not be empty")));
        }
    }

    if let Some(path) = &advisory.soil_table_path {
        if !path.exists() {
            return Err(ConfigError::Validation(format!(
                "advisory.soil_table_path `{}` does not exist; \
                 unset it to use the builtin Punjab table",
                path.display()
            )));
        }
    }

    Ok(())
}

fn validate_notifications(notifications: &NotificationsConfig) -> Result<(), ConfigError> {
    validate_timeout("notifications.timeout_secs", notifications.timeout_secs)?;

    let twilio_fields = [
        notifications.twilio_account_sid.is_some(),
        notifications.twilio_auth_token.is_some(),
        notifications.twilio_from_number.is_some(),
    ];
    if twilio_fields.iter().any(|set| *set) && !notifications.twilio_enabled() {
        return Err(ConfigError::Validation(
            "twilio requires twilio_account_sid, twilio_auth_token and \
             twilio_from_number together; \
             unset all three to use mock SMS"
                .to_string(),
        ));
    }

    let whatsapp_token_set = notifications
        .whatsapp_token
        .as_ref()
        .map(|token| !token.expose_secret().trim().is_empty())
        .unwrap_or(false);
    if whatsapp_token_set != notifications.whatsapp_phone_number_id.is_some() {
        return Err(ConfigError::Validation(
            "whatsapp requires both whatsapp_token and whatsapp_phone_number_id; \
             unset both to use mock WhatsApp"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_weather(weather: &WeatherConfig) -> Result<(), ConfigError> {
    validate_timeout("weather.timeout_secs", weather.timeout_secs)?;

    let base_url = weather.base_url.trim();
    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(ConfigError::Validation(
            "weather.base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_timeout(key: &str, timeout_secs: u64) -> Result<(), ConfigError> {
    if timeout_secs == 0 || timeout_secs > 60 {
        return Err(ConfigError::Validation(format!("{key} must be in range 1..=60")));
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

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    advisory: Option<AdvisoryPatch>,
    notifications: Option<NotificationsPatch>,
    weather: Option<WeatherPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AdvisoryPatch {
    soil_table_path: Option<PathBuf>,
    model_dir: Option<PathBuf>,
    classifier_file: Option<String>,
    scaler_file: Option<String>,
    encoder_file: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationsPatch {
    timeout_secs: Option<u64>,
    twilio_account_sid: Option<String>,
    twilio_auth_token: Option<String>,
    twilio_from_number: Option<String>,
    whatsapp_token: Option<String>,
    whatsapp_phone_number_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WeatherPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
