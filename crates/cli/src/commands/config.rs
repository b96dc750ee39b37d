use std::env;
use std::fs;
use std::path::Path;

use secrecy::{ExposeSecret, SecretString};
use smartcrop_core::config::{detect_config_path, AppConfig, LoadOptions};
use toml::Value;

struct Entry {
    key: &'static str,
    value: String,
    env_key: Option<&'static str>,
}

fn entry(key: &'static str, value: impl Into<String>, env_key: Option<&'static str>) -> Entry {
    Entry { key, value: value.into(), env_key }
}

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for entry in entries(&config) {
        let source = field_source(
            entry.key,
            entry.env_key,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(entry.key, &entry.value, source));
    }

    lines.join("\n")
}

fn entries(config: &AppConfig) -> Vec<Entry> {
    let database = &config.database;
    let server = &config.server;
    let advisory = &config.advisory;
    let notifications = &config.notifications;
    let weather = &config.weather;

    vec![
        entry("database.url", &database.url, Some("SMARTCROP_DATABASE_URL")),
        entry(
            "database.max_connections",
            database.max_connections.to_string(),
            Some("SMARTCROP_DATABASE_MAX_CONNECTIONS"),
        ),
        entry(
            "database.timeout_secs",
            database.timeout_secs.to_string(),
            Some("SMARTCROP_DATABASE_TIMEOUT_SECS"),
        ),
        entry("server.bind_address", &server.bind_address, Some("SMARTCROP_SERVER_BIND_ADDRESS")),
        entry("server.port", server.port.to_string(), Some("SMARTCROP_SERVER_PORT")),
        entry(
            "server.graceful_shutdown_secs",
            server.graceful_shutdown_secs.to_string(),
            Some("SMARTCROP_SERVER_GRACEFUL_SHUTDOWN_SECS"),
        ),
        entry(
            "advisory.soil_table_path",
            advisory
                .soil_table_path
                .as_ref()
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "<builtin>".to_string()),
            Some("SMARTCROP_ADVISORY_SOIL_TABLE_PATH"),
        ),
        entry(
            "advisory.model_dir",
            advisory.model_dir.display().to_string(),
            Some("SMARTCROP_ADVISORY_MODEL_DIR"),
        ),
        entry("advisory.classifier_file", &advisory.classifier_file, None),
        entry("advisory.scaler_file", &advisory.scaler_file, None),
        entry("advisory.encoder_file", &advisory.encoder_file, None),
        entry(
            "notifications.timeout_secs",
            notifications.timeout_secs.to_string(),
            Some("SMARTCROP_NOTIFICATIONS_TIMEOUT_SECS"),
        ),
        entry(
            "notifications.twilio_account_sid",
            plain_or_unset(notifications.twilio_account_sid.as_deref()),
            Some("SMARTCROP_TWILIO_ACCOUNT_SID"),
        ),
        entry(
            "notifications.twilio_auth_token",
            redact_secret(notifications.twilio_auth_token.as_ref()),
            Some("SMARTCROP_TWILIO_AUTH_TOKEN"),
        ),
        entry(
            "notifications.twilio_from_number",
            plain_or_unset(notifications.twilio_from_number.as_deref()),
            Some("SMARTCROP_TWILIO_FROM_NUMBER"),
        ),
        entry(
            "notifications.whatsapp_token",
            redact_secret(notifications.whatsapp_token.as_ref()),
            Some("SMARTCROP_WHATSAPP_TOKEN"),
        ),
        entry(
            "notifications.whatsapp_phone_number_id",
            plain_or_unset(notifications.whatsapp_phone_number_id.as_deref()),
            Some("SMARTCROP_WHATSAPP_PHONE_NUMBER_ID"),
        ),
        entry(
            "weather.api_key",
            redact_secret(weather.api_key.as_ref()),
            Some("SMARTCROP_WEATHER_API_KEY"),
        ),
        entry("weather.base_url", &weather.base_url, Some("SMARTCROP_WEATHER_BASE_URL")),
        entry(
            "weather.timeout_secs",
            weather.timeout_secs.to_string(),
            Some("SMARTCROP_WEATHER_TIMEOUT_SECS"),
        ),
        entry("logging.level", &config.logging.level, Some("SMARTCROP_LOGGING_LEVEL")),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format),
            Some("SMARTCROP_LOGGING_FORMAT"),
        ),
    ]
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: Option<&str>,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_key {
        if env::var_os(env_key).is_some() {
            return format!("env ({env_key})");
        }
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

fn plain_or_unset(value: Option<&str>) -> String {
    value.unwrap_or("<unset>").to_string()
}

fn redact_secret(secret: Option<&SecretString>) -> String {
    match secret {
        None => "<unset>".to_string(),
        Some(secret) if secret.expose_secret().trim().is_empty() => "<empty>".to_string(),
        Some(_) => "<redacted>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;
    use smartcrop_core::config::AppConfig;
    use toml::Value;

    use super::{contains_path, entries, field_source, redact_secret};

    #[test]
    fn secrets_never_render_their_value() {
        let token = SecretString::from("EAAG-very-secret".to_string());
        let blank = SecretString::from("  ".to_string());

        assert_eq!(redact_secret(Some(&token)), "<redacted>");
        assert_eq!(redact_secret(Some(&blank)), "<empty>");
        assert_eq!(redact_secret(None), "<unset>");
    }

    #[test]
    fn every_secret_entry_is_redacted() {
        let mut config = AppConfig::default();
        config.weather.api_key = Some(SecretString::from("owm-key".to_string()));
        config.notifications.twilio_auth_token = Some(SecretString::from("tw-token".to_string()));

        let rendered = entries(&config);

        assert!(rendered.iter().all(|entry| !entry.value.contains("owm-key")));
        assert!(rendered.iter().all(|entry| !entry.value.contains("tw-token")));
        let api_key = rendered.iter().find(|entry| entry.key == "weather.api_key");
        assert_eq!(api_key.map(|entry| entry.value.as_str()), Some("<redacted>"));
    }

    #[test]
    fn source_falls_back_from_file_to_default() {
        let doc: Value = "[server]\nport = 8080\n".parse().expect("toml");

        assert!(contains_path(&doc, "server.port"));
        assert!(!contains_path(&doc, "server.bind_address"));
        assert_eq!(
            field_source("server.port", None, Some(&doc), None),
            "file (config file)".to_string()
        );
        assert_eq!(field_source("logging.level", None, Some(&doc), None), "default");
    }
}
