use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use smartcrop_core::config::WeatherConfig;
use smartcrop_core::domain::weather::WeatherSnapshot;
use thiserror::Error;
use tracing::warn;

pub const MOCK_SOURCE: &str = "mock_data";
pub const OPENWEATHER_SOURCE: &str = "openweathermap";

#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("http client could not be built: {0}")]
    Client(reqwest::Error),
    #[error("weather request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("weather provider answered with status {0}")]
    Status(u16),
    #[error("weather response was malformed: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait WeatherProvider: Send + Sync {
    fn source(&self) -> &'static str;
    async fn current(&self, district: &str) -> Result<WeatherSnapshot, WeatherError>;
}

struct Baseline {
    district: &'static str,
    temperature: f64,
    humidity: f64,
}

const BASELINES: &[Baseline] = &[
    Baseline { district: "patiala", temperature: 28.0, humidity: 65.0 },
    Baseline { district: "ludhiana", temperature: 29.0, humidity: 60.0 },
    Baseline { district: "amritsar", temperature: 27.0, humidity: 70.0 },
    Baseline { district: "jalandhar", temperature: 28.0, humidity: 68.0 },
    Baseline { district: "fazilka", temperature: 32.0, humidity: 45.0 },
    Baseline { district: "bathinda", temperature: 31.0, humidity: 50.0 },
];

const DEFAULT_TEMPERATURE: f64 = 28.0;
const DEFAULT_HUMIDITY: f64 = 60.0;

/// Deterministic stand-in for a weather service: each district always reports its
/// baseline, so alert evaluation is reproducible in demos and tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct MockWeatherProvider;

impl MockWeatherProvider {
    pub fn snapshot_at(&self, district: &str, observed_at: DateTime<Utc>) -> WeatherSnapshot {
        let key = district.trim().to_lowercase();
        let (temperature, humidity) = BASELINES
            .iter()
            .find(|baseline| baseline.district == key)
            .map(|baseline| (baseline.temperature, baseline.humidity))
            .unwrap_or((DEFAULT_TEMPERATURE, DEFAULT_HUMIDITY));

        WeatherSnapshot {
            district: title_case(district.trim()),
            temperature,
            humidity,
            pressure: 1013.0,
            description: "clear sky".to_string(),
            wind_speed: 4.0,
            rainfall: 0.0,
            source: MOCK_SOURCE.to_string(),
            observed_at,
        }
    }
}

#[async_trait]
impl WeatherProvider for MockWeatherProvider {
    fn source(&self) -> &'static str {
        MOCK_SOURCE
    }

    async fn current(&self, district: &str) -> Result<WeatherSnapshot, WeatherError> {
        Ok(self.snapshot_at(district, Utc::now()))
    }
}

fn title_case(raw: &str) -> String {
    raw.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// OpenWeather current-conditions client. Any failure is logged and answered from the
/// mock provider so callers always get a snapshot.
pub struct OpenWeatherProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    fallback: MockWeatherProvider,
}

#[derive(Deserialize)]
struct OpenWeatherResponse {
    main: OpenWeatherMain,
    #[serde(default)]
    weather: Vec<OpenWeatherCondition>,
    #[serde(default)]
    wind: Option<OpenWeatherWind>,
    #[serde(default)]
    rain: Option<OpenWeatherRain>,
}

#[derive(Deserialize)]
struct OpenWeatherMain {
    temp: f64,
    humidity: f64,
    pressure: f64,
}

#[derive(Deserialize)]
struct OpenWeatherCondition {
    description: String,
}

#[derive(Deserialize)]
struct OpenWeatherWind {
    speed: f64,
}

#[derive(Deserialize)]
struct OpenWeatherRain {
    #[serde(rename = "1h", default)]
    one_hour: Option<f64>,
}

impl OpenWeatherProvider {
    pub fn new(config: &WeatherConfig, api_key: SecretString) -> Result<Self, WeatherError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(WeatherError::Client)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            fallback: MockWeatherProvider,
        })
    }

    pub async fn fetch(&self, district: &str) -> Result<WeatherSnapshot, WeatherError> {
        let query = format!("{},Punjab,IN", district.trim());
        let response = self
            .client
            .get(format!("{}/weather", self.base_url))
            .query(&[("q", query.as_str()), ("units", "metric")])
            .query(&[("appid", self.api_key.expose_secret())])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        snapshot_from_body(district, &body, Utc::now())
    }
}

fn snapshot_from_body(
    district: &str,
    body: &str,
    observed_at: DateTime<Utc>,
) -> Result<WeatherSnapshot, WeatherError> {
    let parsed: OpenWeatherResponse =
        serde_json::from_str(body).map_err(|error| WeatherError::Malformed(error.to_string()))?;

    Ok(WeatherSnapshot {
        district: title_case(district.trim()),
        temperature: parsed.main.temp,
        humidity: parsed.main.humidity,
        pressure: parsed.main.pressure,
        description: parsed
            .weather
            .into_iter()
            .next()
            .map(|condition| condition.description)
            .unwrap_or_default(),
        wind_speed: parsed.wind.map_or(0.0, |wind| wind.speed),
        rainfall: parsed.rain.and_then(|rain| rain.one_hour).unwrap_or(0.0),
        source: OPENWEATHER_SOURCE.to_string(),
        observed_at,
    })
}

#[async_trait]
impl WeatherProvider for OpenWeatherProvider {
    fn source(&self) -> &'static str {
        OPENWEATHER_SOURCE
    }

    async fn current(&self, district: &str) -> Result<WeatherSnapshot, WeatherError> {
        match self.fetch(district).await {
            Ok(snapshot) => Ok(snapshot),
            Err(error) => {
                warn!(
                    event_name = "weather.fetch.fallback",
                    district,
                    error = %error,
                    "weather provider failed; answering from mock data"
                );
                self.fallback.current(district).await
            }
        }
    }
}

/// OpenWeather when an API key is configured, the mock otherwise.
pub fn provider_from_config(
    config: &WeatherConfig,
) -> Result<Box<dyn WeatherProvider>, WeatherError> {
    match &config.api_key {
        Some(api_key) => Ok(Box::new(OpenWeatherProvider::new(config, api_key.clone())?)),
        None => Ok(Box::new(MockWeatherProvider)),
    }
}
