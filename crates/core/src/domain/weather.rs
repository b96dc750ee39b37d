use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::farmer::FarmerId;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub district: String,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub description: String,
    pub wind_speed: f64,
    #[serde(default)]
    pub rainfall: f64,
    pub source: String,
    pub observed_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    HeatWave,
    Frost,
    HighHumidity,
    LowHumidity,
    StrongWind,
    HeavyRain,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HeatWave => "heat_wave",
            Self::Frost => "frost",
            Self::HighHumidity => "high_humidity",
            Self::LowHumidity => "low_humidity",
            Self::StrongWind => "strong_wind",
            Self::HeavyRain => "heavy_rain",
        }
    }
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeatherAlert {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

/// Which message a send-alert request asks for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Weather,
    Crop,
}

impl AlertKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "weather" => Some(Self::Weather),
            "crop" => Some(Self::Crop),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Weather => "weather",
            Self::Crop => "crop",
        }
    }
}

/// One dispatched alert, as written to the alert log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AlertLogEntry {
    pub farmer_id: Option<FarmerId>,
    pub district: String,
    pub kind: AlertKind,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}
