//! Plain-text rendering of alerts for SMS and WhatsApp.
//!
//! Both formatters are pure; the caller supplies the issue time so output is
//! reproducible.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::domain::recommendation::{FertilizerGap, RecommendationRecord};
use crate::domain::weather::{WeatherAlert, WeatherSnapshot};

const SIGNATURE: &str = "📱 SmartCrop Advisory System";
const TIME_FORMAT: &str = "%d-%m-%Y %H:%M";

/// Crop outcome fields a crop alert needs.
#[derive(Clone, Copy, Debug)]
pub struct CropAlert<'a> {
    pub crop: &'a str,
    pub confidence: f64,
    pub fertilizer_gap: &'a FertilizerGap,
}

impl<'a> From<&'a RecommendationRecord> for CropAlert<'a> {
    fn from(record: &'a RecommendationRecord) -> Self {
        Self {
            crop: &record.crop,
            confidence: record.confidence,
            fertilizer_gap: &record.fertilizer_gap,
        }
    }
}

pub fn format_weather_alert(
    district: &str,
    snapshot: &WeatherSnapshot,
    alerts: &[WeatherAlert],
    issued_at: DateTime<Utc>,
) -> String {
    let mut message = String::new();
    let _ = writeln!(message, "🌦️ Weather Alert for {district}\n");
    let _ = writeln!(message, "📍 District: {district}");
    let _ = writeln!(message, "🌡️ Temperature: {:.1}°C", snapshot.temperature);
    let _ = writeln!(message, "💧 Humidity: {:.0}%", snapshot.humidity);
    let _ = writeln!(message, "🌬️ Wind: {:.1} m/s", snapshot.wind_speed);
    let _ = writeln!(message, "☁️ Conditions: {}\n", snapshot.description);

    if alerts.is_empty() {
        let _ = writeln!(message, "✅ No weather warnings right now.");
    } else {
        let _ = writeln!(message, "⚠️ Alerts:");
        for alert in alerts {
            let _ = writeln!(
                message,
                "• [{} / {}] {}",
                alert.alert_type,
                alert.severity.as_str(),
                alert.message
            );
            if let Some(recommendation) = alert.recommendation.as_deref() {
                let _ = writeln!(message, "  💡 {recommendation}");
            }
        }
    }

    push_footer(&mut message, issued_at);
    message
}

pub fn format_crop_alert(district: &str, crop: CropAlert<'_>, issued_at: DateTime<Utc>) -> String {
    let mut message = String::new();
    let _ = writeln!(message, "🌱 Crop Alert for {district}\n");
    let _ = writeln!(message, "📍 District: {district}");
    let _ = writeln!(message, "🌾 Recommended Crop: {}", crop.crop);
    let _ = writeln!(message, "📊 Confidence: {:.1}%", crop.confidence * 100.0);

    let gap = crop.fertilizer_gap;
    let needs = [
        ("Nitrogen", gap.nitrogen_gap, "Urea", gap.recommendations.urea),
        ("Phosphorus", gap.phosphorus_gap, "DAP", gap.recommendations.dap),
        ("Potassium", gap.potassium_gap, "MOP", gap.recommendations.mop),
    ];
    if needs.iter().any(|(_, need, _, _)| *need > 0.0) {
        let _ = writeln!(message, "\n💊 Fertilizer Recommendations:");
        for (nutrient, need, product, quantity) in needs {
            if need > 0.0 {
                let _ = writeln!(
                    message,
                    "• {nutrient}: {need:.1} kg/ha ({product} {quantity:.1} kg/ha)"
                );
            }
        }
    }

    push_footer(&mut message, issued_at);
    message
}

fn push_footer(message: &mut String, issued_at: DateTime<Utc>) {
    let _ = write!(message, "\n🕒 Time: {}\n{SIGNATURE}", issued_at.format(TIME_FORMAT));
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{format_crop_alert, format_weather_alert, CropAlert};
    use crate::advisory::fertilizer::fertilizer_gap;
    use crate::domain::weather::{AlertType, Severity, WeatherAlert, WeatherSnapshot};

    fn issued_at() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 6, 30, 0).single().expect("valid timestamp")
    }

    fn snapshot() -> WeatherSnapshot {
        WeatherSnapshot {
            district: "Bathinda".to_string(),
            temperature: 38.44,
            humidity: 25.0,
            pressure: 1008.0,
            description: "clear sky".to_string(),
            wind_speed: 4.0,
            rainfall: 0.0,
            source: "mock".to_string(),
            observed_at: issued_at(),
        }
    }

    #[test]
    fn weather_alert_lists_each_alert_generically() {
        let alerts = vec![
            WeatherAlert {
                alert_type: AlertType::HeatWave,
                severity: Severity::High,
                message: "High temperature alert: 38.4°C.".to_string(),
                recommendation: Some("Irrigate at dusk.".to_string()),
            },
            WeatherAlert {
                alert_type: AlertType::LowHumidity,
                severity: Severity::Medium,
                message: "Low humidity: 25%.".to_string(),
                recommendation: None,
            },
        ];

        let message = format_weather_alert("Bathinda", &snapshot(), &alerts, issued_at());

        assert!(message.starts_with("🌦️ Weather Alert for Bathinda"));
        assert!(message.contains("🌡️ Temperature: 38.4°C"));
        assert!(message.contains("• [heat_wave / high] High temperature alert: 38.4°C."));
        assert!(message.contains("  💡 Irrigate at dusk."));
        assert!(message.contains("• [low_humidity / medium] Low humidity: 25%."));
        assert_eq!(message.matches("💡").count(), 1);
        assert!(message.ends_with("🕒 Time: 15-01-2025 06:30\n📱 SmartCrop Advisory System"));
    }

    #[test]
    fn weather_alert_without_warnings_says_so() {
        let message = format_weather_alert("Moga", &snapshot(), &[], issued_at());

        assert!(message.contains("No weather warnings"));
        assert!(!message.contains("⚠️"));
    }

    #[test]
    fn crop_alert_lists_only_positive_gaps() {
        let gap = fertilizer_gap(25.0, 18.0, 220.0, "Rice");
        let message = format_crop_alert(
            "Ludhiana",
            CropAlert { crop: "Rice", confidence: 0.75, fertilizer_gap: &gap },
            issued_at(),
        );

        assert!(message.contains("🌾 Recommended Crop: Rice"));
        assert!(message.contains("📊 Confidence: 75.0%"));
        assert!(message.contains("• Nitrogen: 75.0 kg/ha (Urea 163.0 kg/ha)"));
        assert!(message.contains("• Phosphorus: 32.0 kg/ha"));
        assert!(!message.contains("Potassium"));
    }

    #[test]
    fn crop_alert_without_gap_skips_fertilizer_section() {
        let gap = fertilizer_gap(500.0, 500.0, 500.0, "Rice");
        let message = format_crop_alert(
            "Ludhiana",
            CropAlert { crop: "Rice", confidence: 0.5, fertilizer_gap: &gap },
            issued_at(),
        );

        assert!(!message.contains("Fertilizer Recommendations"));
    }
}
