use crate::domain::weather::{AlertType, Severity, WeatherAlert, WeatherSnapshot};

const HEAT_WAVE_CELSIUS: f64 = 35.0;
const FROST_CELSIUS: f64 = 5.0;
const HIGH_HUMIDITY_PERCENT: f64 = 80.0;
const LOW_HUMIDITY_PERCENT: f64 = 30.0;
const STRONG_WIND_MPS: f64 = 15.0;
const HEAVY_RAIN_MM: f64 = 10.0;

/// Threshold checks over a single observation. Temperature and humidity each raise at
/// most one alert; all thresholds are strict.
pub fn evaluate_alerts(snapshot: &WeatherSnapshot) -> Vec<WeatherAlert> {
    let mut alerts = Vec::new();

    if snapshot.temperature > HEAT_WAVE_CELSIUS {
        alerts.push(alert(
            AlertType::HeatWave,
            Severity::High,
            format!(
                "High temperature alert: {:.1}°C. Increase irrigation frequency.",
                snapshot.temperature
            ),
            "Water crops early morning or late evening to prevent heat stress.",
        ));
    } else if snapshot.temperature < FROST_CELSIUS {
        alerts.push(alert(
            AlertType::Frost,
            Severity::High,
            format!("Frost warning: {:.1}°C. Protect tender crops.", snapshot.temperature),
            "Cover crops with protective sheets or use irrigation to prevent frost damage.",
        ));
    }

    if snapshot.humidity > HIGH_HUMIDITY_PERCENT {
        alerts.push(alert(
            AlertType::HighHumidity,
            Severity::Medium,
            format!("High humidity: {:.0}%. Watch for fungal diseases.", snapshot.humidity),
            "Apply preventive fungicide and ensure proper ventilation.",
        ));
    } else if snapshot.humidity < LOW_HUMIDITY_PERCENT {
        alerts.push(alert(
            AlertType::LowHumidity,
            Severity::Medium,
            format!("Low humidity: {:.0}%. Increase irrigation.", snapshot.humidity),
            "Water crops more frequently to maintain soil moisture.",
        ));
    }

    if snapshot.wind_speed > STRONG_WIND_MPS {
        alerts.push(alert(
            AlertType::StrongWind,
            Severity::Medium,
            format!("Strong winds: {:.1} m/s. Secure farm equipment.", snapshot.wind_speed),
            "Tie down loose equipment and check for wind damage.",
        ));
    }

    if snapshot.rainfall > HEAVY_RAIN_MM {
        alerts.push(alert(
            AlertType::HeavyRain,
            Severity::High,
            format!("Heavy rainfall: {:.1}mm. Check drainage.", snapshot.rainfall),
            "Ensure proper drainage and cover harvested crops.",
        ));
    }

    alerts
}

fn alert(
    alert_type: AlertType,
    severity: Severity,
    message: String,
    recommendation: &str,
) -> WeatherAlert {
    WeatherAlert { alert_type, severity, message, recommendation: Some(recommendation.to_string()) }
}
