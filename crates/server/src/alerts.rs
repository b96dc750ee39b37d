use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smartcrop_core::alerts::{evaluate_alerts, format_crop_alert, format_weather_alert, CropAlert};
use smartcrop_core::domain::farmer::{FarmerId, NewFarmer};
use smartcrop_core::domain::weather::{AlertKind, AlertLogEntry};
use smartcrop_core::errors::DomainError;
use smartcrop_gateway::ChannelReport;
use tracing::{info, warn};

use crate::api::{current_weather, json_body, trimmed};
use crate::error::{new_correlation_id, ApiError};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct SendAlertRequest {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default, rename = "type", alias = "alert_type")]
    pub alert_type: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendAlertResponse {
    /// `success` when every channel delivered, `partial` or `failed` otherwise.
    pub status: &'static str,
    pub alert_type: AlertKind,
    pub district: String,
    pub farmer_id: FarmerId,
    pub message: String,
    pub channels: Vec<ChannelReport>,
    pub sent_at: DateTime<Utc>,
}

struct AlertTarget {
    phone: String,
    district: String,
    kind: AlertKind,
}

impl SendAlertRequest {
    fn into_target(self) -> Result<AlertTarget, DomainError> {
        let phone = trimmed(self.phone).ok_or(DomainError::MissingField("phone"))?;
        let district = trimmed(self.district).ok_or(DomainError::MissingField("district"))?;
        let raw_kind = trimmed(self.alert_type).unwrap_or_else(|| "weather".to_string());
        let kind = AlertKind::parse(&raw_kind).ok_or(DomainError::UnknownAlertType(raw_kind))?;

        Ok(AlertTarget { phone, district, kind })
    }
}

/// Builds the alert text, sends it on every configured channel and logs it. Channel
/// failures are reported in the response, never raised.
pub async fn send_alert(
    State(state): State<AppState>,
    payload: Result<Json<SendAlertRequest>, JsonRejection>,
) -> Result<Json<SendAlertResponse>, ApiError> {
    let correlation_id = new_correlation_id();
    let target = json_body(payload, &correlation_id)?
        .into_target()
        .map_err(|error| ApiError::domain(error, &correlation_id))?;

    // The message is resolved before the farmer row is written so a failed lookup leaves
    // no partial state.
    let sent_at = Utc::now();
    let (district, message) = match target.kind {
        AlertKind::Weather => {
            let snapshot = current_weather(&state, &target.district, &correlation_id).await?;
            let alerts = evaluate_alerts(&snapshot);
            let message = format_weather_alert(&snapshot.district, &snapshot, &alerts, sent_at);
            (snapshot.district, message)
        }
        AlertKind::Crop => {
            crop_message(&state, &target.phone, &target.district, sent_at, &correlation_id)
                .await?
        }
    };

    let farmer = state
        .farmers
        .get_or_create(
            NewFarmer {
                phone: target.phone.clone(),
                district: target.district.clone(),
                ..NewFarmer::default()
            },
            sent_at,
        )
        .await
        .map_err(|error| ApiError::repository(error, &correlation_id))?;

    let channels = state.notifier.dispatch(&target.phone, &message).await;
    let delivered = channels.iter().filter(|report| report.is_sent()).count();
    let status = match delivered {
        0 => "failed",
        count if count == channels.len() => "success",
        _ => "partial",
    };

    let entry = AlertLogEntry {
        farmer_id: Some(farmer.id),
        district: district.clone(),
        kind: target.kind,
        message: message.clone(),
        sent_at,
    };
    if let Err(error) = state.alert_log.record(&entry).await {
        warn!(
            event_name = "alert.log.persist_failed",
            correlation_id = %correlation_id,
            error = %error,
            "alert was dispatched but could not be logged"
        );
    }

    info!(
        event_name = "alert.dispatch.completed",
        correlation_id = %correlation_id,
        farmer_id = farmer.id.0,
        alert_type = target.kind.as_str(),
        district = %district,
        delivered,
        channels = channels.len(),
        "alert dispatched"
    );

    Ok(Json(SendAlertResponse {
        status,
        alert_type: target.kind,
        district,
        farmer_id: farmer.id,
        message,
        channels,
        sent_at,
    }))
}

// A registered farmer's own latest recommendation wins; otherwise the district's latest.
async fn crop_message(
    state: &AppState,
    phone: &str,
    district: &str,
    issued_at: DateTime<Utc>,
    correlation_id: &str,
) -> Result<(String, String), ApiError> {
    let farmer = state
        .farmers
        .find_by_phone(phone)
        .await
        .map_err(|error| ApiError::repository(error, correlation_id))?;
    let own = match farmer {
        Some(farmer) => state
            .recommendations
            .latest_for_farmer(farmer.id)
            .await
            .map_err(|error| ApiError::repository(error, correlation_id))?,
        None => None,
    };
    let stored = match own {
        Some(stored) => Some(stored),
        None => state
            .recommendations
            .latest_for_district(district)
            .await
            .map_err(|error| ApiError::repository(error, correlation_id))?,
    };

    let stored = stored.ok_or_else(|| {
        ApiError::not_found(
            format!("No crop recommendation on record for {district}"),
            correlation_id,
        )
    })?;

    let record = &stored.record;
    let message = format_crop_alert(&record.district, CropAlert::from(record), issued_at);
    Ok((record.district.clone(), message))
}
