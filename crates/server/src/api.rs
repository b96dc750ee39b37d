//! JSON API for the advisory service.
//!
//! - `POST /api/recommend`            - crop recommendation with fertilizer gap
//! - `POST /api/fertilizer`           - fertilizer gap for a given crop
//! - `POST /api/register-farmer`      - register a farmer by phone
//! - `POST /api/send-alert`           - dispatch a weather or crop alert
//! - `GET  /api/weather`              - current weather for a district
//! - `GET  /api/weather-alerts`       - current weather plus evaluated alerts
//! - `GET  /api/districts`            - soil reference table
//! - `GET  /api/soil-data/{district}` - one soil reference entry
//! - `GET  /api/market-prices`        - mandi prices, optionally filtered by district

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smartcrop_core::advisory::engine::Evaluation;
use smartcrop_core::advisory::soil_reference::DistrictSoil;
use smartcrop_core::advisory::{assess, build_record, FertilizerRequest, RecommendationRequest};
use smartcrop_core::alerts::evaluate_alerts;
use smartcrop_core::domain::farmer::{FarmerId, NewFarmer};
use smartcrop_core::domain::recommendation::{
    FertilizerGap, RecommendationId, RecommendationRecord,
};
use smartcrop_core::domain::weather::{WeatherAlert, WeatherSnapshot};
use smartcrop_core::errors::{ApplicationError, DomainError};
use smartcrop_core::market::{market_prices, MarketPrice};
use tracing::{debug, info, warn};

use crate::alerts::send_alert;
use crate::error::{new_correlation_id, ApiError};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/recommend", post(recommend))
        .route("/api/fertilizer", post(fertilizer))
        .route("/api/register-farmer", post(register_farmer))
        .route("/api/send-alert", post(send_alert))
        .route("/api/weather", get(weather))
        .route("/api/weather-alerts", get(weather_alerts))
        .route("/api/districts", get(districts))
        .route("/api/soil-data/{district}", get(soil_data))
        .route("/api/market-prices", get(list_market_prices))
        .with_state(state)
}

pub(crate) fn json_body<T>(
    payload: Result<Json<T>, JsonRejection>,
    correlation_id: &str,
) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::malformed_body(rejection, correlation_id))
}

#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    /// Null when the record could not be persisted.
    pub id: Option<RecommendationId>,
    pub region: String,
    #[serde(flatten)]
    pub record: RecommendationRecord,
}

pub async fn recommend(
    State(state): State<AppState>,
    payload: Result<Json<RecommendationRequest>, JsonRejection>,
) -> Result<Json<RecommendResponse>, ApiError> {
    let correlation_id = new_correlation_id();
    let request = json_body(payload, &correlation_id)?;

    let validated =
        request.validate().map_err(|error| ApiError::domain(error, &correlation_id))?;
    let assessment = assess(&state.engine, &state.soils, &validated)
        .map_err(|error| ApiError::domain(error, &correlation_id))?;
    log_degradations(&assessment.evaluation, &correlation_id);

    let region = state
        .soils
        .lookup(&assessment.sample.district)
        .map(|soil| soil.region.clone())
        .unwrap_or_default();

    let farmer_id = match validated.phone.as_deref() {
        Some(phone) => resolve_farmer(&state, phone, &correlation_id).await,
        None => None,
    };

    let record = build_record(&assessment, farmer_id, Utc::now());
    let id = match state.recommendations.insert(&record).await {
        Ok(id) => Some(id),
        Err(error) => {
            warn!(
                event_name = "advisory.recommend.persist_failed",
                correlation_id = %correlation_id,
                error = %error,
                "recommendation could not be stored; returning it unsaved"
            );
            None
        }
    };

    info!(
        event_name = "advisory.recommend.completed",
        correlation_id = %correlation_id,
        district = %record.district,
        crop = %record.crop,
        method = %record.method,
        confidence = record.confidence,
        "recommendation issued"
    );

    Ok(Json(RecommendResponse { id, region, record }))
}

// Farmer linkage is best effort: lookup failure leaves the record unlinked.
async fn resolve_farmer(state: &AppState, phone: &str, correlation_id: &str) -> Option<FarmerId> {
    match state.farmers.find_by_phone(phone).await {
        Ok(farmer) => farmer.map(|farmer| farmer.id),
        Err(error) => {
            warn!(
                event_name = "advisory.recommend.farmer_lookup_failed",
                correlation_id,
                error = %error,
                "farmer lookup failed; recommendation will not be linked"
            );
            None
        }
    }
}

fn log_degradations(evaluation: &Evaluation, correlation_id: &str) {
    for degradation in &evaluation.degradations {
        if degradation.reason.is_expected() {
            debug!(
                event_name = "advisory.engine.tier_skipped",
                correlation_id,
                tier = %degradation.tier,
                reason = %degradation.reason,
                "decision tier skipped"
            );
        } else {
            warn!(
                event_name = "advisory.engine.degraded",
                correlation_id,
                tier = %degradation.tier,
                reason = %degradation.reason,
                "decision tier failed; falling back"
            );
        }
    }
}

pub async fn fertilizer(
    payload: Result<Json<FertilizerRequest>, JsonRejection>,
) -> Result<Json<FertilizerGap>, ApiError> {
    let correlation_id = new_correlation_id();
    let request = json_body(payload, &correlation_id)?;
    let gap = request.estimate().map_err(|error| ApiError::domain(error, &correlation_id))?;
    Ok(Json(gap))
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterFarmerRequest {
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub taluk: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterFarmerResponse {
    pub status: &'static str,
    pub farmer_id: FarmerId,
    pub message: &'static str,
    pub registered_at: DateTime<Utc>,
}

pub async fn register_farmer(
    State(state): State<AppState>,
    payload: Result<Json<RegisterFarmerRequest>, JsonRejection>,
) -> Result<Json<RegisterFarmerResponse>, ApiError> {
    let correlation_id = new_correlation_id();
    let request = json_body(payload, &correlation_id)?;

    let phone = trimmed(request.phone)
        .ok_or_else(|| ApiError::domain(DomainError::MissingField("phone"), &correlation_id))?;
    let farmer = NewFarmer {
        phone,
        district: trimmed(request.district).unwrap_or_default(),
        taluk: trimmed(request.taluk).unwrap_or_default(),
        name: trimmed(request.name).unwrap_or_default(),
    };

    let registered_at = Utc::now();
    let farmer = state
        .farmers
        .register(farmer, registered_at)
        .await
        .map_err(|error| ApiError::repository(error, &correlation_id))?;

    info!(
        event_name = "farmer.registered",
        correlation_id = %correlation_id,
        farmer_id = farmer.id.0,
        district = %farmer.district,
        "farmer registered"
    );

    Ok(Json(RegisterFarmerResponse {
        status: "success",
        farmer_id: farmer.id,
        message: "Farmer registered successfully",
        registered_at,
    }))
}

pub(crate) fn trimmed(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

#[derive(Debug, Default, Deserialize)]
pub struct DistrictQuery {
    #[serde(default)]
    pub district: Option<String>,
}

pub async fn weather(
    State(state): State<AppState>,
    Query(query): Query<DistrictQuery>,
) -> Result<Json<WeatherSnapshot>, ApiError> {
    let correlation_id = new_correlation_id();
    let district = required_district(query, &correlation_id)?;
    let snapshot = current_weather(&state, &district, &correlation_id).await?;
    Ok(Json(snapshot))
}

#[derive(Debug, Serialize)]
pub struct WeatherAlertsResponse {
    pub district: String,
    pub weather: WeatherSnapshot,
    pub alerts: Vec<WeatherAlert>,
    pub count: usize,
}

pub async fn weather_alerts(
    State(state): State<AppState>,
    Query(query): Query<DistrictQuery>,
) -> Result<Json<WeatherAlertsResponse>, ApiError> {
    let correlation_id = new_correlation_id();
    let district = required_district(query, &correlation_id)?;
    let snapshot = current_weather(&state, &district, &correlation_id).await?;
    let alerts = evaluate_alerts(&snapshot);

    Ok(Json(WeatherAlertsResponse {
        district: snapshot.district.clone(),
        count: alerts.len(),
        alerts,
        weather: snapshot,
    }))
}

fn required_district(query: DistrictQuery, correlation_id: &str) -> Result<String, ApiError> {
    trimmed(query.district)
        .ok_or_else(|| ApiError::domain(DomainError::MissingField("district"), correlation_id))
}

pub(crate) async fn current_weather(
    state: &AppState,
    district: &str,
    correlation_id: &str,
) -> Result<WeatherSnapshot, ApiError> {
    state.weather.current(district).await.map_err(|error| {
        ApiError::from_application(ApplicationError::Integration(error.to_string()), correlation_id)
    })
}

#[derive(Debug, Serialize)]
pub struct DistrictsResponse {
    pub districts: Vec<DistrictSoil>,
    pub count: usize,
}

pub async fn districts(State(state): State<AppState>) -> Json<DistrictsResponse> {
    let districts = state.soils.entries().to_vec();
    Json(DistrictsResponse { count: districts.len(), districts })
}

#[derive(Debug, Serialize)]
pub struct SoilDataResponse {
    pub district: String,
    pub soil_data: DistrictSoil,
}

pub async fn soil_data(
    State(state): State<AppState>,
    Path(district): Path<String>,
) -> Result<Json<SoilDataResponse>, ApiError> {
    let correlation_id = new_correlation_id();
    let soil = state
        .soils
        .lookup(&district)
        .map_err(|_| ApiError::not_found("District not found", &correlation_id))?;

    Ok(Json(SoilDataResponse { district: soil.district.clone(), soil_data: soil.clone() }))
}

#[derive(Debug, Serialize)]
pub struct MarketPricesResponse {
    pub prices: Vec<MarketPrice>,
    pub count: usize,
}

pub async fn list_market_prices(Query(query): Query<DistrictQuery>) -> Json<MarketPricesResponse> {
    let prices = market_prices(query.district.as_deref());
    Json(MarketPricesResponse { count: prices.len(), prices })
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use smartcrop_core::domain::farmer::FarmerId;
    use smartcrop_core::domain::recommendation::{
        RecommendationId, RecommendationRecord, StoredRecommendation,
    };
    use smartcrop_db::repositories::RepositoryError;
    use smartcrop_db::repositories::RecommendationRepository;
    use tower::ServiceExt;

    use super::router;
    use crate::state::AppState;

    pub(crate) async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.expect("router responds");
        let status = response.status();
        let bytes =
            axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("body bytes");
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub(crate) fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).expect("request")
    }

    #[tokio::test]
    async fn recommend_loamy_district_returns_rule_based_rice() {
        let state = AppState::in_memory();
        let (status, body) = call(
            router(state.clone()),
            post_json(
                "/api/recommend",
                json!({"district": "Ludhiana", "nitrogen": 25, "phosphorus": 18,
                       "potassium": 220, "ph": 7.2}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["crop"], "Rice");
        assert_eq!(body["method"], "rule_based");
        assert_eq!(body["confidence"], 0.75);
        assert_eq!(body["soil_type"], "loamy");
        assert_eq!(body["region"], "Malwa");
        assert_eq!(body["fertilizer_gap"]["nitrogen_gap"], 75.0);
        assert_eq!(body["id"], 1);
        assert_eq!(state.recommendations.count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn recommend_unknown_district_is_rejected_without_persisting() {
        let state = AppState::in_memory();
        let (status, body) = call(
            router(state.clone()),
            post_json(
                "/api/recommend",
                json!({"district": "Atlantis", "nitrogen": 1, "phosphorus": 1,
                       "potassium": 1, "ph": 7}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "District not found in database: Atlantis");
        assert!(body["correlation_id"].as_str().is_some_and(|id| !id.is_empty()));
        assert_eq!(state.recommendations.count().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn recommend_missing_field_names_it() {
        let (status, body) = call(
            router(AppState::in_memory()),
            post_json("/api/recommend", json!({"district": "Moga", "nitrogen": 1})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required field: phosphorus");
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request_in_api_shape() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/recommend")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .expect("request");

        let (status, body) = call(router(AppState::in_memory()), request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().is_some_and(|error| error.starts_with("Malformed JSON")));
    }

    #[tokio::test]
    async fn recommend_links_registered_farmer_by_phone() {
        let state = AppState::in_memory();
        let app = router(state.clone());
        call(app.clone(), post_json("/api/register-farmer", json!({"phone": "+911"}))).await;

        let (status, body) = call(
            app,
            post_json(
                "/api/recommend",
                json!({"district": "Bathinda", "nitrogen": 10, "phosphorus": 10,
                       "potassium": 10, "ph": 8.1, "phone": "+911"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["crop"], "Pearl Millet (Bajra)");
        assert_eq!(body["farmer_id"], 1);
        let stored = state
            .recommendations
            .latest_for_farmer(FarmerId(1))
            .await
            .expect("lookup")
            .expect("linked row");
        assert_eq!(stored.record.district, "Bathinda");
    }

    struct FailingRecommendations;

    #[async_trait]
    impl RecommendationRepository for FailingRecommendations {
        async fn insert(
            &self,
            _record: &RecommendationRecord,
        ) -> Result<RecommendationId, RepositoryError> {
            Err(RepositoryError::Decode("disk full".to_string()))
        }

        async fn latest_for_farmer(
            &self,
            _farmer_id: FarmerId,
        ) -> Result<Option<StoredRecommendation>, RepositoryError> {
            Ok(None)
        }

        async fn latest_for_district(
            &self,
            _district: &str,
        ) -> Result<Option<StoredRecommendation>, RepositoryError> {
            Ok(None)
        }

        async fn count(&self) -> Result<i64, RepositoryError> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn persistence_failure_still_returns_recommendation() {
        let mut state = AppState::in_memory();
        state.recommendations = Arc::new(FailingRecommendations);

        let (status, body) = call(
            router(state),
            post_json(
                "/api/recommend",
                json!({"district": "Patiala", "nitrogen": 10, "phosphorus": 10,
                       "potassium": 10, "ph": 8.0, "lastCrop": "Wheat harvested"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["crop"], "Rice");
        assert!(body["id"].is_null());
    }

    #[tokio::test]
    async fn duplicate_registration_is_conflict_and_keeps_first_row() {
        let state = AppState::in_memory();
        let app = router(state.clone());

        let (first_status, first) = call(
            app.clone(),
            post_json("/api/register-farmer", json!({"phone": "+919", "district": "Moga"})),
        )
        .await;
        let (second_status, second) = call(
            app,
            post_json("/api/register-farmer", json!({"phone": "+919", "district": "Mansa"})),
        )
        .await;

        assert_eq!(first_status, StatusCode::OK);
        assert_eq!(first["farmer_id"], 1);
        assert_eq!(second_status, StatusCode::CONFLICT);
        assert_eq!(second["error"], "Phone number already registered");
        assert_eq!(state.farmers.count().await.expect("count"), 1);
        let farmer = state.farmers.find_by_phone("+919").await.expect("lookup").expect("farmer");
        assert_eq!(farmer.district, "Moga");
    }

    #[tokio::test]
    async fn registration_requires_phone() {
        let (status, body) = call(
            router(AppState::in_memory()),
            post_json("/api/register-farmer", json!({"district": "Moga"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required field: phone");
    }

    #[tokio::test]
    async fn fertilizer_endpoint_sizes_gap() {
        let (status, body) = call(
            router(AppState::in_memory()),
            post_json(
                "/api/fertilizer",
                json!({"nitrogen": 20, "phosphorus": 70, "potassium": 10, "crop": "Wheat"}),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["nitrogen_gap"], 100.0);
        assert_eq!(body["phosphorus_gap"], 0.0);
        assert_eq!(body["potassium_gap"], 50.0);
        assert_eq!(body["recommendations"]["dap"], 0.0);
    }

    #[tokio::test]
    async fn weather_alerts_require_district() {
        let (status, body) = call(router(AppState::in_memory()), get("/api/weather-alerts")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing required field: district");
    }

    #[tokio::test]
    async fn weather_alerts_report_mock_conditions() {
        let (status, body) =
            call(router(AppState::in_memory()), get("/api/weather-alerts?district=fazilka")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["district"], "Fazilka");
        assert_eq!(body["weather"]["temperature"], 32.0);
        assert_eq!(body["count"], 0);
    }

    #[tokio::test]
    async fn soil_data_lookup_is_case_insensitive_and_404s_unknown() {
        let app = router(AppState::in_memory());

        let (found_status, found) = call(app.clone(), get("/api/soil-data/SANGRUR")).await;
        let (missing_status, missing) = call(app, get("/api/soil-data/Atlantis")).await;

        assert_eq!(found_status, StatusCode::OK);
        assert_eq!(found["district"], "Sangrur");
        assert_eq!(found["soil_data"]["soil_type"], "alluvial");
        assert_eq!(missing_status, StatusCode::NOT_FOUND);
        assert_eq!(missing["error"], "District not found");
    }

    #[tokio::test]
    async fn districts_and_market_prices_list_reference_data() {
        let app = router(AppState::in_memory());

        let (_, districts) = call(app.clone(), get("/api/districts")).await;
        let (_, all_prices) = call(app.clone(), get("/api/market-prices")).await;
        let (_, patiala) = call(app, get("/api/market-prices?district=patiala")).await;

        assert_eq!(districts["count"], 10);
        assert_eq!(all_prices["count"], 10);
        assert_eq!(patiala["count"], 1);
        assert_eq!(patiala["prices"][0]["commodity"], "Wheat");
    }
}
