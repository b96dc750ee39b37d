use std::sync::Arc;

use smartcrop_core::advisory::{engine::DecisionEngine, soil_reference::SoilReferenceTable};
use smartcrop_db::repositories::{
    AlertLogRepository, FarmerRepository, RecommendationRepository, SqlAlertLogRepository,
    SqlFarmerRepository, SqlRecommendationRepository,
};
use smartcrop_db::DbPool;
use smartcrop_gateway::{Notifier, WeatherProvider};

/// Everything a request handler needs. Built once at bootstrap and cloned per request;
/// all members are read-only or internally synchronised.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<DecisionEngine>,
    pub soils: Arc<SoilReferenceTable>,
    pub farmers: Arc<dyn FarmerRepository>,
    pub recommendations: Arc<dyn RecommendationRepository>,
    pub alert_log: Arc<dyn AlertLogRepository>,
    pub notifier: Arc<Notifier>,
    pub weather: Arc<dyn WeatherProvider>,
}

impl AppState {
    pub fn with_pool(
        db_pool: DbPool,
        engine: DecisionEngine,
        soils: SoilReferenceTable,
        notifier: Notifier,
        weather: Box<dyn WeatherProvider>,
    ) -> Self {
        Self {
            engine: Arc::new(engine),
            soils: Arc::new(soils),
            farmers: Arc::new(SqlFarmerRepository::new(db_pool.clone())),
            recommendations: Arc::new(SqlRecommendationRepository::new(db_pool.clone())),
            alert_log: Arc::new(SqlAlertLogRepository::new(db_pool)),
            notifier: Arc::new(notifier),
            weather: Arc::from(weather),
        }
    }

    /// Rule-based engine, builtin soil table, mock gateways and in-memory stores.
    #[cfg(test)]
    pub fn in_memory() -> Self {
        use smartcrop_db::repositories::{
            InMemoryAlertLogRepository, InMemoryFarmerRepository, InMemoryRecommendationRepository,
        };
        use smartcrop_gateway::MockWeatherProvider;

        Self {
            engine: Arc::new(DecisionEngine::rule_based()),
            soils: Arc::new(SoilReferenceTable::default()),
            farmers: Arc::new(InMemoryFarmerRepository::default()),
            recommendations: Arc::new(InMemoryRecommendationRepository::default()),
            alert_log: Arc::new(InMemoryAlertLogRepository::default()),
            notifier: Arc::new(Notifier::mock()),
            weather: Arc::new(MockWeatherProvider),
        }
    }
}
