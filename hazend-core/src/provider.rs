use crate::{
    Config,
    error::PredictionError,
    model::{GeoPoint, Indicators, TimeWindow},
    provider::{earthengine::EarthEngineProvider, openrouter::OpenRouterClient},
};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod earthengine;
pub mod openrouter;
#[cfg(test)]
mod test_server;

/// Source of the remote-sensing indicators for a point and window.
#[async_trait]
pub trait IndicatorProvider: Send + Sync + Debug {
    async fn fetch_indicators(
        &self,
        point: GeoPoint,
        window: TimeWindow,
    ) -> anyhow::Result<Indicators>;

    /// Verify credentials without running a query.
    async fn check(&self) -> anyhow::Result<()>;
}

/// Sends a prompt to a hosted model and returns its raw text.
#[async_trait]
pub trait RiskPredictor: Send + Sync + Debug {
    async fn predict(&self, prompt: &str) -> Result<String, PredictionError>;
}

/// Construct the geospatial provider from config. Credentials are only read when
/// first used, so this never fails on a missing key file.
pub fn indicator_provider_from_config(config: &Config) -> Box<dyn IndicatorProvider> {
    Box::new(EarthEngineProvider::new(config.earth_engine.clone()))
}

/// Construct the inference client from config. A missing API key surfaces per request.
pub fn risk_predictor_from_config(config: &Config) -> Box<dyn RiskPredictor> {
    Box::new(OpenRouterClient::new(
        config.openrouter.clone(),
        config.openrouter_api_key().map(str::to_owned),
    ))
}
