use anyhow::Result;
use std::sync::Arc;

use crate::{
    Config,
    assemble::assemble,
    model::{RiskReport, RiskRequest},
    prediction::summarize,
    prompt::build_prompt,
    provider::{
        IndicatorProvider, RiskPredictor, indicator_provider_from_config,
        risk_predictor_from_config,
    },
};

/// Runs one assessment end to end: lookups, record, prompt, inference.
#[derive(Debug, Clone)]
pub struct RiskService {
    indicators: Arc<dyn IndicatorProvider>,
    predictor: Arc<dyn RiskPredictor>,
}

impl RiskService {
    pub fn new(indicators: Arc<dyn IndicatorProvider>, predictor: Arc<dyn RiskPredictor>) -> Self {
        Self { indicators, predictor }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::from(indicator_provider_from_config(config)),
            Arc::from(risk_predictor_from_config(config)),
        )
    }

    /// Probe the geospatial credentials. Failure is logged, never fatal.
    pub async fn check_credentials(&self) -> bool {
        match self.indicators.check().await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Earth Engine initialization failed: {e:#}");
                false
            }
        }
    }

    /// Geospatial failures abort the request; inference failures end up in the report.
    pub async fn assess(&self, request: RiskRequest) -> Result<RiskReport> {
        log::info!(
            "Assessing wildfire risk at ({}, {}) for {}..{}",
            request.point.latitude,
            request.point.longitude,
            request.window.start,
            request.window.end
        );

        let indicators = self.indicators.fetch_indicators(request.point, request.window).await?;
        let record = assemble(request.point, indicators, request.readings);
        let prompt = build_prompt(&record)?;

        let outcome = self.predictor.predict(&prompt).await;
        if let Err(e) = &outcome {
            log::warn!("Inference failed ({}): {}", e.kind(), e);
        }

        let (prediction, assessment) = summarize(&outcome);
        log::info!("Assessment finished: {assessment:?}");

        Ok(RiskReport { result: record, prediction, assessment })
    }
}
