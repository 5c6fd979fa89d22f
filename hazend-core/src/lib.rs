//! Core library for the HazEnd wildfire-risk backend.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The Earth Engine indicator lookups and the OpenRouter inference client
//! - Record assembly, prompt construction and prediction parsing
//! - Shared domain models (requests, records, reports)
//!
//! It is used by `hazend-cli`, which serves it over HTTP.

pub mod assemble;
pub mod config;
pub mod error;
pub mod model;
pub mod prediction;
pub mod prompt;
pub mod provider;
pub mod service;

pub use assemble::RawQuery;
pub use config::Config;
pub use error::{PredictionError, QueryError};
pub use model::{
    AmbientReadings, Assessment, GeoPoint, Indicators, RiskLevel, RiskRecord, RiskReport,
    RiskRequest, TimeWindow,
};
pub use provider::{IndicatorProvider, RiskPredictor};
pub use service::RiskService;
