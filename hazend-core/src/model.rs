use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Length of the lookup window used when the caller does not supply one.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// Date range the remote collections are filtered to. `end` is exclusive on the
/// Earth Engine side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl TimeWindow {
    /// The default window: the last 30 days ending on `today`.
    pub fn ending_on(today: NaiveDate) -> Self {
        Self { start: today - Duration::days(DEFAULT_WINDOW_DAYS), end: today }
    }

    /// Default window ending today (UTC). Evaluated on every call.
    pub fn last_30_days() -> Self {
        Self::ending_on(Utc::now().date_naive())
    }

    /// Apply caller overrides on top of the default window.
    pub fn with_overrides(self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start: start.unwrap_or(self.start), end: end.unwrap_or(self.end) }
    }
}

/// Remote-sensing indicators. Each one is `None` when the backing collection had
/// nothing for the window and region.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Indicators {
    pub ndvi_mean: Option<f64>,
    pub burn_date_mean: Option<f64>,
    pub fire_activity_count: Option<u64>,
    pub population_density: Option<f64>,
}

/// Weather and air-quality readings supplied by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AmbientReadings {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub precipitation: Option<f64>,
    pub windspeed: Option<f64>,
    pub aqi: Option<f64>,
    pub elevation: Option<f64>,
    pub pm25: Option<f64>,
    pub pm10: Option<f64>,
    pub o3: Option<f64>,
    pub no2: Option<f64>,
    pub so2: Option<f64>,
    pub co: Option<f64>,
}

/// Everything needed to run one assessment.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskRequest {
    pub point: GeoPoint,
    pub window: TimeWindow,
    pub readings: AmbientReadings,
}

/// The flat record sent to the model and returned to the caller as `result`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskRecord {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(flatten)]
    pub indicators: Indicators,
    #[serde(flatten)]
    pub readings: AmbientReadings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
    Extreme,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::High => "High",
            RiskLevel::Extreme => "Extreme",
        }
    }

    pub const fn all() -> &'static [RiskLevel] {
        &[RiskLevel::Low, RiskLevel::Moderate, RiskLevel::High, RiskLevel::Extreme]
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "moderate" => Ok(RiskLevel::Moderate),
            "high" => Ok(RiskLevel::High),
            "extreme" => Ok(RiskLevel::Extreme),
            _ => Err(format!("Unknown risk level '{value}'")),
        }
    }
}

/// Validated model output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPrediction {
    pub prediction: RiskLevel,
    pub reasoning: String,
}

/// Typed view of the inference outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Assessment {
    Ok {
        prediction: RiskLevel,
        reasoning: String,
    },
    Error {
        kind: String,
        message: String,
    },
}

/// Response body of `/gee-data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskReport {
    pub result: RiskRecord,
    /// Raw model text, or `Error getting AI response: ...`.
    pub prediction: String,
    pub assessment: Assessment,
}
