use chrono::NaiveDate;

use crate::{
    error::QueryError,
    model::{AmbientReadings, GeoPoint, Indicators, RiskRecord, RiskRequest, TimeWindow},
};

/// Raw, untyped query parameters as they arrive on `/gee-data`.
#[derive(Debug, Clone, Default)]
pub struct RawQuery {
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub temperature: Option<String>,
    pub humidity: Option<String>,
    pub precipitation: Option<String>,
    pub windspeed: Option<String>,
    pub aqi: Option<String>,
    pub elevation: Option<String>,
    pub pm25: Option<String>,
    pub pm10: Option<String>,
    pub o3: Option<String>,
    pub no2: Option<String>,
    pub so2: Option<String>,
    pub co: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Absent or blank means null; anything else must parse as a finite float.
pub fn parse_optional_reading(
    name: &'static str,
    raw: Option<&str>,
) -> Result<Option<f64>, QueryError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or_else(|| QueryError::InvalidNumber { name, value: value.to_string() }),
    }
}

/// Coordinates fall back to 0 when missing.
fn parse_coordinate(name: &'static str, raw: Option<&str>) -> Result<f64, QueryError> {
    Ok(parse_optional_reading(name, raw)?.unwrap_or(0.0))
}

fn parse_date(name: &'static str, raw: Option<&str>) -> Result<Option<NaiveDate>, QueryError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| QueryError::InvalidDate { name, value: value.to_string() }),
    }
}

impl RawQuery {
    /// Build from decoded query pairs. A repeated key keeps its first value; unknown keys
    /// are ignored.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        let mut query = Self::default();

        for (key, value) in pairs {
            let slot = match key.as_str() {
                "lat" => &mut query.lat,
                "lon" => &mut query.lon,
                "temperature" => &mut query.temperature,
                "humidity" => &mut query.humidity,
                "precipitation" => &mut query.precipitation,
                "windspeed" => &mut query.windspeed,
                "aqi" => &mut query.aqi,
                "elevation" => &mut query.elevation,
                "pm25" => &mut query.pm25,
                "pm10" => &mut query.pm10,
                "o3" => &mut query.o3,
                "no2" => &mut query.no2,
                "so2" => &mut query.so2,
                "co" => &mut query.co,
                "start" => &mut query.start,
                "end" => &mut query.end,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }

        query
    }

    /// Coerce into a typed request. `default_window` is used for any missing bound.
    pub fn into_request(self, default_window: TimeWindow) -> Result<RiskRequest, QueryError> {
        let point = GeoPoint::new(
            parse_coordinate("lat", self.lat.as_deref())?,
            parse_coordinate("lon", self.lon.as_deref())?,
        );

        let window = default_window.with_overrides(
            parse_date("start", self.start.as_deref())?,
            parse_date("end", self.end.as_deref())?,
        );

        let readings = AmbientReadings {
            temperature: parse_optional_reading("temperature", self.temperature.as_deref())?,
            humidity: parse_optional_reading("humidity", self.humidity.as_deref())?,
            precipitation: parse_optional_reading("precipitation", self.precipitation.as_deref())?,
            windspeed: parse_optional_reading("windspeed", self.windspeed.as_deref())?,
            aqi: parse_optional_reading("aqi", self.aqi.as_deref())?,
            elevation: parse_optional_reading("elevation", self.elevation.as_deref())?,
            pm25: parse_optional_reading("pm25", self.pm25.as_deref())?,
            pm10: parse_optional_reading("pm10", self.pm10.as_deref())?,
            o3: parse_optional_reading("o3", self.o3.as_deref())?,
            no2: parse_optional_reading("no2", self.no2.as_deref())?,
            so2: parse_optional_reading("so2", self.so2.as_deref())?,
            co: parse_optional_reading("co", self.co.as_deref())?,
        };

        Ok(RiskRequest { point, window, readings })
    }
}

/// Merge the remote indicators with the caller's readings. No plausibility checks.
pub fn assemble(point: GeoPoint, indicators: Indicators, readings: AmbientReadings) -> RiskRecord {
    RiskRecord {
        latitude: point.latitude,
        longitude: point.longitude,
        indicators,
        readings,
    }
}
