//! Remote-sensing indicators from the Earth Engine REST API.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::OnceCell;

use crate::{
    config::EarthEngineConfig,
    model::{GeoPoint, Indicators, TimeWindow},
};

use super::IndicatorProvider;

mod auth;
pub mod expr;

use auth::{ServiceAccountAuth, ServiceAccountKey};
pub use expr::Expr;

const TIME_START: &str = "system:time_start";

/// Radius around the point for vegetation, burn and fire lookups.
pub const LOCAL_BUFFER_M: f64 = 5_000.0;
/// Radius around the point for population density.
pub const POPULATION_BUFFER_M: f64 = 20_000.0;

const NDVI_SCALE_M: f64 = 30.0;
const BURN_SCALE_M: f64 = 500.0;
const POPULATION_SCALE_M: f64 = 100.0;

/// A "latest image, mean over a buffer" lookup. `size` gates `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageQuery {
    pub size: Expr,
    pub value: Expr,
}

impl ImageQuery {
    fn latest(
        collection: Expr,
        image: impl FnOnce(Expr) -> Expr,
        band: &str,
        region: Expr,
        scale: f64,
    ) -> Self {
        Self {
            size: collection.clone().size(),
            value: image(collection.first()).reduce_mean(region, scale).get(band),
        }
    }
}

pub fn ndvi_query(dataset: &str, point: GeoPoint, window: TimeWindow) -> ImageQuery {
    let collection = Expr::image_collection(dataset)
        .filter_date(window)
        .filter_bounds(Expr::point(point))
        .sort_desc(TIME_START);

    ImageQuery::latest(
        collection,
        |img| img.normalized_difference("B8", "B4").rename("NDVI"),
        "NDVI",
        Expr::point(point).buffer(LOCAL_BUFFER_M),
        NDVI_SCALE_M,
    )
}

pub fn burn_query(dataset: &str, point: GeoPoint, window: TimeWindow) -> ImageQuery {
    let collection = Expr::image_collection(dataset)
        .filter_date(window)
        .filter_bounds(Expr::point(point))
        .sort_desc(TIME_START);

    ImageQuery::latest(
        collection,
        |img| img.select("BurnDate"),
        "BurnDate",
        Expr::point(point).buffer(LOCAL_BUFFER_M),
        BURN_SCALE_M,
    )
}

/// Number of fire detections inside the local buffer during the window.
pub fn fire_count_query(dataset: &str, point: GeoPoint, window: TimeWindow) -> Expr {
    Expr::feature_collection(dataset)
        .filter_date(window)
        .filter_bounds(Expr::point(point).buffer(LOCAL_BUFFER_M))
        .size()
}

/// Population is read from a single pinned year, independent of the request window.
pub fn population_query(dataset: &str, point: GeoPoint, year: i32) -> Result<ImageQuery> {
    let window = year_window(year)?;
    let collection = Expr::image_collection(dataset)
        .filter_date(window)
        .filter_bounds(Expr::point(point));

    Ok(ImageQuery::latest(
        collection,
        |img| img,
        "population",
        Expr::point(point).buffer(POPULATION_BUFFER_M),
        POPULATION_SCALE_M,
    ))
}

fn year_window(year: i32) -> Result<TimeWindow> {
    let start = NaiveDate::from_ymd_opt(year, 1, 1);
    let end = NaiveDate::from_ymd_opt(year, 12, 31);
    match (start, end) {
        (Some(start), Some(end)) => Ok(TimeWindow { start, end }),
        _ => Err(anyhow!("Invalid population year {year}")),
    }
}

#[derive(Debug, Deserialize)]
struct ComputeResponse {
    #[serde(default)]
    result: Value,
}

#[derive(Debug)]
pub struct EarthEngineProvider {
    config: EarthEngineConfig,
    auth: ServiceAccountAuth,
    project_id: OnceCell<String>,
    http: Client,
}

impl EarthEngineProvider {
    pub fn new(config: EarthEngineConfig) -> Self {
        let auth = ServiceAccountAuth::new(
            config.key_file.clone(),
            config.service_account.clone(),
            config.access_token.clone(),
        );
        Self { config, auth, project_id: OnceCell::new(), http: Client::new() }
    }

    /// Resolved once: the configured project, else the key file's `project_id`.
    async fn project(&self) -> Result<&str> {
        let project = self
            .project_id
            .get_or_try_init(|| async {
                match &self.config.project {
                    Some(project) => Ok(project.clone()),
                    None => project_from_key(&self.auth.load_key()?),
                }
            })
            .await?;

        Ok(project.as_str())
    }

    /// Evaluate one expression server-side.
    async fn compute(&self, expr: &Expr) -> Result<Value> {
        let token = self.auth.access_token().await?;
        let project = self.project().await?;
        let url = format!(
            "{}/projects/{project}/value:compute",
            self.config.api_base.trim_end_matches('/')
        );

        let res = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "expression": expr.to_expression() }))
            .send()
            .await
            .context("Failed to send request to Earth Engine (value:compute)")?;

        let status = res.status();
        let body = res.text().await.context("Failed to read Earth Engine response body")?;

        if !status.is_success() {
            return Err(anyhow!(
                "Earth Engine value:compute failed with status {}: {}",
                status,
                truncate_body(&body),
            ));
        }

        let parsed: ComputeResponse =
            serde_json::from_str(&body).context("Failed to parse Earth Engine JSON")?;

        Ok(parsed.result)
    }

    async fn count(&self, expr: &Expr) -> Result<u64> {
        let value = self.compute(expr).await?;
        value.as_u64().ok_or_else(|| anyhow!("Earth Engine returned a non-integer size: {value}"))
    }

    /// `None` when the collection is empty; the value query is skipped then.
    async fn latest_mean(&self, name: &str, query: ImageQuery) -> Result<Option<f64>> {
        if self.count(&query.size).await? == 0 {
            log::debug!("No {name} imagery in window; leaving it null");
            return Ok(None);
        }

        Ok(self.compute(&query.value).await?.as_f64())
    }

    async fn ndvi(&self, point: GeoPoint, window: TimeWindow) -> Result<Option<f64>> {
        self.latest_mean("vegetation", ndvi_query(&self.config.datasets.vegetation, point, window))
            .await
            .context("NDVI lookup failed")
    }

    async fn burn_date(&self, point: GeoPoint, window: TimeWindow) -> Result<Option<f64>> {
        self.latest_mean("burn", burn_query(&self.config.datasets.burn, point, window))
            .await
            .context("Burn history lookup failed")
    }

    async fn fire_count(&self, point: GeoPoint, window: TimeWindow) -> Result<Option<u64>> {
        let expr = fire_count_query(&self.config.datasets.fire, point, window);
        let value = self.compute(&expr).await.context("Fire activity lookup failed")?;
        Ok(value.as_u64())
    }

    async fn population(&self, point: GeoPoint) -> Result<Option<f64>> {
        let query =
            population_query(&self.config.datasets.population, point, self.config.population_year)?;
        self.latest_mean("population", query).await.context("Population density lookup failed")
    }
}

#[async_trait]
impl IndicatorProvider for EarthEngineProvider {
    async fn fetch_indicators(&self, point: GeoPoint, window: TimeWindow) -> Result<Indicators> {
        let (ndvi_mean, burn_date_mean, fire_activity_count, population_density) = tokio::try_join!(
            self.ndvi(point, window),
            self.burn_date(point, window),
            self.fire_count(point, window),
            self.population(point),
        )?;

        Ok(Indicators { ndvi_mean, burn_date_mean, fire_activity_count, population_density })
    }

    async fn check(&self) -> Result<()> {
        self.project().await?;
        self.auth.access_token().await?;
        Ok(())
    }
}

fn project_from_key(key: &ServiceAccountKey) -> Result<String> {
    key.project_id.clone().ok_or_else(|| {
        anyhow!(
            "No Earth Engine project configured and the key file has no project_id.\n\
             Hint: set HAZEND_EE_PROJECT."
        )
    })
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Datasets;
    use crate::provider::test_server::{Recorded, TestServer};
    use reqwest::StatusCode;
    use serde_json::json;

    fn window() -> TimeWindow {
        TimeWindow::ending_on(NaiveDate::from_ymd_opt(2024, 8, 15).unwrap())
    }

    fn function_name(expr: &Expr) -> &'static str {
        match expr {
            Expr::Call { function, .. } => *function,
            Expr::Constant(_) => "",
        }
    }

    fn arg<'a>(expr: &'a Expr, name: &str) -> &'a Expr {
        match expr {
            Expr::Call { args, .. } => &args.iter().find(|(n, _)| *n == name).unwrap().1,
            Expr::Constant(_) => panic!("constant has no arguments"),
        }
    }

    #[test]
    fn ndvi_query_gates_on_size_and_reads_ndvi_band() {
        let query = ndvi_query(&Datasets::default().vegetation, GeoPoint::new(34.05, -118.25), window());

        assert_eq!(function_name(&query.size), "Collection.size");
        assert_eq!(function_name(&query.value), "Dictionary.get");
        assert_eq!(arg(&query.value, "key"), &Expr::constant("NDVI"));

        let reduce = arg(&query.value, "dictionary");
        assert_eq!(function_name(reduce), "Image.reduceRegion");
        assert_eq!(arg(reduce, "scale"), &Expr::constant(30.0));
        assert_eq!(
            arg(reduce, "geometry"),
            &Expr::point(GeoPoint::new(34.05, -118.25)).buffer(LOCAL_BUFFER_M)
        );

        let image = arg(reduce, "image");
        assert_eq!(function_name(image), "Image.rename");
        assert_eq!(function_name(arg(image, "input")), "Image.normalizedDifference");
    }

    #[test]
    fn burn_query_selects_burn_date_at_500m() {
        let query = burn_query("MODIS/061/MCD64A1", GeoPoint::new(0.0, 0.0), window());
        let reduce = arg(&query.value, "dictionary");

        assert_eq!(arg(&query.value, "key"), &Expr::constant("BurnDate"));
        assert_eq!(arg(reduce, "scale"), &Expr::constant(500.0));
        assert_eq!(function_name(arg(reduce, "image")), "Image.select");
    }

    #[test]
    fn fire_query_counts_within_buffer() {
        let point = GeoPoint::new(1.0, 2.0);
        let expr = fire_count_query("FIRMS", point, window());

        assert_eq!(function_name(&expr), "Collection.size");
        let filtered = arg(&expr, "collection");
        let filter = arg(filtered, "filter");
        assert_eq!(function_name(filter), "Filter.intersects");
        assert_eq!(arg(filter, "rightValue"), &Expr::point(point).buffer(LOCAL_BUFFER_M));
    }

    #[test]
    fn population_query_uses_pinned_year_and_wide_buffer() {
        let point = GeoPoint::new(1.0, 2.0);
        let query = population_query("WorldPop/GP/100m/pop", point, 2020).unwrap();
        let reduce = arg(&query.value, "dictionary");

        assert_eq!(arg(&query.value, "key"), &Expr::constant("population"));
        assert_eq!(arg(reduce, "scale"), &Expr::constant(100.0));
        assert_eq!(arg(reduce, "geometry"), &Expr::point(point).buffer(POPULATION_BUFFER_M));

        let expected = Expr::image_collection("WorldPop/GP/100m/pop")
            .filter_date(year_window(2020).unwrap())
            .filter_bounds(Expr::point(point))
            .size();
        assert_eq!(query.size, expected);
    }

    #[test]
    fn invalid_population_year_is_an_error() {
        assert!(population_query("WorldPop/GP/100m/pop", GeoPoint::new(0.0, 0.0), i32::MAX).is_err());
    }

    #[tokio::test]
    async fn configured_project_never_reads_key_file() {
        let config = EarthEngineConfig {
            project: Some("configured".into()),
            key_file: Some("/nonexistent/hazend.json".into()),
            ..Default::default()
        };
        let provider = EarthEngineProvider::new(config);

        assert_eq!(provider.project().await.unwrap(), "configured");
    }

    #[tokio::test]
    async fn project_from_key_file_is_read_once() {
        let path = std::env::temp_dir().join(format!("hazend-key-{}.json", std::process::id()));
        std::fs::write(&path, r#"{"client_email":"a","private_key":"b","project_id":"from-key"}"#)
            .unwrap();

        let config = EarthEngineConfig { key_file: Some(path.clone()), ..Default::default() };
        let provider = EarthEngineProvider::new(config);
        assert_eq!(provider.project().await.unwrap(), "from-key");

        std::fs::remove_file(&path).unwrap();
        assert_eq!(provider.project().await.unwrap(), "from-key");
    }

    #[test]
    fn key_without_project_id_needs_configured_project() {
        let key = auth::parse_key(r#"{"client_email":"a","private_key":"b"}"#).unwrap();
        let err = project_from_key(&key).unwrap_err();
        assert!(err.to_string().contains("HAZEND_EE_PROJECT"));
    }

    fn invoked_function(body: &Value) -> &str {
        body["expression"]["values"]["0"]["functionInvocationValue"]["functionName"]
            .as_str()
            .unwrap_or_default()
    }

    fn stub_provider(server: &TestServer) -> EarthEngineProvider {
        EarthEngineProvider::new(EarthEngineConfig {
            api_base: format!("{}/v1/", server.url),
            access_token: Some("test-token".into()),
            project: Some("test".into()),
            ..Default::default()
        })
    }

    fn value_reads<'a>(requests: &'a [Recorded], dataset: &str) -> Vec<&'a Recorded> {
        requests
            .iter()
            .filter(|r| invoked_function(&r.body) == "Dictionary.get")
            .filter(|r| r.body.to_string().contains(dataset))
            .collect()
    }

    /// Vegetation has no imagery, burn has some, fire detections are counted and the
    /// population raster covers nothing under the buffer.
    fn mixed_coverage(body: &Value) -> (StatusCode, String) {
        let text = body.to_string();
        let result = match invoked_function(body) {
            "Collection.size" if text.contains("S2_HARMONIZED") => json!(0),
            "Collection.size" if text.contains("FIRMS") => json!(7),
            "Collection.size" => json!(1),
            "Dictionary.get" if text.contains("BurnDate") => json!(215.5),
            "Dictionary.get" => Value::Null,
            other => panic!("unexpected function {other}"),
        };
        (StatusCode::OK, json!({ "result": result }).to_string())
    }

    #[tokio::test]
    async fn empty_collection_skips_value_query() {
        let server = TestServer::start(mixed_coverage).await;
        let provider = stub_provider(&server);

        let indicators =
            provider.fetch_indicators(GeoPoint::new(34.05, -118.25), window()).await.unwrap();

        assert_eq!(indicators.ndvi_mean, None);
        assert_eq!(indicators.burn_date_mean, Some(215.5));
        assert_eq!(indicators.fire_activity_count, Some(7));
        assert_eq!(indicators.population_density, None);

        let requests = server.requests();
        assert_eq!(requests.len(), 6);
        assert!(value_reads(&requests, "S2_HARMONIZED").is_empty());
        assert_eq!(value_reads(&requests, "MCD64A1").len(), 1);
        assert_eq!(value_reads(&requests, "WorldPop").len(), 1);
    }

    #[tokio::test]
    async fn compute_posts_to_project_with_bearer_token() {
        let server = TestServer::start(mixed_coverage).await;
        let provider = stub_provider(&server);

        provider.fetch_indicators(GeoPoint::new(1.0, 2.0), window()).await.unwrap();

        for request in server.requests() {
            assert_eq!(request.path, "/v1/projects/test/value:compute");
            assert_eq!(request.header("authorization"), Some("Bearer test-token"));
            assert_eq!(request.body["expression"]["result"], "0");
        }
    }

    #[tokio::test]
    async fn upstream_failure_aborts_the_lookup() {
        let server = TestServer::start(|_| {
            (StatusCode::SERVICE_UNAVAILABLE, r#"{"error":{"message":"backend down"}}"#.to_string())
        })
        .await;
        let provider = stub_provider(&server);

        let err = provider.fetch_indicators(GeoPoint::new(1.0, 2.0), window()).await.unwrap_err();
        let message = format!("{err:#}");

        assert!(message.contains("503"), "{message}");
        assert!(message.contains("backend down"), "{message}");
    }

    #[tokio::test]
    async fn non_integer_size_is_an_error() {
        let server =
            TestServer::start(|_| (StatusCode::OK, r#"{"result":"many"}"#.to_string())).await;
        let provider = stub_provider(&server);

        assert!(provider.fetch_indicators(GeoPoint::new(1.0, 2.0), window()).await.is_err());
    }
}
