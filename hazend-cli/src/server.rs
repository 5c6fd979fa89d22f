use axum::{
    Json, Router,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use hazend_core::{QueryError, RawQuery, RiskReport, RiskService, TimeWindow};
use serde::Serialize;
use tower_http::cors::CorsLayer;

const HOME_PAGE: &str = include_str!("../static/home.html");
const ABOUT_PAGE: &str = include_str!("../static/about.html");

#[derive(Debug, Clone)]
pub struct AppState {
    service: RiskService,
}

pub fn create_router(service: RiskService) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/about", get(about))
        .route("/health", get(health))
        .route("/gee-data", get(gee_data))
        .layer(CorsLayer::permissive())
        .with_state(AppState { service })
}

pub async fn run(address: &str, service: RiskService) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(address).await?;

    log::info!("HazEnd listening on http://{}", listener.local_addr()?);
    log::info!("  GET /gee-data?lat=<lat>&lon=<lon>&temperature=..&start=YYYY-MM-DD&end=YYYY-MM-DD");

    axum::serve(listener, create_router(service)).await?;
    Ok(())
}

async fn home() -> Html<&'static str> {
    Html(HOME_PAGE)
}

async fn about() -> Html<&'static str> {
    Html(ABOUT_PAGE)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// Pairs are taken raw so a repeated parameter keeps its first value.
async fn gee_data(
    State(state): State<AppState>,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<RiskReport>, ApiError> {
    let Query(pairs) = query?;
    let request = RawQuery::from_pairs(pairs).into_request(TimeWindow::last_30_days())?;
    let report = state.service.assess(request).await?;
    Ok(Json(report))
}

#[derive(Serialize)]
struct ErrorMessage {
    code: u16,
    message: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(QueryError),
    Rejected(QueryRejection),
    Internal(anyhow::Error),
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::Rejected(rejection)
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::BadRequest(err)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, message) = match self {
            ApiError::BadRequest(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ApiError::Rejected(rejection) => (StatusCode::BAD_REQUEST, rejection.body_text()),
            ApiError::Internal(err) => {
                log::error!("Error: {err:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error.".to_string())
            }
        };

        (code, Json(ErrorMessage { code: code.as_u16(), message })).into_response()
    }
}
