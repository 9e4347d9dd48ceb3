//! REST endpoints. Every response is wrapped in `{code, message, data}`.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use weathercast_core::{GateHours, WeatherError, WeatherFeed};

use crate::sessions::{self, SessionRegistry};

/// Shared state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub feed: WeatherFeed,
    pub gate: GateHours,
    pub sessions: Arc<SessionRegistry>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Envelope<T> {
    pub code: u16,
    pub message: String,
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: StatusCode::OK.as_u16(),
            message: "success".to_string(),
            data: Some(data),
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Map a core failure, prefixing internal errors with `context`.
    fn from_weather(context: &str, err: WeatherError) -> Self {
        match err.root() {
            WeatherError::UnknownLocation(_) => ApiError::BadRequest(err.root().to_string()),
            _ => {
                tracing::error!(error = %err, "{context}");
                ApiError::Internal(format!("{context}: {err}"))
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::BAD_REQUEST {
            tracing::warn!("rejected request: {self}");
        }
        Envelope::<()> {
            code: status.as_u16(),
            message: self.to_string(),
            data: None,
        }
        .into_response()
    }
}

type ApiResult<T> = Result<Envelope<T>, ApiError>;

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    pub location: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateTime {
    pub open_time: String,
    pub close_time: String,
}

/// GET /weathers/basic
async fn basic(State(state): State<AppState>) -> ApiResult<weathercast_core::CurrentWeather> {
    let current = state
        .feed
        .current()
        .await
        .map_err(|e| ApiError::from_weather("Failed to retrieve weather data", e))?;
    Ok(Envelope::success(current))
}

/// GET /weathers/forecast?location=NAME
async fn forecast(
    State(state): State<AppState>,
    Query(query): Query<ForecastQuery>,
) -> ApiResult<weathercast_core::ForecastBundle> {
    let location = query
        .location
        .filter(|l| !l.trim().is_empty())
        .ok_or_else(|| ApiError::BadRequest("location is required".to_string()))?;

    let bundle = state
        .feed
        .forecast(&location)
        .await
        .map_err(|e| ApiError::from_weather("Failed to retrieve forecast data", e))?;
    Ok(Envelope::success(bundle))
}

/// GET /weathers/location/{location}
async fn caption(
    State(state): State<AppState>,
    Path(location): Path<String>,
) -> ApiResult<Option<String>> {
    let caption = state
        .feed
        .caption(&location)
        .await
        .map_err(|e| ApiError::from_weather("Failed to retrieve weather information", e))?;
    Ok(Envelope::success(caption))
}

/// GET /weathers/gate
async fn gate(State(state): State<AppState>) -> Envelope<GateTime> {
    Envelope::success(GateTime {
        open_time: state.gate.open.clone(),
        close_time: state.gate.close.clone(),
    })
}

/// Create the HTTP router
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/weathers/basic", get(basic))
        .route("/weathers/forecast", get(forecast))
        .route("/weathers/location/{location}", get(caption))
        .route("/weathers/gate", get(gate))
        .route("/ws/{location}", get(sessions::ws_handler))
        .layer(cors)
        .with_state(state)
}
