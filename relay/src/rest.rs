use crate::metrics::{
    INVALID_REQUESTS_TOTAL, LATEST_HITS_TOTAL, LATEST_MISSES_TOTAL, READINGS_SAVED_TOTAL,
};
use crate::model::{ErrorResponse, LatestReading, MessageResponse, SensorReading};
use crate::store::ReadingStore;
use crate::validate::{validate_device_param, validate_save, Rejection, MISSING_DEVICE_PARAM};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

const SAVED: &str = "Data saved successfully.";
const MALFORMED_BODY: &str = "Request body must be a JSON object.";
const NO_DATA: &str = "No data found for this device.";
const SAVE_FAILED: &str = "Failed to save data to database.";
const FETCH_FAILED: &str = "Failed to retrieve data from database.";

#[derive(Clone)]
struct AppState {
    store: Arc<dyn ReadingStore>,
}

#[derive(Debug, Deserialize)]
pub struct LatestQuery {
    device: Option<String>,
}

pub fn create_router(store: Arc<dyn ReadingStore>) -> Router {
    let state = AppState { store };

    Router::new()
        .route("/api/v1/data/save", post(save_reading))
        .route("/api/v1/data/latest", get(latest_reading))
        .with_state(state)
}

async fn save_reading(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let Json(body) = payload.map_err(|e| {
        warn!("[SAVE] Unreadable request body: {}", e);
        INVALID_REQUESTS_TOTAL.inc();
        ApiError::BadRequest(MALFORMED_BODY)
    })?;

    let request = validate_save(&body).map_err(|e| rejected("SAVE", e))?;
    let reading = SensorReading::new(request.device_id, request.temperature);

    match state.store.insert(&reading).await {
        Ok(_) => {
            READINGS_SAVED_TOTAL.inc();
            info!(
                "[SAVE] Data received and stored: {} @ {}°C",
                reading.device_id, reading.temperature
            );
            Ok((StatusCode::CREATED, Json(MessageResponse { message: SAVED })))
        }
        Err(e) => {
            error!("[SAVE] Database write error: {}", e);
            Err(ApiError::Internal(SAVE_FAILED))
        }
    }
}

async fn latest_reading(
    State(state): State<AppState>,
    params: Result<Query<LatestQuery>, QueryRejection>,
) -> Result<Json<LatestReading>, ApiError> {
    let Query(params) = params.map_err(|e| {
        warn!("[FETCH] Unreadable query string: {}", e);
        INVALID_REQUESTS_TOTAL.inc();
        ApiError::BadRequest(MISSING_DEVICE_PARAM)
    })?;
    let device_id = validate_device_param(params.device.as_deref()).map_err(|e| rejected("FETCH", e))?;

    match state.store.find_latest(device_id).await {
        Ok(Some(reading)) => {
            LATEST_HITS_TOTAL.inc();
            info!("[FETCH] Sent latest reading for {}", device_id);
            Ok(Json(LatestReading::from(reading)))
        }
        Ok(None) => {
            LATEST_MISSES_TOTAL.inc();
            info!("[FETCH] No data found for {}", device_id);
            Err(ApiError::NotFound(NO_DATA))
        }
        Err(e) => {
            error!("[FETCH] Database read error: {}", e);
            Err(ApiError::Internal(FETCH_FAILED))
        }
    }
}

fn rejected(route: &str, reason: Rejection) -> ApiError {
    INVALID_REQUESTS_TOTAL.inc();
    warn!("[{}] Rejected request: {}", route, reason);
    ApiError::BadRequest(reason)
}

/// Failure outcomes of the API, always rendered as `{"error": ...}`.
/// Internal variants carry only a caller-safe message; causes go to the log.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    NotFound(&'static str),
    Internal(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        let body = ErrorResponse {
            error: error.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{FailingStore, MemoryStore};
    use crate::validate::INVALID_READING;
    use chrono::{Duration, Utc};
    use serde_json::json;

    fn state_with(store: Arc<dyn ReadingStore>) -> AppState {
        AppState { store }
    }

    async fn body_json(resp: Response) -> Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn save(state: &AppState, body: Value) -> Response {
        save_reading(State(state.clone()), Ok(Json(body)))
            .await
            .into_response()
    }

    async fn latest(state: &AppState, device: Option<&str>) -> Response {
        let query = LatestQuery {
            device: device.map(str::to_string),
        };
        latest_reading(State(state.clone()), Ok(Query(query)))
            .await
            .into_response()
    }

    #[test]
    fn test_save_then_latest() {
        tokio_test::block_on(async {
            let state = state_with(Arc::new(MemoryStore::default()));

            let resp = save(&state, json!({"device_id": "ESP32_001", "temperature": 26.5})).await;
            assert_eq!(resp.status(), StatusCode::CREATED);
            assert_eq!(body_json(resp).await, json!({"message": SAVED}));

            let resp = latest(&state, Some("ESP32_001")).await;
            assert_eq!(resp.status(), StatusCode::OK);
            let body = body_json(resp).await;
            assert_eq!(body["temperature"], json!(26.5));
            assert!(body["timestamp"].is_string());
            assert!(body.get("device_id").is_none());
        });
    }

    #[test]
    fn test_save_rejects_string_temperature_without_writing() {
        tokio_test::block_on(async {
            let store = Arc::new(MemoryStore::default());
            let state = state_with(store.clone());

            let resp = save(&state, json!({"device_id": "ESP32_001", "temperature": "26.5"})).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(resp).await, json!({"error": INVALID_READING}));
            assert_eq!(store.count(), 0);
        });
    }

    #[test]
    fn test_save_rejects_missing_or_empty_device_id() {
        tokio_test::block_on(async {
            let store = Arc::new(MemoryStore::default());
            let state = state_with(store.clone());

            let resp = save(&state, json!({"temperature": 26.5})).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

            let resp = save(&state, json!({"device_id": "", "temperature": 26.5})).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

            assert_eq!(store.count(), 0);
        });
    }

    #[test]
    fn test_latest_requires_device_param() {
        tokio_test::block_on(async {
            // A failing store proves the handler never reached storage
            let state = state_with(Arc::new(FailingStore));

            let resp = latest(&state, None).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(resp).await, json!({"error": MISSING_DEVICE_PARAM}));

            let resp = latest(&state, Some("")).await;
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        });
    }

    #[test]
    fn test_rejections_render_reason_as_error_body() {
        tokio_test::block_on(async {
            let resp = ApiError::BadRequest(INVALID_READING).into_response();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(resp).await, json!({"error": INVALID_READING}));

            let resp = rejected("SAVE", MISSING_DEVICE_PARAM).into_response();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(resp).await, json!({"error": MISSING_DEVICE_PARAM}));
        });
    }

    #[test]
    fn test_latest_unknown_device() {
        tokio_test::block_on(async {
            let state = state_with(Arc::new(MemoryStore::default()));

            let resp = latest(&state, Some("UNKNOWN_DEVICE")).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND);
            assert_eq!(body_json(resp).await, json!({"error": "No data found for this device."}));
        });
    }

    #[test]
    fn test_latest_returns_newest_reading() {
        tokio_test::block_on(async {
            let store = Arc::new(MemoryStore::default());
            let t1 = Utc::now() - Duration::minutes(10);
            let t2 = t1 + Duration::minutes(5);
            store.insert(&SensorReading::at("dev-1", 21.0, t2)).await.unwrap();
            store.insert(&SensorReading::at("dev-1", 19.5, t1)).await.unwrap();

            let resp = latest(&state_with(store), Some("dev-1")).await;
            assert_eq!(resp.status(), StatusCode::OK);
            assert_eq!(body_json(resp).await["temperature"], json!(21.0));
        });
    }

    #[test]
    fn test_storage_failures_are_generic() {
        tokio_test::block_on(async {
            let state = state_with(Arc::new(FailingStore));

            let resp = save(&state, json!({"device_id": "dev-1", "temperature": 20.0})).await;
            assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body_json(resp).await, json!({"error": SAVE_FAILED}));

            let resp = latest(&state, Some("dev-1")).await;
            assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body_json(resp).await, json!({"error": FETCH_FAILED}));
        });
    }

    /// Serves the router on an ephemeral port and returns its base URL.
    async fn spawn_server(store: Arc<dyn ReadingStore>) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(store)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_http_round_trip() {
        let base = spawn_server(Arc::new(MemoryStore::default())).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/api/v1/data/save", base))
            .json(&json!({"device_id": "ESP32_001", "temperature": 26.5}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::CREATED);

        let resp = client
            .get(format!("{}/api/v1/data/latest?device=ESP32_001", base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(
            resp.headers()["content-type"].to_str().unwrap(),
            "application/json"
        );
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["temperature"], json!(26.5));

        let ts = chrono::DateTime::parse_from_rfc3339(body["timestamp"].as_str().unwrap()).unwrap();
        assert!(Utc::now() - ts.with_timezone(&Utc) < Duration::minutes(1));
    }

    #[tokio::test]
    async fn test_http_malformed_requests() {
        let store = Arc::new(MemoryStore::default());
        let base = spawn_server(store.clone()).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(format!("{}/api/v1/data/save", base))
            .header("content-type", "application/json")
            .body("{\"device_id\": \"ESP32_001\", ")
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({"error": MALFORMED_BODY}));

        let resp = client
            .get(format!("{}/api/v1/data/latest", base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body, json!({"error": MISSING_DEVICE_PARAM}));

        assert_eq!(store.count(), 0);
    }
}
