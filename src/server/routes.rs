//! HTTP routes
//!
//! The same routes are mounted under `/api/iot` and `/iot`.

use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::error::QueryError;
use crate::fanout::BinEvent;
use crate::ingest::GatewayState;
use crate::query::{AdminUpdate, BinService};
use crate::registry::{Bin, Registration};
use crate::stats::IngestStatsSnapshot;

use super::ws;

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub service: BinService,
    pub gateway: watch::Receiver<GatewayState>,
}

impl AppState {
    pub fn new(service: BinService, gateway: watch::Receiver<GatewayState>) -> Self {
        Self { service, gateway }
    }
}

/// Build the router
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/subscribe", get(subscribe))
        .route("/bins", get(list_bins).post(register_bin))
        .route("/bins/:id", put(update_bin))
        .route("/bins/:id/simulate", post(simulate_bin))
        .route("/stats", get(stats))
        .route("/ws", get(ws::handler));

    Router::new()
        .nest("/api/iot", api.clone())
        .nest("/iot", api)
        .with_state(state)
}

/// Error response
#[derive(Debug)]
pub enum ApiError {
    Query(QueryError),
    BadRequest(String),
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        ApiError::Query(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Query(e @ QueryError::NotFound(_)) => (StatusCode::NOT_FOUND, e.to_string()),
            ApiError::Query(e @ QueryError::NoDataYet) => (StatusCode::NOT_FOUND, e.to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

async fn subscribe(State(state): State<AppState>) -> Result<Json<BinEvent>, ApiError> {
    let bin = state.service.latest().await?;
    Ok(Json(BinEvent::from(&bin)))
}

async fn list_bins(State(state): State<AppState>) -> Json<Vec<Bin>> {
    Json(state.service.list_all().await)
}

/// Registration body: an identifier plus optional initial fields
#[derive(Debug, Deserialize)]
struct RegisterRequest {
    #[serde(default, alias = "binId")]
    id: Option<String>,

    #[serde(flatten)]
    registration: Registration,
}

async fn register_bin(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Bin>), ApiError> {
    let Json(req) = body?;
    let id = req
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("binId is required".into()))?;

    let bin = state.service.register_bin(id, &req.registration).await;
    Ok((StatusCode::CREATED, Json(bin)))
}

async fn update_bin(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<AdminUpdate>, JsonRejection>,
) -> Result<Json<Bin>, ApiError> {
    let Json(update) = body?;
    Ok(Json(state.service.update_fields(&id, &update).await?))
}

/// The body is optional; an empty one means a random step
async fn simulate_bin(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<Bin>, ApiError> {
    let update = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        let update: AdminUpdate = serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?;
        Some(update)
    };
    Ok(Json(state.service.simulate(&id, update.as_ref()).await?))
}

#[derive(Serialize)]
struct StatsResponse {
    gateway: &'static str,
    bins: usize,
    observers: usize,
    #[serde(flatten)]
    ingest: IngestStatsSnapshot,
}

async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let gateway = state.gateway.borrow().as_str();
    Json(StatsResponse {
        gateway,
        bins: state.service.registry().len().await,
        observers: state.service.hub().subscriber_count(),
        ingest: state.service.stats(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app() -> (Router, BinService) {
        let service = BinService::default();
        let (_tx, rx) = watch::channel(GatewayState::Simulating);
        (router(AppState::new(service.clone(), rx)), service)
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                builder = builder.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };

        let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn send_raw(app: Router, method: &str, uri: &str, body: &'static str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_subscribe_without_data() {
        let (app, _) = app();
        let (status, body) = send(app, "GET", "/api/iot/subscribe", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_subscribe_returns_latest_event() {
        let (app, service) = app();
        service.registry().seed_demo().await;

        let (status, body) = send(app, "GET", "/iot/subscribe", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["binId"], "Bin_003");
        assert_eq!(body["filledLevel"], 75);
        assert_eq!(body["filled_level"], 75);
    }

    #[tokio::test]
    async fn test_register_and_list() {
        let (app, _) = app();

        let (status, body) = send(
            app.clone(),
            "POST",
            "/api/iot/bins",
            Some(json!({"binId": "Bin_010", "height": 50})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["id"], "Bin_010");
        assert_eq!(body["height"], 50.0);

        let (status, body) = send(app, "GET", "/api/iot/bins", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_register_requires_id() {
        let (app, _) = app();
        let (status, body) =
            send(app, "POST", "/api/iot/bins", Some(json!({"height": 50}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "binId is required");
    }

    #[tokio::test]
    async fn test_update_missing_bin() {
        let (app, _) = app();
        let (status, body) = send(
            app,
            "PUT",
            "/api/iot/bins/missing-id",
            Some(json!({"filledLevel": 10})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("missing-id"));
    }

    #[tokio::test]
    async fn test_update_existing_bin() {
        let (app, service) = app();
        service.registry().seed_demo().await;

        let (status, body) = send(
            app,
            "PUT",
            "/api/iot/bins/Bin_001",
            Some(json!({"filledLevel": 90, "temperature": 31.5})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["filled_level"], 90);
        assert_eq!(body["temperature"], 31.5);
    }

    #[tokio::test]
    async fn test_simulate_with_and_without_body() {
        let (app, service) = app();
        service.registry().seed_demo().await;

        let (status, _) = send(app.clone(), "POST", "/api/iot/bins/Bin_002/simulate", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(service.stats().simulated_updates, 1);

        let (status, body) = send(
            app.clone(),
            "POST",
            "/api/iot/bins/Bin_002/simulate",
            Some(json!({"filled_level": 5})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["filled_level"], 5);

        let (status, _) = send(app, "POST", "/api/iot/bins/ghost/simulate", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_json_is_json_error() {
        let (app, service) = app();
        service.registry().seed_demo().await;

        for (method, uri) in [
            ("PUT", "/api/iot/bins/Bin_001"),
            ("POST", "/api/iot/bins/Bin_001/simulate"),
            ("POST", "/api/iot/bins"),
        ] {
            let (status, body) = send_raw(app.clone(), method, uri, "{\"filledLevel\": ").await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{method} {uri}");
            assert!(body["error"].is_string(), "{method} {uri}");
        }

        // Nothing was applied
        assert_eq!(service.stats().simulated_updates, 0);
        assert_eq!(service.get("Bin_001").await.unwrap().fill_percent, Some(10));
    }

    #[tokio::test]
    async fn test_update_wrong_field_type() {
        let (app, service) = app();
        service.registry().seed_demo().await;

        let (status, body) = send(
            app,
            "PUT",
            "/api/iot/bins/Bin_001",
            Some(json!({"temperature": "hot"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_simulate_whitespace_body_is_random_step() {
        let (app, service) = app();
        service.registry().seed_demo().await;

        let request = Request::builder()
            .method("POST")
            .uri("/api/iot/bins/Bin_001/simulate")
            .body(Body::from("  \n"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(service.stats().simulated_updates, 1);
    }

    #[tokio::test]
    async fn test_stats() {
        let (app, service) = app();
        service.registry().seed_demo().await;

        let (status, body) = send(app, "GET", "/api/iot/stats", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["gateway"], "simulating");
        assert_eq!(body["bins"], 3);
        assert_eq!(body["observers"], 0);
        assert_eq!(body["messages_received"], 0);
    }
}
