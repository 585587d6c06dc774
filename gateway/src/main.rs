mod api;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use std::sync::Arc;

// Internal imports
use crate::api::{DiagnoseRequest, DiagnoseResponse, ErrorResponse, CLEAR_BANNER, LOGGED_BANNER};
use agridoc_core::{
    Brain, Config, Language, OutbreakStat, OutbreakRegistry, PlantDoctor, RECENT_STATS_LIMIT,
};

// 1. Define Application State
// The doctor runs diagnosis cycles; the registry feeds the outbreak monitor.
#[derive(Clone)]
struct AppState {
    doctor: Arc<PlantDoctor>,
    registry: Arc<OutbreakRegistry>,
    default_language: Language,
}

#[tokio::main]
async fn main() -> Result<()> {
    // 2. Logging Setup
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .compact()
        .init();

    info!("AgriDoc Gateway Initializing...");
    let config = Config::from_env().context("System Init Failure")?;

    // 3. Initialize The Brain
    info!("Connecting to model endpoint...");
    let brain = Brain::new(&config);
    match brain.say_hello().await {
        Ok(msg) => info!("Brain Status: {}", msg),
        Err(e) => error!("Brain is online but unresponsive: {}", e),
    }

    // 4. Open The Outbreak Registry
    info!("Opening outbreak registry at {}", config.database_url);
    let registry = Arc::new(
        OutbreakRegistry::connect(&config.database_url)
            .await
            .context("Failed to open outbreak registry")?,
    );

    // 5. Bundle State
    let state = AppState {
        doctor: Arc::new(PlantDoctor::new(Arc::new(brain), registry.clone())),
        registry,
        default_language: config.default_language.clone(),
    };

    // 6. Start Server
    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    info!("Gateway listening on {}...", config.bind_addr);

    axum::serve(listener, app(state)).await?;
    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/diagnose", post(diagnose))
        .route("/outbreaks", get(recent_outbreaks))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// --- HANDLERS ---

async fn health_check() -> &'static str {
    "AgriDoc Gateway: Operational"
}

// The Diagnosis Handler
async fn diagnose(
    State(state): State<AppState>,
    Json(payload): Json<DiagnoseRequest>,
) -> Result<Json<DiagnoseResponse>, (StatusCode, Json<ErrorResponse>)> {
    let image = STANDARD
        .decode(payload.image_base64.trim())
        .map_err(|e| bad_request(format!("image_base64 is not valid base64: {}", e)))?;
    if image.is_empty() {
        return Err(bad_request("image is empty".to_string()));
    }

    let language = Language::parse_or(
        payload.language.as_deref().unwrap_or_default(),
        state.default_language.clone(),
    );
    info!("Agent is analyzing {} bytes in {}", image.len(), language);

    let result = state.doctor.diagnose(&image, &language).await;
    let status = if result.logged { LOGGED_BANNER } else { CLEAR_BANNER };

    Ok(Json(DiagnoseResponse {
        diagnosis: result.text,
        logged: result.logged,
        status: status.to_string(),
    }))
}

// The Outbreak Monitor feed
async fn recent_outbreaks(State(state): State<AppState>) -> Json<Vec<OutbreakStat>> {
    match state.registry.recent_stats(RECENT_STATS_LIMIT).await {
        Ok(stats) => Json(stats),
        Err(e) => {
            warn!("Outbreak monitor unavailable: {}", e);
            Json(Vec::new())
        }
    }
}

fn bad_request(message: String) -> (StatusCode, Json<ErrorResponse>) {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: message }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agridoc_core::{GenerateRequest, ModelEndpoint, ModelError, ResponsePart, LOG_OUTBREAK};
    use async_trait::async_trait;
    use axum::body::Body;
    use base64::Engine as _;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    // Calls the tool on the first turn, answers plainly on the second.
    struct ToolHappyModel;

    #[async_trait]
    impl ModelEndpoint for ToolHappyModel {
        async fn generate(&self, request: GenerateRequest) -> Result<Vec<ResponsePart>, ModelError> {
            if request.tools.is_empty() {
                return Ok(vec![ResponsePart::Text("Blight. Use neem, copper, pruning.".into())]);
            }
            Ok(vec![ResponsePart::ToolCall {
                name: LOG_OUTBREAK.into(),
                arguments: json!({
                    "plant": "Tomato", "disease": "Blight", "confidence": 85, "severity": "High"
                }),
            }])
        }
    }

    async fn test_app() -> Router {
        let registry = Arc::new(OutbreakRegistry::connect("sqlite::memory:").await.unwrap());
        app(AppState {
            doctor: Arc::new(PlantDoctor::new(Arc::new(ToolHappyModel), registry.clone())),
            registry,
            default_language: Language::English,
        })
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_diagnose(body: Value) -> Request<Body> {
        Request::post("/diagnose")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_operational() {
        let response = test_app()
            .await
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn diagnose_logs_and_feeds_the_monitor() {
        let app = test_app().await;
        let image = STANDARD.encode([0xFF, 0xD8, 0xFF, 0xE0]);

        let response = app
            .clone()
            .oneshot(post_diagnose(json!({ "image_base64": image, "language": "hindi" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["logged"], true);
        assert_eq!(body["status"], LOGGED_BANNER);
        assert_eq!(body["diagnosis"], "Blight. Use neem, copper, pruning.");

        let response = app
            .oneshot(Request::get("/outbreaks").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let stats = body_json(response).await;
        assert_eq!(stats.as_array().unwrap().len(), 1);
        assert_eq!(stats[0]["plant"], "Tomato");
    }

    #[tokio::test]
    async fn invalid_image_is_rejected() {
        let app = test_app().await;

        let response = app
            .clone()
            .oneshot(post_diagnose(json!({ "image_base64": "!!not base64!!" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(post_diagnose(json!({ "image_base64": "" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "image is empty");
    }
}
