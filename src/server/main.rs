//! HTTP server for telemetry ingestion, route generation and guidance.
//!
//! A thin transport over [`senda::pipeline::Pipeline`] plus the speech, translation and
//! directions collaborators.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use senda::config::Config;
use senda::directions::{DirectionsClient, DirectionsRequest};
use senda::error::PipelineError;
use senda::models::ZoneType;
use senda::pipeline::Pipeline;
use senda::speech::SpeechClient;
use senda::store::FsBlobStore;
use senda::translate::TranslatorClient;

#[derive(Parser, Debug)]
#[command(name = "server")]
#[command(about = "Telemetry route and guidance server")]
struct Args {
    /// Listen address
    #[arg(short, long, default_value = "0.0.0.0:3000")]
    listen: String,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Blob storage root (overrides the config file)
    #[arg(long)]
    storage_root: Option<PathBuf>,
}

/// Application state shared across handlers
struct AppState {
    pipeline: Pipeline,
    speech: Option<SpeechClient>,
    translator: Option<TranslatorClient>,
    directions: Option<DirectionsClient>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();

    let mut config = Config::load_or_default(args.config.as_deref())?;
    if let Some(root) = args.storage_root {
        config.storage.root = root;
    }

    info!("Senda Server");
    let store = Arc::new(FsBlobStore::new(&config.storage.root));
    info!("Blob storage at {}", store.root().display());

    let speech = env_key("SPEECH_KEY").map(|key| SpeechClient::new(config.speech.clone(), key));
    let translator = env_key("TRANSLATOR_KEY")
        .map(|key| TranslatorClient::new(config.translator.clone(), key));
    let directions =
        env_key("MAPS_KEY").map(|key| DirectionsClient::new(config.directions.clone(), key));

    let state = Arc::new(AppState {
        pipeline: Pipeline::new(store, config),
        speech,
        translator,
        directions,
    });

    // Build router
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/v1/telemetry", post(telemetry_handler))
        .route("/v1/devices/{device_id}/batches", get(list_batches_handler))
        .route("/v1/route", get(route_handler).post(route_handler))
        .route("/v1/guide", post(guide_handler))
        .route("/v1/geojson", get(download_handler).post(upload_handler))
        .route("/v1/tts", post(tts_handler))
        .route("/v1/translate", post(translate_handler))
        .route(
            "/v1/directions",
            get(directions_example_handler).post(directions_handler),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!("Starting server on {}", args.listen);

    let listener = tokio::net::TcpListener::bind(&args.listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn env_key(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(key) if !key.is_empty() => Some(key),
        _ => {
            warn!("{} not set, the matching endpoint is disabled", name);
            None
        }
    }
}

/// Map a pipeline failure to a status code and message
fn error_response(e: anyhow::Error) -> (StatusCode, String) {
    let status = match e.downcast_ref::<PipelineError>() {
        Some(PipelineError::Validation(_)) | Some(PipelineError::InsufficientData { .. }) => {
            StatusCode::BAD_REQUEST
        }
        Some(PipelineError::NotFound { .. }) => StatusCode::NOT_FOUND,
        None => {
            error!("Request failed: {:#}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}

fn disabled(service: &str) -> (StatusCode, String) {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        format!("{} is not configured", service),
    )
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    speech: bool,
    translator: bool,
    directions: bool,
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        speech: state.speech.is_some(),
        translator: state.translator.is_some(),
        directions: state.directions.is_some(),
    })
}

#[derive(Serialize)]
struct BatchResponse {
    name: String,
    kept: usize,
    dropped: usize,
}

/// Store a raw telemetry batch as a point collection
async fn telemetry_handler(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<BatchResponse>, (StatusCode, String)> {
    let saved = state
        .pipeline
        .save_batch(&body, Utc::now())
        .map_err(error_response)?;

    Ok(Json(BatchResponse {
        name: saved.name,
        kept: saved.kept,
        dropped: saved.dropped,
    }))
}

async fn list_batches_handler(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> Result<Json<Vec<String>>, (StatusCode, String)> {
    state
        .pipeline
        .list_batches(&device_id)
        .map(Json)
        .map_err(error_response)
}

#[derive(Deserialize)]
struct RouteQueryParams {
    /// Source blob in the telemetry container
    archivo: Option<String>,
}

#[derive(Serialize)]
struct RouteResponse {
    name: String,
}

/// Build a route from a stored point collection
async fn route_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RouteQueryParams>,
) -> Result<Json<RouteResponse>, (StatusCode, String)> {
    let source = params.archivo.unwrap_or_default();
    let name = state
        .pipeline
        .generate_route(&source)
        .map_err(error_response)?;

    Ok(Json(RouteResponse { name }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GuideRequest {
    latitude: Option<f64>,
    longitude: Option<f64>,
    blob_name: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GuideResponse {
    texto: String,
    zone: Option<ZoneType>,
    zone_type: Option<String>,
    /// Absent when the collection holds no points
    distance_km: Option<f64>,
}

/// Guidance text for a live position
async fn guide_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GuideRequest>,
) -> Result<Json<GuideResponse>, (StatusCode, String)> {
    let (Some(lat), Some(lon), Some(blob_name)) =
        (request.latitude, request.longitude, request.blob_name)
    else {
        return Err((
            StatusCode::BAD_REQUEST,
            "latitude, longitude and blobName are required".to_string(),
        ));
    };

    let result = state
        .pipeline
        .navigate(&blob_name, lat, lon)
        .map_err(error_response)?;

    Ok(Json(GuideResponse {
        texto: result.text,
        zone: result.zone,
        zone_type: result.zone_tag,
        distance_km: Some(result.distance_km).filter(|d| d.is_finite()),
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadQueryParams {
    blob_name: Option<String>,
}

/// Stored GeoJSON, returned as-is
async fn download_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DownloadQueryParams>,
) -> Result<Response, (StatusCode, String)> {
    let blob_name = params.blob_name.unwrap_or_default();
    let body = state.pipeline.fetch(&blob_name).map_err(error_response)?;

    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadRequest {
    file_name: Option<String>,
    geojson: Option<serde_json::Value>,
}

/// Store a client-built collection in the custom route container
async fn upload_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<UploadRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    let (Some(file_name), Some(geojson)) = (request.file_name, request.geojson) else {
        return Err((
            StatusCode::BAD_REQUEST,
            "fileName and geojson are required".to_string(),
        ));
    };

    let body = serde_json::to_vec(&geojson).map_err(|e| error_response(e.into()))?;
    state
        .pipeline
        .upload_geojson(&file_name, &body)
        .map_err(error_response)?;

    Ok(StatusCode::CREATED)
}

#[derive(Deserialize)]
struct TtsRequest {
    texto: Option<String>,
}

/// Speak a piece of guidance text
async fn tts_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TtsRequest>,
) -> Result<Response, (StatusCode, String)> {
    let speech = state.speech.as_ref().ok_or_else(|| disabled("speech"))?;
    let audio = speech
        .synthesize(request.texto.as_deref().unwrap_or_default())
        .await
        .map_err(error_response)?;

    Ok(([(header::CONTENT_TYPE, "audio/mpeg")], audio).into_response())
}

#[derive(Deserialize)]
struct TranslateRequest {
    text: Option<String>,
}

#[derive(Serialize)]
struct TranslateResponse {
    text: String,
}

async fn translate_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TranslateRequest>,
) -> Result<Json<TranslateResponse>, (StatusCode, String)> {
    let translator = state
        .translator
        .as_ref()
        .ok_or_else(|| disabled("translator"))?;
    let text = translator
        .translate(request.text.as_deref().unwrap_or_default())
        .await
        .map_err(error_response)?;

    Ok(Json(TranslateResponse { text }))
}

async fn directions_example_handler() -> Json<DirectionsRequest> {
    Json(DirectionsRequest::example())
}

/// Forward a directions request to the routing service
async fn directions_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DirectionsRequest>,
) -> Result<Response, (StatusCode, String)> {
    let directions = state
        .directions
        .as_ref()
        .ok_or_else(|| disabled("directions"))?;
    let reply = directions.route(&request).await.map_err(error_response)?;

    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
    Ok((
        status,
        [(header::CONTENT_TYPE, "application/json")],
        reply.body,
    )
        .into_response())
}
