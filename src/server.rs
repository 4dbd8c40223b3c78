// 🌐 DiVE Web Server - REST API with Axum
// Serves the viewer UI, the upload/session API, the image proxy and the
// merge route. One shared session behind a mutex; views recompute on demand.

use crate::graph::{DieRef, EdgeMode};
use crate::images::{ImageMerger, MAX_IMAGE_BYTES};
use crate::session::{ColumnMapping, ConfirmChoice, Session, View};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

// ============================================================================
// CONFIG & STATE
// ============================================================================

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub assets_dir: PathBuf,
    pub row_limit: usize,
    /// None = any host may be proxied
    pub allowed_image_hosts: Option<Vec<String>>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8050,
            assets_dir: PathBuf::from("assets"),
            row_limit: crate::ingest::DEFAULT_ROW_LIMIT,
            allowed_image_hosts: None,
        }
    }
}

/// Shared application state
#[derive(Clone)]
struct AppState {
    session: Arc<Mutex<Session>>,
    merger: Arc<ImageMerger>,
    http: reqwest::Client,
    allowed_hosts: Option<Arc<Vec<String>>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

fn api_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ApiResponse {
            success: false,
            data: (),
            error: Some(message.into()),
        }),
    )
        .into_response()
}

// ============================================================================
// REQUEST BODIES
// ============================================================================

#[derive(Deserialize)]
struct ConfirmRequest {
    accept: ConfirmChoice,
}

#[derive(Deserialize)]
struct EdgeModeRequest {
    mode: EdgeMode,
}

#[derive(Deserialize)]
struct FiltersRequest {
    #[serde(default)]
    filters: std::collections::BTreeMap<String, Vec<String>>,
}

#[derive(Deserialize)]
struct ColorSelectionRequest {
    color: String,
    #[serde(default)]
    conditions: Vec<String>,
}

#[derive(Deserialize)]
struct AddColorRequest {
    color: String,
}

#[derive(Deserialize)]
struct ScaleEdgesRequest {
    enabled: bool,
}

#[derive(Deserialize)]
struct LayoutRequest {
    view: View,
    layout: String,
}

#[derive(Deserialize)]
struct SelectionRequest {
    view: View,
    #[serde(default)]
    coins: Vec<String>,
    #[serde(default)]
    dies: Vec<DieRef>,
}

#[derive(Deserialize)]
struct ProxyParams {
    url: Option<String>,
}

#[derive(Deserialize)]
struct MergeParams {
    front: Option<String>,
    back: Option<String>,
    w: Option<u32>,
    h: Option<u32>,
}

// ============================================================================
// UI & API HANDLERS
// ============================================================================

/// GET / - Serve the viewer UI
async fn serve_index() -> impl IntoResponse {
    Html(include_str!("../web/index.html"))
}

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/upload - Raw CSV body; oversized lists require confirmation
async fn upload_csv(State(state): State<AppState>, body: Bytes) -> Response {
    if body.is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "empty upload");
    }
    let mut session = state.session.lock().unwrap();
    match session.upload(body.to_vec()) {
        Ok(outcome) => {
            info!(?outcome, "CSV upload processed");
            Json(ApiResponse::ok(outcome)).into_response()
        }
        Err(e) => {
            warn!("rejected CSV upload: {}", e);
            api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
    }
}

/// POST /api/upload/confirm - Resolve a pending oversized upload
async fn confirm_upload(
    State(state): State<AppState>,
    Json(request): Json<ConfirmRequest>,
) -> Response {
    let mut session = state.session.lock().unwrap();
    match session.confirm_upload(request.accept) {
        Ok(Some(outcome)) => Json(ApiResponse::ok(outcome)).into_response(),
        Ok(None) => api_error(StatusCode::CONFLICT, "no upload awaiting confirmation"),
        Err(e) => {
            warn!("pending CSV failed to ingest: {}", e);
            api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
        }
    }
}

/// POST /api/mapping - Set the four column names
async fn set_mapping(
    State(state): State<AppState>,
    Json(mapping): Json<ColumnMapping>,
) -> impl IntoResponse {
    let mut session = state.session.lock().unwrap();
    session.mapping = mapping;
    Json(ApiResponse::ok("mapping updated"))
}

/// POST /api/edge-mode - Switch the coin-view edge condition
async fn set_edge_mode(
    State(state): State<AppState>,
    Json(request): Json<EdgeModeRequest>,
) -> impl IntoResponse {
    let mut session = state.session.lock().unwrap();
    session.edge_mode = request.mode;
    Json(ApiResponse::ok(request.mode.name()))
}

/// POST /api/scale-edges - Toggle die-view edge width scaling by weight
async fn set_scale_edges(
    State(state): State<AppState>,
    Json(request): Json<ScaleEdgesRequest>,
) -> impl IntoResponse {
    let mut session = state.session.lock().unwrap();
    session.scale_edge_weight = request.enabled;
    Json(ApiResponse::ok(request.enabled))
}

/// POST /api/filters - Replace the attribute filters
async fn set_filters(
    State(state): State<AppState>,
    Json(request): Json<FiltersRequest>,
) -> impl IntoResponse {
    let mut session = state.session.lock().unwrap();
    session.filters = request
        .filters
        .into_iter()
        .filter(|(_, values)| !values.is_empty())
        .collect();
    Json(ApiResponse::ok("filters updated"))
}

/// POST /api/colors - Set (or clear) the conditions for one color
async fn set_color_selection(
    State(state): State<AppState>,
    Json(request): Json<ColorSelectionRequest>,
) -> impl IntoResponse {
    let mut session = state.session.lock().unwrap();
    if request.conditions.is_empty() {
        session.color_selections.remove(&request.color);
    } else {
        session
            .color_selections
            .insert(request.color, request.conditions);
    }
    Json(ApiResponse::ok("colors updated"))
}

/// POST /api/colors/add - Register a custom color name
async fn add_custom_color(
    State(state): State<AppState>,
    Json(request): Json<AddColorRequest>,
) -> Response {
    if request.color.trim().is_empty() {
        return api_error(StatusCode::BAD_REQUEST, "empty color name");
    }
    let mut session = state.session.lock().unwrap();
    if !session.custom_colors.contains(&request.color) {
        session.custom_colors.push(request.color);
    }
    Json(ApiResponse::ok(session.custom_colors.clone())).into_response()
}

/// POST /api/layout - Remember the layout choice for a view
async fn set_layout(
    State(state): State<AppState>,
    Json(request): Json<LayoutRequest>,
) -> impl IntoResponse {
    let mut session = state.session.lock().unwrap();
    session
        .layout_choices
        .insert(request.view.name().to_string(), request.layout);
    Json(ApiResponse::ok("layout updated"))
}

/// POST /api/hidden/hide - Hide the current selection
async fn hide_selection(
    State(state): State<AppState>,
    Json(request): Json<SelectionRequest>,
) -> impl IntoResponse {
    let mut session = state.session.lock().unwrap();
    session.hide_selection(request.view, request.coins, request.dies);
    Json(ApiResponse::ok(session.hidden.clone()))
}

/// POST /api/hidden/show-only - Hide everything except the selection
async fn show_only_selection(
    State(state): State<AppState>,
    Json(request): Json<SelectionRequest>,
) -> impl IntoResponse {
    let mut session = state.session.lock().unwrap();
    session.show_only_selection(request.view, request.coins, request.dies);
    Json(ApiResponse::ok(session.hidden.clone()))
}

/// POST /api/hidden/reset - Clear selection-based hiding
async fn reset_hidden(State(state): State<AppState>) -> impl IntoResponse {
    let mut session = state.session.lock().unwrap();
    session.reset_hidden();
    Json(ApiResponse::ok(session.hidden.clone()))
}

/// GET /api/view/:view - Recompute and return one view
async fn get_view(State(state): State<AppState>, Path(view): Path<String>) -> Response {
    let view = match view.as_str() {
        "coins" => View::Coins,
        "dies" => View::Dies,
        other => return api_error(StatusCode::NOT_FOUND, format!("unknown view: {}", other)),
    };
    let session = state.session.lock().unwrap();
    match session.compute_view(view) {
        Some(payload) => Json(ApiResponse::ok(payload)).into_response(),
        None => api_error(StatusCode::CONFLICT, "no CSV ingested yet"),
    }
}

/// GET /api/options - Filter and color dropdown contents
async fn get_options(State(state): State<AppState>) -> Response {
    let session = state.session.lock().unwrap();
    match session.options() {
        Some(options) => Json(ApiResponse::ok(options)).into_response(),
        None => api_error(StatusCode::CONFLICT, "no CSV ingested yet"),
    }
}

// ============================================================================
// IMAGE ROUTES
// ============================================================================

const IMAGE_CACHE_CONTROL: &str = "public, max-age=86400";

/// GET /img_proxy?url=… - Fetch a remote image for the client, working
/// around CORS. Only http(s), optional host allowlist, 8 MiB cap.
async fn img_proxy(State(state): State<AppState>, Query(params): Query<ProxyParams>) -> Response {
    let Some(url) = params.url.filter(|u| !u.is_empty()) else {
        return (StatusCode::BAD_REQUEST, "missing url").into_response();
    };

    let parsed = match reqwest::Url::parse(&url) {
        Ok(parsed) => parsed,
        Err(_) => return (StatusCode::BAD_REQUEST, "invalid url").into_response(),
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return (StatusCode::BAD_REQUEST, "invalid scheme").into_response();
    }
    if let Some(allowed) = &state.allowed_hosts {
        let host = parsed.host_str().unwrap_or("").to_lowercase();
        if !allowed.iter().any(|h| h.eq_ignore_ascii_case(&host)) {
            return (StatusCode::FORBIDDEN, "host not allowed").into_response();
        }
    }

    let mut response = match state.http.get(url.clone()).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!("image fetch failed for {}: {}", url, e);
            return (StatusCode::BAD_GATEWAY, format!("fetch error: {}", e)).into_response();
        }
    };

    if response.status() != reqwest::StatusCode::OK {
        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        return status.into_response();
    }

    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();
    if !content_type.starts_with("image/") {
        return (StatusCode::UNSUPPORTED_MEDIA_TYPE, "unsupported media type").into_response();
    }

    // Read in chunks so an oversized image is cut off early
    let mut data: Vec<u8> = Vec::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                if data.len() + chunk.len() > MAX_IMAGE_BYTES {
                    return (StatusCode::PAYLOAD_TOO_LARGE, "image too large").into_response();
                }
                data.extend_from_slice(&chunk);
            }
            Ok(None) => break,
            Err(e) => {
                warn!("image body read failed for {}: {}", url, e);
                return (StatusCode::BAD_GATEWAY, format!("fetch error: {}", e)).into_response();
            }
        }
    }

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, IMAGE_CACHE_CONTROL.to_string()),
        ],
        data,
    )
        .into_response()
}

/// GET /merge_split?front=…&back=…&w=…&h=… - Side-by-side merge of a coin's
/// front and back images, returned as PNG.
async fn merge_split(State(state): State<AppState>, Query(params): Query<MergeParams>) -> Response {
    let (Some(front), Some(back)) = (
        params.front.filter(|s| !s.is_empty()),
        params.back.filter(|s| !s.is_empty()),
    ) else {
        return (StatusCode::BAD_REQUEST, "missing front/back").into_response();
    };
    let w = params.w.unwrap_or(200);
    let h = params.h.unwrap_or(200);

    match state.merger.merge_side_by_side(&front, &back, w, h).await {
        Ok(png) => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "image/png".to_string()),
                (header::CACHE_CONTROL, IMAGE_CACHE_CONTROL.to_string()),
            ],
            png,
        )
            .into_response(),
        Err(e) => {
            error!("merge failed ({} + {}): {}", front, back, e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("merge error: {}", e)).into_response()
        }
    }
}

// ============================================================================
// ROUTER & STARTUP
// ============================================================================

fn build_router(state: AppState, assets_dir: &std::path::Path) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/upload", post(upload_csv))
        .route("/upload/confirm", post(confirm_upload))
        .route("/mapping", post(set_mapping))
        .route("/edge-mode", post(set_edge_mode))
        .route("/scale-edges", post(set_scale_edges))
        .route("/filters", post(set_filters))
        .route("/colors", post(set_color_selection))
        .route("/colors/add", post(add_custom_color))
        .route("/layout", post(set_layout))
        .route("/hidden/hide", post(hide_selection))
        .route("/hidden/show-only", post(show_only_selection))
        .route("/hidden/reset", post(reset_hidden))
        .route("/view/:view", get(get_view))
        .route("/options", get(get_options));

    Router::new()
        .route("/", get(serve_index))
        .nest("/api", api_routes)
        .route("/img_proxy", get(img_proxy))
        .route("/merge_split", get(merge_split))
        .nest_service("/assets", ServeDir::new(assets_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Run the DiVE server until shutdown.
pub async fn run(config: ServerConfig) -> anyhow::Result<()> {
    let http = reqwest::Client::builder()
        .connect_timeout(crate::images::CONNECT_TIMEOUT)
        .timeout(crate::images::READ_TIMEOUT)
        .build()?;

    let state = AppState {
        session: Arc::new(Mutex::new(Session::new(config.row_limit))),
        merger: Arc::new(ImageMerger::new(&config.assets_dir)?),
        http,
        allowed_hosts: config.allowed_image_hosts.clone().map(Arc::new),
    };

    let app = build_router(state, &config.assets_dir);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("DiVE running on http://{}", addr);
    info!("  UI:  http://{}/", addr);
    info!("  API: http://{}/api/health", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
