use crate::config::AppConfig;
use crate::export::PROPERTIES_FILE;
use crate::resolve::Layers;
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    response::Json,
    routing::get,
    Router,
};
use geo::Point;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{info, warn};

pub struct AppState {
    pub layers: Layers,
}

#[derive(Deserialize)]
pub struct LocateParams {
    lat: f64,
    lon: f64,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct LocateResponse {
    subbarrio: Option<String>,
    barrio: Option<String>,
    county: Option<String>,
    classification_path: String,
}

pub fn router(state: Arc<AppState>, static_dir: &Path) -> Router {
    Router::new()
        .route("/api/locate", get(locate_handler))
        .fallback_service(ServeDir::new(static_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Whether `export` has written the property layer into `dir`.
pub fn map_dir_ready(dir: &Path) -> bool {
    dir.join(PROPERTIES_FILE).is_file()
}

pub async fn start_server(config: AppConfig, layers: Layers) -> Result<()> {
    let state = Arc::new(AppState { layers });

    if !map_dir_ready(&config.output.map_dir) {
        warn!(
            map_dir = ?config.output.map_dir,
            "map data not found; run `export` first. Only /api/locate will respond"
        );
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], config.server.port));
    let app = router(state, &config.output.map_dir);

    info!(%addr, map_dir = ?config.output.map_dir, "starting server");
    println!("Serving map on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn locate(layers: &Layers, params: &LocateParams) -> LocateResponse {
    let containment = layers.contain(&Point::new(params.lon, params.lat));
    LocateResponse {
        classification_path: containment.classification_path(),
        subbarrio: containment.subbarrio,
        barrio: containment.barrio,
        county: containment.county,
    }
}

async fn locate_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LocateParams>,
) -> Json<LocateResponse> {
    Json(locate(&state.layers, &params))
}
