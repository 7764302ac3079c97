// Scan trigger API

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use std::sync::Arc;

use crate::AppState;

/// Routes for /scan
pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(get_scan_status).post(start_scan))
}

#[derive(Debug, Serialize)]
pub struct ScanAccepted {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ScanStatus {
    pub scanning: bool,
}

/// POST /api/scan - Start a full media scan in the background
///
/// Responds before the scan finishes; results only show up in the logs.
async fn start_scan(State(state): State<Arc<AppState>>) -> (StatusCode, Json<ScanAccepted>) {
    tracing::info!("Media scan triggered via API");
    state.scanner.trigger();

    (
        StatusCode::ACCEPTED,
        Json(ScanAccepted {
            message: "Media scan initiated successfully. This process will run in the background."
                .to_string(),
        }),
    )
}

/// GET /api/scan - Whether a scan is currently running
async fn get_scan_status(State(state): State<Arc<AppState>>) -> Json<ScanStatus> {
    Json(ScanStatus {
        scanning: state.scanner.is_scanning(),
    })
}
