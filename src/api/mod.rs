use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::AppState;

mod scan;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().nest("/scan", scan::routes()) // Fire-and-forget media scan
}

/// Full application router: health check at the root, API under /api
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health))
        .nest("/api", routes())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "message": "Stream-Flex server is running",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::scanner::{MediaRoots, ScanOrchestrator};
    use crate::store::memory::MemoryStore;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_state(roots: MediaRoots) -> (Arc<AppState>, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = Arc::new(AppState {
            scanner: Arc::new(ScanOrchestrator::new(store.clone(), roots)),
        });
        (state, store)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _) = test_state(AppConfig::default().media_roots());
        let response = router(state)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_post_scan_is_accepted_and_runs_in_background() {
        let dir = tempfile::tempdir().unwrap();
        let roots = MediaRoots {
            movies: dir.path().join("movies"),
            series: dir.path().join("series"),
            ads: dir.path().join("ads"),
        };
        std::fs::create_dir_all(roots.ads.join("promo")).unwrap();
        let (state, store) = test_state(roots);

        let response = router(Arc::clone(&state))
            .oneshot(Request::post("/api/scan").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(body_json(response).await["message"]
            .as_str()
            .unwrap()
            .contains("initiated"));

        for _ in 0..200 {
            if !state.scanner.is_scanning() && !store.keys(crate::models::Collection::Ads).is_empty()
            {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(store.keys(crate::models::Collection::Ads), vec!["promo"]);
    }

    #[tokio::test]
    async fn test_get_scan_status() {
        let (state, _) = test_state(AppConfig::default().media_roots());
        let response = router(state)
            .oneshot(Request::get("/api/scan").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["scanning"], false);
    }
}
