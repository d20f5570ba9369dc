use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::ws;

/// Static body of the readiness probe
pub const READY_BODY: &str = "estamos listos compas";

/// GET /ready
pub async fn ready() -> &'static str {
    READY_BODY
}

/// Build the router with the readiness probe and the chat endpoint.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ready", get(ready))
        .route("/ws/chat", get(ws::ws_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_ready_returns_static_body() {
        let app = build_router(Arc::new(AppState::default()));

        let response = app
            .oneshot(Request::builder().uri("/ready").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], READY_BODY.as_bytes());
    }

    #[tokio::test]
    async fn test_chat_route_requires_upgrade() {
        let app = build_router(Arc::new(AppState::default()));

        let response = app
            .oneshot(Request::builder().uri("/ws/chat").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let app = build_router(Arc::new(AppState::default()));

        let response = app
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
