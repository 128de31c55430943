use axum::{middleware, routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::request_id::{make_span_with_request_id, request_id_middleware};

use super::handlers;
use super::AppState;

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes());

    if state.config().enable_cors {
        router = router.layer(CorsLayer::permissive());
    }

    // Request ID is assigned before the trace span opens
    router
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        // Catalog
        .route("/movies/:id", get(handlers::get_movie))
        .route("/search", get(handlers::search_movies))
        // Recommendations
        .route("/movies/:id/similar", get(handlers::similar_movies))
        .route("/popular", get(handlers::popular_movies))
        .route("/similarity", get(handlers::similarity))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    use super::*;
    use crate::{
        config::Config,
        data::Dataset,
        middleware::request_id::REQUEST_ID_HEADER,
        models::{Movie, Rating},
        services::Recommender,
    };

    fn state(enable_cors: bool) -> AppState {
        let dataset = Dataset::from_parts(
            vec![Movie::new(1, "A", "Drama"), Movie::new(2, "B", "Drama")],
            vec![Rating::new(1, 1, 4.0), Rating::new(2, 2, 3.0)],
        )
        .unwrap();
        let recommender = Recommender::compute(&dataset, Default::default());

        let mut config = Config::for_dataset("unused", "unused");
        config.enable_cors = enable_cors;
        AppState::from_recommender(config, Arc::new(recommender))
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::ORIGIN, "http://localhost:8501")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_cors_headers_when_enabled() {
        let response = create_router(state(true))
            .oneshot(get_request("/health"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_no_cors_headers_when_disabled() {
        let response = create_router(state(false))
            .oneshot(get_request("/health"))
            .await
            .unwrap();

        assert!(!response
            .headers()
            .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = create_router(state(false))
            .oneshot(get_request("/api/v1/nope"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
