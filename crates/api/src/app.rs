use axum::{
    middleware,
    routing::{get, put},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowOrigin, Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{constraints, distributions, flags, health, segments, variants};
use crate::services::ConfigService;

#[derive(Clone)]
pub struct AppState {
    pub service: ConfigService,
    pub config: Arc<Config>,
}

pub fn create_app(config: Config, service: ConfigService) -> Router {
    let config = Arc::new(config);

    let state = AppState {
        service,
        config: config.clone(),
    };

    let cors = if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let flag_routes = Router::new()
        .route(
            "/api/v1/flags",
            get(flags::find_flags).post(flags::create_flag),
        )
        .route(
            "/api/v1/flags/:flag_id",
            get(flags::get_flag)
                .put(flags::put_flag)
                .delete(flags::delete_flag),
        )
        .route("/api/v1/flags/:flag_id/enabled", put(flags::set_flag_enabled))
        .route(
            "/api/v1/flags/:flag_id/snapshots",
            get(flags::get_flag_snapshots),
        );

    let segment_routes = Router::new()
        .route(
            "/api/v1/flags/:flag_id/segments",
            get(segments::find_segments).post(segments::create_segment),
        )
        .route(
            "/api/v1/flags/:flag_id/segments/reorder",
            put(segments::put_segments_reorder),
        )
        .route(
            "/api/v1/flags/:flag_id/segments/:segment_id",
            put(segments::put_segment).delete(segments::delete_segment),
        )
        .route(
            "/api/v1/flags/:flag_id/segments/:segment_id/constraints",
            get(constraints::find_constraints).post(constraints::create_constraint),
        )
        .route(
            "/api/v1/flags/:flag_id/segments/:segment_id/constraints/:constraint_id",
            put(constraints::put_constraint).delete(constraints::delete_constraint),
        )
        .route(
            "/api/v1/flags/:flag_id/segments/:segment_id/distributions",
            get(distributions::find_distributions).put(distributions::put_distributions),
        );

    let variant_routes = Router::new()
        .route(
            "/api/v1/flags/:flag_id/variants",
            get(variants::find_variants).post(variants::create_variant),
        )
        .route(
            "/api/v1/flags/:flag_id/variants/:variant_id",
            put(variants::put_variant).delete(variants::delete_variant),
        );

    let public_routes = Router::new()
        .route("/api/v1/health", get(health::health_check))
        .route("/api/v1/health/live", get(health::live))
        .route("/api/v1/health/ready", get(health::ready))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(flag_routes)
        .merge(segment_routes)
        .merge(variant_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use persistence::repositories::MemoryConfigStore;
    use tower::ServiceExt;

    fn app() -> Router {
        let config = Config::load_for_test(&[]).unwrap();
        let service = ConfigService::new(Arc::new(MemoryConfigStore::new()));
        create_app(config, service)
    }

    #[tokio::test]
    async fn test_live_probe() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health/live")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_request_id_is_echoed() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health/ready")
                    .header("X-Request-ID", "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-request-id"], "req-42");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/nothing")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
