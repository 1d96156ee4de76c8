//! Common test utilities for integration tests.
//!
//! Every test gets its own in-process store, so tests are isolated and need
//! no database.

// Helpers are shared by several test binaries; not every binary uses all of them.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, Response, StatusCode},
    Router,
};
use domain::models::{
    Attachment, Constraint, Distribution, Flag, FlagSnapshot, Segment, Variant,
};
use domain::ConfigError;
use fake::{faker::lorem::en::Sentence, Fake};
use flag_config_api::{
    app::create_app,
    config::Config,
    services::{ConfigService, EntityMapper, Mapper},
};
use persistence::entities::{
    ConstraintEntity, DistributionEntity, FlagSnapshotEntity, FlagTree, SegmentTree,
    VariantEntity,
};
use persistence::repositories::MemoryConfigStore;
use serde_json::{json, Value};
use tower::ServiceExt;

/// Router plus direct handles on the service and store behind it.
pub struct TestContext {
    pub app: Router,
    pub service: ConfigService,
    pub store: MemoryConfigStore,
}

/// Test configuration with embedded defaults.
pub fn test_config() -> Config {
    Config::load_for_test(&[
        ("database.url", "postgres://unused@localhost/flag_config_test"),
        ("logging.format", "pretty"),
    ])
    .expect("Failed to load test config")
}

/// Create a test application over a fresh in-process store.
pub fn create_test_app() -> TestContext {
    create_test_app_with_mapper(Arc::new(EntityMapper))
}

pub fn create_test_app_with_mapper(mapper: Arc<dyn Mapper>) -> TestContext {
    let store = MemoryConfigStore::new();
    let service = ConfigService::with_mapper(Arc::new(store.clone()), mapper);
    let app = create_app(test_config(), service.clone());
    TestContext {
        app,
        service,
        store,
    }
}

/// A random human-readable description.
pub fn fake_description() -> String {
    Sentence(2..5).fake()
}

// ============================================================================
// Request builders
// ============================================================================

pub fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// JSON request carrying an `X-Updated-By` header.
pub fn json_request_as(method: Method, uri: &str, body: Value, actor: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header("X-Updated-By", actor)
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn delete_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method(Method::DELETE)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Parse the response body as JSON.
pub async fn parse_response_body(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap_or_else(|_| {
        panic!(
            "Failed to parse response body: {:?}",
            String::from_utf8_lossy(&body)
        )
    })
}

/// Send a request and return its status and JSON body.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, parse_response_body(response).await)
}

/// Send a request that must succeed and decode its body.
pub async fn send_ok<T: serde::de::DeserializeOwned>(app: &Router, request: Request<Body>) -> T {
    let (status, body) = send(app, request).await;
    if status != StatusCode::OK {
        panic!("Request failed with status: {}, body: {}", status, body);
    }
    serde_json::from_value(body.clone())
        .unwrap_or_else(|e| panic!("Unexpected response shape ({}): {}", e, body))
}

// ============================================================================
// Fixtures
// ============================================================================

pub async fn create_test_flag(app: &Router, key: &str) -> Flag {
    send_ok(
        app,
        json_request(
            Method::POST,
            "/api/v1/flags",
            json!({"key": key, "description": fake_description()}),
        ),
    )
    .await
}

pub async fn create_test_segment(
    app: &Router,
    flag_id: i64,
    description: &str,
    rollout_percent: i64,
) -> Segment {
    send_ok(
        app,
        json_request(
            Method::POST,
            &format!("/api/v1/flags/{}/segments", flag_id),
            json!({"description": description, "rolloutPercent": rollout_percent}),
        ),
    )
    .await
}

pub async fn create_test_constraint(
    app: &Router,
    flag_id: i64,
    segment_id: i64,
    operator: &str,
    value: &str,
) -> Constraint {
    send_ok(
        app,
        json_request(
            Method::POST,
            &format!(
                "/api/v1/flags/{}/segments/{}/constraints",
                flag_id, segment_id
            ),
            json!({"property": "state", "operator": operator, "value": value}),
        ),
    )
    .await
}

pub async fn create_test_variant(app: &Router, flag_id: i64, key: &str) -> Variant {
    send_ok(
        app,
        json_request(
            Method::POST,
            &format!("/api/v1/flags/{}/variants", flag_id),
            json!({"key": key}),
        ),
    )
    .await
}

pub async fn put_test_distributions(
    app: &Router,
    flag_id: i64,
    segment_id: i64,
    distributions: Value,
) -> Vec<Distribution> {
    send_ok(
        app,
        json_request(
            Method::PUT,
            &format!(
                "/api/v1/flags/{}/segments/{}/distributions",
                flag_id, segment_id
            ),
            json!({ "distributions": distributions }),
        ),
    )
    .await
}

pub async fn get_test_flag(app: &Router, flag_id: i64) -> Flag {
    send_ok(app, get_request(&format!("/api/v1/flags/{}", flag_id))).await
}

pub async fn get_test_snapshots(app: &Router, flag_id: i64) -> Vec<FlagSnapshot> {
    send_ok(
        app,
        get_request(&format!("/api/v1/flags/{}/snapshots", flag_id)),
    )
    .await
}

// ============================================================================
// Mapper double
// ============================================================================

/// Conversions a [`FailingMapper`] can be told to break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapperFault {
    Flag,
    Variant,
    SnapshotPayload,
}

/// Delegates to [`EntityMapper`] except for one conversion, which always
/// reports a mapping error.
pub struct FailingMapper {
    pub fault: MapperFault,
}

impl FailingMapper {
    pub fn new(fault: MapperFault) -> Arc<Self> {
        Arc::new(Self { fault })
    }

    fn check(&self, fault: MapperFault) -> Result<(), ConfigError> {
        if self.fault == fault {
            return Err(ConfigError::mapping(format!("forced {:?} failure", fault)));
        }
        Ok(())
    }
}

impl Mapper for FailingMapper {
    fn flag(&self, tree: &FlagTree) -> Result<Flag, ConfigError> {
        self.check(MapperFault::Flag)?;
        EntityMapper.flag(tree)
    }

    fn segment(&self, tree: &SegmentTree) -> Result<Segment, ConfigError> {
        EntityMapper.segment(tree)
    }

    fn constraint(&self, entity: &ConstraintEntity) -> Result<Constraint, ConfigError> {
        EntityMapper.constraint(entity)
    }

    fn variant(&self, entity: &VariantEntity) -> Result<Variant, ConfigError> {
        self.check(MapperFault::Variant)?;
        EntityMapper.variant(entity)
    }

    fn distribution(&self, entity: &DistributionEntity) -> Result<Distribution, ConfigError> {
        EntityMapper.distribution(entity)
    }

    fn attachment_to_entity(
        &self,
        attachment: Option<&Attachment>,
    ) -> Result<Option<Value>, ConfigError> {
        EntityMapper.attachment_to_entity(attachment)
    }

    fn snapshot_payload(&self, flag: &Flag) -> Result<Value, ConfigError> {
        self.check(MapperFault::SnapshotPayload)?;
        EntityMapper.snapshot_payload(flag)
    }

    fn snapshot(&self, entity: &FlagSnapshotEntity) -> Result<FlagSnapshot, ConfigError> {
        EntityMapper.snapshot(entity)
    }
}
