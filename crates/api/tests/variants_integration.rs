//! Integration tests for variant and distribution endpoints.
//!
//! Run with: cargo test --test variants_integration

mod common;

use axum::http::{Method, StatusCode};
use common::{
    create_test_app, create_test_flag, create_test_segment, create_test_variant, delete_request,
    get_request, get_test_flag, get_test_snapshots, json_request, put_test_distributions, send,
    send_ok, TestContext,
};
use domain::models::{Distribution, Flag, Segment, Variant};
use serde_json::json;

/// A flag with one segment and the given variants.
async fn setup(keys: &[&str]) -> (TestContext, Flag, Segment, Vec<Variant>) {
    let ctx = create_test_app();
    let flag = create_test_flag(&ctx.app, "experiment").await;
    let segment = create_test_segment(&ctx.app, flag.id, "everyone", 100).await;
    let mut variants = Vec::new();
    for key in keys {
        variants.push(create_test_variant(&ctx.app, flag.id, key).await);
    }
    (ctx, flag, segment, variants)
}

fn distributions_uri(flag_id: i64, segment_id: i64) -> String {
    format!(
        "/api/v1/flags/{}/segments/{}/distributions",
        flag_id, segment_id
    )
}

// ============================================================================
// Variants
// ============================================================================

#[tokio::test]
async fn test_create_variant_with_attachment() {
    let ctx = create_test_app();
    let flag = create_test_flag(&ctx.app, "attached").await;

    let variant: Variant = send_ok(
        &ctx.app,
        json_request(
            Method::POST,
            &format!("/api/v1/flags/{}/variants", flag.id),
            json!({"key": "treatment", "attachment": {"color": "blue", "size": 2, "beta": true, "note": null}}),
        ),
    )
    .await;
    let attachment = variant.attachment.unwrap();
    assert_eq!(attachment["color"], json!("blue"));
    assert_eq!(attachment["size"], json!(2));

    let variants: Vec<Variant> = send_ok(
        &ctx.app,
        get_request(&format!("/api/v1/flags/{}/variants", flag.id)),
    )
    .await;
    assert_eq!(variants.len(), 1);
    assert_eq!(variants[0].key, "treatment");
}

#[tokio::test]
async fn test_create_variant_rejects_nested_attachment() {
    let ctx = create_test_app();
    let flag = create_test_flag(&ctx.app, "nested").await;
    let uri = format!("/api/v1/flags/{}/variants", flag.id);

    for attachment in [json!({"list": [1, 2]}), json!({"inner": {"a": 1}})] {
        let (status, _) = send(
            &ctx.app,
            json_request(
                Method::POST,
                &uri,
                json!({"key": "treatment", "attachment": attachment}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    // Attachments must be objects at all
    let (status, _) = send(
        &ctx.app,
        json_request(Method::POST, &uri, json!({"key": "treatment", "attachment": "blue"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert!(get_test_flag(&ctx.app, flag.id).await.variants.is_empty());
}

#[tokio::test]
async fn test_variant_keys_are_validated_and_unique_per_flag() {
    let ctx = create_test_app();
    let flag = create_test_flag(&ctx.app, "keys").await;
    let other = create_test_flag(&ctx.app, "other_keys").await;
    create_test_variant(&ctx.app, flag.id, "control").await;

    let uri = format!("/api/v1/flags/{}/variants", flag.id);
    for key in ["control", "", "9lives"] {
        let (status, _) = send(&ctx.app, json_request(Method::POST, &uri, json!({"key": key}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "key {:?}", key);
    }

    // Another flag may reuse the key
    let variant = create_test_variant(&ctx.app, other.id, "control").await;
    assert_eq!(variant.key, "control");
}

#[tokio::test]
async fn test_rename_variant_syncs_distributions() {
    let (ctx, flag, segment, variants) = setup(&["control", "treatment"]).await;
    put_test_distributions(
        &ctx.app,
        flag.id,
        segment.id,
        json!([
            {"percent": 50, "variantId": variants[0].id},
            {"percent": 50, "variantId": variants[1].id}
        ]),
    )
    .await;

    let renamed: Variant = send_ok(
        &ctx.app,
        json_request(
            Method::PUT,
            &format!("/api/v1/flags/{}/variants/{}", flag.id, variants[1].id),
            json!({"key": "treatment_v2", "attachment": {"color": "red"}}),
        ),
    )
    .await;
    assert_eq!(renamed.key, "treatment_v2");

    let distributions: Vec<Distribution> =
        send_ok(&ctx.app, get_request(&distributions_uri(flag.id, segment.id))).await;
    let keys: Vec<&str> = distributions.iter().map(|d| d.variant_key.as_str()).collect();
    assert_eq!(keys, vec!["control", "treatment_v2"]);

    let snapshot = get_test_snapshots(&ctx.app, flag.id).await.pop().unwrap();
    assert_eq!(
        snapshot.flag.segments[0].distributions[1].variant_key,
        "treatment_v2"
    );
}

#[tokio::test]
async fn test_put_variant_rejects_sibling_key() {
    let (ctx, flag, _, variants) = setup(&["control", "treatment"]).await;

    let (status, _) = send(
        &ctx.app,
        json_request(
            Method::PUT,
            &format!("/api/v1/flags/{}/variants/{}", flag.id, variants[1].id),
            json!({"key": "control"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Keeping its own key is fine
    let (status, _) = send(
        &ctx.app,
        json_request(
            Method::PUT,
            &format!("/api/v1/flags/{}/variants/{}", flag.id, variants[1].id),
            json!({"key": "treatment"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_delete_referenced_variant_is_rejected() {
    let (ctx, flag, segment, variants) = setup(&["control"]).await;
    put_test_distributions(
        &ctx.app,
        flag.id,
        segment.id,
        json!([{"percent": 100, "variantId": variants[0].id}]),
    )
    .await;
    let uri = format!("/api/v1/flags/{}/variants/{}", flag.id, variants[0].id);

    let (status, body) = send(&ctx.app, delete_request(&uri)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert_eq!(get_test_flag(&ctx.app, flag.id).await.variants.len(), 1);

    // Clearing the distribution releases the variant
    put_test_distributions(&ctx.app, flag.id, segment.id, json!([])).await;
    let (status, body) = send(&ctx.app, delete_request(&uri)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({}));
    assert!(get_test_flag(&ctx.app, flag.id).await.variants.is_empty());
}

#[tokio::test]
async fn test_variant_of_other_flag_is_not_found() {
    let (ctx, _, _, variants) = setup(&["control"]).await;
    let stranger = create_test_flag(&ctx.app, "stranger").await;

    let (status, _) = send(
        &ctx.app,
        json_request(
            Method::PUT,
            &format!("/api/v1/flags/{}/variants/{}", stranger.id, variants[0].id),
            json!({"key": "stolen"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &ctx.app,
        delete_request(&format!(
            "/api/v1/flags/{}/variants/{}",
            stranger.id, variants[0].id
        )),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Distributions
// ============================================================================

#[tokio::test]
async fn test_distributions_must_sum_to_100() {
    let (ctx, flag, segment, variants) = setup(&["control"]).await;
    let uri = distributions_uri(flag.id, segment.id);

    let (status, body) = send(
        &ctx.app,
        json_request(
            Method::PUT,
            &uri,
            json!({"distributions": [{"percent": 50, "variantId": variants[0].id, "variantKey": "control"}]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let distributions: Vec<Distribution> = send_ok(
        &ctx.app,
        json_request(
            Method::PUT,
            &uri,
            json!({"distributions": [{"percent": 100, "variantId": variants[0].id, "variantKey": "control"}]}),
        ),
    )
    .await;
    assert_eq!(distributions.len(), 1);
    assert_eq!(distributions[0].percent, 100);
    assert_eq!(distributions[0].variant_key, "control");
}

#[tokio::test]
async fn test_rejected_distributions_keep_previous_set() {
    let (ctx, flag, segment, variants) = setup(&["control", "treatment"]).await;
    let uri = distributions_uri(flag.id, segment.id);
    let previous = put_test_distributions(
        &ctx.app,
        flag.id,
        segment.id,
        json!([
            {"percent": 30, "variantId": variants[0].id},
            {"percent": 70, "variantId": variants[1].id}
        ]),
    )
    .await;
    let snapshots_before = get_test_snapshots(&ctx.app, flag.id).await.len();

    let proposals = vec![
        json!([
            {"percent": 49, "variantId": variants[0].id},
            {"percent": 50, "variantId": variants[1].id}
        ]),
        json!([
            {"percent": 51, "variantId": variants[0].id},
            {"percent": 50, "variantId": variants[1].id}
        ]),
        json!([
            {"percent": 50, "variantId": variants[0].id},
            {"percent": 50, "variantId": variants[0].id}
        ]),
        json!([{"percent": 100, "variantId": 999}]),
        json!([
            {"percent": 110, "variantId": variants[0].id},
            {"percent": -10, "variantId": variants[1].id}
        ]),
    ];
    for proposal in proposals {
        let (status, _) = send(
            &ctx.app,
            json_request(Method::PUT, &uri, json!({ "distributions": proposal })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", proposal);
    }

    let current: Vec<Distribution> = send_ok(&ctx.app, get_request(&uri)).await;
    assert_eq!(current, previous);
    assert_eq!(
        get_test_snapshots(&ctx.app, flag.id).await.len(),
        snapshots_before
    );
}

#[tokio::test]
async fn test_distribution_cannot_use_variant_of_other_flag() {
    let (ctx, flag, segment, _) = setup(&["control"]).await;
    let other = create_test_flag(&ctx.app, "other_flag").await;
    let foreign = create_test_variant(&ctx.app, other.id, "control").await;

    let (status, _) = send(
        &ctx.app,
        json_request(
            Method::PUT,
            &distributions_uri(flag.id, segment.id),
            json!({"distributions": [{"percent": 100, "variantId": foreign.id}]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_replace_and_clear_distributions() {
    let (ctx, flag, segment, variants) = setup(&["control", "treatment"]).await;

    put_test_distributions(
        &ctx.app,
        flag.id,
        segment.id,
        json!([{"percent": 100, "variantId": variants[0].id}]),
    )
    .await;
    let replaced = put_test_distributions(
        &ctx.app,
        flag.id,
        segment.id,
        json!([
            {"percent": 20, "variantId": variants[0].id},
            {"percent": 80, "variantId": variants[1].id}
        ]),
    )
    .await;
    assert_eq!(replaced.len(), 2);
    assert_eq!(replaced.iter().map(|d| d.percent).sum::<i64>(), 100);

    let flag_view = get_test_flag(&ctx.app, flag.id).await;
    assert_eq!(flag_view.segments[0].distributions, replaced);

    let cleared = put_test_distributions(&ctx.app, flag.id, segment.id, json!([])).await;
    assert!(cleared.is_empty());
    assert!(get_test_flag(&ctx.app, flag.id).await.segments[0]
        .distributions
        .is_empty());
}
