//! Variant domain model.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Flat JSON object attached to a variant.
pub type Attachment = serde_json::Map<String, serde_json::Value>;

/// A named treatment a flag can serve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    pub id: i64,
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
}

/// Request payload for creating a variant.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateVariantRequest {
    #[validate(custom(function = "shared::validation::validate_key_format"))]
    pub key: String,

    #[serde(default)]
    pub attachment: Option<Attachment>,
}

/// Request payload for replacing a variant.
pub type PutVariantRequest = CreateVariantRequest;
