//! Distribution domain model.

use serde::{Deserialize, Serialize};

/// Percentage of a segment's traffic assigned to one variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Distribution {
    pub id: i64,
    pub percent: i64,
    pub variant_id: i64,
    pub variant_key: String,
}

/// One proposed distribution row.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionRequest {
    pub percent: i64,
    pub variant_id: i64,
    /// Informational; the stored key is taken from the referenced variant.
    #[serde(default)]
    pub variant_key: Option<String>,
}

/// Replaces the whole distribution set of a segment.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PutDistributionsRequest {
    pub distributions: Vec<DistributionRequest>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_distributions_request() {
        let request: PutDistributionsRequest = serde_json::from_str(
            r#"{"distributions": [{"percent": 100, "variantId": 1, "variantKey": "control"}]}"#,
        )
        .unwrap();
        assert_eq!(request.distributions.len(), 1);
        assert_eq!(request.distributions[0].variant_id, 1);
    }

    #[test]
    fn test_empty_distribution_set() {
        let request: PutDistributionsRequest =
            serde_json::from_str(r#"{"distributions": []}"#).unwrap();
        assert!(request.distributions.is_empty());
    }
}
