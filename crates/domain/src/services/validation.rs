//! Cross-entity validation of proposed configuration changes.
//!
//! Every function is pure: it receives the proposed values plus the minimal
//! sibling state it needs and never touches storage.

use std::collections::HashSet;

use serde_json::Value;

use crate::error::ConfigError;
use crate::models::{Attachment, DistributionRequest, Operator};
use shared::validation::{is_valid_key, MAX_PERCENT};

/// Checks the identifier format shared by flag and variant keys.
pub fn validate_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_key(key) {
        Ok(())
    } else {
        Err(ConfigError::validation(format!(
            "key '{}' must start with a letter and contain only letters, digits and underscores",
            key
        )))
    }
}

/// Checks a constraint's operator and JSON value, returning the parsed operator.
pub fn validate_constraint(operator: &str, value: &str) -> Result<Operator, ConfigError> {
    let op: Operator = operator.parse().map_err(|_| {
        ConfigError::validation(format!(
            "operator '{}' is not one of {}",
            operator,
            Operator::ALL
                .iter()
                .map(Operator::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        ))
    })?;

    let parsed: Value = serde_json::from_str(value).map_err(|e| {
        ConfigError::validation(format!(
            "constraint value {} is not valid JSON: {}",
            value, e
        ))
    })?;

    if op.expects_array() && !parsed.is_array() {
        return Err(ConfigError::validation(format!(
            "operator {} requires a JSON array value, got {}",
            op, value
        )));
    }

    Ok(op)
}

/// Checks that `proposed` is a permutation of exactly `existing`.
pub fn validate_segment_reorder(existing: &[i64], proposed: &[i64]) -> Result<(), ConfigError> {
    let existing_set: HashSet<i64> = existing.iter().copied().collect();
    let mut seen = HashSet::with_capacity(proposed.len());

    for id in proposed {
        if !seen.insert(*id) {
            return Err(ConfigError::validation(format!(
                "segment {} appears more than once in the new order",
                id
            )));
        }
        if !existing_set.contains(id) {
            return Err(ConfigError::validation(format!(
                "segment {} does not belong to this flag",
                id
            )));
        }
    }

    if seen.len() != existing_set.len() {
        let mut missing: Vec<i64> = existing_set.difference(&seen).copied().collect();
        missing.sort_unstable();
        return Err(ConfigError::validation(format!(
            "new order must contain every segment of the flag, missing {:?}",
            missing
        )));
    }

    Ok(())
}

/// Checks a replacement distribution set against the flag's variants.
///
/// An empty set is valid and clears the segment's configuration.
pub fn validate_distributions(
    proposed: &[DistributionRequest],
    variant_ids: &[i64],
) -> Result<(), ConfigError> {
    if proposed.is_empty() {
        return Ok(());
    }

    let known: HashSet<i64> = variant_ids.iter().copied().collect();
    let mut seen = HashSet::with_capacity(proposed.len());
    let mut sum = 0i64;

    for d in proposed {
        if !known.contains(&d.variant_id) {
            return Err(ConfigError::validation(format!(
                "variant {} does not belong to this flag",
                d.variant_id
            )));
        }
        if !seen.insert(d.variant_id) {
            return Err(ConfigError::validation(format!(
                "variant {} is distributed more than once",
                d.variant_id
            )));
        }
        if !(0..=MAX_PERCENT).contains(&d.percent) {
            return Err(ConfigError::validation(format!(
                "percent {} of variant {} must be between 0 and 100",
                d.percent, d.variant_id
            )));
        }
        sum += d.percent;
    }

    if sum != MAX_PERCENT {
        return Err(ConfigError::validation(format!(
            "distribution percents must add up to 100, got {}",
            sum
        )));
    }

    Ok(())
}

/// Checks that every attachment value is a string, number, boolean or null.
pub fn validate_attachment(attachment: &Attachment) -> Result<(), ConfigError> {
    for (name, value) in attachment {
        if value.is_array() || value.is_object() {
            return Err(ConfigError::validation(format!(
                "attachment value '{}' must be a string, number, boolean or null",
                name
            )));
        }
    }
    Ok(())
}

/// Fails if the flag key is held by a flag other than the one being updated.
///
/// `holder` is the id of the flag currently holding `key`, if any.
pub fn validate_flag_key_uniqueness(
    key: &str,
    holder: Option<i64>,
    updating: Option<i64>,
) -> Result<(), ConfigError> {
    match holder {
        Some(id) if Some(id) != updating => Err(ConfigError::validation(format!(
            "flag key '{}' is already used by flag {}",
            key, id
        ))),
        _ => Ok(()),
    }
}

/// Fails if a sibling variant of the same flag already holds `key`.
pub fn validate_variant_key_uniqueness<'a, I>(
    key: &str,
    siblings: I,
    updating: Option<i64>,
) -> Result<(), ConfigError>
where
    I: IntoIterator<Item = (i64, &'a str)>,
{
    for (id, sibling_key) in siblings {
        if sibling_key == key && Some(id) != updating {
            return Err(ConfigError::validation(format!(
                "variant key '{}' is already used by variant {}",
                key, id
            )));
        }
    }
    Ok(())
}

/// Fails if any distribution still references the variant.
///
/// `referencing_segments` lists the segments whose distributions point at it.
pub fn validate_delete_variant(
    variant_id: i64,
    referencing_segments: &[i64],
) -> Result<(), ConfigError> {
    if referencing_segments.is_empty() {
        return Ok(());
    }
    Err(ConfigError::validation(format!(
        "variant {} is still referenced by the distributions of segments {:?}",
        variant_id, referencing_segments
    )))
}
