use regex::Regex;
use tracing::warn;

use crate::binding::FieldValueMap;
use crate::catalog::MetadataFieldDefinition;

/// Checks every field of the active document type and returns one message
/// per failing field, in field order. An empty result means the record may
/// be submitted.
pub fn validate(fields: &[MetadataFieldDefinition], values: &FieldValueMap) -> Vec<String> {
    fields
        .iter()
        .filter_map(|field| check_field(field, values.get(field.id).unwrap_or("")))
        .collect()
}

fn check_field(field: &MetadataFieldDefinition, value: &str) -> Option<String> {
    if field.required && value.trim().is_empty() {
        return Some(format!("Field '{}' is required.", field.label));
    }
    if !matches_pattern(field, value) {
        return Some(format!("Validation failed for {}: {}", field.label, value));
    }
    None
}

/// Message shown while a value is typed in; blank values are left to
/// `validate`.
pub fn live_check(field: &MetadataFieldDefinition, value: &str) -> Option<String> {
    if value.is_empty() || matches_pattern(field, value) {
        return None;
    }
    Some(format!(
        "Invalid input for {}. Please match the required format.",
        field.label
    ))
}

/// Prefix-anchored match: the pattern has to match starting at offset 0
/// but may leave trailing input. Fields without a usable pattern pass.
fn matches_pattern(field: &MetadataFieldDefinition, value: &str) -> bool {
    let Some(pattern) = field.pattern() else {
        return true;
    };
    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(err) => {
            warn!(
                "ignoring invalid pattern {:?} on field {}: {}",
                pattern, field.label, err
            );
            return true;
        }
    };
    regex.find(value).is_some_and(|found| found.start() == 0)
}
