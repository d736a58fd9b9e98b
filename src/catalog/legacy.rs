//! Decoding of the catalog's wire format into the crate's field model.
//!
//! The DMS stores regex validator arguments as a Python-repr style string,
//! e.g. `{'pattern': '^\\d+$'}`. That string is not JSON; it is normalized
//! here and nowhere else.

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::debug;

use super::{DocumentType, FieldValidation, MetadataFieldDefinition};

const REGEX_VALIDATOR: &str = "RegularExpressionValidator";

#[derive(Debug, Deserialize)]
pub(super) struct Page<T> {
    pub(super) results: Vec<T>,
    #[serde(default)]
    pub(super) next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireDocumentType {
    id: u64,
    label: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct WireMetadataEntry {
    metadata_type: WireMetadataType,
    #[serde(default)]
    required: bool,
}

#[derive(Debug, Deserialize)]
struct WireMetadataType {
    id: u64,
    label: String,
    #[serde(default)]
    lookup: Option<String>,
    #[serde(default)]
    validation: Option<String>,
    #[serde(default)]
    validation_arguments: Option<String>,
}

impl From<WireDocumentType> for DocumentType {
    fn from(wire: WireDocumentType) -> Self {
        DocumentType {
            id: wire.id,
            label: wire.label,
        }
    }
}

impl From<WireMetadataEntry> for MetadataFieldDefinition {
    fn from(wire: WireMetadataEntry) -> Self {
        let meta = wire.metadata_type;
        let lookup = meta
            .lookup
            .as_deref()
            .map(split_lookup)
            .unwrap_or_default();
        let validation = match (meta.validation.as_deref(), meta.validation_arguments.as_deref()) {
            (Some(kind), Some(arguments))
                if kind.contains(REGEX_VALIDATOR) && !arguments.trim().is_empty() =>
            {
                parse_legacy_pattern(arguments).map(FieldValidation::Pattern)
            }
            _ => None,
        };
        MetadataFieldDefinition {
            id: meta.id,
            label: meta.label,
            required: wire.required,
            lookup,
            validation,
        }
    }
}

pub(super) fn parse_document_type_page(body: &str) -> Result<Page<DocumentType>> {
    let page: Page<WireDocumentType> =
        serde_json::from_str(body).with_context(|| "failed to parse document types page")?;
    Ok(Page {
        results: page.results.into_iter().map(DocumentType::from).collect(),
        next: page.next.filter(|next| !next.trim().is_empty()),
    })
}

pub(super) fn parse_metadata_fields(body: &str) -> Result<Vec<MetadataFieldDefinition>> {
    let page: Page<WireMetadataEntry> =
        serde_json::from_str(body).with_context(|| "failed to parse metadata types")?;
    Ok(page
        .results
        .into_iter()
        .map(MetadataFieldDefinition::from)
        .collect())
}

fn split_lookup(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|option| option.trim())
        .filter(|option| !option.is_empty())
        .map(|option| option.to_string())
        .collect()
}

/// Extracts the `pattern` entry from a legacy validator argument string.
/// Returns `None` when the string cannot be understood; callers treat that
/// as "no constraint".
pub fn parse_legacy_pattern(arguments: &str) -> Option<String> {
    let normalized = arguments.replace('\'', "\"").replace('\\', "\\\\");
    let value: serde_json::Value = match serde_json::from_str(&normalized) {
        Ok(value) => value,
        Err(err) => {
            debug!("ignoring unparseable validation arguments {:?}: {}", arguments, err);
            return None;
        }
    };
    let Some(pattern) = value.get("pattern").and_then(|pattern| pattern.as_str()) else {
        debug!("validation arguments {:?} carry no pattern", arguments);
        return None;
    };
    Some(pattern.replace("\\\\", "\\"))
}
