use anyhow::Result;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;

mod http;
mod legacy;

pub use http::HttpCatalog;
pub use legacy::parse_legacy_pattern;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentType {
    pub id: u64,
    pub label: String,
}

/// Constraint attached to a metadata field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FieldValidation {
    /// Value must match this regular expression starting at offset 0.
    Pattern(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataFieldDefinition {
    pub id: u64,
    pub label: String,
    pub required: bool,
    pub lookup: Vec<String>,
    pub validation: Option<FieldValidation>,
}

impl MetadataFieldDefinition {
    pub fn new(id: u64, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            required: false,
            lookup: Vec::new(),
            validation: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.validation = Some(FieldValidation::Pattern(pattern.into()));
        self
    }

    pub fn with_lookup<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lookup = options.into_iter().map(Into::into).collect();
        self
    }

    pub fn pattern(&self) -> Option<&str> {
        match &self.validation {
            Some(FieldValidation::Pattern(pattern)) => Some(pattern.as_str()),
            None => None,
        }
    }

    pub fn is_lookup(&self) -> bool {
        !self.lookup.is_empty()
    }

    /// Label as shown next to an input, with a marker for required fields.
    pub fn display_label(&self) -> String {
        if self.required {
            format!("{} *", self.label)
        } else {
            self.label.clone()
        }
    }
}

pub type CatalogFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Source of document types and their metadata field definitions.
pub trait Catalog: Send + Sync {
    fn document_types(&self) -> CatalogFuture<'_, Vec<DocumentType>>;
    fn metadata_fields(&self, document_type_id: u64)
        -> CatalogFuture<'_, Vec<MetadataFieldDefinition>>;
}
