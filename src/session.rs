use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::binding::{FieldBinder, FieldValueMap};
use crate::catalog::{Catalog, DocumentType, MetadataFieldDefinition};
use crate::data::{self, DocumentFile};
use crate::document::LoadedDocument;
use crate::ocr::{self, Extraction, TextRecognizer};
use crate::region::{self, Region};
use crate::settings::Settings;
use crate::submission::{self, IngestionClient, SubmissionRecord, SubmitOutcome};
use crate::validation;

/// Result of asking the session to package its record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packaging {
    /// Validation failed; nothing was written.
    Blocked(Vec<String>),
    Ready(SubmissionRecord),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReport {
    pub artifact: PathBuf,
    /// `None` when the record was only written, not posted.
    pub outcome: Option<SubmitOutcome>,
}

/// Everything one capture session knows. Operations take `&mut self`; there
/// is no shared or global state.
#[derive(Debug)]
pub struct SessionContext {
    settings: Settings,
    document: Option<LoadedDocument>,
    document_types: Vec<DocumentType>,
    document_type: Option<DocumentType>,
    binder: FieldBinder,
    scale: f64,
    last_region: Option<Region>,
    annotations: Vec<Region>,
    output_path: PathBuf,
    include_annotations: bool,
}

impl SessionContext {
    pub fn new(settings: Settings) -> Self {
        let output_path = settings.artifact_path.clone();
        let include_annotations = settings.include_annotations;
        Self {
            settings,
            document: None,
            document_types: Vec::new(),
            document_type: None,
            binder: FieldBinder::default(),
            scale: 1.0,
            last_region: None,
            annotations: Vec::new(),
            output_path,
            include_annotations,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn load_document(&mut self, path: &Path) -> Result<&LoadedDocument> {
        let file = data::load_document_file(path)?;
        self.load_file(file)
    }

    pub fn load_file(&mut self, file: DocumentFile) -> Result<&LoadedDocument> {
        let document = LoadedDocument::load(file, &self.settings)?;
        Ok(self.set_document(document))
    }

    /// Replaces the current document. Regions and entered values belong to
    /// the previous file and are dropped.
    pub fn set_document(&mut self, document: LoadedDocument) -> &LoadedDocument {
        debug!("session document: {} ({})", document.file().name, document.caption());
        self.last_region = None;
        self.annotations.clear();
        self.binder = FieldBinder::new(self.binder.fields().to_vec());
        self.document.insert(document)
    }

    pub fn document(&self) -> Option<&LoadedDocument> {
        self.document.as_ref()
    }

    pub fn document_mut(&mut self) -> Result<&mut LoadedDocument> {
        self.document
            .as_mut()
            .ok_or_else(|| anyhow!("no document loaded; use --data or /open first"))
    }

    fn require_document(&self) -> Result<&LoadedDocument> {
        self.document
            .as_ref()
            .ok_or_else(|| anyhow!("no document loaded; use --data or /open first"))
    }

    pub async fn refresh_document_types<C: Catalog + ?Sized>(
        &mut self,
        catalog: &C,
    ) -> Result<&[DocumentType]> {
        self.document_types = catalog
            .document_types()
            .await
            .with_context(|| "failed to fetch document types")?;
        Ok(&self.document_types)
    }

    pub fn document_types(&self) -> &[DocumentType] {
        &self.document_types
    }

    pub fn document_type(&self) -> Option<&DocumentType> {
        self.document_type.as_ref()
    }

    /// Selects a document type by id or label (case-insensitive) and loads
    /// its fields. Any previously entered values are discarded.
    pub async fn select_document_type<C: Catalog + ?Sized>(
        &mut self,
        catalog: &C,
        key: &str,
    ) -> Result<&DocumentType> {
        if self.document_types.is_empty() {
            self.refresh_document_types(catalog).await?;
        }
        let key = key.trim();
        let selected = self
            .document_types
            .iter()
            .find(|doc| key.parse::<u64>().is_ok_and(|id| id == doc.id))
            .or_else(|| {
                self.document_types
                    .iter()
                    .find(|doc| doc.label.eq_ignore_ascii_case(key))
            })
            .cloned()
            .ok_or_else(|| anyhow!("unknown document type: {}", key))?;

        let fields = catalog
            .metadata_fields(selected.id)
            .await
            .with_context(|| format!("failed to fetch metadata fields for {}", selected.label))?;
        debug!(
            "document type {} ({}) has {} field(s)",
            selected.label,
            selected.id,
            fields.len()
        );
        self.binder = FieldBinder::new(fields);
        Ok(&*self.document_type.insert(selected))
    }

    pub fn fields(&self) -> &[MetadataFieldDefinition] {
        self.binder.fields()
    }

    pub fn values(&self) -> &FieldValueMap {
        self.binder.values()
    }

    pub fn active_field(&self) -> Option<&MetadataFieldDefinition> {
        self.binder.active_field()
    }

    pub fn select_field(&mut self, key: &str) -> Result<&MetadataFieldDefinition> {
        self.binder.select(key)
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: f64) -> Result<()> {
        self.scale = region::validate_scale(scale)?;
        Ok(())
    }

    /// Writes a preview of the current page and adopts its display scale.
    pub fn export_preview(&mut self, path: &Path, display_width: Option<u32>) -> Result<f64> {
        let scale = self.require_document()?.export_preview(path, display_width)?;
        self.set_scale(scale)?;
        Ok(scale)
    }

    /// OCRs `region` on the current page and binds the text to the active
    /// field. Once OCR succeeds the region is kept as an annotation, even
    /// when it read nothing.
    pub fn draw_region<R: TextRecognizer + ?Sized>(
        &mut self,
        region: Region,
        recognizer: &R,
    ) -> Result<Extraction> {
        if self.binder.active_field().is_none() {
            return Err(anyhow!(
                "no metadata fields loaded; select a document type first"
            ));
        }
        let page = self.require_document()?.current_page();
        let extraction = ocr::extract_text(page, region, self.scale, recognizer)?;
        self.binder.bind(&extraction.text)?;
        self.last_region = Some(region);
        self.annotations.push(region);
        Ok(extraction)
    }

    pub fn last_region(&self) -> Option<Region> {
        self.last_region
    }

    pub fn annotations(&self) -> &[Region] {
        &self.annotations
    }

    /// Sets a value by hand. Returns the live format warning, if any.
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<Option<String>> {
        let field = self.binder.set(key, value)?;
        Ok(validation::live_check(field, value))
    }

    pub fn clear_value(&mut self, key: &str) -> Result<()> {
        self.binder.clear(key)?;
        Ok(())
    }

    pub fn validate(&self) -> Vec<String> {
        validation::validate(self.binder.fields(), self.binder.values())
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    pub fn set_output_path(&mut self, path: impl Into<PathBuf>) {
        self.output_path = path.into();
    }

    pub fn include_annotations(&self) -> bool {
        self.include_annotations
    }

    pub fn set_include_annotations(&mut self, include: bool) {
        self.include_annotations = include;
    }

    /// Validates and, when clean, builds the record from the current state.
    pub fn package(&self) -> Result<Packaging> {
        let document = self.require_document()?;
        let document_type = self
            .document_type
            .as_ref()
            .ok_or_else(|| anyhow!("no document type selected"))?;
        let errors = self.validate();
        if !errors.is_empty() {
            return Ok(Packaging::Blocked(errors));
        }
        let annotations = self
            .include_annotations
            .then_some(self.annotations.as_slice());
        Ok(Packaging::Ready(SubmissionRecord::build(
            document.file(),
            document_type.id,
            self.binder.fields(),
            self.binder.values(),
            annotations,
            &self.settings.dms_domain,
        )))
    }

    /// Writes the artifact and posts it when a client is given. Validation
    /// errors come back as `Err` carrying every message.
    pub async fn submit(&self, client: Option<&IngestionClient>) -> Result<SubmitReport> {
        let record = match self.package()? {
            Packaging::Blocked(errors) => return Err(anyhow!(errors.join("\n"))),
            Packaging::Ready(record) => record,
        };
        submission::write_artifact(&record, &self.output_path)?;
        let outcome = match client {
            Some(client) => Some(client.submit(&record).await?),
            None => None,
        };
        Ok(SubmitReport {
            artifact: self.output_path.clone(),
            outcome,
        })
    }
}
