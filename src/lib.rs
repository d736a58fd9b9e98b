use anyhow::{anyhow, Context, Result};
use std::path::Path;

pub mod binding;
pub mod catalog;
pub mod data;
pub mod document;
pub mod logging;
pub mod ocr;
mod pdf;
pub mod region;
pub mod session;
pub mod settings;
pub mod submission;
#[cfg(test)]
mod test_util;
pub mod validation;

pub use catalog::{Catalog, DocumentType, HttpCatalog, MetadataFieldDefinition};
pub use ocr::{TesseractRecognizer, TextRecognizer};
pub use region::Region;
pub use session::{Packaging, SessionContext, SubmitReport};
pub use submission::{IngestionClient, SubmissionRecord, SubmitOutcome};

/// `FIELD=x,y,w,h`: OCR the region into the named field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRegion {
    pub field: String,
    pub region: Region,
}

impl FieldRegion {
    pub fn parse(input: &str) -> Result<Self> {
        let (field, region) = input
            .rsplit_once('=')
            .ok_or_else(|| anyhow!("expected FIELD=x,y,w,h (got '{}')", input))?;
        let field = field.trim();
        if field.is_empty() {
            return Err(anyhow!("region target field is empty in '{}'", input));
        }
        Ok(Self {
            field: field.to_string(),
            region: Region::parse(region)?,
        })
    }
}

/// `FIELD=VALUE`: set a field by hand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAssignment {
    pub field: String,
    pub value: String,
}

impl FieldAssignment {
    pub fn parse(input: &str) -> Result<Self> {
        let (field, value) = input
            .split_once('=')
            .ok_or_else(|| anyhow!("expected FIELD=VALUE (got '{}')", input))?;
        let field = field.trim();
        if field.is_empty() {
            return Err(anyhow!("field name is empty in '{}'", input));
        }
        Ok(Self {
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub data: Option<String>,
    pub doctype: Option<String>,
    pub page: Option<usize>,
    pub scale: Option<f64>,
    pub regions: Vec<FieldRegion>,
    pub assignments: Vec<FieldAssignment>,
    pub output: Option<String>,
    pub no_annotations: bool,
    pub submit: bool,
    pub settings_path: Option<String>,
    pub show_document_types: bool,
    pub show_fields: bool,
}

pub async fn run(config: Config) -> Result<String> {
    let settings_path = config.settings_path.as_deref().map(Path::new);
    let settings = settings::load_settings(settings_path)?;
    let catalog = HttpCatalog::from_settings(&settings)?;
    let recognizer = TesseractRecognizer::from_settings(&settings);
    let ingestion = if config.submit {
        Some(IngestionClient::from_settings(&settings)?)
    } else {
        None
    };
    let mut session = SessionContext::new(settings);
    run_session(&config, &mut session, &catalog, &recognizer, ingestion.as_ref()).await
}

/// One-shot capture against explicit collaborators: load, select the
/// document type, apply regions then assignments, validate, write, and
/// optionally post.
pub async fn run_session<C, R>(
    config: &Config,
    session: &mut SessionContext,
    catalog: &C,
    recognizer: &R,
    ingestion: Option<&IngestionClient>,
) -> Result<String>
where
    C: Catalog + ?Sized,
    R: TextRecognizer + ?Sized,
{
    if config.show_document_types || config.show_fields {
        return show_catalog(config, session, catalog).await;
    }

    let data = config
        .data
        .as_deref()
        .ok_or_else(|| anyhow!("--data is required (or use -i for interactive mode)"))?;
    session.load_document(Path::new(data))?;
    if let Some(page) = config.page {
        session.document_mut()?.goto_page(page)?;
    }
    if let Some(scale) = config.scale {
        session.set_scale(scale)?;
    }
    let doctype = config
        .doctype
        .as_deref()
        .ok_or_else(|| anyhow!("--doctype is required"))?;
    session.select_document_type(catalog, doctype).await?;

    let mut lines = Vec::new();
    for target in &config.regions {
        session.select_field(&target.field)?;
        let extraction = session
            .draw_region(target.region, recognizer)
            .with_context(|| format!("OCR failed for field '{}'", target.field))?;
        lines.push(format_extraction(&target.field, &extraction));
    }
    for assignment in &config.assignments {
        if let Some(warning) = session.set_value(&assignment.field, &assignment.value)? {
            lines.push(warning);
        }
    }
    if let Some(output) = config.output.as_deref() {
        session.set_output_path(output);
    }
    if config.no_annotations {
        session.set_include_annotations(false);
    }

    let report = session.submit(ingestion).await?;
    lines.push(format_values(session));
    lines.push(format!("saved {}", report.artifact.display()));
    match report.outcome {
        Some(SubmitOutcome::Accepted) => lines.push("submission accepted".to_string()),
        Some(SubmitOutcome::Rejected { status }) => {
            return Err(anyhow!(
                "failed to send data to the ingestion API: status {} (artifact kept at {})",
                status,
                report.artifact.display()
            ));
        }
        None => {}
    }
    Ok(lines.join("\n"))
}

async fn show_catalog<C: Catalog + ?Sized>(
    config: &Config,
    session: &mut SessionContext,
    catalog: &C,
) -> Result<String> {
    let mut sections = Vec::new();
    if config.show_document_types {
        let types = session.refresh_document_types(catalog).await?;
        sections.push(format_document_types(types));
    }
    if config.show_fields {
        let doctype = config
            .doctype
            .as_deref()
            .ok_or_else(|| anyhow!("--show-fields requires --doctype"))?;
        session.select_document_type(catalog, doctype).await?;
        sections.push(format_fields(session.fields()));
    }
    Ok(sections.join("\n"))
}

pub fn format_extraction(field: &str, extraction: &ocr::Extraction) -> String {
    if extraction.is_blank() {
        format!("{}: no text recognized in {}", field, extraction.display)
    } else {
        format!("{}: {}", field, extraction.text)
    }
}

pub fn format_document_types(types: &[DocumentType]) -> String {
    types
        .iter()
        .map(|doc| format!("{}\t{}", doc.id, doc.label))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_fields(fields: &[MetadataFieldDefinition]) -> String {
    if fields.is_empty() {
        return "(no metadata fields)".to_string();
    }
    fields
        .iter()
        .map(|field| {
            let mut line = format!("{}\t{}", field.id, field.display_label());
            if field.is_lookup() {
                line.push_str(&format!("\t[{}]", field.lookup.join("|")));
            }
            if let Some(pattern) = field.pattern() {
                line.push_str(&format!("\t/{}/", pattern));
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn format_values(session: &SessionContext) -> String {
    let active = session.active_field().map(|field| field.id);
    session
        .fields()
        .iter()
        .map(|field| {
            let marker = if Some(field.id) == active { ">" } else { " " };
            let value = session.values().get(field.id).unwrap_or("");
            format!("{} {}: {}", marker, field.display_label(), value)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::testing::FakeRecognizer;
    use crate::session::testing::MemoryCatalog;
    use crate::settings::Settings;
    use image::{DynamicImage, ImageFormat};

    fn write_png(dir: &Path) -> String {
        let path = dir.join("scan.png");
        DynamicImage::new_rgb8(300, 200)
            .save_with_format(&path, ImageFormat::Png)
            .unwrap();
        path.display().to_string()
    }

    #[test]
    fn field_region_and_assignment_parse() {
        let target = FieldRegion::parse("Invoice number=10,10,100,40").unwrap();
        assert_eq!(target.field, "Invoice number");
        assert_eq!(target.region, Region::new(10, 10, 100, 40));
        assert!(FieldRegion::parse("=1,2,3,4").is_err());
        assert!(FieldRegion::parse("1,2,3,4").is_err());

        let assignment = FieldAssignment::parse("Notes=a=b").unwrap();
        assert_eq!(assignment.field, "Notes");
        assert_eq!(assignment.value, "a=b");
    }

    #[tokio::test]
    async fn one_shot_capture_writes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("out.json");
        let config = Config {
            data: Some(write_png(dir.path())),
            doctype: Some("Invoice".to_string()),
            regions: vec![FieldRegion::parse("Invoice number=0,0,50,20").unwrap()],
            assignments: vec![FieldAssignment::parse("Currency=USD").unwrap()],
            output: Some(output.display().to_string()),
            no_annotations: true,
            ..Config::default()
        };
        let mut session = SessionContext::new(Settings::default());
        let summary = run_session(
            &config,
            &mut session,
            &MemoryCatalog::invoice(),
            &FakeRecognizer::reading("INV-42\n"),
            None,
        )
        .await
        .unwrap();

        assert!(summary.contains("Invoice number: INV-42"));
        assert!(summary.contains(&format!("saved {}", output.display())));
        let record: SubmissionRecord =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(record.doctype_id, 1);
        assert_eq!(record.docmeta_data[0].value, "INV-42");
        assert_eq!(record.docmeta_data[1].value, "USD");
        assert_eq!(record.annotations, None);
    }

    #[tokio::test]
    async fn assignments_override_region_text() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            data: Some(write_png(dir.path())),
            doctype: Some("1".to_string()),
            regions: vec![FieldRegion::parse("3=0,0,10,10").unwrap()],
            assignments: vec![FieldAssignment::parse("Invoice number=INV-7").unwrap()],
            output: Some(dir.path().join("data.json").display().to_string()),
            ..Config::default()
        };
        let mut session = SessionContext::new(Settings::default());
        run_session(
            &config,
            &mut session,
            &MemoryCatalog::invoice(),
            &FakeRecognizer::reading("garbage"),
            None,
        )
        .await
        .unwrap();
        assert_eq!(session.values().get(3), Some("INV-7"));
    }

    #[tokio::test]
    async fn validation_errors_fail_the_run() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("data.json");
        let config = Config {
            data: Some(write_png(dir.path())),
            doctype: Some("Invoice".to_string()),
            output: Some(output.display().to_string()),
            ..Config::default()
        };
        let mut session = SessionContext::new(Settings::default());
        let err = run_session(
            &config,
            &mut session,
            &MemoryCatalog::invoice(),
            &FakeRecognizer::reading(""),
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "Field 'Invoice number' is required.");
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn show_flags_list_catalog_contents() {
        let config = Config {
            show_document_types: true,
            show_fields: true,
            doctype: Some("Invoice".to_string()),
            ..Config::default()
        };
        let mut session = SessionContext::new(Settings::default());
        let output = run_session(
            &config,
            &mut session,
            &MemoryCatalog::invoice(),
            &FakeRecognizer::reading(""),
            None,
        )
        .await
        .unwrap();
        assert_eq!(
            output.lines().collect::<Vec<_>>(),
            vec![
                "1\tInvoice",
                "2\tContract",
                "3\tInvoice number *\t/^INV-\\d+/",
                "5\tCurrency\t[EUR|USD]",
            ]
        );
    }
}
