use std::cell::RefCell;

use anyhow::{anyhow, Result};
use docmeta_capture::catalog::CatalogFuture;
use docmeta_capture::data::{DocumentFile, PDF_MIME};
use docmeta_capture::document::LoadedDocument;
use docmeta_capture::settings::Settings;
use docmeta_capture::{
    Catalog, DocumentType, MetadataFieldDefinition, Packaging, Region, SessionContext,
    SubmissionRecord, TextRecognizer,
};
use image::{DynamicImage, GenericImageView};

struct InvoiceCatalog;

impl Catalog for InvoiceCatalog {
    fn document_types(&self) -> CatalogFuture<'_, Vec<DocumentType>> {
        Box::pin(async {
            Ok::<_, anyhow::Error>(vec![DocumentType {
                id: 4,
                label: "Invoice".to_string(),
            }])
        })
    }

    fn metadata_fields(
        &self,
        document_type_id: u64,
    ) -> CatalogFuture<'_, Vec<MetadataFieldDefinition>> {
        Box::pin(async move {
            if document_type_id != 4 {
                return Err(anyhow!("unknown document type {}", document_type_id));
            }
            Ok(vec![
                MetadataFieldDefinition::new(11, "Invoice number")
                    .required()
                    .with_pattern(r"^INV-\d+"),
                MetadataFieldDefinition::new(12, "Notes"),
            ])
        })
    }
}

/// Answers with a fixed text and remembers the size of every crop.
struct ScriptedRecognizer {
    text: String,
    crops: RefCell<Vec<(u32, u32)>>,
}

impl TextRecognizer for ScriptedRecognizer {
    fn name(&self) -> &str {
        "scripted"
    }

    fn recognize(&self, crop: &DynamicImage) -> Result<String> {
        self.crops.borrow_mut().push(crop.dimensions());
        Ok(self.text.clone())
    }
}

fn two_page_pdf() -> LoadedDocument {
    let file = DocumentFile {
        bytes: b"%PDF-1.4 two page invoice".to_vec(),
        mime: PDF_MIME.to_string(),
        name: "invoice.pdf".to_string(),
    };
    LoadedDocument::from_pages(
        file,
        vec![
            DynamicImage::new_rgb8(1200, 1600),
            DynamicImage::new_rgb8(900, 1200),
        ],
    )
    .unwrap()
}

#[tokio::test]
async fn capture_on_second_page_maps_region_and_submits_record() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("data.json");

    let mut session = SessionContext::new(Settings::default());
    session.set_output_path(&output);
    session.set_document(two_page_pdf());
    session.document_mut().unwrap().goto_page(2).unwrap();
    session.set_scale(3.0).unwrap();
    session
        .select_document_type(&InvoiceCatalog, "invoice")
        .await
        .unwrap();

    let recognizer = ScriptedRecognizer {
        text: "INV-2024-001\n".to_string(),
        crops: RefCell::new(Vec::new()),
    };
    let extraction = session
        .draw_region(Region::new(10, 10, 100, 40), &recognizer)
        .unwrap();

    assert_eq!(extraction.source, Region::new(30, 30, 300, 120));
    assert_eq!(recognizer.crops.borrow().as_slice(), &[(300, 120)]);
    assert_eq!(session.values().get(11), Some("INV-2024-001"));
    assert!(session.validate().is_empty());

    let record = match session.package().unwrap() {
        Packaging::Ready(record) => record,
        Packaging::Blocked(errors) => panic!("unexpected validation errors: {:?}", errors),
    };
    assert_eq!(record.doctype_id, 4);
    assert_eq!(record.file_name, "invoice.pdf");
    assert_eq!(record.annotations, Some(vec![Region::new(10, 10, 100, 40)]));

    let report = session.submit(None).await.unwrap();
    assert_eq!(report.outcome, None);
    let written: SubmissionRecord =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written, record);
}

#[tokio::test]
async fn blank_required_field_blocks_submission() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("data.json");

    let mut session = SessionContext::new(Settings::default());
    session.set_output_path(&output);
    session.set_document(two_page_pdf());
    session
        .select_document_type(&InvoiceCatalog, "4")
        .await
        .unwrap();

    let recognizer = ScriptedRecognizer {
        text: "   ".to_string(),
        crops: RefCell::new(Vec::new()),
    };
    let extraction = session
        .draw_region(Region::new(0, 0, 50, 50), &recognizer)
        .unwrap();
    assert!(extraction.is_blank());

    assert_eq!(
        session.validate(),
        vec!["Field 'Invoice number' is required.".to_string()]
    );
    assert!(session.submit(None).await.is_err());
    assert!(!output.exists());
}
