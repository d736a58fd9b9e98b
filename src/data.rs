use anyhow::{anyhow, Context, Result};
use std::path::Path;

pub const PDF_MIME: &str = "application/pdf";
pub const PNG_MIME: &str = "image/png";
pub const JPEG_MIME: &str = "image/jpeg";
pub const JSON_MIME: &str = "application/json";

/// Raw bytes of the uploaded file, kept untouched so the submission carries
/// exactly what the user provided.
#[derive(Debug, Clone)]
pub struct DocumentFile {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub name: String,
}

impl DocumentFile {
    pub fn is_pdf(&self) -> bool {
        self.mime == PDF_MIME
    }
}

pub fn load_document_file(path: &Path) -> Result<DocumentFile> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read data file: {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|value| value.to_str())
        .map(|value| value.to_string())
        .unwrap_or_else(|| "document".to_string());
    document_file_from_bytes(bytes, &name)
}

pub fn document_file_from_bytes(bytes: Vec<u8>, name: &str) -> Result<DocumentFile> {
    if bytes.is_empty() {
        return Err(anyhow!("data file '{}' is empty", name));
    }
    let mime = detect_mime(&bytes, Path::new(name))?;
    Ok(DocumentFile {
        bytes,
        mime,
        name: name.to_string(),
    })
}

fn detect_mime(bytes: &[u8], path: &Path) -> Result<String> {
    if let Some(detected) = sniff_mime_bytes(bytes) {
        return Ok(detected.to_string());
    }

    if let Some(ext) = extension_lower(path) {
        if let Some(mime) = mime_from_extension(&ext) {
            return Ok(mime.to_string());
        }
    }

    Err(anyhow!(
        "unsupported file '{}' (expected png, jpg, jpeg or pdf)",
        path.display()
    ))
}

fn sniff_mime_bytes(bytes: &[u8]) -> Option<&'static str> {
    let kind = infer::get(bytes)?;
    let detected = kind.mime_type();
    if detected.starts_with("image/") {
        return Some(detected);
    }
    match detected {
        PDF_MIME => Some(PDF_MIME),
        _ => None,
    }
}

fn extension_lower(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_lowercase())
}

fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "pdf" => Some(PDF_MIME),
        "png" => Some(PNG_MIME),
        "jpg" | "jpeg" => Some(JPEG_MIME),
        _ => None,
    }
}
