use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::process::Command;

use super::TextRecognizer;

/// Runs the `tesseract` CLI on a temporary PNG of the crop.
#[derive(Debug, Clone)]
pub struct TesseractRecognizer {
    binary: String,
    language: String,
    psm: u32,
}

impl TesseractRecognizer {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            binary: "tesseract".to_string(),
            language: language.into(),
            psm: 6,
        }
    }

    pub fn with_psm(mut self, psm: u32) -> Self {
        self.psm = psm;
        self
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn from_settings(settings: &crate::settings::Settings) -> Self {
        Self::new(settings.ocr_language.clone())
            .with_psm(settings.ocr_psm)
            .with_binary(settings.ocr_binary.clone())
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn name(&self) -> &str {
        &self.binary
    }

    fn recognize(&self, crop: &DynamicImage) -> Result<String> {
        let mut tmp = tempfile::Builder::new()
            .suffix(".png")
            .tempfile()
            .with_context(|| "failed to create temp file for OCR")?;
        crop.write_to(&mut tmp, image::ImageFormat::Png)
            .with_context(|| "failed to write temp image for OCR")?;
        tmp.flush().ok();

        self.run(tmp.path())
    }
}

impl TesseractRecognizer {
    fn run(&self, path: &Path) -> Result<String> {
        let output = match Command::new(&self.binary)
            .arg(path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .arg("--psm")
            .arg(self.psm.to_string())
            .output()
        {
            Ok(output) => output,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(anyhow!(
                    "OCR backend unavailable: '{}' was not found on PATH (install tesseract-ocr)",
                    self.binary
                ));
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to run {}", self.binary));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("{} failed: {}", self.binary, stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}
