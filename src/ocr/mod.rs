mod tesseract;

use anyhow::Result;
use image::{DynamicImage, GenericImageView};
use tracing::debug;

use crate::region::{self, Region};

pub use tesseract::TesseractRecognizer;

/// OCR backend seam. `recognize` receives the already-cropped region and
/// returns the raw text; an `Err` means the backend itself failed, which is
/// reported differently from an empty reading.
pub trait TextRecognizer {
    fn name(&self) -> &str;
    fn recognize(&self, crop: &DynamicImage) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub display: Region,
    pub source: Region,
    pub text: String,
}

impl Extraction {
    pub fn is_blank(&self) -> bool {
        self.text.is_empty()
    }
}

/// Maps `drawn` (display coordinates) onto the page buffer, crops it and
/// runs OCR on the crop. Empty crops short-circuit to an empty reading
/// without touching the recognizer.
pub fn extract_text<R: TextRecognizer + ?Sized>(
    image: &DynamicImage,
    drawn: Region,
    scale: f64,
    recognizer: &R,
) -> Result<Extraction> {
    let (width, height) = image.dimensions();
    let source = drawn.to_source(scale).clamp_to(width, height);
    if source.is_empty() {
        debug!("region {} maps to an empty crop; skipping OCR", drawn);
        return Ok(Extraction {
            display: drawn,
            source,
            text: String::new(),
        });
    }

    let crop = region::crop(image, &source);
    debug!(
        "running {} on {}x{} crop at {}",
        recognizer.name(),
        crop.width(),
        crop.height(),
        source
    );
    let text = recognizer.recognize(&crop)?.trim().to_string();
    Ok(Extraction {
        display: drawn,
        source,
        text,
    })
}


#[cfg(test)]
mod tests {
    use super::testing::FakeRecognizer;
    use super::*;

    #[test]
    fn text_is_trimmed_and_crop_uses_source_coordinates() {
        let image = DynamicImage::new_rgb8(600, 400);
        let recognizer = FakeRecognizer::reading("  INV-2024-001\n\n");
        let extraction =
            extract_text(&image, Region::new(10, 10, 100, 40), 3.0, &recognizer).unwrap();
        assert_eq!(extraction.text, "INV-2024-001");
        assert_eq!(extraction.source, Region::new(30, 30, 300, 120));
        assert_eq!(recognizer.seen.borrow().as_slice(), &[(300, 120)]);
    }

    #[test]
    fn empty_region_yields_empty_text_without_ocr() {
        let image = DynamicImage::new_rgb8(100, 100);
        let recognizer = FakeRecognizer::failing("tesseract missing");
        let extraction =
            extract_text(&image, Region::new(10, 10, 0, 20), 1.0, &recognizer).unwrap();
        assert!(extraction.is_blank());
        assert!(recognizer.seen.borrow().is_empty());
    }

    #[test]
    fn backend_failure_is_an_error_not_blank_text() {
        let image = DynamicImage::new_rgb8(100, 100);
        let recognizer = FakeRecognizer::failing("tesseract missing");
        let err = extract_text(&image, Region::new(0, 0, 10, 10), 1.0, &recognizer).unwrap_err();
        assert!(err.to_string().contains("tesseract missing"));
    }
}
