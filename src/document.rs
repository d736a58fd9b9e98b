use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, GenericImageView};
use std::path::Path;

use crate::data::DocumentFile;
use crate::pdf;
use crate::settings::Settings;

/// An uploaded file together with its rasterized pages and the page the
/// user is currently looking at.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    file: DocumentFile,
    pages: Vec<DynamicImage>,
    current: usize,
}

impl LoadedDocument {
    pub fn load(file: DocumentFile, settings: &Settings) -> Result<Self> {
        let pages = if file.is_pdf() {
            pdf::render_pdf_pages(&file.bytes, settings.pdf_dpi, settings.pdf_sharpen)
                .with_context(|| format!("error in PDF processing for '{}'", file.name))?
        } else {
            let image = image::load_from_memory(&file.bytes)
                .with_context(|| format!("failed to decode image '{}'", file.name))?;
            vec![image]
        };
        Self::from_pages(file, pages)
    }

    pub fn from_pages(file: DocumentFile, pages: Vec<DynamicImage>) -> Result<Self> {
        if pages.is_empty() {
            return Err(anyhow!("document '{}' has no pages", file.name));
        }
        Ok(Self {
            file,
            pages,
            current: 0,
        })
    }

    pub fn file(&self) -> &DocumentFile {
        &self.file
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Zero-based index of the current page.
    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_page(&self) -> &DynamicImage {
        &self.pages[self.current]
    }

    pub fn next_page(&mut self) -> usize {
        if self.current + 1 < self.pages.len() {
            self.current += 1;
        }
        self.current
    }

    pub fn prev_page(&mut self) -> usize {
        self.current = self.current.saturating_sub(1);
        self.current
    }

    /// Jumps to a one-based page number.
    pub fn goto_page(&mut self, number: usize) -> Result<()> {
        if number == 0 || number > self.pages.len() {
            return Err(anyhow!(
                "page {} is out of range (document has {} page(s))",
                number,
                self.pages.len()
            ));
        }
        self.current = number - 1;
        Ok(())
    }

    /// `Page N of M`, one-based.
    pub fn caption(&self) -> String {
        format!("Page {} of {}", self.current + 1, self.pages.len())
    }

    /// Writes the current page scaled to `display_width` and returns the
    /// display→source scale factor for regions read off that preview.
    pub fn export_preview(&self, path: &Path, display_width: Option<u32>) -> Result<f64> {
        let page = self.current_page();
        let (width, height) = page.dimensions();
        let display_width = display_width.unwrap_or(width);
        if display_width == 0 {
            return Err(anyhow!("preview width must be positive"));
        }
        let scale = width as f64 / display_width as f64;
        let preview = if display_width == width {
            page.clone()
        } else {
            let display_height = ((height as f64 / scale).round() as u32).max(1);
            page.resize_exact(
                display_width,
                display_height,
                image::imageops::FilterType::Triangle,
            )
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create preview dir: {}", parent.display())
                })?;
            }
        }
        preview
            .save(path)
            .with_context(|| format!("failed to write preview: {}", path.display()))?;
        Ok(scale)
    }
}
