use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;
use tracing::debug;

// 3x3 sharpen kernel (weights sum to 16, normalized by filter3x3).
const SHARPEN_KERNEL: [f32; 9] = [-2.0, -2.0, -2.0, -2.0, 32.0, -2.0, -2.0, -2.0, -2.0];

/// Rasterizes every page of `pdf_bytes` at `dpi`, in page order.
pub fn render_pdf_pages(pdf_bytes: &[u8], dpi: u32, sharpen: bool) -> Result<Vec<DynamicImage>> {
    let pages = render_pdf_page_pngs(pdf_bytes, dpi)?;
    if pages.is_empty() {
        return Err(anyhow!("no pages found in pdf"));
    }
    pages
        .iter()
        .enumerate()
        .map(|(index, bytes)| {
            let image = image::load_from_memory(bytes)
                .with_context(|| format!("failed to decode rendered pdf page {}", index + 1))?;
            Ok(if sharpen { sharpen_page(&image) } else { image })
        })
        .collect()
}

pub fn sharpen_page(image: &DynamicImage) -> DynamicImage {
    image.filter3x3(&SHARPEN_KERNEL)
}

fn render_pdf_page_pngs(pdf_bytes: &[u8], dpi: u32) -> Result<Vec<Vec<u8>>> {
    let dir = tempdir().with_context(|| "failed to create temp dir for pdf")?;
    let input_path = dir.path().join("input.pdf");
    fs::write(&input_path, pdf_bytes).with_context(|| "failed to write temp pdf")?;
    let dpi = dpi.to_string();

    let mut mutool = Command::new("mutool");
    mutool
        .arg("draw")
        .arg("-r")
        .arg(&dpi)
        .arg("-o")
        .arg(dir.path().join("page-%03d.png"))
        .arg(&input_path);
    let mut pdftoppm = Command::new("pdftoppm");
    pdftoppm
        .arg("-png")
        .arg("-r")
        .arg(&dpi)
        .arg(&input_path)
        .arg(dir.path().join("page"));

    for (name, command) in [("mutool", &mut mutool), ("pdftoppm", &mut pdftoppm)] {
        if run_renderer(name, command)? {
            debug!("rendered pdf with {} at {} dpi", name, dpi);
            return collect_page_pngs(dir.path());
        }
    }
    Err(anyhow!(
        "pdf rendering requires mutool or pdftoppm (install mupdf or poppler)"
    ))
}

/// `Ok(false)` when the renderer is not installed.
fn run_renderer(name: &str, command: &mut Command) -> Result<bool> {
    let output = match command.output() {
        Ok(output) => output,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err).with_context(|| format!("failed to run {}", name)),
    };
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("{} failed: {}", name, stderr.trim()));
    }
    Ok(true)
}

fn collect_page_pngs(dir: &Path) -> Result<Vec<Vec<u8>>> {
    let mut entries: Vec<_> = fs::read_dir(dir)
        .with_context(|| "failed to read temp pdf directory")?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| is_page_png(path))
        .collect();
    entries.sort();

    entries
        .iter()
        .map(|path| fs::read(path).with_context(|| "failed to read rendered pdf page"))
        .collect()
}

fn is_page_png(path: &Path) -> bool {
    let named_page = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with("page"))
        .unwrap_or(false);
    let png = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("png"))
        .unwrap_or(false);
    named_page && png
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    #[test]
    fn page_pngs_are_collected_in_order() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("page-002.png"), b"two").unwrap();
        fs::write(dir.path().join("page-001.png"), b"one").unwrap();
        fs::write(dir.path().join("input.pdf"), b"%PDF").unwrap();
        let pages = collect_page_pngs(dir.path()).unwrap();
        assert_eq!(pages, vec![b"one".to_vec(), b"two".to_vec()]);
    }

    #[test]
    fn missing_renderer_is_skipped() {
        let mut command = Command::new("docmeta-capture-no-such-renderer");
        let ran = run_renderer("docmeta-capture-no-such-renderer", &mut command).unwrap();
        assert!(!ran);
    }

    #[test]
    fn sharpening_keeps_flat_pages_flat() {
        let page = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(
            8,
            8,
            image::Luma([180u8]),
        ));
        let sharpened = sharpen_page(&page);
        assert_eq!(sharpened.dimensions(), (8, 8));
        assert_eq!(sharpened.to_luma8().get_pixel(4, 4)[0], 180);
    }
}
