use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SETTINGS_TOML: &str = include_str!("../settings.toml");
pub const PASSWORD_ENV: &str = "DOCMETA_CATALOG_PASSWORD";

#[derive(Debug, Clone)]
pub struct Settings {
    pub catalog_base_url: String,
    pub catalog_username: String,
    pub catalog_password: String,
    pub ingestion_url: String,
    pub dms_domain: String,
    pub ocr_language: String,
    pub ocr_psm: u32,
    pub ocr_binary: String,
    pub pdf_dpi: u32,
    pub pdf_sharpen: bool,
    pub artifact_path: PathBuf,
    pub include_annotations: bool,
    pub http_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog_base_url: "https://edms-demo.epik.live/api/v4".to_string(),
            catalog_username: "admin".to_string(),
            catalog_password: String::new(),
            ingestion_url: "https://dms.api.epik.live/api/processBase64File".to_string(),
            dms_domain: "edms-demo.epik.live".to_string(),
            ocr_language: "eng".to_string(),
            ocr_psm: 6,
            ocr_binary: "tesseract".to_string(),
            pdf_dpi: 300,
            pdf_sharpen: true,
            artifact_path: PathBuf::from("data.json"),
            include_annotations: true,
            http_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SettingsFile {
    catalog: Option<CatalogSettings>,
    ingestion: Option<IngestionSettings>,
    ocr: Option<OcrSettings>,
    pdf: Option<PdfSettings>,
    output: Option<OutputSettings>,
    http: Option<HttpSettings>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogSettings {
    base_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct IngestionSettings {
    url: Option<String>,
    dms_domain: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OcrSettings {
    language: Option<String>,
    psm: Option<u32>,
    binary: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PdfSettings {
    dpi: Option<u32>,
    sharpen: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct OutputSettings {
    artifact: Option<String>,
    annotations: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct HttpSettings {
    timeout_secs: Option<u64>,
}

pub fn load_settings(extra_path: Option<&Path>) -> Result<Settings> {
    if let Some(extra) = extra_path {
        if !extra.exists() {
            return Err(anyhow!("settings file not found: {}", extra.display()));
        }
    }

    let mut settings = Settings::default();
    ensure_home_settings_file()?;

    let mut ordered_paths = Vec::new();
    ordered_paths.push(PathBuf::from("settings.toml"));
    ordered_paths.push(PathBuf::from("settings.local.toml"));

    if let Some(home) = home_dir() {
        ordered_paths.push(home.join("settings.toml"));
        ordered_paths.push(home.join("settings.local.toml"));
    }

    if let Some(extra) = extra_path {
        ordered_paths.push(extra.to_path_buf());
    }

    for path in ordered_paths {
        if path.exists() {
            let content = fs::read_to_string(&path)
                .with_context(|| format!("failed to read settings: {}", path.display()))?;
            settings
                .merge_toml(&content)
                .with_context(|| format!("failed to parse settings: {}", path.display()))?;
        }
    }

    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        if !password.is_empty() {
            settings.catalog_password = password;
        }
    }

    Ok(settings)
}

impl Settings {
    pub fn merge_toml(&mut self, content: &str) -> Result<()> {
        let parsed: SettingsFile = toml::from_str(content)?;
        self.merge(parsed);
        Ok(())
    }

    fn merge(&mut self, incoming: SettingsFile) {
        if let Some(catalog) = incoming.catalog {
            if let Some(url) = non_blank(catalog.base_url) {
                self.catalog_base_url = url.trim_end_matches('/').to_string();
            }
            if let Some(username) = non_blank(catalog.username) {
                self.catalog_username = username;
            }
            if let Some(password) = non_blank(catalog.password) {
                self.catalog_password = password;
            }
        }
        if let Some(ingestion) = incoming.ingestion {
            if let Some(url) = non_blank(ingestion.url) {
                self.ingestion_url = url;
            }
            if let Some(domain) = non_blank(ingestion.dms_domain) {
                self.dms_domain = domain;
            }
        }
        if let Some(ocr) = incoming.ocr {
            if let Some(language) = non_blank(ocr.language) {
                self.ocr_language = language;
            }
            if let Some(psm) = ocr.psm {
                self.ocr_psm = psm;
            }
            if let Some(binary) = non_blank(ocr.binary) {
                self.ocr_binary = binary;
            }
        }
        if let Some(pdf) = incoming.pdf {
            if let Some(dpi) = pdf.dpi {
                if dpi > 0 {
                    self.pdf_dpi = dpi;
                }
            }
            if let Some(sharpen) = pdf.sharpen {
                self.pdf_sharpen = sharpen;
            }
        }
        if let Some(output) = incoming.output {
            if let Some(artifact) = non_blank(output.artifact) {
                self.artifact_path = PathBuf::from(artifact);
            }
            if let Some(annotations) = output.annotations {
                self.include_annotations = annotations;
            }
        }
        if let Some(http) = incoming.http {
            if let Some(timeout) = http.timeout_secs {
                if timeout > 0 {
                    self.http_timeout_secs = timeout;
                }
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

fn ensure_home_settings_file() -> Result<()> {
    let Some(home) = home_dir() else {
        return Ok(());
    };
    fs::create_dir_all(&home)
        .with_context(|| format!("failed to create settings directory: {}", home.display()))?;
    let path = home.join("settings.toml");
    if !path.exists() {
        fs::write(&path, DEFAULT_SETTINGS_TOML)
            .with_context(|| format!("failed to write settings: {}", path.display()))?;
    }
    Ok(())
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().and_then(|home| {
        let home = home.trim();
        if home.is_empty() {
            None
        } else {
            Some(Path::new(home).join(".docmeta-capture"))
        }
    })
}
