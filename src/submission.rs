use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::binding::FieldValueMap;
use crate::catalog::MetadataFieldDefinition;
use crate::data::{DocumentFile, JSON_MIME};
use crate::region::Region;
use crate::settings::Settings;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataValue {
    pub id: u64,
    pub value: String,
}

/// Payload accepted by the ingestion endpoint. Built once per submission and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub file_base64: String,
    pub dms_domain: String,
    pub file_name: String,
    pub doctype_id: u64,
    pub docmeta_data: Vec<MetadataValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<Region>>,
}

impl SubmissionRecord {
    /// `docmeta_data` follows the order of `fields`; fields with no entry in
    /// `values` are sent as empty strings.
    pub fn build(
        file: &DocumentFile,
        doctype_id: u64,
        fields: &[MetadataFieldDefinition],
        values: &FieldValueMap,
        annotations: Option<&[Region]>,
        dms_domain: &str,
    ) -> Self {
        let docmeta_data = fields
            .iter()
            .map(|field| MetadataValue {
                id: field.id,
                value: values.get(field.id).unwrap_or("").to_string(),
            })
            .collect();
        Self {
            file_base64: BASE64.encode(&file.bytes),
            dms_domain: dms_domain.to_string(),
            file_name: file.name.clone(),
            doctype_id,
            docmeta_data,
            annotations: annotations.map(<[Region]>::to_vec),
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).with_context(|| "failed to serialize submission record")
    }
}

pub fn write_artifact(record: &SubmissionRecord, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    let json = record.to_json_pretty()?;
    fs::write(path, json).with_context(|| format!("failed to write artifact: {}", path.display()))?;
    debug!("wrote submission artifact to {}", path.display());
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    Rejected { status: u16 },
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted)
    }
}

#[derive(Debug, Clone)]
pub struct IngestionClient {
    client: reqwest::Client,
    url: String,
}

impl IngestionClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .with_context(|| "failed to build ingestion http client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            settings.ingestion_url.clone(),
            Duration::from_secs(settings.http_timeout_secs),
        )
    }

    /// Posts the record once. Only a 200 counts as accepted.
    pub async fn submit(&self, record: &SubmissionRecord) -> Result<SubmitOutcome> {
        let body = record.to_json_pretty()?;
        info!(
            "submitting {} ({} field(s)) to {}",
            record.file_name,
            record.docmeta_data.len(),
            self.url
        );
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, JSON_MIME)
            .body(body)
            .send()
            .await
            .map_err(|err| anyhow!("ingestion request to {} failed: {}", self.url, err))?;
        let status = response.status().as_u16();
        if status == 200 {
            info!("submission accepted");
            Ok(SubmitOutcome::Accepted)
        } else {
            let text = response.text().await.unwrap_or_default();
            debug!("ingestion rejected with {}: {}", status, text);
            Ok(SubmitOutcome::Rejected { status })
        }
    }
}
