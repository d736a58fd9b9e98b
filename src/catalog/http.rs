use anyhow::{anyhow, Context, Result};
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

use super::legacy::{parse_document_type_page, parse_metadata_fields};
use super::{Catalog, CatalogFuture, DocumentType, MetadataFieldDefinition};
use crate::settings::Settings;

/// Catalog backed by the DMS REST API (`/document_types/...`), using HTTP
/// basic authentication.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl HttpCatalog {
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .with_context(|| "failed to build catalog http client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            username: username.into(),
            password: password.into(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::new(
            settings.catalog_base_url.clone(),
            settings.catalog_username.clone(),
            settings.catalog_password.clone(),
            Duration::from_secs(settings.http_timeout_secs),
        )
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await
            .with_context(|| format!("catalog request failed: {}", url))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("failed to read catalog response: {}", url))?;
        if !status.is_success() {
            return Err(anyhow!(
                "catalog request {} failed with status {}: {}",
                url,
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            ));
        }
        Ok(body)
    }

    pub async fn list_document_types(&self) -> Result<Vec<DocumentType>> {
        let mut document_types = Vec::new();
        let mut visited = HashSet::new();
        let mut next_url = Some(format!("{}/document_types/", self.base_url));
        while let Some(url) = next_url.take() {
            if !visited.insert(url.clone()) {
                return Err(anyhow!("document type pagination loops back to {}", url));
            }
            let body = self.get_text(&url).await?;
            let page = parse_document_type_page(&body)?;
            debug!(
                "fetched {} document type(s), next={:?}",
                page.results.len(),
                page.next
            );
            document_types.extend(page.results);
            next_url = page.next;
        }
        Ok(document_types)
    }

    pub async fn list_metadata_fields(
        &self,
        document_type_id: u64,
    ) -> Result<Vec<MetadataFieldDefinition>> {
        let url = format!(
            "{}/document_types/{}/metadata_types/",
            self.base_url, document_type_id
        );
        let body = self.get_text(&url).await?;
        parse_metadata_fields(&body)
    }
}

impl Catalog for HttpCatalog {
    fn document_types(&self) -> CatalogFuture<'_, Vec<DocumentType>> {
        Box::pin(self.list_document_types())
    }

    fn metadata_fields(
        &self,
        document_type_id: u64,
    ) -> CatalogFuture<'_, Vec<MetadataFieldDefinition>> {
        Box::pin(self.list_metadata_fields(document_type_id))
    }
}
