use std::fs::File;
use std::time::Duration;

use reqwest::blocking::{Body, Client};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::{Credentials, Endpoints, ResolvedConfig};
use crate::domain::ItemId;
use crate::error::UploadError;
use crate::metadata::Metadata;

#[derive(Debug)]
pub struct UploadFile {
    pub name: String,
    pub file: File,
    pub len: u64,
}

pub trait ArchiveService: Send + Sync {
    fn exists(&self, identifier: &ItemId) -> Result<bool, UploadError>;
    fn upload(
        &self,
        identifier: &ItemId,
        files: Vec<UploadFile>,
        metadata: &Metadata,
    ) -> Result<(), UploadError>;
}

#[derive(Clone)]
pub struct IaSession {
    client: Client,
    credentials: Option<Credentials>,
    endpoints: Endpoints,
}

impl IaSession {
    pub fn new(
        credentials: Option<Credentials>,
        endpoints: Endpoints,
        timeout: Duration,
    ) -> Result<Self, UploadError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("scan-upload/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| UploadError::ArchiveHttp(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| UploadError::ArchiveHttp(err.to_string()))?;
        Ok(Self {
            client,
            credentials,
            endpoints,
        })
    }

    pub fn from_config(config: &ResolvedConfig) -> Result<Self, UploadError> {
        Self::new(
            config.credentials.clone(),
            config.endpoints.clone(),
            config.timeout,
        )
    }

    pub fn metadata_url(&self, identifier: &ItemId) -> String {
        format!("{}/metadata/{}", self.endpoints.metadata_url, identifier.as_str())
    }

    pub fn upload_url(&self, identifier: &ItemId, name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoints.s3_url,
            identifier.as_str(),
            urlencoding::encode(name)
        )
    }

    fn handle_status(
        response: reqwest::blocking::Response,
    ) -> Result<reqwest::blocking::Response, UploadError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response
            .text()
            .unwrap_or_else(|_| "Internet Archive request failed".to_string());
        Err(UploadError::ArchiveStatus { status, message })
    }

    fn upload_headers(
        &self,
        file: &UploadFile,
        metadata: &Metadata,
    ) -> Result<HeaderMap, UploadError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(UploadError::MissingCredentials)?;
        let mut headers = metadata_headers(metadata)?;
        let authorization = format!("LOW {}:{}", credentials.access, credentials.secret);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&authorization).map_err(|_| {
                UploadError::InvalidConfig("credentials contain invalid characters".to_string())
            })?,
        );
        headers.insert("x-archive-auto-make-bucket", HeaderValue::from_static("1"));
        headers.insert("x-archive-queue-derive", HeaderValue::from_static("1"));
        headers.insert(
            "x-archive-size-hint",
            HeaderValue::from_str(&file.len.to_string())
                .map_err(|err| UploadError::ArchiveHttp(err.to_string()))?,
        );
        Ok(headers)
    }
}

impl ArchiveService for IaSession {
    fn exists(&self, identifier: &ItemId) -> Result<bool, UploadError> {
        let url = self.metadata_url(identifier);
        debug!(%url, "checking item existence");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|err| UploadError::ArchiveHttp(err.to_string()))?;
        let response = Self::handle_status(response)?;
        let body: Value = response
            .json()
            .map_err(|err| UploadError::ArchiveHttp(err.to_string()))?;
        Ok(item_exists(&body))
    }

    fn upload(
        &self,
        identifier: &ItemId,
        files: Vec<UploadFile>,
        metadata: &Metadata,
    ) -> Result<(), UploadError> {
        for file in files {
            let url = self.upload_url(identifier, &file.name);
            let headers = self.upload_headers(&file, metadata)?;
            info!(item = %identifier, file = %file.name, bytes = file.len, "uploading");
            let response = self
                .client
                .put(&url)
                .headers(headers)
                .body(Body::sized(file.file, file.len))
                .send()
                .map_err(|err| UploadError::ArchiveHttp(err.to_string()))?;
            Self::handle_status(response)?;
            info!(item = %identifier, file = %file.name, "upload accepted");
        }
        Ok(())
    }
}

/// The metadata API answers `{}` for identifiers that are not taken.
pub fn item_exists(body: &Value) -> bool {
    body.as_object()
        .map(|object| !object.is_empty())
        .unwrap_or(false)
}

/// One `x-archive-meta-*` header per metadata field.
///
/// Underscores in field names travel as `--`. Values outside printable
/// ASCII are sent as `uri(<percent-encoded>)`.
pub fn metadata_headers(metadata: &Metadata) -> Result<HeaderMap, UploadError> {
    let mut headers = HeaderMap::new();
    for (key, value) in metadata {
        let name = format!("x-archive-meta-{}", key.replace('_', "--"));
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| UploadError::InvalidMetadataField(key.clone()))?;
        let value = if is_plain_header_text(value) {
            value.clone()
        } else {
            format!("uri({})", urlencoding::encode(value))
        };
        let value = HeaderValue::from_str(&value)
            .map_err(|_| UploadError::InvalidMetadataField(key.clone()))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

fn is_plain_header_text(value: &str) -> bool {
    value
        .chars()
        .all(|ch| ch.is_ascii() && !ch.is_ascii_control())
}
