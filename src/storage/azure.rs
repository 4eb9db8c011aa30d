//! Azure Blob Storage provider
//!
//! Connection string: `azure://{account}.blob.core.windows.net/{container}?{sas}`.
//! The SAS query is appended verbatim to every request. The container is
//! assumed to exist; nothing is checked until the first request.

use super::{
    http_client, BackupRecord, ConnectionError, ProviderConfig, StorageError, StorageProvider,
};
use chrono::{DateTime, Utc};
use reqwest::blocking::{Client, Response};
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, warn};

pub const PROVIDER_NAME: &str = "azure";

const HOST_SUFFIX: &str = ".blob.core.windows.net";
const API_VERSION: &str = "2021-08-06";

pub struct AzureBlobProvider {
    client: Client,
    account_name: String,
    container_name: String,
    container_url: Url,
    sas_token: Option<String>,
}

pub(crate) fn construct(
    config: &ProviderConfig,
) -> Result<Box<dyn StorageProvider>, ConnectionError> {
    Ok(Box::new(AzureBlobProvider::from_config(config)?))
}

impl AzureBlobProvider {
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ConnectionError> {
        let descriptor = config.descriptor()?;

        if descriptor.scheme() != PROVIDER_NAME {
            return Err(ConnectionError::WrongScheme {
                expected: PROVIDER_NAME,
            });
        }

        let host = descriptor.host().unwrap_or_default().to_lowercase();
        let account_name = host.strip_suffix(HOST_SUFFIX).unwrap_or_default();
        if account_name.is_empty() || account_name.contains('.') {
            return Err(ConnectionError::InvalidHost {
                provider: PROVIDER_NAME,
                host,
                reason: "expected {account}.blob.core.windows.net",
            });
        }
        if descriptor.port().is_some() {
            return Err(ConnectionError::Ambiguous("a port"));
        }

        let container_name = match descriptor.path_segments().as_slice() {
            [container] => container.to_string(),
            [] => {
                return Err(ConnectionError::Invalid(
                    "Container name not found in connection string".to_string(),
                ))
            }
            _ => {
                return Err(ConnectionError::Invalid(
                    "Azure connection string must name exactly one container".to_string(),
                ))
            }
        };

        let container_url = Url::parse(&format!("https://{}/{}", host, container_name))
            .map_err(|e| ConnectionError::Invalid(format!("Invalid Azure container URL: {}", e)))?;

        let sas_token = descriptor.query().map(str::to_string);
        if sas_token.is_none() {
            warn!(
                "Azure connection string for container '{}' has no SAS token; requests will be anonymous",
                container_name
            );
        }

        Ok(Self {
            client: http_client(PROVIDER_NAME, config.timeout)?,
            account_name: account_name.to_string(),
            container_name,
            container_url,
            sas_token,
        })
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    pub fn container_name(&self) -> &str {
        &self.container_name
    }

    /// Blob URL with the SAS token attached
    pub fn blob_url(&self, remote_path: &str) -> Url {
        let mut url = self.container_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.extend(blob_name(remote_path).split('/').filter(|s| !s.is_empty()));
        }
        url.set_query(self.sas_token.as_deref());
        url
    }

    fn list_url(&self, prefix: &str, marker: Option<&str>) -> Url {
        let mut url = self.container_url.clone();
        url.set_query(self.sas_token.as_deref());
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("restype", "container")
                .append_pair("comp", "list")
                .append_pair("prefix", prefix);
            if let Some(marker) = marker {
                query.append_pair("marker", marker);
            }
        }
        url
    }

    fn send(&self, request: reqwest::blocking::RequestBuilder) -> Result<Response, StorageError> {
        request
            .header("x-ms-version", API_VERSION)
            .send()
            .map_err(|source| StorageError::Transport {
                provider: PROVIDER_NAME,
                source,
            })
    }
}

/// Azure blob names carry no leading slash
fn blob_name(remote_path: &str) -> &str {
    remote_path.trim_start_matches('/')
}

/// Directory prefix for listing, always ending in '/'
fn list_prefix(prefix: &str) -> String {
    let trimmed = blob_name(prefix).trim_end_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

fn error_from_response(response: Response) -> StorageError {
    let status = response.status().as_u16();
    let code = response
        .headers()
        .get("x-ms-error-code")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.text().unwrap_or_default();
    classify_error(status, code.as_deref(), body)
}

/// Map an Azure error response to a storage error
fn classify_error(status: u16, code: Option<&str>, body: String) -> StorageError {
    let message = match code {
        Some(code) => code.to_string(),
        None if body.is_empty() => "no error details".to_string(),
        None => body,
    };

    let quota = code
        .map(|c| c.contains("Quota") || c.contains("InsufficientSpace"))
        .unwrap_or(false);
    if status == 507 || quota {
        return StorageError::InsufficientSpace {
            provider: PROVIDER_NAME,
            message,
        };
    }

    StorageError::Http {
        provider: PROVIDER_NAME,
        status,
        message,
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EnumerationResults {
    #[serde(default)]
    blobs: BlobList,
    #[serde(default)]
    next_marker: String,
}

#[derive(Debug, Default, Deserialize)]
struct BlobList {
    #[serde(rename = "Blob", default)]
    blobs: Vec<BlobItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BlobItem {
    name: String,
    properties: BlobProperties,
}

#[derive(Debug, Deserialize)]
struct BlobProperties {
    #[serde(rename = "Last-Modified")]
    last_modified: String,
}

/// Parse one page of a List Blobs response; returns the records and the next marker
fn parse_list_response(xml: &str) -> Result<(Vec<BackupRecord>, Option<String>), StorageError> {
    let xml = xml.trim_start_matches('\u{feff}');
    let results: EnumerationResults =
        quick_xml::de::from_str(xml).map_err(|e| StorageError::InvalidResponse {
            provider: PROVIDER_NAME,
            message: format!("could not parse blob listing: {}", e),
        })?;

    let mut records = Vec::with_capacity(results.blobs.blobs.len());
    for blob in results.blobs.blobs {
        let modified = DateTime::parse_from_rfc2822(&blob.properties.last_modified)
            .map_err(|e| StorageError::InvalidResponse {
                provider: PROVIDER_NAME,
                message: format!(
                    "bad Last-Modified '{}' for {}: {}",
                    blob.properties.last_modified, blob.name, e
                ),
            })?
            .with_timezone(&Utc);
        records.push(BackupRecord::new(blob.name, modified));
    }

    let marker = Some(results.next_marker.trim().to_string()).filter(|m| !m.is_empty());
    Ok((records, marker))
}

impl StorageProvider for AzureBlobProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn upload(&self, contents: &[u8], remote_path: &str) -> Result<(), StorageError> {
        let request = self
            .client
            .put(self.blob_url(remote_path))
            .header("x-ms-blob-type", "BlockBlob")
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(contents.to_vec());

        let response = self.send(request).map_err(|e| {
            warn!("Azure upload error: {}", e);
            e
        })?;

        if !response.status().is_success() {
            let err = error_from_response(response);
            warn!("Azure upload error for {}: {}", blob_name(remote_path), err);
            return Err(err);
        }

        debug!("Uploaded {} bytes to azure blob {}", contents.len(), blob_name(remote_path));
        Ok(())
    }

    fn list_backups(&self, prefix: &str) -> Result<Vec<BackupRecord>, StorageError> {
        let prefix = list_prefix(prefix);
        let mut records = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let request = self.client.get(self.list_url(&prefix, marker.as_deref()));
            let response = self.send(request).map_err(|e| {
                warn!("Azure list error: {}", e);
                e
            })?;

            if !response.status().is_success() {
                let err = error_from_response(response);
                warn!("Azure list error: {}", err);
                return Err(err);
            }

            let body = response.text().map_err(|source| StorageError::Transport {
                provider: PROVIDER_NAME,
                source,
            })?;
            let (page, next) = parse_list_response(&body)?;
            records.extend(page);

            match next {
                Some(next) => marker = Some(next),
                None => break,
            }
        }

        Ok(records)
    }

    fn delete(&self, remote_path: &str) -> Result<(), StorageError> {
        let request = self.client.delete(self.blob_url(remote_path));
        let response = self.send(request).map_err(|e| {
            warn!("Azure delete error: {}", e);
            e
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!("File {} not found for deletion", blob_name(remote_path));
            return Ok(());
        }
        if !status.is_success() {
            let err = error_from_response(response);
            warn!("Azure delete error for {}: {}", blob_name(remote_path), err);
            return Err(err);
        }
        Ok(())
    }

    fn create_directory(&self, _path: &str) -> Result<(), StorageError> {
        // Blob storage has no directories
        Ok(())
    }
}
